//! Framebuffer planes.
//!
//! Adapts a [`Pixmap`] (plus palette, for the indexed modes) to the plane
//! contract. The row position is not derived from the `row` argument: vblank
//! resets the internal pointers and every `render` advances them by one row.
//! If a scanline is ever missed the remainder of the frame is shifted by one
//! line; the next vblank resheets everything, which is the recovery policy
//! for the whole pipeline.

use super::VideoPlane;
use crate::color::ColorMap;
use crate::pixmap::{GeometryError, Pixmap};
use crate::rast::{pixels_per_word, Renderer};
use crate::util::render_cell::RenderCell;
use crate::Arc;

pub struct FrameBuffer {
    pixmap: Arc<Pixmap>,
    state: RenderCell<FbState>,
}

struct FbState {
    renderer: Renderer,
    row: usize,
    arow: usize,
    arow_countdown: u32,
}

impl FrameBuffer {
    /// Builds a framebuffer plane over `pixmap`. Indexed modes take their
    /// palette from `colormap`, falling back to the stock palette of the
    /// mode's depth.
    pub fn new(
        pixmap: Arc<Pixmap>,
        colormap: Option<Arc<ColorMap>>,
    ) -> Result<FrameBuffer, GeometryError> {
        let renderer = Renderer::for_mode(pixmap.mode(), colormap)?;
        let arow_countdown = pixmap.attr_height();
        Ok(FrameBuffer {
            pixmap,
            state: RenderCell::new(FbState {
                renderer,
                row: 0,
                arow: 0,
                arow_countdown,
            }),
        })
    }

    pub fn pixmap(&self) -> &Arc<Pixmap> {
        &self.pixmap
    }
}

impl VideoPlane for FrameBuffer {
    #[cfg_attr(target_os = "none", link_section = ".data.rp2vga.fb_vblank")]
    fn vblank(&self) {
        let attr_height = self.pixmap.attr_height();
        self.state.with(|s| {
            s.row = 0;
            s.arow = 0;
            s.arow_countdown = attr_height;
            s.renderer.vblank();
        });
    }

    #[cfg_attr(target_os = "none", link_section = ".data.rp2vga.fb_render")]
    fn render(&self, _row: i32, width: i32, buf: &mut [u32]) {
        let pm = &*self.pixmap;
        self.state.with(|s| {
            // We don't check the row: vblank resets the pointers, and after
            // a missed scanline the rest of the frame is simply shifted.
            if s.row >= pm.height() as usize {
                return;
            }

            // A pixmap narrower than the plane gets its width rounded down
            // to whole DMA words; a ragged right edge stays untouched.
            let width = width.min(pm.width()) as usize & !(pixels_per_word() - 1);
            let pixels = pm.row(s.row);
            let is_attr = pm.mode().is_attribute();
            let attrs = is_attr.then(|| pm.attr_row(s.arow));
            s.renderer
                .render(&mut buf[..width / pixels_per_word()], width, pixels, attrs);

            s.row += 1;
            if is_attr {
                s.arow_countdown -= 1;
                if s.arow_countdown == 0 {
                    s.arow_countdown = pm.attr_height();
                    s.arow += 1;
                }
            }
        });
    }

    fn ram_resident(&self) -> bool {
        // Renderer tables, palette and pixmap are heap allocations; the
        // render paths carry RAM link sections.
        true
    }
}

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::plane::dispatch_vblank;
    use crate::rast::{colors_mut, ColorMode};
    use alloc::vec;

    fn render_rows(fb: &FrameBuffer, width: i32, rows: usize) -> vec::Vec<vec::Vec<Color>> {
        let words = width as usize / pixels_per_word();
        let mut out = vec::Vec::new();
        for r in 0..rows {
            let mut buf = vec![0u32; words];
            fb.render(r as i32, width, &mut buf);
            out.push(colors_mut(&mut buf).to_vec());
        }
        out
    }

    #[test]
    fn solid_i1_pixmap_renders_palette_color_zero() {
        // 640x480, 1 bpp, all zero bits, palette {black, bright white}:
        // every pixel of every scanline is black.
        let pm = Arc::new(Pixmap::filled(ColorMode::I1, 640, 480, 0));
        let cmap = Arc::new(ColorMap::from_slice(&[
            Color::BLACK,
            Color::BRIGHT_WHITE,
        ]));
        let fb = FrameBuffer::new(pm, Some(cmap)).unwrap();
        fb.vblank();
        let rows = render_rows(&fb, 640, 2);
        for row in &rows {
            assert_eq!(row.len(), 640);
            assert!(row.iter().all(|&c| c == Color::BLACK));
        }
    }

    #[test]
    fn attribute_rows_advance_every_attr_height() {
        // 16x4 a2w8, attr_height 2: rows 0-1 use attr row 0, rows 2-3 attr
        // row 1.
        let mut attrs = vec![Color::RED; 8];
        attrs.extend(vec![Color::BLUE; 8]);
        let pm = Arc::new(
            Pixmap::with_attributes(
                ColorMode::A2W8,
                16,
                4,
                vec![0u8; 16].into(), // all pixels value 0
                4,
                attrs.into(),
                8,
                2,
            )
            .unwrap(),
        );
        let fb = FrameBuffer::new(pm, None).unwrap();
        fb.vblank();
        let rows = render_rows(&fb, 16, 4);
        assert!(rows[0].iter().all(|&c| c == Color::RED));
        assert!(rows[1].iter().all(|&c| c == Color::RED));
        assert!(rows[2].iter().all(|&c| c == Color::BLUE));
        assert!(rows[3].iter().all(|&c| c == Color::BLUE));
    }

    #[test]
    fn vblank_is_idempotent() {
        let pm = Arc::new(Pixmap::filled(ColorMode::I8, 8, 4, 3));
        let fb = FrameBuffer::new(pm, None).unwrap();
        fb.vblank();
        let first = render_rows(&fb, 8, 1);
        dispatch_vblank(&fb);
        dispatch_vblank(&fb);
        let second = render_rows(&fb, 8, 1);
        assert_eq!(first, second);
    }

    #[test]
    fn rows_past_the_pixmap_render_nothing() {
        let pm = Arc::new(Pixmap::filled(ColorMode::I8, 8, 2, 1));
        let fb = FrameBuffer::new(pm, None).unwrap();
        fb.vblank();
        let words = 8 / pixels_per_word();
        let mut buf = vec![0xFFFF_FFFFu32; words];
        fb.render(0, 8, &mut buf);
        fb.render(1, 8, &mut buf);
        let before = buf.clone();
        fb.render(2, 8, &mut buf);
        assert_eq!(buf, before);
    }
}
