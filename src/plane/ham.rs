//! Hold-and-modify image plane.
//!
//! An 8-bit indexed framebuffer whose palette is split into absolute colors
//! and relative offset codes (see `rast::ham`). Only worthwhile when the
//! hardware color is wider than a byte; images for this mode come from the
//! resource compressor via `ham_image`.

use super::VideoPlane;
use crate::color::ColorMap;
use crate::ham_image::HamImage;
use crate::pixmap::{GeometryError, Pixmap};
use crate::rast::{ColorMode, HamRenderer};
use crate::util::render_cell::RenderCell;
use crate::Arc;

pub struct HamImagePlane {
    state: RenderCell<HamState>,
}

struct HamState {
    pixmap: Arc<Pixmap>,
    renderer: HamRenderer,
    row: usize,
}

impl HamImagePlane {
    /// Builds the plane over an 8-bit indexed pixmap and a 256-entry
    /// palette. Codes at or above `first_rel_code` are relative.
    pub fn new(
        pixmap: Arc<Pixmap>,
        colormap: Arc<ColorMap>,
        first_rel_code: u16,
    ) -> Result<HamImagePlane, GeometryError> {
        if pixmap.mode() != ColorMode::I8 {
            return Err(GeometryError::WrongColorMode);
        }
        if colormap.len() != 256 {
            return Err(GeometryError::PaletteTooSmall);
        }
        if pixmap.row_offset() & 1 != 0 {
            return Err(GeometryError::OddRowOffset);
        }
        Ok(HamImagePlane {
            state: RenderCell::new(HamState {
                pixmap,
                renderer: HamRenderer::new(colormap, first_rel_code),
                row: 0,
            }),
        })
    }

    /// Builds the plane straight from a decoded image file.
    pub fn from_image(image: &HamImage) -> Result<HamImagePlane, GeometryError> {
        HamImagePlane::new(
            image.pixmap.clone(),
            image.colormap.clone(),
            image.first_rel_code,
        )
    }

    /// Swaps in the next image. The palette is reused; callers replace its
    /// backing pixmap wholesale. Call from a one-time action, with the plane
    /// blanked (e.g. a zero-height passepartout window) if the swap spans
    /// several frames.
    pub fn set_next_image(&self, pixmap: Arc<Pixmap>, first_rel_code: u16) {
        self.state.with(|s| {
            debug_assert_eq!(pixmap.mode(), ColorMode::I8);
            debug_assert_eq!(pixmap.row_offset() & 1, 0);
            s.pixmap = pixmap;
            s.renderer.set_first_rel_code(first_rel_code);
        });
    }
}

impl VideoPlane for HamImagePlane {
    #[cfg_attr(target_os = "none", link_section = ".data.rp2vga.ham_vblank")]
    fn vblank(&self) {
        self.state.with(|s| {
            s.row = 0;
            s.renderer.vblank();
        });
    }

    #[cfg_attr(target_os = "none", link_section = ".data.rp2vga.ham_render")]
    fn render(&self, _row: i32, width: i32, buf: &mut [u32]) {
        self.state.with(|s| {
            // Like the plain framebuffer: trust vblank for the row pointer.
            if s.row >= s.pixmap.height() as usize {
                return;
            }
            let width = width.min(s.pixmap.width()) as usize
                & !(crate::rast::pixels_per_word() - 1);
            let pixels = s.pixmap.row(s.row);
            s.row += 1;
            let dest = &mut crate::rast::colors_mut(buf)[..width];
            s.renderer.render(dest, pixels);
        });
    }

    fn ram_resident(&self) -> bool {
        true
    }
}

#[cfg(all(test, not(target_os = "none"), not(feature = "color-8bit")))]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::rast::colors_mut;
    use alloc::vec;
    use alloc::vec::Vec;

    fn palette() -> Arc<ColorMap> {
        let mut colors = vec![Color::BLACK; 256];
        colors[1] = Color::new(4, 4, 4);
        colors[200] = Color::new(1, 0, 0); // relative +1 red
        Arc::new(ColorMap::new(colors.into_boxed_slice()))
    }

    #[test]
    fn renders_rows_with_carry_between_them() {
        // 2x2 image: row0 = [abs, +1r], row1 = [+1r, +1r]
        let pm = Arc::new(
            Pixmap::new(ColorMode::I8, 2, 2, vec![1, 200, 200, 200].into(), 2).unwrap(),
        );
        let plane = HamImagePlane::new(pm, palette(), 128).unwrap();
        plane.vblank();

        let mut buf = vec![0u32; 2];
        plane.render(0, 2, &mut buf);
        let row0: Vec<Color> = colors_mut(&mut buf)[..2].to_vec();
        assert_eq!(row0[0], Color::new(4, 4, 4));
        assert_eq!(row0[1], Color::new(5, 4, 4));

        let mut buf2 = vec![0u32; 2];
        plane.render(1, 2, &mut buf2);
        let row1: Vec<Color> = colors_mut(&mut buf2)[..2].to_vec();
        // row1 starts from row0's first pixel
        assert_eq!(row1[0], Color::new(5, 4, 4));
        assert_eq!(row1[1], Color::new(6, 4, 4));
    }

    #[test]
    fn rejects_wrong_mode_and_odd_stride() {
        let wrong = Arc::new(Pixmap::filled(ColorMode::I4, 4, 2, 0));
        assert_eq!(
            HamImagePlane::new(wrong, palette(), 128).err(),
            Some(GeometryError::WrongColorMode)
        );

        let odd = Arc::new(
            Pixmap::new(ColorMode::I8, 3, 2, vec![0; 6].into(), 3).unwrap(),
        );
        assert_eq!(
            HamImagePlane::new(odd, palette(), 128).err(),
            Some(GeometryError::OddRowOffset)
        );
    }

    #[test]
    fn set_next_image_resets_content() {
        let pm = Arc::new(Pixmap::new(ColorMode::I8, 2, 1, vec![1, 1].into(), 2).unwrap());
        let plane = HamImagePlane::new(pm, palette(), 128).unwrap();
        let next = Arc::new(Pixmap::new(ColorMode::I8, 2, 1, vec![0, 0].into(), 2).unwrap());
        plane.set_next_image(next, 100);
        plane.vblank();
        let mut buf = vec![0u32; 2];
        plane.render(0, 2, &mut buf);
        // codes 0 with first_rel 100: absolute black
        assert_eq!(colors_mut(&mut buf)[0], Color::BLACK);
    }
}
