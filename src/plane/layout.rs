//! Horizontal and vertical layout planes.
//!
//! Layout nodes tile 2..4 child planes across the screen. Horizontal
//! layouts split each scanline into columns; vertical layouts hand whole
//! bands of scanlines to one child at a time. The last child always takes
//! whatever is left, expressed internally with a sentinel extent no real
//! mode reaches.

use super::{dispatch_render, dispatch_vblank, PlaneRef, VideoPlane};
use crate::rast::pixels_per_word;
use crate::util::render_cell::RenderCell;
use arrayvec::ArrayVec;

/// Extent of the final child; larger than any mode's width or height.
const STOPPER: i32 = 8000;

/// Rounds a column width down to a whole number of DMA words so every child
/// renders into an aligned buffer.
fn word_aligned(width: i32) -> i32 {
    width & !(pixels_per_word() as i32 - 1)
}

/// Tiles children left to right. Each child `i` takes `width[i]` pixels
/// (rounded down to a DMA word); the last child takes the rest of the line.
pub struct HorizontalLayout {
    planes: ArrayVec<(PlaneRef, i32), 4>,
}

impl HorizontalLayout {
    pub fn split2(p0: PlaneRef, w0: i32, p1: PlaneRef) -> HorizontalLayout {
        Self::build([(p0, w0), (p1, STOPPER)].into_iter())
    }

    pub fn split3(
        p0: PlaneRef,
        w0: i32,
        p1: PlaneRef,
        w1: i32,
        p2: PlaneRef,
    ) -> HorizontalLayout {
        Self::build([(p0, w0), (p1, w1), (p2, STOPPER)].into_iter())
    }

    pub fn split4(
        p0: PlaneRef,
        w0: i32,
        p1: PlaneRef,
        w1: i32,
        p2: PlaneRef,
        w2: i32,
        p3: PlaneRef,
    ) -> HorizontalLayout {
        Self::build([(p0, w0), (p1, w1), (p2, w2), (p3, STOPPER)].into_iter())
    }

    fn build(children: impl Iterator<Item = (PlaneRef, i32)>) -> HorizontalLayout {
        let planes: ArrayVec<(PlaneRef, i32), 4> = children
            .map(|(p, w)| {
                assert!(w >= 0);
                (p, word_aligned(w))
            })
            .collect();
        HorizontalLayout { planes }
    }
}

impl VideoPlane for HorizontalLayout {
    #[cfg_attr(target_os = "none", link_section = ".data.rp2vga.hl_vblank")]
    fn vblank(&self) {
        for (p, _) in &self.planes {
            dispatch_vblank(&**p);
        }
    }

    #[cfg_attr(target_os = "none", link_section = ".data.rp2vga.hl_render")]
    fn render(&self, row: i32, width: i32, buf: &mut [u32]) {
        let mut remaining = width;
        let mut offset = 0usize;
        for (p, w) in &self.planes {
            let w = (*w).min(remaining);
            let words = w as usize / pixels_per_word();
            dispatch_render(&**p, row, w, &mut buf[offset..offset + words]);
            remaining -= w;
            offset += words;
            if remaining == 0 {
                break;
            }
        }
    }

    fn ram_resident(&self) -> bool {
        // The layout itself stays out of flash; children are gated one by
        // one through the dispatchers.
        true
    }
}

/// Stacks children top to bottom. Child `i` covers `height[i]` rows; the
/// last child covers the rest of the frame. A negative height on leading
/// children shifts the whole stack up: the first on-screen child enters with
/// its top rows already consumed.
pub struct VerticalLayout {
    planes: ArrayVec<(PlaneRef, i32), 4>,
    state: RenderCell<Bands>,
}

#[derive(Default)]
struct Bands {
    idx: usize,
    top: i32,
}

impl VerticalLayout {
    pub fn split2(p0: PlaneRef, h0: i32, p1: PlaneRef) -> VerticalLayout {
        Self::build([(p0, h0), (p1, STOPPER)].into_iter())
    }

    pub fn split3(p0: PlaneRef, h0: i32, p1: PlaneRef, h1: i32, p2: PlaneRef) -> VerticalLayout {
        Self::build([(p0, h0), (p1, h1), (p2, STOPPER)].into_iter())
    }

    pub fn split4(
        p0: PlaneRef,
        h0: i32,
        p1: PlaneRef,
        h1: i32,
        p2: PlaneRef,
        h2: i32,
        p3: PlaneRef,
    ) -> VerticalLayout {
        Self::build([(p0, h0), (p1, h1), (p2, h2), (p3, STOPPER)].into_iter())
    }

    fn build(children: impl Iterator<Item = (PlaneRef, i32)>) -> VerticalLayout {
        let planes: ArrayVec<(PlaneRef, i32), 4> = children.collect();
        for (_, h) in planes.iter().take(planes.len() - 1) {
            assert!(*h > -1000, "band height out of range");
        }
        VerticalLayout {
            planes,
            state: RenderCell::default(),
        }
    }
}

impl VideoPlane for VerticalLayout {
    #[cfg_attr(target_os = "none", link_section = ".data.rp2vga.vl_vblank")]
    fn vblank(&self) {
        self.state.with(|b| {
            b.idx = 0;
            b.top = 0;
        });
        for (p, _) in &self.planes {
            dispatch_vblank(&**p);
        }
    }

    #[cfg_attr(target_os = "none", link_section = ".data.rp2vga.vl_render")]
    fn render(&self, row: i32, width: i32, buf: &mut [u32]) {
        self.state.with(|b| {
            while row - b.top >= self.planes[b.idx].1 {
                b.top += self.planes[b.idx].1;
                b.idx += 1;
            }
            dispatch_render(&*self.planes[b.idx].0, row - b.top, width, buf);
        });
    }

    fn ram_resident(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::plane::{share, Backdrop};
    use crate::rast::colors_mut;
    use crate::Arc;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::sync::atomic::{AtomicI32, Ordering};

    /// Records the rows it is asked to render.
    struct RowProbe {
        last_row: Arc<AtomicI32>,
        fill: Color,
    }

    impl RowProbe {
        fn new(fill: Color) -> (RowProbe, Arc<AtomicI32>) {
            let last_row = Arc::new(AtomicI32::new(i32::MIN));
            (
                RowProbe {
                    last_row: last_row.clone(),
                    fill,
                },
                last_row,
            )
        }
    }

    impl VideoPlane for RowProbe {
        fn render(&self, row: i32, width: i32, buf: &mut [u32]) {
            self.last_row.store(row, Ordering::Relaxed);
            for c in colors_mut(buf)[..width as usize].iter_mut() {
                *c = self.fill;
            }
        }
        fn ram_resident(&self) -> bool {
            true
        }
    }

    fn line(width: i32) -> Vec<u32> {
        vec![0u32; width as usize / pixels_per_word()]
    }

    #[test]
    fn horizontal_concatenates_children() {
        // 320 wide, red | blue at 160
        let hl = HorizontalLayout::split2(
            share(Backdrop::new(Color::RED)),
            160,
            share(Backdrop::new(Color::BLUE)),
        );
        let mut buf = line(320);
        hl.render(7, 320, &mut buf);
        let px = colors_mut(&mut buf);
        assert!(px[..160].iter().all(|&c| c == Color::RED));
        assert!(px[160..320].iter().all(|&c| c == Color::BLUE));
    }

    #[test]
    fn horizontal_widths_sum_to_total() {
        // additivity: widths 64+128+rest over 320
        let hl = HorizontalLayout::split3(
            share(Backdrop::new(Color::RED)),
            64,
            share(Backdrop::new(Color::GREEN)),
            128,
            share(Backdrop::new(Color::BLUE)),
        );
        let mut buf = line(320);
        hl.render(0, 320, &mut buf);
        let px = colors_mut(&mut buf);
        assert!(px[..64].iter().all(|&c| c == Color::RED));
        assert!(px[64..192].iter().all(|&c| c == Color::GREEN));
        assert!(px[192..320].iter().all(|&c| c == Color::BLUE));
    }

    #[test]
    fn horizontal_rounds_widths_to_dma_words() {
        let ppw = pixels_per_word() as i32;
        let hl = HorizontalLayout::split2(
            share(Backdrop::new(Color::RED)),
            ppw + 1,
            share(Backdrop::new(Color::BLUE)),
        );
        let mut buf = line(8 * ppw);
        hl.render(0, 8 * ppw, &mut buf);
        let px = colors_mut(&mut buf);
        assert!(px[..ppw as usize].iter().all(|&c| c == Color::RED));
        assert!(px[ppw as usize..].iter().all(|&c| c == Color::BLUE));
    }

    #[test]
    fn vertical_bands_switch_at_heights() {
        let top = share(Backdrop::new(Color::RED));
        let (probe, _) = RowProbe::new(Color::BLUE);
        let vl = VerticalLayout::split2(top, 100, share(probe));
        vl.vblank();
        let mut buf = line(16);
        for row in 0..120 {
            vl.render(row, 16, &mut buf);
            let px = colors_mut(&mut buf);
            let expect = if row < 100 { Color::RED } else { Color::BLUE };
            assert_eq!(px[0], expect, "row {}", row);
        }
    }

    #[test]
    fn vertical_children_see_rows_from_their_top() {
        let (probe0, _) = RowProbe::new(Color::RED);
        let (probe1, rows1) = RowProbe::new(Color::BLUE);
        let vl = VerticalLayout::split2(share(probe0), 10, share(probe1));
        vl.vblank();
        let mut buf = line(16);
        for row in 0..14 {
            vl.render(row, 16, &mut buf);
        }
        assert_eq!(rows1.load(Ordering::Relaxed), 3); // row 13 - top 10
    }

    #[test]
    fn negative_first_band_shifts_the_stack_up() {
        let (above, _) = RowProbe::new(Color::RED);
        let (probe, rows) = RowProbe::new(Color::BLUE);
        let vl = VerticalLayout::split2(share(above), -5, share(probe));
        vl.vblank();
        let mut buf = line(16);
        vl.render(0, 16, &mut buf);
        assert_eq!(rows.load(Ordering::Relaxed), 5);
    }
}
