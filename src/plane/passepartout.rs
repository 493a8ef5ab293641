//! Passepartout: a border around an inner plane.
//!
//! Clears the bars above, below and beside a centered window and delegates
//! the window to the inner plane with adjusted row numbers and buffer
//! offsets. Shrinking the window to zero height is the supported way to
//! blank an inner plane while its content is being replaced.

use super::{dispatch_render, dispatch_vblank, PlaneRef, VideoPlane};
use crate::rast::pixels_per_word;
use crate::util::render_cell::RenderCell;

pub struct Passepartout {
    inner: PlaneRef,
    geom: RenderCell<Geometry>,
}

struct Geometry {
    height: i32,
    /// Window width in DMA words.
    inner_words: i32,
    inner_height: i32,
    top: i32,
}

impl Geometry {
    fn set(&mut self, width: i32, height: i32, inner_width: i32, inner_height: i32) {
        let ppw = pixels_per_word() as i32;
        self.height = height;
        self.inner_words = inner_width.min(width) / ppw;
        self.inner_height = inner_height.min(height);
        self.top = (height - self.inner_height) / 2;
    }
}

impl Passepartout {
    /// Frames `inner` in an `inner_width` x `inner_height` window centered
    /// in `width` x `height`.
    pub fn new(
        inner: PlaneRef,
        width: i32,
        height: i32,
        inner_width: i32,
        inner_height: i32,
    ) -> Passepartout {
        let mut geom = Geometry {
            height: 0,
            inner_words: 0,
            inner_height: 0,
            top: 0,
        };
        geom.set(width, height, inner_width, inner_height);
        Passepartout {
            inner,
            geom: RenderCell::new(geom),
        }
    }

    /// Resizes the window. Call from a one-time action so the change lands
    /// at a frame boundary.
    pub fn set_inner_size(&self, width: i32, height: i32, inner_width: i32, inner_height: i32) {
        self.geom
            .with(|g| g.set(width, height, inner_width, inner_height));
    }
}

#[cfg_attr(target_os = "none", link_section = ".data.rp2vga.ppt_clear")]
fn clear_row(buf: &mut [u32]) {
    let mut p = buf.as_mut_ptr();
    // Volatile, so the compiler cannot call a flash-resident memclr.
    // Safety: p walks exactly buf.len() elements.
    unsafe {
        for _ in 0..buf.len() {
            core::ptr::write_volatile(p, 0);
            p = p.add(1);
        }
    }
}

impl VideoPlane for Passepartout {
    #[cfg_attr(target_os = "none", link_section = ".data.rp2vga.ppt_vblank")]
    fn vblank(&self) {
        dispatch_vblank(&*self.inner);
    }

    #[cfg_attr(target_os = "none", link_section = ".data.rp2vga.ppt_render")]
    fn render(&self, row: i32, width: i32, buf: &mut [u32]) {
        let ppw = pixels_per_word() as i32;
        let words = width / ppw;
        self.geom.with(|g| {
            debug_assert!(words >= g.inner_words);
            if (row - g.top) as u32 >= g.inner_height as u32 {
                clear_row(&mut buf[..words as usize]);
                return;
            }
            let left = (words - g.inner_words) / 2;
            let right = words - g.inner_words - left;
            clear_row(&mut buf[..left as usize]);
            let after = (left + g.inner_words) as usize;
            clear_row(&mut buf[after..after + right as usize]);
            dispatch_render(
                &*self.inner,
                row - g.top,
                g.inner_words * ppw,
                &mut buf[left as usize..after],
            );
        });
    }

    fn ram_resident(&self) -> bool {
        // The bars and geometry stay out of flash; the inner plane is gated
        // by the dispatcher.
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::plane::{share, Backdrop};
    use crate::rast::colors_mut;
    use alloc::vec;

    #[test]
    fn bars_are_black_and_window_is_centered() {
        let ppw = pixels_per_word() as i32;
        // screen 32 px, window 16 px wide, rows 2..6 of 8
        let pp = Passepartout::new(share(Backdrop::new(Color::RED)), 32, 8, 16, 4);
        let words = (32 / ppw) as usize;

        let mut buf = vec![0xFFFF_FFFFu32; words];
        pp.render(0, 32, &mut buf);
        assert!(buf.iter().all(|&w| w == 0), "top bar must be cleared");

        let mut buf = vec![0xFFFF_FFFFu32; words];
        pp.render(3, 32, &mut buf);
        let px = colors_mut(&mut buf);
        assert!(px[..8].iter().all(|&c| c == Color::BLACK));
        assert!(px[8..24].iter().all(|&c| c == Color::RED));
        assert!(px[24..].iter().all(|&c| c == Color::BLACK));

        let mut buf = vec![0xFFFF_FFFFu32; words];
        pp.render(6, 32, &mut buf);
        assert!(buf.iter().all(|&w| w == 0), "bottom bar must be cleared");
    }

    #[test]
    fn zero_height_window_blanks_everything() {
        let pp = Passepartout::new(share(Backdrop::new(Color::RED)), 32, 8, 16, 4);
        pp.set_inner_size(32, 8, 16, 0);
        let words = 32 / pixels_per_word();
        let mut buf = vec![0xFFFF_FFFFu32; words];
        for row in 0..8 {
            pp.render(row, 32, &mut buf);
            assert!(buf.iter().all(|&w| w == 0));
        }
    }
}
