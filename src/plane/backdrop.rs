//! Uni-color backdrop plane.

use super::VideoPlane;
use crate::color::Color;
use crate::rast::pixels_per_word;

/// Fills every scanline with one color. Usually the bottom of the plane
/// stack, and the cheapest way to guarantee every pixel is written.
///
/// Fully RAM-resident: the fill below goes through volatile writes so the
/// compiler cannot substitute a flash-resident `memset`, and the replicated
/// color lives in the plane itself.
pub struct Backdrop {
    word: u32,
}

impl Backdrop {
    pub fn new(color: Color) -> Backdrop {
        Backdrop {
            word: color.replicated(),
        }
    }
}

impl VideoPlane for Backdrop {
    #[cfg_attr(target_os = "none", link_section = ".data.rp2vga.backdrop")]
    fn render(&self, _row: i32, width: i32, buf: &mut [u32]) {
        let words = width as usize / pixels_per_word();
        let word = self.word;
        let mut p = buf[..words].as_mut_ptr();
        // Safety: p walks exactly `words` elements of the checked subslice.
        unsafe {
            for _ in 0..words / 2 {
                core::ptr::write_volatile(p, word);
                p = p.add(1);
                core::ptr::write_volatile(p, word);
                p = p.add(1);
            }
            if words & 1 != 0 {
                core::ptr::write_volatile(p, word);
            }
        }
    }

    fn ram_resident(&self) -> bool {
        true
    }
}
