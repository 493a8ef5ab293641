//! Hold-and-modify rasterizer.
//!
//! An 8-bit index stream where codes below `first_rel_code` are absolute
//! palette colors and codes at or above it are signed component offsets added
//! to the previous pixel. The carried color survives scanlines: at the start
//! of a row the accumulator is primed with the final color of the *previous*
//! row's first pixel, so vertical blends propagate downward while each row
//! stays self-contained once its first absolute pixel arrives.
//!
//! Relative codes are classified by palette *address*: the palette is laid
//! out with all absolute entries below `first_rel_code`, so a single pointer
//! comparison on the interpolator's pop result decides absolute vs. relative
//! without touching the code byte again.

use crate::color::{Color, ColorMap};
use crate::interp::{Interp, InterpUnit};
use crate::Arc;

pub struct HamRenderer {
    colormap: Arc<ColorMap>,
    first_rel_code: u16,
    /// Initial color at the start of the next row.
    first_color: Color,
    interp: Interp,
}

impl HamRenderer {
    /// `colormap` must have 256 entries; `first_rel_code` is the first
    /// relative (offset) code.
    pub fn new(colormap: Arc<ColorMap>, first_rel_code: u16) -> HamRenderer {
        assert_eq!(colormap.len(), 256);
        HamRenderer {
            colormap,
            first_rel_code,
            first_color: Color::BLACK,
            interp: Interp::new(InterpUnit::I0),
        }
    }

    pub fn set_first_rel_code(&mut self, first_rel_code: u16) {
        self.first_rel_code = first_rel_code;
    }

    pub fn vblank(&mut self) {
        self.first_color = Color::BLACK;
        self.interp.configure(8, self.colormap.colors());
    }

    pub fn render(&mut self, dest: &mut [Color], pixels: &[u8]) {
        #[cfg(feature = "interp-per-scanline")]
        self.interp.configure(8, self.colormap.colors());

        if dest.is_empty() {
            return;
        }

        let first_rel = unsafe {
            // Safety: in-bounds or one-past-end of the palette allocation.
            self.colormap.colors().as_ptr().add(self.first_rel_code as usize)
        };

        let dest_len = dest.len();
        let mut cur = self.first_color;
        let mut out = dest.iter_mut();
        let mut pairs = pixels.chunks_exact(2);
        let mut remaining = dest_len;

        while remaining >= 2 {
            let pair = pairs.next().unwrap();
            self.interp
                .set_pixels(u16::from_le_bytes([pair[0], pair[1]]) as u32);
            for _ in 0..2 {
                let entry = self.interp.pop();
                // Safety: masked 8-bit index into a 256-entry palette.
                cur = unsafe {
                    if entry >= first_rel {
                        cur + *entry
                    } else {
                        *entry
                    }
                };
                *out.next().unwrap() = cur;
            }
            remaining -= 2;
        }
        if remaining != 0 {
            let code = pixels[dest_len - 1];
            self.interp.set_pixels(code as u32);
            let entry = self.interp.pop();
            cur = unsafe {
                if entry >= first_rel {
                    cur + *entry
                } else {
                    *entry
                }
            };
            *out.next().unwrap() = cur;
        }

        self.first_color = dest[0];
    }
}

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn ham_palette() -> Arc<ColorMap> {
        // 128 absolute codes, 128 relative codes.
        let mut colors = Vec::new();
        colors.resize(256, Color::BLACK);
        colors[5] = Color::new(20, 20, 20); // "red" anchor of the S4 scenario
        colors[253] = Color::new(1, 1, 1); // +1 on every component
        Arc::new(ColorMap::new(colors.into_boxed_slice()))
    }

    #[test]
    fn carry_accumulates_and_absolute_resets() {
        let mut r = HamRenderer::new(ham_palette(), 128);
        r.vblank();
        let mut dest = [Color::BLACK; 4];
        r.render(&mut dest, &[5, 253, 253, 5]);
        assert_eq!(dest[0], Color::new(20, 20, 20));
        assert_eq!(dest[1], Color::new(21, 21, 21));
        assert_eq!(dest[2], Color::new(22, 22, 22));
        assert_eq!(dest[3], Color::new(20, 20, 20));
    }

    #[test]
    fn next_row_primes_from_first_pixel() {
        let mut r = HamRenderer::new(ham_palette(), 128);
        r.vblank();
        let mut row0 = [Color::BLACK; 2];
        r.render(&mut row0, &[5, 253]);
        // next row starts relative: applies offset to row0's first pixel
        let mut row1 = [Color::BLACK; 2];
        r.render(&mut row1, &[253, 253]);
        assert_eq!(row1[0], Color::new(21, 21, 21));
        assert_eq!(row1[1], Color::new(22, 22, 22));
    }

    #[test]
    fn vblank_clears_the_carry() {
        let mut r = HamRenderer::new(ham_palette(), 128);
        r.vblank();
        let mut row = [Color::BLACK; 1];
        r.render(&mut row, &[5]);
        r.vblank();
        let mut row2 = [Color::BLACK; 1];
        r.render(&mut row2, &[253]);
        assert_eq!(row2[0], Color::BLACK + Color::new(1, 1, 1));
    }
}
