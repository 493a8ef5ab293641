//! Indexed-color rasterizers.
//!
//! The 1- and 2-bit modes expand every possible pixel byte into a lookup
//! table at construction time, so the inner loop is a single indexed copy of
//! 8 (or 4) colors per input byte. The 4- and 8-bit modes would need 8 KiB
//! and 64 KiB tables for the same trick, so they lean on the interpolator
//! instead: one pop per pixel.

use crate::color::Color;
use crate::color::ColorMap;
use crate::interp::{Interp, InterpUnit};
use crate::Arc;
use alloc::boxed::Box;
use alloc::vec::Vec;

/// 1 bit per pixel through a 256-byte-to-8-colors table.
pub struct I1Renderer {
    /// `table[byte * 8 + i]` is the color of bit `i` of `byte`.
    table: Box<[Color]>,
}

impl I1Renderer {
    pub fn new(colormap: &[Color]) -> I1Renderer {
        let mut table = Vec::with_capacity(256 * 8);
        for byte in 0..256 {
            for bit in 0..8 {
                table.push(colormap[(byte >> bit) & 1]);
            }
        }
        I1Renderer {
            table: table.into_boxed_slice(),
        }
    }

    pub fn render(&self, dest: &mut [Color], pixels: &[u8]) {
        let mut chunks = dest.chunks_exact_mut(8);
        let mut src = pixels.iter();
        for out in chunks.by_ref() {
            let byte = *src.next().unwrap() as usize;
            out.copy_from_slice(&self.table[byte * 8..byte * 8 + 8]);
        }
        let tail = chunks.into_remainder();
        if !tail.is_empty() {
            let byte = *src.next().unwrap() as usize;
            tail.copy_from_slice(&self.table[byte * 8..byte * 8 + tail.len()]);
        }
    }
}

/// 2 bits per pixel through a 256-byte-to-4-colors table.
pub struct I2Renderer {
    table: Box<[Color]>,
}

impl I2Renderer {
    pub fn new(colormap: &[Color]) -> I2Renderer {
        let mut table = Vec::with_capacity(256 * 4);
        for byte in 0..256 {
            for px in 0..4 {
                table.push(colormap[(byte >> (px * 2)) & 3]);
            }
        }
        I2Renderer {
            table: table.into_boxed_slice(),
        }
    }

    pub fn render(&self, dest: &mut [Color], pixels: &[u8]) {
        let mut chunks = dest.chunks_exact_mut(4);
        let mut src = pixels.iter();
        for out in chunks.by_ref() {
            let byte = *src.next().unwrap() as usize;
            out.copy_from_slice(&self.table[byte * 4..byte * 4 + 4]);
        }
        let tail = chunks.into_remainder();
        if !tail.is_empty() {
            let byte = *src.next().unwrap() as usize;
            tail.copy_from_slice(&self.table[byte * 4..byte * 4 + tail.len()]);
        }
    }
}

/// 4 or 8 bits per pixel via the interpolator (unit 1).
pub struct InterpIndexed {
    bits: u32,
    colormap: Arc<ColorMap>,
    interp: Interp,
}

impl InterpIndexed {
    pub fn new(bits: u32, colormap: Arc<ColorMap>) -> InterpIndexed {
        debug_assert!(bits == 4 || bits == 8);
        InterpIndexed {
            bits,
            colormap,
            interp: Interp::new(InterpUnit::I1),
        }
    }

    pub fn vblank(&mut self) {
        self.interp.configure(self.bits, self.colormap.colors());
    }

    pub fn render(&mut self, dest: &mut [Color], pixels: &[u8]) {
        #[cfg(feature = "interp-per-scanline")]
        self.interp.configure(self.bits, self.colormap.colors());

        let per_halfword = (16 / self.bits) as usize;
        let mut out = dest.chunks_exact_mut(per_halfword);
        let mut src = pixels.chunks_exact(2);
        for chunk in out.by_ref() {
            let pair = src.next().unwrap();
            self.interp
                .set_pixels(u16::from_le_bytes([pair[0], pair[1]]) as u32);
            for d in chunk.iter_mut() {
                *d = self.interp.next_color();
            }
        }
        // Odd trailing byte, or a width that is not a multiple of one load.
        let tail = out.into_remainder();
        if !tail.is_empty() {
            let rest = src.remainder();
            let lo = rest.first().copied().unwrap_or(0);
            let hi = rest.get(1).copied().unwrap_or(0);
            self.interp.set_pixels(u16::from_le_bytes([lo, hi]) as u32);
            for d in tail.iter_mut() {
                *d = self.interp.next_color();
            }
        }
    }
}

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    use super::*;
    use crate::color::DEFAULT_COLORMAP_I4;

    fn c(n: u16) -> Color {
        Color::from_raw(n as _)
    }

    #[test]
    fn i1_low_bits_are_leftmost() {
        let r = I1Renderer::new(&[c(0xAA), c(0x55)]);
        let mut dest = [Color::BLACK; 8];
        r.render(&mut dest, &[0b0000_0101]);
        assert_eq!(dest[0], c(0x55));
        assert_eq!(dest[1], c(0xAA));
        assert_eq!(dest[2], c(0x55));
        assert_eq!(dest[3], c(0xAA));
    }

    #[test]
    fn i2_packs_four_pixels_per_byte() {
        let pal = [c(10), c(11), c(12), c(13)];
        let r = I2Renderer::new(&pal);
        let mut dest = [Color::BLACK; 4];
        // pixels left to right: 3, 2, 0, 1
        r.render(&mut dest, &[0b01_00_10_11]);
        assert_eq!(dest, [c(13), c(12), c(10), c(11)]);
    }

    #[test]
    fn i4_resolves_through_interp() {
        let cmap = Arc::new(ColorMap::from_slice(&DEFAULT_COLORMAP_I4));
        let mut r = InterpIndexed::new(4, cmap);
        r.vblank();
        let mut dest = [Color::BLACK; 4];
        r.render(&mut dest, &[0x21, 0x43]);
        assert_eq!(dest[0], DEFAULT_COLORMAP_I4[1]);
        assert_eq!(dest[1], DEFAULT_COLORMAP_I4[2]);
        assert_eq!(dest[2], DEFAULT_COLORMAP_I4[3]);
        assert_eq!(dest[3], DEFAULT_COLORMAP_I4[4]);
    }

    #[test]
    fn i8_handles_odd_widths() {
        let colors: Vec<Color> = (0..256).map(|i| c(i as u16)).collect();
        let cmap = Arc::new(ColorMap::new(colors.into_boxed_slice()));
        let mut r = InterpIndexed::new(8, cmap);
        r.vblank();
        let mut dest = [Color::BLACK; 3];
        r.render(&mut dest, &[7, 8, 9]);
        assert_eq!(dest, [c(7), c(8), c(9)]);
    }
}
