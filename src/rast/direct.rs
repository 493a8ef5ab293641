//! Direct-color rasterizer.
//!
//! In `rgb` mode the pixmap already stores hardware pixels, so a scanline is
//! a straight copy. Rows and scanline slots are both word-aligned and
//! little-endian, matching the wire format the PIO shifts out.

use crate::color::Color;

pub fn render(dest: &mut [Color], pixels: &[u8]) {
    let n = core::mem::size_of_val(dest);
    // Safety: any Color slice is a plain byte buffer of the same length.
    let dst = unsafe {
        core::slice::from_raw_parts_mut(dest.as_mut_ptr() as *mut u8, n)
    };
    dst.copy_from_slice(&pixels[..n]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_hardware_pixels() {
        let sz = core::mem::size_of::<Color>();
        let mut src = alloc::vec![0u8; 4 * sz];
        for (i, b) in src.iter_mut().enumerate() {
            *b = i as u8 + 1;
        }
        let mut dest = [Color::BLACK; 4];
        render(&mut dest, &src);
        let mut expect = 0u32;
        for (i, b) in src[..sz].iter().enumerate() {
            expect |= (*b as u32) << (8 * i);
        }
        assert_eq!(dest[0].raw as u32, expect);
    }
}
