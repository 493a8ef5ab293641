//! Attribute-mode rasterizers.
//!
//! The pixel grid carries 1 or 2 bits per pixel; colors come from a
//! lower-resolution row of attribute cells, one cell per `w` pixels. A cell
//! stores 2 colors (`a1`) or 4 colors (`a2`), lower pixel values selecting
//! the colors with the lower index.
//!
//! `a1w8` is the classic text/tile layout (one byte of pixels per cell) and
//! the tightest loop of the family, so it gets a dedicated routine; the
//! other widths share the generic ones.

use crate::color::Color;

/// 1-bit pixels, one 2-color cell per `cell_width` pixels.
pub fn render_a1(dest: &mut [Color], pixels: &[u8], attrs: &[Color], cell_width: usize) {
    let mut x = 0;
    'rows: for &byte in pixels {
        let mut b = byte;
        for _ in 0..8 {
            if x == dest.len() {
                break 'rows;
            }
            let cell = x / cell_width;
            dest[x] = attrs[cell * 2 + (b & 1) as usize];
            b >>= 1;
            x += 1;
        }
    }
}

/// 1-bit pixels, 8 per cell: one pixel byte maps to one attribute cell.
#[cfg(not(feature = "optimistic-a1w8"))]
pub fn render_a1w8(dest: &mut [Color], pixels: &[u8], attrs: &[Color]) {
    for ((out, &byte), cell) in dest
        .chunks_mut(8)
        .zip(pixels.iter())
        .zip(attrs.chunks_exact(2))
    {
        for (i, d) in out.iter_mut().enumerate() {
            *d = cell[(byte as usize >> i) & 1];
        }
    }
}

/// 1-bit pixels, 8 per cell; unchecked addressing for boards that can hold
/// the tighter timing.
#[cfg(feature = "optimistic-a1w8")]
pub fn render_a1w8(dest: &mut [Color], pixels: &[u8], attrs: &[Color]) {
    let cells = dest.len() / 8;
    assert!(pixels.len() >= cells && attrs.len() >= cells * 2);
    for c in 0..cells {
        // Safety: bounds established by the assert above.
        unsafe {
            let byte = *pixels.get_unchecked(c) as usize;
            let pair = attrs.get_unchecked(c * 2..c * 2 + 2);
            let out = dest.get_unchecked_mut(c * 8..c * 8 + 8);
            for (i, d) in out.iter_mut().enumerate() {
                *d = *pair.get_unchecked((byte >> i) & 1);
            }
        }
    }
}

/// 2-bit pixels, one 4-color cell per `cell_width` pixels.
pub fn render_a2(dest: &mut [Color], pixels: &[u8], attrs: &[Color], cell_width: usize) {
    let mut x = 0;
    'rows: for &byte in pixels {
        let mut b = byte;
        for _ in 0..4 {
            if x == dest.len() {
                break 'rows;
            }
            let cell = x / cell_width;
            dest[x] = attrs[cell * 4 + (b & 3) as usize];
            b >>= 2;
            x += 1;
        }
    }
}

/// 2-bit pixels, 8 per cell: two pixel bytes map to one attribute cell.
pub fn render_a2w8(dest: &mut [Color], pixels: &[u8], attrs: &[Color]) {
    for ((out, bytes), cell) in dest
        .chunks_mut(8)
        .zip(pixels.chunks(2))
        .zip(attrs.chunks_exact(4))
    {
        let mut b = bytes[0] as usize | (bytes.get(1).copied().unwrap_or(0) as usize) << 8;
        for d in out.iter_mut() {
            *d = cell[b & 3];
            b >>= 2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(n: u16) -> Color {
        Color::from_raw(n as _)
    }

    #[test]
    fn a2w8_selects_from_cell() {
        // cell = {red, green, blue, yellow}, pixel values 1, 0, 2, 3
        // left to right
        let cell = [Color::RED, Color::GREEN, Color::BLUE, Color::YELLOW];
        let mut attrs = alloc::vec![Color::BLACK; 8];
        attrs[..4].copy_from_slice(&cell);
        attrs[4..].copy_from_slice(&cell);

        let mut dest = [Color::BLACK; 16];
        // byte 0: pixels 1,0,2,3 -> bits 11_10_00_01
        render_a2w8(&mut dest, &[0b11_10_00_01, 0, 0, 0], &attrs);
        assert_eq!(dest[0], Color::GREEN);
        assert_eq!(dest[1], Color::RED);
        assert_eq!(dest[2], Color::BLUE);
        assert_eq!(dest[3], Color::YELLOW);
        // remaining pixels of the cell are value 0 -> red
        assert_eq!(dest[7], Color::RED);
    }

    #[test]
    fn a1_cells_advance_every_cell_width() {
        // two cells of width 2: {1,2} then {3,4}
        let attrs = [c(1), c(2), c(3), c(4)];
        let mut dest = [Color::BLACK; 4];
        // pixels: 1, 0, 0, 1
        render_a1(&mut dest, &[0b1001], &attrs, 2);
        assert_eq!(dest, [c(2), c(1), c(3), c(4)]);
    }

    #[test]
    fn a1w1_gives_every_pixel_its_own_cell() {
        let attrs = [c(10), c(11), c(20), c(21), c(30), c(31)];
        let mut dest = [Color::BLACK; 3];
        render_a1(&mut dest, &[0b101], &attrs, 1);
        assert_eq!(dest, [c(11), c(20), c(31)]);
    }

    #[test]
    fn a1w8_matches_generic_renderer() {
        let attrs: alloc::vec::Vec<Color> = (0u16..8).map(c).collect();
        let pixels = [0b0110_1001u8, 0b1111_0000];
        let mut fast = [Color::BLACK; 16];
        let mut generic = [Color::BLACK; 16];
        render_a1w8(&mut fast, &pixels, &attrs);
        render_a1(&mut generic, &pixels, &attrs, 8);
        assert_eq!(fast, generic);
    }

    #[test]
    fn a2_cell_width_four() {
        let attrs = [c(0), c(1), c(2), c(3), c(10), c(11), c(12), c(13)];
        let mut dest = [Color::BLACK; 8];
        // byte0: 3,2,1,0  byte1: 0,1,2,3
        render_a2(&mut dest, &[0b00_01_10_11, 0b11_10_01_00], &attrs, 4);
        assert_eq!(
            dest,
            [c(3), c(2), c(1), c(0), c(10), c(11), c(12), c(13)]
        );
    }
}
