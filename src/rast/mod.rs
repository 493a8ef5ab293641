//! Scanline rasterizers.
//!
//! One renderer per color mode turns a row of packed pixels (and, for the
//! attribute modes, a row of attribute cells) into hardware colors in a
//! scanline buffer. Bit order is fixed across all modes: the low bits of a
//! pixel byte are the leftmost pixels, and the low bits of an attribute cell
//! select the color with the lower index.
//!
//! These loops are the innermost code in the crate. On target they live in
//! RAM sections so they keep running while the flash is locked out.

pub mod attr;
pub mod direct;
pub mod ham;
pub mod indexed;

pub use ham::HamRenderer;

use crate::color::{Color, ColorMap};
use crate::pixmap::GeometryError;
use crate::Arc;

/// Pixels per 32-bit DMA word at the configured color width.
pub const fn pixels_per_word() -> usize {
    4 / core::mem::size_of::<Color>()
}

/// Views a word-aligned scanline buffer as hardware pixels.
pub(crate) fn colors_mut(buf: &mut [u32]) -> &mut [Color] {
    // Safety: Color is repr(transparent) over a 1- or 2-byte integer, so any
    // u32 is a whole number of Colors and the alignment is satisfied.
    unsafe {
        core::slice::from_raw_parts_mut(
            buf.as_mut_ptr() as *mut Color,
            buf.len() * pixels_per_word(),
        )
    }
}

/// The thirteen framebuffer color modes: indexed (`iN`), direct (`rgb`), and
/// attribute modes (`aB wW`: B pixel bits selecting from a cell of 2^B
/// colors, one cell per W pixels).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ColorMode {
    I1,
    I2,
    I4,
    I8,
    Rgb,
    A1W1,
    A1W2,
    A1W4,
    A1W8,
    A2W1,
    A2W2,
    A2W4,
    A2W8,
}

impl ColorMode {
    /// Bits per pixel in the pixel grid.
    pub const fn bits_per_pixel(self) -> u32 {
        match self {
            ColorMode::I1 | ColorMode::A1W1 | ColorMode::A1W2 | ColorMode::A1W4
            | ColorMode::A1W8 => 1,
            ColorMode::I2 | ColorMode::A2W1 | ColorMode::A2W2 | ColorMode::A2W4
            | ColorMode::A2W8 => 2,
            ColorMode::I4 => 4,
            ColorMode::I8 => 8,
            ColorMode::Rgb => 8 * core::mem::size_of::<Color>() as u32,
        }
    }

    pub const fn is_attribute(self) -> bool {
        self.attr_width() != 0
    }

    pub const fn is_indexed(self) -> bool {
        matches!(
            self,
            ColorMode::I1 | ColorMode::I2 | ColorMode::I4 | ColorMode::I8
        )
    }

    pub const fn is_direct(self) -> bool {
        matches!(self, ColorMode::Rgb)
    }

    /// Pixels per attribute cell, 0 for non-attribute modes.
    pub const fn attr_width(self) -> u32 {
        match self {
            ColorMode::A1W1 | ColorMode::A2W1 => 1,
            ColorMode::A1W2 | ColorMode::A2W2 => 2,
            ColorMode::A1W4 | ColorMode::A2W4 => 4,
            ColorMode::A1W8 | ColorMode::A2W8 => 8,
            _ => 0,
        }
    }

    /// Colors stored per attribute cell.
    pub const fn colors_per_cell(self) -> u32 {
        1 << self.bits_per_pixel()
    }

    /// Palette entries an indexed mode resolves against.
    pub const fn palette_len(self) -> usize {
        match self {
            ColorMode::I1 => 2,
            ColorMode::I2 => 4,
            ColorMode::I4 => 16,
            ColorMode::I8 => 256,
            _ => 0,
        }
    }

    /// Bytes of pixel data per row of `width` pixels.
    pub const fn row_bytes(self, width: i32) -> usize {
        (width as usize * self.bits_per_pixel() as usize).div_ceil(8)
    }

    /// Colors per attribute row for `width` pixels.
    pub const fn attr_row_colors(self, width: i32) -> usize {
        if self.attr_width() == 0 {
            0
        } else {
            (width as usize).div_ceil(self.attr_width() as usize)
                * self.colors_per_cell() as usize
        }
    }
}

/// A configured scanline renderer for one color mode.
pub enum Renderer {
    I1(indexed::I1Renderer),
    I2(indexed::I2Renderer),
    I4(indexed::InterpIndexed),
    I8(indexed::InterpIndexed),
    Rgb,
    Attr { mode: ColorMode },
}

impl Renderer {
    /// Builds the renderer for `mode`, validating the palette against the
    /// mode's depth. Indexed modes fall back to the stock palette when none
    /// is given.
    pub fn for_mode(
        mode: ColorMode,
        colormap: Option<Arc<ColorMap>>,
    ) -> Result<Renderer, GeometryError> {
        if mode.is_indexed() {
            let cmap = match colormap {
                Some(cm) => {
                    if cm.len() < mode.palette_len() {
                        return Err(GeometryError::PaletteTooSmall);
                    }
                    cm
                }
                None => Arc::new(ColorMap::default_for(mode.bits_per_pixel())),
            };
            Ok(match mode {
                ColorMode::I1 => Renderer::I1(indexed::I1Renderer::new(cmap.colors())),
                ColorMode::I2 => Renderer::I2(indexed::I2Renderer::new(cmap.colors())),
                ColorMode::I4 => Renderer::I4(indexed::InterpIndexed::new(4, cmap)),
                ColorMode::I8 => Renderer::I8(indexed::InterpIndexed::new(8, cmap)),
                _ => unreachable!(),
            })
        } else if mode.is_direct() {
            Ok(Renderer::Rgb)
        } else {
            Ok(Renderer::Attr { mode })
        }
    }

    /// Per-frame reset: reprograms the interpolator for the modes that use
    /// one. Cheap, and idempotent.
    pub fn vblank(&mut self) {
        match self {
            Renderer::I4(r) | Renderer::I8(r) => r.vblank(),
            _ => {}
        }
    }

    /// Renders `width` pixels of one row into `dest`.
    ///
    /// `attrs` carries the attribute row for attribute modes and is ignored
    /// otherwise.
    pub fn render(
        &mut self,
        dest: &mut [u32],
        width: usize,
        pixels: &[u8],
        attrs: Option<&[Color]>,
    ) {
        let dest = &mut colors_mut(dest)[..width];
        match self {
            Renderer::I1(r) => r.render(dest, pixels),
            Renderer::I2(r) => r.render(dest, pixels),
            Renderer::I4(r) | Renderer::I8(r) => r.render(dest, pixels),
            Renderer::Rgb => direct::render(dest, pixels),
            Renderer::Attr { mode } => {
                let attrs = attrs.expect("attribute mode without attribute row");
                match mode.bits_per_pixel() {
                    1 => match mode.attr_width() {
                        8 => attr::render_a1w8(dest, pixels, attrs),
                        w => attr::render_a1(dest, pixels, attrs, w as usize),
                    },
                    _ => match mode.attr_width() {
                        8 => attr::render_a2w8(dest, pixels, attrs),
                        w => attr::render_a2(dest, pixels, attrs, w as usize),
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_geometry() {
        assert_eq!(ColorMode::I1.row_bytes(640), 80);
        assert_eq!(ColorMode::I2.row_bytes(10), 3);
        assert_eq!(ColorMode::I8.row_bytes(320), 320);
        assert_eq!(
            ColorMode::Rgb.row_bytes(16),
            16 * core::mem::size_of::<Color>()
        );
        assert_eq!(ColorMode::A1W8.attr_row_colors(640), 160);
        assert_eq!(ColorMode::A2W4.attr_row_colors(10), 12);
        assert_eq!(ColorMode::A1W1.attr_row_colors(8), 16);
    }

    #[test]
    fn palette_validation() {
        let short = Arc::new(ColorMap::from_slice(&[Color::BLACK; 4]));
        assert!(matches!(
            Renderer::for_mode(ColorMode::I8, Some(short)),
            Err(GeometryError::PaletteTooSmall)
        ));
        assert!(Renderer::for_mode(ColorMode::I8, None).is_ok());
    }

    #[test]
    fn colors_mut_views_whole_words() {
        let mut buf = [0u32; 4];
        let n = colors_mut(&mut buf).len();
        assert_eq!(n, 4 * pixels_per_word());
    }
}
