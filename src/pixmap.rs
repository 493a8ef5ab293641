//! Pixel and attribute grids.
//!
//! A [`Pixmap`] is the backing store of a framebuffer plane: a byte grid of
//! packed pixels, and for the attribute modes a second, lower-resolution grid
//! of color cells. Pixmaps are validated against their color mode when they
//! are built, so the scanline renderers can index rows without checks.
//!
//! Pixmaps handed to a plane are immutable; to change displayed content,
//! build a new pixmap (or plane) and swap it in through a one-time action at
//! vblank.

use crate::color::Color;
use crate::rast::ColorMode;
use alloc::boxed::Box;
use alloc::vec;

/// Construction-time validation failures. These are raised before a plane
/// ever reaches the rendering loop; nothing fails at render time.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GeometryError {
    /// The pixel buffer is shorter than `height` rows of `row_offset` bytes.
    BufferTooSmall,
    /// `row_offset` can't hold `width` pixels at this depth.
    RowOffsetTooSmall,
    /// The color mode has attribute cells but no attribute grid was given.
    MissingAttributes,
    /// The color mode has no attribute cells but an attribute grid was given.
    UnexpectedAttributes,
    /// Attribute grid rows don't cover the pixel grid.
    AttributeGeometry,
    /// The palette is too small for the color mode.
    PaletteTooSmall,
    /// The plane requires a different color mode for this pixmap.
    WrongColorMode,
    /// Hold-and-modify rows must start on 16-bit boundaries.
    OddRowOffset,
}

impl core::fmt::Display for GeometryError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            GeometryError::BufferTooSmall => "pixel buffer too small",
            GeometryError::RowOffsetTooSmall => "row offset smaller than a row",
            GeometryError::MissingAttributes => "attribute mode without attribute grid",
            GeometryError::UnexpectedAttributes => "attribute grid in non-attribute mode",
            GeometryError::AttributeGeometry => "attribute grid does not cover pixmap",
            GeometryError::PaletteTooSmall => "palette too small for color mode",
            GeometryError::WrongColorMode => "pixmap color mode not accepted here",
            GeometryError::OddRowOffset => "row offset must be even",
        };
        f.write_str(msg)
    }
}

/// The attribute overlay of an attribute-mode pixmap: one row of cells per
/// `attr_height` pixel rows, each cell holding 2 (`a1`) or 4 (`a2`) colors.
pub struct AttrGrid {
    pub(crate) row_offset: usize, // in colors
    pub(crate) attr_height: u8,
    pub(crate) data: Box<[Color]>,
}

/// A 2D pixel grid plus optional attribute overlay.
pub struct Pixmap {
    mode: ColorMode,
    width: i32,
    height: i32,
    row_offset: usize, // in bytes
    pixels: Box<[u8]>,
    attrs: Option<AttrGrid>,
}

impl Pixmap {
    /// Builds a pixmap for a mode without attribute cells.
    pub fn new(
        mode: ColorMode,
        width: i32,
        height: i32,
        pixels: Box<[u8]>,
        row_offset: usize,
    ) -> Result<Pixmap, GeometryError> {
        if mode.is_attribute() {
            return Err(GeometryError::MissingAttributes);
        }
        Self::validate_pixels(mode, width, height, &pixels, row_offset)?;
        Ok(Pixmap {
            mode,
            width,
            height,
            row_offset,
            pixels,
            attrs: None,
        })
    }

    /// Builds a pixmap for an attribute mode. `attr_row_offset` is counted in
    /// colors; `attr_height` is the number of pixel rows each attribute row
    /// covers.
    #[allow(clippy::too_many_arguments)]
    pub fn with_attributes(
        mode: ColorMode,
        width: i32,
        height: i32,
        pixels: Box<[u8]>,
        row_offset: usize,
        attrs: Box<[Color]>,
        attr_row_offset: usize,
        attr_height: u8,
    ) -> Result<Pixmap, GeometryError> {
        if !mode.is_attribute() {
            return Err(GeometryError::UnexpectedAttributes);
        }
        Self::validate_pixels(mode, width, height, &pixels, row_offset)?;

        let min_row = mode.attr_row_colors(width);
        if attr_row_offset < min_row || attr_height == 0 {
            return Err(GeometryError::AttributeGeometry);
        }
        let attr_rows = (height as usize).div_ceil(attr_height as usize);
        if attrs.len() < (attr_rows - 1) * attr_row_offset + min_row {
            return Err(GeometryError::AttributeGeometry);
        }

        Ok(Pixmap {
            mode,
            width,
            height,
            row_offset,
            pixels,
            attrs: Some(AttrGrid {
                row_offset: attr_row_offset,
                attr_height,
                data: attrs,
            }),
        })
    }

    /// Convenience constructor: a tightly packed pixmap filled with `fill`.
    pub fn filled(mode: ColorMode, width: i32, height: i32, fill: u8) -> Pixmap {
        assert!(!mode.is_attribute());
        let row_offset = mode.row_bytes(width);
        let pixels = vec![fill; row_offset * height as usize].into_boxed_slice();
        Pixmap::new(mode, width, height, pixels, row_offset).unwrap()
    }

    fn validate_pixels(
        mode: ColorMode,
        width: i32,
        height: i32,
        pixels: &[u8],
        row_offset: usize,
    ) -> Result<(), GeometryError> {
        assert!(width > 0 && height > 0);
        let row_bytes = mode.row_bytes(width);
        if row_offset < row_bytes {
            return Err(GeometryError::RowOffsetTooSmall);
        }
        if pixels.len() < (height as usize - 1) * row_offset + row_bytes {
            return Err(GeometryError::BufferTooSmall);
        }
        Ok(())
    }

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Bytes from one pixel row to the next.
    pub fn row_offset(&self) -> usize {
        self.row_offset
    }

    /// Pixel rows covered by one attribute row (1 for non-attribute modes).
    pub fn attr_height(&self) -> u32 {
        self.attrs.as_ref().map_or(1, |a| a.attr_height as u32)
    }

    pub(crate) fn row(&self, y: usize) -> &[u8] {
        let start = y * self.row_offset;
        &self.pixels[start..start + self.mode.row_bytes(self.width)]
    }

    pub(crate) fn attr_row(&self, arow: usize) -> &[Color] {
        let a = self.attrs.as_ref().expect("attribute row of plain pixmap");
        let start = arow * a.row_offset;
        &a.data[start..start + self.mode.attr_row_colors(self.width)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_rows() {
        let e = Pixmap::new(ColorMode::I8, 16, 2, vec![0; 32].into(), 15);
        assert_eq!(e.err(), Some(GeometryError::RowOffsetTooSmall));
    }

    #[test]
    fn rejects_short_buffer() {
        let e = Pixmap::new(ColorMode::I1, 64, 3, vec![0; 23].into(), 8);
        assert_eq!(e.err(), Some(GeometryError::BufferTooSmall));
    }

    #[test]
    fn last_row_may_be_tight() {
        // 3 rows with stride 10 but only 8 bytes in the last row.
        let p = Pixmap::new(ColorMode::I1, 64, 3, vec![0; 28].into(), 10);
        assert!(p.is_ok());
    }

    #[test]
    fn attribute_mode_needs_attributes() {
        let e = Pixmap::new(ColorMode::A1W8, 16, 2, vec![0; 4].into(), 2);
        assert_eq!(e.err(), Some(GeometryError::MissingAttributes));
    }

    #[test]
    fn attribute_rows_cover_pixmap() {
        // 16 px wide a2w8: 2 cells/row, 4 colors each = 8 colors per attr row;
        // 4 pixel rows at attr_height 2 need 2 attr rows.
        let ok = Pixmap::with_attributes(
            ColorMode::A2W8,
            16,
            4,
            vec![0; 16].into(),
            4,
            vec![Color::BLACK; 16].into(),
            8,
            2,
        );
        assert!(ok.is_ok());

        let short = Pixmap::with_attributes(
            ColorMode::A2W8,
            16,
            4,
            vec![0; 16].into(),
            4,
            vec![Color::BLACK; 8].into(),
            8,
            2,
        );
        assert_eq!(short.err(), Some(GeometryError::AttributeGeometry));
    }

    #[test]
    fn row_slices_are_row_bytes_long() {
        let p = Pixmap::filled(ColorMode::I2, 20, 3, 0xAB);
        assert_eq!(p.row(2).len(), 5);
        assert!(p.row(2).iter().all(|&b| b == 0xAB));
    }
}
