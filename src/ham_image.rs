//! Loader for hold-and-modify image files.
//!
//! The file carries its own color model (bit counts and shifts per
//! component), a 256-entry palette split into absolute colors and relative
//! offset codes, and an 8-bit index stream. The loader validates the model
//! against the hardware `Color` layout and converts the palette to native
//! form; images whose components don't fit the native fields are rejected
//! rather than decoded lossily, because relative codes are added raw and
//! dropped low bits would accumulate.

use crate::color::{Color, ColorMap};
use crate::pixmap::Pixmap;
use crate::rast::ColorMode;
use crate::Arc;
use alloc::vec;

pub const HAM_MAGIC: u32 = 3_109_478_632;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HamImageError {
    /// Not a HAM image file.
    BadMagic,
    /// Structurally invalid: bad tag, overlapping component masks, or an
    /// oversized code count.
    Corrupt,
    /// The file's color model cannot be represented in the native `Color`.
    IncompatibleColorModel,
    /// The byte stream ended early.
    Truncated,
}

impl core::fmt::Display for HamImageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            HamImageError::BadMagic => "not a rgb8 image",
            HamImageError::Corrupt => "rgb8 image corrupted",
            HamImageError::IncompatibleColorModel => "rgb8 image has incompatible color model",
            HamImageError::Truncated => "rgb8 image truncated",
        };
        f.write_str(msg)
    }
}

/// A decoded HAM image, ready to feed a `HamImagePlane`.
pub struct HamImage {
    pub width: u16,
    pub height: u16,
    pub colormap: Arc<ColorMap>,
    /// First relative code; codes below are absolute palette colors.
    pub first_rel_code: u16,
    pub pixmap: Arc<Pixmap>,
}

struct FileModel {
    rbits: u32,
    gbits: u32,
    bbits: u32,
    ibits: u32,
    rshift: u32,
    gshift: u32,
    bshift: u32,
    ishift: u32,
}

impl FileModel {
    fn mask(bits: u32, shift: u32) -> u32 {
        ((1u32 << bits) - 1) << shift
    }

    fn rmask(&self) -> u32 {
        Self::mask(self.rbits, self.rshift)
    }
    fn gmask(&self) -> u32 {
        Self::mask(self.gbits, self.gshift)
    }
    fn bmask(&self) -> u32 {
        Self::mask(self.bbits, self.bshift)
    }
    fn imask(&self) -> u32 {
        Self::mask(self.ibits, self.ishift)
    }

    fn is_native(&self) -> bool {
        self.rmask() == Color::RMASK
            && self.gmask() == Color::GMASK
            && self.bmask() == Color::BMASK
            && self.imask() == 0
    }

    /// Converts an absolute file color to native form by realigning each
    /// component to the top of its native field.
    fn convert_abs(&self, q: u32) -> Color {
        let r = ((q >> self.rshift) & ((1 << self.rbits) - 1))
            << (Color::RSHIFT + Color::RBITS - self.rbits);
        let g = ((q >> self.gshift) & ((1 << self.gbits) - 1))
            << (Color::GSHIFT + Color::GBITS - self.gbits);
        let b = ((q >> self.bshift) & ((1 << self.bbits) - 1))
            << (Color::BSHIFT + Color::BBITS - self.bbits);
        Color::from_raw((r | g | b) as _)
    }

    /// Converts a relative offset code. Offsets are stored biased around a
    /// mid-grey built from the most significant bit of every component, so
    /// the signed delta is reconstructed by converting both and subtracting.
    fn convert_rel(&self, q: u32) -> Color {
        let mid_grey = (1u32 << self.rbits >> 1) << self.rshift
            | (1u32 << self.gbits >> 1) << self.gshift
            | (1u32 << self.bbits >> 1) << self.bshift
            | (1u32 << self.ibits >> 1) << self.ishift;
        let c1 = self.convert_abs(mid_grey);
        let c2 = self.convert_abs(mid_grey.wrapping_add(q));
        Color::from_raw(c2.raw.wrapping_sub(c1.raw))
    }
}

/// Parses a complete HAM image file.
pub fn parse(bytes: &[u8]) -> Result<HamImage, HamImageError> {
    let mut r = Reader { bytes, at: 0 };

    if r.u32()? != HAM_MAGIC {
        return Err(HamImageError::BadMagic);
    }
    if r.take(4)? != b"rgb\0" {
        return Err(HamImageError::Corrupt);
    }
    let width = r.u16()?;
    let height = r.u16()?;
    let model = FileModel {
        rbits: r.u8()? as u32,
        gbits: r.u8()? as u32,
        bbits: r.u8()? as u32,
        ibits: r.u8()? as u32,
        rshift: r.u8()? as u32,
        gshift: r.u8()? as u32,
        bshift: r.u8()? as u32,
        ishift: r.u8()? as u32,
    };
    let num_abs = r.u16()?;
    let num_rel = r.u16()?;

    if width == 0 || height == 0 {
        return Err(HamImageError::Corrupt);
    }
    if num_abs as u32 + num_rel as u32 > 256 {
        return Err(HamImageError::Corrupt);
    }

    let mut colors = [Color::BLACK; 256];

    if model.is_native() {
        for c in colors.iter_mut() {
            *c = match core::mem::size_of::<Color>() {
                2 => Color::from_raw(r.u16()? as _),
                _ => Color::from_raw(r.u8()? as _),
            };
        }
    } else {
        let (rm, gm, bm, im) = (model.rmask(), model.gmask(), model.bmask(), model.imask());
        if rm & gm != 0 || (rm | gm) & bm != 0 || (rm | gm | bm) & im != 0 {
            return Err(HamImageError::Corrupt);
        }
        if model.rbits + model.rshift > 16
            || model.gbits + model.gshift > 16
            || model.bbits + model.bshift > 16
            || model.ibits + model.ishift > 16
        {
            return Err(HamImageError::Corrupt);
        }
        // The native Color has no intensity field and may not drop component
        // bits, or the relative arithmetic would drift.
        if model.ibits != 0
            || Color::RBITS < model.rbits
            || Color::GBITS < model.gbits
            || Color::BBITS < model.bbits
        {
            return Err(HamImageError::IncompatibleColorModel);
        }

        let wide = (rm | gm | bm | im) > 0xFF;
        let first_rel = 256 - num_rel as usize;
        for (i, c) in colors.iter_mut().enumerate() {
            let q = if wide { r.u16()? as u32 } else { r.u8()? as u32 };
            if i < num_abs as usize {
                *c = model.convert_abs(q);
            } else if i >= first_rel {
                *c = model.convert_rel(q);
            }
        }
    }

    // Index stream: rows are packed width-tight in the file; rows in the
    // pixmap start on 16-bit boundaries.
    let stride = (width as usize + 1) & !1;
    let mut pixels = vec![0u8; stride * height as usize];
    for y in 0..height as usize {
        let row = r.take(width as usize)?;
        pixels[y * stride..y * stride + width as usize].copy_from_slice(row);
    }

    let pixmap = Pixmap::new(
        ColorMode::I8,
        width as i32,
        height as i32,
        pixels.into_boxed_slice(),
        stride,
    )
    .map_err(|_| HamImageError::Corrupt)?;

    Ok(HamImage {
        width,
        height,
        colormap: Arc::new(ColorMap::from_slice(&colors)),
        first_rel_code: 256 - num_rel,
        pixmap: Arc::new(pixmap),
    })
}

struct Reader<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], HamImageError> {
        let s = self
            .bytes
            .get(self.at..self.at + n)
            .ok_or(HamImageError::Truncated)?;
        self.at += n;
        Ok(s)
    }

    fn u8(&mut self) -> Result<u8, HamImageError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, HamImageError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, HamImageError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[cfg(all(test, not(feature = "color-8bit")))]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn header(
        width: u16,
        height: u16,
        bits: [u8; 4],
        shifts: [u8; 4],
        num_abs: u16,
        num_rel: u16,
    ) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&HAM_MAGIC.to_le_bytes());
        v.extend_from_slice(b"rgb\0");
        v.extend_from_slice(&width.to_le_bytes());
        v.extend_from_slice(&height.to_le_bytes());
        v.extend_from_slice(&bits);
        v.extend_from_slice(&shifts);
        v.extend_from_slice(&num_abs.to_le_bytes());
        v.extend_from_slice(&num_rel.to_le_bytes());
        v
    }

    #[test]
    fn rejects_bad_magic() {
        let mut f = header(2, 1, [5, 6, 5, 0], [0, 5, 11, 0], 128, 128);
        f[0] ^= 1;
        assert_eq!(parse(&f).err(), Some(HamImageError::BadMagic));
    }

    #[test]
    fn native_palette_loads_verbatim() {
        let mut f = header(2, 2, [5, 6, 5, 0], [0, 5, 11, 0], 128, 128);
        for i in 0..256u32 {
            f.extend_from_slice(&(i as u16).to_le_bytes());
        }
        f.extend_from_slice(&[1, 2, 3, 4]); // 2x2 indices
        let img = parse(&f).unwrap();
        assert_eq!(img.colormap[7].raw, 7);
        assert_eq!(img.first_rel_code, 128);
        assert_eq!(img.pixmap.row_offset(), 2);
    }

    #[test]
    fn rgb444_palette_is_realigned() {
        let mut f = header(1, 1, [4, 4, 4, 0], [0, 4, 8, 0], 16, 16);
        // entries are 16-bit because the model spans 12 bits
        for i in 0..256u32 {
            let q: u16 = match i {
                0 => 0x00F,              // abs: full red
                240 => 0x888 + 0x001,    // rel: +1 red around mid-grey
                _ => 0,
            };
            f.extend_from_slice(&q.to_le_bytes());
        }
        f.push(0);
        let img = parse(&f).unwrap();
        // 4-bit red realigned into the 5-bit field
        assert_eq!(img.colormap[0].red(), 0x0F << 1);
        // relative +1 in 4 bits is +2 in 5 bits
        assert_eq!(img.colormap[240], Color::new(2, 0, 0));
        assert_eq!(img.first_rel_code, 240);
    }

    #[test]
    fn incompatible_model_is_refused() {
        // 7-bit green cannot fit the native 6-bit field
        let mut f = header(1, 1, [4, 7, 4, 0], [0, 4, 11, 0], 128, 128);
        f.resize(f.len() + 2 * 256 + 1, 0);
        assert_eq!(
            parse(&f).err(),
            Some(HamImageError::IncompatibleColorModel)
        );
    }

    #[test]
    fn truncated_stream_is_refused() {
        let mut f = header(4, 4, [5, 6, 5, 0], [0, 5, 11, 0], 128, 128);
        for _ in 0..256 {
            f.extend_from_slice(&[0, 0]);
        }
        f.extend_from_slice(&[0; 10]); // needs 16
        assert_eq!(parse(&f).err(), Some(HamImageError::Truncated));
    }
}
