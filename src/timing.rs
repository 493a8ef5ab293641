//! Definition of display timing and modes.
//!
//! A [`VgaMode`] captures everything the timing state machine needs to drive
//! a monitor: the pixel clock, the porch/pulse geometry on both axes, and the
//! logical framebuffer size. Low-res modes repeat each rendered row on
//! `2^vss` consecutive raster lines, so a 320x240 mode runs the same monitor
//! timing as 640x480 with `vss = 1` and half the pixel rate.

use crate::rast::pixels_per_word;

/// Immutable description of a display format.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VgaMode {
    /// Pixel clock in Hz.
    pub pixel_clock: u32,

    /// Horizontal front porch, in pixels.
    pub h_front_porch: u16,
    /// Length of the horizontal sync pulse, in pixels.
    pub h_pulse: u16,
    /// Horizontal back porch, in pixels.
    pub h_back_porch: u16,
    /// `true` if hsync idles low and pulses high.
    pub h_sync_polarity: bool,

    /// Vertical front porch, in lines.
    pub v_front_porch: u16,
    /// Length of the vertical sync pulse, in lines.
    pub v_pulse: u16,
    /// Vertical back porch, in lines.
    pub v_back_porch: u16,
    /// `true` if vsync idles low and pulses high.
    pub v_sync_polarity: bool,

    /// log2 of how many raster lines share one rendered row.
    pub vss: u32,
    /// Logical width in pixels.
    pub width: i32,
    /// Logical height in rows.
    pub height: i32,
}

impl VgaMode {
    pub const fn h_active(&self) -> u32 {
        self.width as u32
    }

    pub const fn h_total(&self) -> u32 {
        self.h_front_porch as u32 + self.h_pulse as u32 + self.h_back_porch as u32 + self.h_active()
    }

    /// Active raster lines, counting `vss` repetition.
    pub const fn v_active(&self) -> u32 {
        (self.height as u32) << self.vss
    }

    pub const fn v_total(&self) -> u32 {
        self.v_front_porch as u32 + self.v_pulse as u32 + self.v_back_porch as u32 + self.v_active()
    }

    /// Number of 32-bit words in one rendered scanline.
    pub const fn words_per_scanline(&self) -> usize {
        self.width as usize / pixels_per_word()
    }

    /// Derives the half-resolution variant of this mode: same monitor
    /// timing, half the pixel clock, one more level of line doubling.
    pub const fn half(&self) -> VgaMode {
        VgaMode {
            pixel_clock: self.pixel_clock >> 1,
            h_front_porch: self.h_front_porch >> 1,
            h_pulse: self.h_pulse >> 1,
            h_back_porch: self.h_back_porch >> 1,
            h_sync_polarity: self.h_sync_polarity,
            v_front_porch: self.v_front_porch,
            v_pulse: self.v_pulse,
            v_back_porch: self.v_back_porch,
            v_sync_polarity: self.v_sync_polarity,
            vss: self.vss + 1,
            width: self.width >> 1,
            height: self.height >> 1,
        }
    }
}

/// VESA 640x480 @ 60 Hz, with the vertical porches rebalanced so the image
/// is not cut off at the top (the stock VESA numbers start the picture seven
/// lines early on most monitors).
pub static VGA_MODE_640X480_60: VgaMode = VgaMode {
    // VESA: 25.175 MHz; 640 +16 +96 +48 = 800; 480 +10 +2 +33 = 525; -h -v
    pixel_clock: 25_000_000,

    h_front_porch: 16,
    h_pulse: 96,
    h_back_porch: 48,
    h_sync_polarity: false,

    v_front_porch: 3,
    v_pulse: 2,
    v_back_porch: 40,
    v_sync_polarity: false,

    vss: 0,
    width: 640,
    height: 480,
};

pub static VGA_MODE_320X240_60: VgaMode = VGA_MODE_640X480_60.half();
pub static VGA_MODE_160X120_60: VgaMode = VGA_MODE_320X240_60.half();

/// VESA 800x600 @ 60 Hz.
pub static VGA_MODE_800X600_60: VgaMode = VgaMode {
    // VESA: 40.000 MHz; 800 +40 +128 +88 = 1056; 600 +1 +4 +23 = 628; +h +v
    pixel_clock: 40_000_000,

    h_front_porch: 40,
    h_pulse: 128,
    h_back_porch: 88,
    h_sync_polarity: true,

    v_front_porch: 1,
    v_pulse: 4,
    v_back_porch: 23,
    v_sync_polarity: true,

    vss: 0,
    width: 800,
    height: 600,
};

pub static VGA_MODE_400X300_60: VgaMode = VGA_MODE_800X600_60.half();
pub static VGA_MODE_200X150_60: VgaMode = VGA_MODE_400X300_60.half();

/// VESA 1024x768 @ 60 Hz.
pub static VGA_MODE_1024X768_60: VgaMode = VgaMode {
    // VESA: 65.000 MHz; 1024 +24 +136 +160 = 1344; 768 +3 +6 +29 = 806; -h -v
    pixel_clock: 65_000_000,

    h_front_porch: 24,
    h_pulse: 136,
    h_back_porch: 160,
    h_sync_polarity: false,

    v_front_porch: 3,
    v_pulse: 6,
    v_back_porch: 29,
    v_sync_polarity: false,

    vss: 0,
    width: 1024,
    height: 768,
};

pub static VGA_MODE_512X384_60: VgaMode = VGA_MODE_1024X768_60.half();
pub static VGA_MODE_256X192_60: VgaMode = VGA_MODE_512X384_60.half();

/// VESA 1366x768 @ 60 Hz reduced blanking, using only 1280 = 40*32 active
/// pixels with the difference folded into the porches.
pub static VGA_MODE_1280X768_60: VgaMode = VgaMode {
    // VESA: 72.000 MHz; 1366 +14 +56 +64 = 1500; 768 +1 +3 +28 = 800; +h +v
    pixel_clock: 72_000_000,

    h_front_porch: 56,
    h_pulse: 56,
    h_back_porch: 108,
    h_sync_polarity: true,

    v_front_porch: 1,
    v_pulse: 3,
    v_back_porch: 28,
    v_sync_polarity: true,

    vss: 0,
    width: 1280,
    height: 768,
};

pub static VGA_MODE_640X384_60: VgaMode = VGA_MODE_1280X768_60.half();

// 50 Hz variants. There is no VESA standard for these; they are known to work
// on TV sets that accept VGA input.

pub static VGA_MODE_640X480_50: VgaMode = VgaMode {
    pixel_clock: 22_000_000,

    h_front_porch: 16,
    h_pulse: 64,
    h_back_porch: 80,
    h_sync_polarity: false,

    v_front_porch: 16,
    v_pulse: 2,
    v_back_porch: 52,
    v_sync_polarity: false,

    vss: 0,
    width: 640,
    height: 480,
};

pub static VGA_MODE_320X240_50: VgaMode = VGA_MODE_640X480_50.half();

pub static VGA_MODE_1024X768_50: VgaMode = VgaMode {
    pixel_clock: 54_000_000,

    h_front_porch: 32,
    h_pulse: 160,
    h_back_porch: 152,
    h_sync_polarity: false,

    v_front_porch: 3,
    v_pulse: 6,
    v_back_porch: 29,
    v_sync_polarity: false,

    vss: 0,
    width: 1024,
    height: 768,
};

pub static VGA_MODE_512X384_50: VgaMode = VGA_MODE_1024X768_50.half();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_mode_totals() {
        assert_eq!(VGA_MODE_640X480_60.h_total(), 800);
        assert_eq!(VGA_MODE_640X480_60.v_total(), 525);
        assert_eq!(VGA_MODE_800X600_60.h_total(), 1056);
        assert_eq!(VGA_MODE_800X600_60.v_total(), 628);
        assert_eq!(VGA_MODE_1024X768_60.h_total(), 1344);
        assert_eq!(VGA_MODE_1024X768_60.v_total(), 806);
        assert_eq!(VGA_MODE_640X480_50.h_total(), 800);
        assert_eq!(VGA_MODE_640X480_50.v_total(), 550);
    }

    #[test]
    fn half_modes_keep_raster_geometry() {
        let half = VGA_MODE_320X240_60;
        assert_eq!(half.vss, 1);
        assert_eq!(half.v_active(), VGA_MODE_640X480_60.v_active());
        assert_eq!(half.h_total() * 2, VGA_MODE_640X480_60.h_total());
        assert_eq!(VGA_MODE_160X120_60.vss, 2);
    }
}
