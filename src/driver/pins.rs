//! Video pin assignment.
//!
//! The defaults match the common VGA demo boards: sixteen color pins from
//! GPIO 0, then hsync/vsync, then DEN. Boards with fewer color pins build
//! with `color-8bit` and leave the upper pins free.

use rp2040_pac as pac;

pub const COLOR_PIN_BASE: u8 = 0;
pub const COLOR_PIN_COUNT: u8 = (8 * core::mem::size_of::<crate::Color>()) as u8;

pub const SYNC_PIN_BASE: u8 = COLOR_PIN_BASE + COLOR_PIN_COUNT;
pub const HSYNC_PIN: u8 = SYNC_PIN_BASE;
pub const VSYNC_PIN: u8 = SYNC_PIN_BASE + 1;
pub const DEN_PIN: u8 = SYNC_PIN_BASE + 2;

/// Hands every video pin to PIO0.
///
/// # Safety
///
/// Steals peripherals; the pins must not be claimed elsewhere.
pub unsafe fn connect_to_pio() {
    let io = &*pac::IO_BANK0::ptr();
    let pads = &*pac::PADS_BANK0::ptr();
    for pin in (COLOR_PIN_BASE..COLOR_PIN_BASE + COLOR_PIN_COUNT).chain([HSYNC_PIN, VSYNC_PIN, DEN_PIN]) {
        // funcsel 6 = PIO0
        io.gpio(pin as usize)
            .gpio_ctrl()
            .write(|w| unsafe { w.funcsel().bits(6) });
        // fast slew, no pulls: these toggle at pixel rate
        pads.gpio(pin as usize)
            .modify(|_, w| w.slewfast().set_bit().pue().clear_bit().pde().clear_bit());
    }
}

/// Returns the video pins to high-impedance inputs (driven low by the pad
/// pulls being off and the PIO released).
///
/// # Safety
///
/// Steals peripherals.
pub unsafe fn disconnect() {
    let io = &*pac::IO_BANK0::ptr();
    for pin in (COLOR_PIN_BASE..COLOR_PIN_BASE + COLOR_PIN_COUNT).chain([HSYNC_PIN, VSYNC_PIN, DEN_PIN]) {
        // funcsel NULL
        io.gpio(pin as usize)
            .gpio_ctrl()
            .write(|w| unsafe { w.funcsel().bits(0x1f) });
    }
}
