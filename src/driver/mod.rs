//! RP2040 hardware backend.
//!
//! Everything in here requires the real chip: PLL and voltage regulator
//! setup, PIO programs for sync and pixel shift-out, the chained DMA that
//! feeds the pixel state machine from the scanline ring, interrupt wiring,
//! the core-1 rendering loop, and the flash-lockout handshake.
//!
//! Resource map (claimed at `start_video`, released at `stop_video`):
//!
//! * PIO0 SM0 -- timing (hsync/vsync pins, DEN side-set, irq 4 line gate)
//! * PIO0 SM1 -- pixel shift-out to the color pins
//! * DMA 0    -- timing microprograms -> PIO0 TX0, phase IRQ on DMA_IRQ_1
//! * DMA 1    -- control list -> DMA2 read address (chain head)
//! * DMA 2    -- scanline slot -> PIO0 TX1, per-line IRQ on DMA_IRQ_0
//! * DMA 3    -- reserved for a second pixel plane
//! * SIO spinlock 31 -- critical-section backend
//! * Both interpolators of core 1 (see `crate::interp`)

mod backend;
mod clock;
mod critical;
mod lockout;
mod multicore;
mod pins;
mod pio_prog;
mod timing_sm;

mod controller;

pub use controller::{
    add_one_time_action, add_video_plane, remove_video_plane, set_vblank_action, start_video,
    stop_video, wait_for_scanline, wait_for_vblank,
};
pub use lockout::{enter_flash_lockout, exit_flash_lockout};
