//! Scanline-composited VGA video engine for the RP2040.
//!
//! The engine produces a continuous VGA-timed pixel stream by composing a
//! stack of independent *video planes* row by row into a small ring of
//! scanline buffers, which a PIO state machine consumes over chained DMA.
//! Core 0 runs the application and mutates the plane stack through a
//! one-time-action queue; core 1 owns the rendering loop and must finish
//! every row before the beam eats it.
//!
//! Everything except the `driver` module is hardware-independent and
//! testable on the host; the hardware backend only exists when building for
//! a bare-metal target, following the usual split for this kind of driver.
//!
//! The crate allocates (scanline ring, planes, shapes); the embedding
//! application provides the `#[global_allocator]`.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

/// Shared ownership used throughout the crate. `portable-atomic-util`'s
/// `Arc`, because the RP2040's cores have no compare-and-swap and the
/// standard one is unavailable on thumbv6m.
pub use portable_atomic_util::Arc;

pub mod color;
pub mod compose;
pub mod frame;
pub mod ham_image;
pub mod pixmap;
pub mod plane;
pub mod rast;
pub mod ring;
pub mod shape;
pub mod timing;
pub mod util;

mod interp;

pub use color::{Color, ColorMap};
pub use compose::{scanlines_missed, Compositor};
pub use frame::{current_frame, current_scanline, frame_state, in_vblank, FrameState};
pub use ham_image::HamImage;
pub use pixmap::{GeometryError, Pixmap};
pub use plane::{
    dispatch_render, dispatch_vblank, flash_lockout_active, share, Backdrop, FrameBuffer,
    HamImagePlane, HorizontalLayout, MultiSpritePlane, Passepartout, PlaneRef,
    SingleSpritePlane, Sprite, VerticalLayout, VideoPlane,
};
pub use plane::sprites::take_hotlist_overflow;
pub use rast::{pixels_per_word, ColorMode};
pub use ring::ScanlineBuffer;
pub use shape::{AnimatedShape, Shape};
pub use timing::VgaMode;
pub use util::rolling::Rolling;

/// Maximum visible pixels in a scanline across the supported modes.
pub const MAX_PIXELS_PER_LINE: usize = 1280;

/// A position in logical pixels.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Point {
        Point { x, y }
    }
}

/// Startup failures of the video pipeline. Runtime degradations (missed
/// scanlines, sprite overflow) are counters, never errors.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VideoError {
    /// The requested system clock cannot be synthesized from the crystal.
    UnsupportedSystemClock,
    /// Scanline ring allocation failed.
    OutOfMemory,
    /// PIO, DMA or core-1 resources are already claimed.
    HardwareClaimFailed,
}

impl core::fmt::Display for VideoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            VideoError::UnsupportedSystemClock => "UNSUPPORTED_SYSTEM_CLOCK",
            VideoError::OutOfMemory => "OUT_OF_MEMORY",
            VideoError::HardwareClaimFailed => "HARDWARE_CLAIM_FAILED",
        };
        f.write_str(msg)
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "none")] {
        mod driver;
        pub use driver::{
            add_one_time_action, add_video_plane, enter_flash_lockout, exit_flash_lockout,
            remove_video_plane, set_vblank_action, start_video, stop_video, wait_for_scanline,
            wait_for_vblank,
        };
    }
}
