//! Raster position bookkeeping shared between the cores.
//!
//! The rendering core's interrupt paths publish where the beam is: a rolling
//! frame number, the rolling line index at which the current frame started,
//! the current rolling scanline, and the vblank flag (raised a couple of
//! scanlines early so renderers can pre-position). The application core
//! reads a consistent snapshot through a tiny sequence lock: all fields are
//! written between two increments of a counter, and readers retry while the
//! counter is odd or changed under them.

use crate::util::rolling::Rolling;
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

static SEQ: AtomicU32 = AtomicU32::new(0);
static FRAME: AtomicU32 = AtomicU32::new(0);
static LINE_AT_FRAME_START: AtomicU32 = AtomicU32::new(0);
static TIME_US_AT_FRAME_START: AtomicU32 = AtomicU32::new(0);
static TIME_CC_AT_FRAME_START: AtomicU32 = AtomicU32::new(0);

static IN_VBLANK: AtomicBool = AtomicBool::new(true);
static CURRENT_SCANLINE: AtomicU32 = AtomicU32::new(0);

/// A consistent view of the raster position at one frame boundary.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameState {
    pub frame: Rolling,
    pub line_at_frame_start: Rolling,
    pub time_us_at_frame_start: u32,
    pub time_cc_at_frame_start: u32,
    pub in_vblank: bool,
}

/// Reads a torn-free frame snapshot (read twice, check equal).
pub fn frame_state() -> FrameState {
    loop {
        let s1 = SEQ.load(Ordering::Acquire);
        if s1 & 1 != 0 {
            core::hint::spin_loop();
            continue;
        }
        let state = FrameState {
            frame: Rolling(FRAME.load(Ordering::Relaxed)),
            line_at_frame_start: Rolling(LINE_AT_FRAME_START.load(Ordering::Relaxed)),
            time_us_at_frame_start: TIME_US_AT_FRAME_START.load(Ordering::Relaxed),
            time_cc_at_frame_start: TIME_CC_AT_FRAME_START.load(Ordering::Relaxed),
            in_vblank: IN_VBLANK.load(Ordering::Relaxed),
        };
        if SEQ.load(Ordering::Acquire) == s1 {
            return state;
        }
    }
}

/// Publishes a new frame start. Called from the timing interrupt on the
/// rendering core, once per frame.
pub(crate) fn begin_frame(line: Rolling, time_us: u32, time_cc: u32) {
    SEQ.fetch_add(1, Ordering::Release);
    FRAME.store(FRAME.load(Ordering::Relaxed).wrapping_add(1), Ordering::Relaxed);
    LINE_AT_FRAME_START.store(line.0, Ordering::Relaxed);
    TIME_US_AT_FRAME_START.store(time_us, Ordering::Relaxed);
    TIME_CC_AT_FRAME_START.store(time_cc, Ordering::Relaxed);
    IN_VBLANK.store(false, Ordering::Relaxed);
    SEQ.fetch_add(1, Ordering::Release);
}

pub(crate) fn set_in_vblank(in_vblank: bool) {
    IN_VBLANK.store(in_vblank, Ordering::Release);
}

pub(crate) fn set_current_scanline(line: Rolling) {
    CURRENT_SCANLINE.store(line.0, Ordering::Release);
}

/// The rolling index of the scanline the beam is in.
pub fn current_scanline() -> Rolling {
    Rolling(CURRENT_SCANLINE.load(Ordering::Acquire))
}

pub fn current_frame() -> Rolling {
    Rolling(FRAME.load(Ordering::Relaxed))
}

/// True during (and slightly before) the vertical blanking interval.
pub fn in_vblank() -> bool {
    IN_VBLANK.load(Ordering::Relaxed)
}
