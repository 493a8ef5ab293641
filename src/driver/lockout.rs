//! Flash lockout handshake.
//!
//! Writing the internal flash stalls every read from it, including
//! instruction fetches. Before programming, core 0 raises the lockout
//! request and blocks until the rendering loop acknowledges at a scanline
//! boundary; from then on the plane dispatchers suppress every callback that
//! is not RAM-resident, and the loop itself stays in its RAM sections.
//! Releasing the request lets normal dispatch resume on the next scanline.

use crate::plane;
use portable_atomic::{AtomicBool, Ordering};

static LOCKOUT_REQUESTED: AtomicBool = AtomicBool::new(false);
static LOCKED_OUT: AtomicBool = AtomicBool::new(false);

/// Suspends flash-resident rendering. Blocks until core 1 acknowledges.
/// Call from core 0, immediately before touching the flash controller.
pub fn enter_flash_lockout() {
    debug_assert!(!LOCKOUT_REQUESTED.load(Ordering::Relaxed));
    LOCKOUT_REQUESTED.store(true, Ordering::Release);
    cortex_m::asm::sev();
    while !LOCKED_OUT.load(Ordering::Acquire) {
        cortex_m::asm::wfe();
    }
}

/// Resumes normal dispatch on the next scanline. Does not block.
pub fn exit_flash_lockout() {
    debug_assert!(LOCKOUT_REQUESTED.load(Ordering::Relaxed));
    LOCKOUT_REQUESTED.store(false, Ordering::Release);
    cortex_m::asm::sev();
}

/// Scanline-boundary poll on the rendering core.
#[cfg_attr(target_os = "none", link_section = ".data.rp2vga.lockout_poll")]
pub(super) fn poll_on_render_core() {
    let requested = LOCKOUT_REQUESTED.load(Ordering::Acquire);
    if requested != LOCKED_OUT.load(Ordering::Relaxed) {
        plane::set_flash_lockout(requested);
        LOCKED_OUT.store(requested, Ordering::Release);
        cortex_m::asm::sev();
    }
}

pub(super) fn reset() {
    LOCKOUT_REQUESTED.store(false, Ordering::Relaxed);
    LOCKED_OUT.store(false, Ordering::Relaxed);
    plane::set_flash_lockout(false);
}
