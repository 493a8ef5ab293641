//! Video planes and their composition contract.
//!
//! A plane is anything that can produce pixels for a scanline: a
//! framebuffer, a backdrop, a sprite layer, or a layout node that delegates
//! sub-rectangles to children. The composition loop calls [`VideoPlane::vblank`]
//! once per frame and [`VideoPlane::render`] once per scanline, strictly in
//! row order, always on the rendering core.
//!
//! Planes are shared with the application through [`PlaneRef`]; the
//! application side may hold handles (to move sprites, swap images) but all
//! per-frame interior state belongs to the rendering core (see
//! `util::render_cell`).
//!
//! # Flash lockout
//!
//! While the internal flash is being programmed, code and constants in flash
//! are unreadable. Planes that keep their hot paths and data in RAM return
//! `true` from [`VideoPlane::ram_resident`] and keep rendering through the
//! lockout window; everything else is skipped by the dispatchers until the
//! window closes, leaving stale ring content on screen for a frame or two.

pub mod backdrop;
pub mod framebuffer;
pub mod ham;
pub mod layout;
pub mod passepartout;
pub mod sprite;
pub mod sprites;

pub use backdrop::Backdrop;
pub use framebuffer::FrameBuffer;
pub use ham::HamImagePlane;
pub use layout::{HorizontalLayout, VerticalLayout};
pub use passepartout::Passepartout;
pub use sprite::SingleSpritePlane;
pub use sprites::{MultiSpritePlane, Sprite};

use crate::Arc;
use alloc::boxed::Box;
use portable_atomic::{AtomicBool, Ordering};

/// The renderer contract every plane implements.
///
/// `render` must write exactly `width` pixels starting at `buf` (the buffer
/// is `width / pixels_per_word()` words); compositing planes like sprites
/// may leave pixels untouched, which makes them transparent over whatever
/// plane rendered below. Neither callback may block or outlast its slot: one
/// vblank interval for `vblank`, one scanline budget for `render`.
pub trait VideoPlane: Send + Sync {
    /// Per-frame reset, called before any scanline of the frame.
    fn vblank(&self) {}

    /// Renders one scanline. `row` counts from 0 at the top of this plane's
    /// area; `width` is in pixels and always a whole number of DMA words.
    fn render(&self, row: i32, width: i32, buf: &mut [u32]);

    /// `true` when both callbacks and everything they touch stay out of
    /// flash, so the plane keeps rendering during flash lockout.
    fn ram_resident(&self) -> bool {
        false
    }
}

/// Shared handle on a plane.
pub type PlaneRef = Arc<dyn VideoPlane>;

/// Wraps a plane into a shareable [`PlaneRef`].
pub fn share<P: VideoPlane + 'static>(plane: P) -> PlaneRef {
    Arc::from(Box::new(plane) as Box<dyn VideoPlane>)
}

static LOCKED_OUT: AtomicBool = AtomicBool::new(false);

/// True while flash-resident plane callbacks are suppressed.
pub fn flash_lockout_active() -> bool {
    LOCKED_OUT.load(Ordering::Relaxed)
}

pub(crate) fn set_flash_lockout(locked: bool) {
    LOCKED_OUT.store(locked, Ordering::Release);
}

/// Invokes a plane's `vblank` unless the lockout gate suppresses it.
#[cfg_attr(target_os = "none", link_section = ".data.rp2vga.dispatch_vblank")]
pub fn dispatch_vblank(plane: &dyn VideoPlane) {
    if !LOCKED_OUT.load(Ordering::Relaxed) || plane.ram_resident() {
        plane.vblank();
    }
}

/// Invokes a plane's `render` unless the lockout gate suppresses it.
#[cfg_attr(target_os = "none", link_section = ".data.rp2vga.dispatch_render")]
pub fn dispatch_render(plane: &dyn VideoPlane, row: i32, width: i32, buf: &mut [u32]) {
    if !LOCKED_OUT.load(Ordering::Relaxed) || plane.ram_resident() {
        plane.render(row, width, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering as CoreOrdering};

    struct Probe {
        calls: AtomicU32,
        ram: bool,
    }

    impl VideoPlane for Probe {
        fn render(&self, _row: i32, _width: i32, _buf: &mut [u32]) {
            self.calls.fetch_add(1, CoreOrdering::Relaxed);
        }
        fn ram_resident(&self) -> bool {
            self.ram
        }
    }

    #[test]
    fn lockout_gates_flash_resident_planes_only() {
        let flashy = Probe {
            calls: AtomicU32::new(0),
            ram: false,
        };
        let rammy = Probe {
            calls: AtomicU32::new(0),
            ram: true,
        };
        let mut buf = [0u32; 4];

        set_flash_lockout(true);
        dispatch_render(&flashy, 0, 8, &mut buf);
        dispatch_render(&rammy, 0, 8, &mut buf);
        set_flash_lockout(false);
        dispatch_render(&flashy, 0, 8, &mut buf);

        assert_eq!(flashy.calls.load(CoreOrdering::Relaxed), 1);
        assert_eq!(rammy.calls.load(CoreOrdering::Relaxed), 1);
    }
}
