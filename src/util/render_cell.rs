//! Interior-mutable state owned by the rendering core.
//!
//! Planes are shared between both cores through `Arc`, but their per-frame
//! bookkeeping (row pointers, attribute countdowns, hot sprite cursors) is
//! only ever touched from the rendering loop on core 1, which is
//! single-threaded and runs `vblank` and `render` strictly in sequence.
//! `RenderCell` encodes that ownership: it hands out `&mut` access through a
//! shared reference without any locking on the hot path.
//!
//! The soundness argument is the same single-writer reasoning as the scanline
//! ring: `vblank`/`render` are dispatched only by the composition loop, never
//! concurrently, and core 0 reaches plane interiors exclusively through the
//! one-time-action queue which executes on core 1. This type is crate-private
//! so the invariant is enforced by construction, not by users.

use core::cell::UnsafeCell;

pub(crate) struct RenderCell<T> {
    inner: UnsafeCell<T>,
}

// Safety: see module docs. All mutation happens on the rendering core; the
// only cross-core accesses are reads of plain flags behind atomics elsewhere.
unsafe impl<T: Send> Sync for RenderCell<T> {}

impl<T> RenderCell<T> {
    pub const fn new(value: T) -> Self {
        RenderCell {
            inner: UnsafeCell::new(value),
        }
    }

    /// Runs `f` with exclusive access to the contents.
    ///
    /// Must only be called from the rendering loop (`vblank`/`render` paths
    /// or one-time actions). Nesting `with` on the same cell is a bug; keep
    /// closures small and non-reentrant.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        // Safety: single-threaded access per the module contract.
        f(unsafe { &mut *self.inner.get() })
    }
}

impl<T: Default> Default for RenderCell<T> {
    fn default() -> Self {
        RenderCell::new(T::default())
    }
}
