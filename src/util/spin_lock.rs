//! Cross-core spinlocks.
//!
//! The two RP2040 cores share plane state (sprite display lists, the driver
//! hand-off) and need a mutual-exclusion primitive that works without an
//! operating system. `SpinLock` is that primitive: a single lock word plus
//! the protected value, with best-effort `try_lock` and a spinning `lock`.
//!
//! The lock word is a `portable_atomic::AtomicBool` rather than a core one:
//! the Cortex-M0+ has no compare-and-swap, so on thumbv6m the `swap` below
//! compiles to a short critical section backed by SIO hardware spinlock 31
//! (see `driver::critical`), while hosted builds and bigger cores get a
//! native atomic exchange. Either way the acquire/release orderings pair up
//! across cores: everything written under the lock on one core is visible
//! to the next holder on the other.
//!
//! Hold times in this crate are tens of cycles. Guards do not mask
//! interrupts; none of the driver's ISRs take a `SpinLock` except through
//! `try_lock`, where contention is treated as a bug rather than waited out.

use core::cell::UnsafeCell;
use portable_atomic::{AtomicBool, Ordering};

/// A value guarded by a spinnable lock word.
pub struct SpinLock<T: ?Sized> {
    locked: AtomicBool,
    contents: UnsafeCell<T>,
}

// Safety: the lock word serializes all access to `contents`, so sharing the
// lock between cores is fine whenever moving the value itself would be.
unsafe impl<T: Send + ?Sized> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub const fn new(contents: T) -> Self {
        SpinLock {
            locked: AtomicBool::new(false),
            contents: UnsafeCell::new(contents),
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub enum SpinLockError {
    /// The other core (or an outer frame on this one) holds the lock.
    Contended,
}

impl<T: ?Sized + Send> SpinLock<T> {
    /// Attempts to take the lock without spinning.
    pub fn try_lock(&self) -> Result<SpinLockGuard<'_, T>, SpinLockError> {
        // A swap that returns `false` means we made the false->true
        // transition, and nobody else can have observed the same one.
        if self.locked.swap(true, Ordering::Acquire) {
            Err(SpinLockError::Contended)
        } else {
            Ok(SpinLockGuard { lock: self })
        }
    }

    /// Takes the lock, spinning until the current holder lets go.
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        loop {
            match self.try_lock() {
                Ok(guard) => return guard,
                Err(SpinLockError::Contended) => core::hint::spin_loop(),
            }
        }
    }
}

impl<T: core::fmt::Debug + Send> core::fmt::Debug for SpinLock<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.try_lock() {
            Ok(guard) => f.debug_tuple("SpinLock").field(&&*guard).finish(),
            Err(_) => f.write_str("SpinLock(<locked>)"),
        }
    }
}

/// Exclusive access to the locked value; unlocks when dropped.
#[must_use = "dropping the guard unlocks immediately"]
pub struct SpinLockGuard<'a, T: ?Sized> {
    lock: &'a SpinLock<T>,
}

impl<'a, T: ?Sized> core::ops::Deref for SpinLockGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // Safety: this guard exists, so the lock word is ours until drop.
        unsafe { &*self.lock.contents.get() }
    }
}

impl<'a, T: ?Sized> core::ops::DerefMut for SpinLockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: as above, plus `&mut self` rules out aliasing through
        // this same guard.
        unsafe { &mut *self.lock.contents.get() }
    }
}

impl<'a, T: ?Sized> Drop for SpinLockGuard<'a, T> {
    fn drop(&mut self) {
        // The Release store publishes every write made under the guard to
        // whichever core performs the next Acquire swap.
        self.lock.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excludes_while_held_and_reopens_on_drop() {
        let lock = SpinLock::new(41);
        {
            let mut g = lock.lock();
            *g += 1;
            assert!(lock.try_lock().is_err());
        }
        assert_eq!(*lock.lock(), 42);
    }

    #[test]
    fn guards_are_reentrant_free() {
        let lock = SpinLock::new(());
        let first = lock.try_lock();
        assert!(first.is_ok());
        assert!(matches!(lock.try_lock(), Err(SpinLockError::Contended)));
        drop(first);
        assert!(lock.try_lock().is_ok());
    }

    #[test]
    fn debug_shows_contents_or_locked() {
        let lock = SpinLock::new(7);
        let open = alloc::format!("{:?}", lock);
        assert!(open.contains('7'));
        let _g = lock.lock();
        let held = alloc::format!("{:?}", lock);
        assert!(held.contains("locked"));
    }
}
