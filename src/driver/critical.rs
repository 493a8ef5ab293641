//! `critical-section` implementation for dual-core RP2040.
//!
//! `portable-atomic` routes the atomic read-modify-writes this crate needs
//! (the M0+ has none) through `critical-section`, so the implementation must
//! exclude the *other core* as well as interrupts: mask PRIMASK, then take a
//! hardware spinlock. Spinlock 31 is reserved for this, by the same
//! convention the wider ecosystem uses.

use rp2040_pac as pac;

struct SioSpinlockCs;

critical_section::set_impl!(SioSpinlockCs);

const LOCK_INDEX: usize = 31;

unsafe impl critical_section::Impl for SioSpinlockCs {
    unsafe fn acquire() -> u8 {
        let was_active = cortex_m::register::primask::read().is_active();
        cortex_m::interrupt::disable();
        let sio = &*pac::SIO::ptr();
        // Reading the spinlock register claims it; 0 means somebody else
        // holds it.
        while sio.spinlock(LOCK_INDEX).read().bits() == 0 {
            core::hint::spin_loop();
        }
        core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
        was_active as u8
    }

    unsafe fn release(token: u8) {
        core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
        let sio = &*pac::SIO::ptr();
        // Any write releases the lock.
        sio.spinlock(LOCK_INDEX).write(|w| unsafe { w.bits(1) });
        if token != 0 {
            cortex_m::interrupt::enable();
        }
    }
}
