//! Core 1 launch and reset.
//!
//! The rendering loop owns core 1 outright. Launch follows the boot ROM's
//! mailbox protocol: reset the core through PSM, then feed the vector table,
//! stack pointer and entry point through the SIO FIFO, echoing until the
//! sequence is acknowledged.

use rp2040_pac as pac;

/// Words of stack for the rendering loop. The hot path is shallow; the
/// depth is for plane trees and the action closures.
pub const CORE1_STACK_WORDS: usize = 1024;

#[repr(align(8))]
pub struct Core1Stack(pub [usize; CORE1_STACK_WORDS]);

pub static mut CORE1_STACK: Core1Stack = Core1Stack([0; CORE1_STACK_WORDS]);

fn fifo_drain(sio: &pac::sio::RegisterBlock) {
    while sio.fifo_st().read().vld().bit_is_set() {
        let _ = sio.fifo_rd().read().bits();
    }
}

fn fifo_push_blocking(sio: &pac::sio::RegisterBlock, value: u32) {
    while sio.fifo_st().read().rdy().bit_is_clear() {}
    sio.fifo_wr().write(|w| unsafe { w.bits(value) });
    cortex_m::asm::sev();
}

fn fifo_pop_blocking(sio: &pac::sio::RegisterBlock) -> u32 {
    while sio.fifo_st().read().vld().bit_is_clear() {
        cortex_m::asm::wfe();
    }
    sio.fifo_rd().read().bits()
}

/// Holds core 1 in reset.
///
/// # Safety
///
/// Anything running on core 1 stops mid-instruction.
pub unsafe fn reset_core1() {
    let psm = &*pac::PSM::ptr();
    psm.frce_off().modify(|_, w| w.proc1().set_bit());
    while psm.frce_off().read().proc1().bit_is_clear() {}
    psm.frce_off().modify(|_, w| w.proc1().clear_bit());
}

/// Launches `entry` on core 1 with the static rendering stack.
///
/// # Safety
///
/// Must run on core 0 with core 1 held in reset (see [`reset_core1`]).
pub unsafe fn launch_core1(entry: fn() -> !) {
    let sio = &*pac::SIO::ptr();

    let stack_top = {
        let base = core::ptr::addr_of_mut!(CORE1_STACK) as *mut usize;
        base.add(CORE1_STACK_WORDS) as u32
    };
    // Core 1 inherits core 0's vector table.
    let vector_table = (*pac::PPB::ptr()).vtor().read().bits();

    let cmds = [
        0,
        0,
        1,
        vector_table,
        stack_top,
        entry as *const () as u32,
    ];

    let mut i = 0;
    while i < cmds.len() {
        let cmd = cmds[i];
        if cmd == 0 {
            fifo_drain(sio);
            cortex_m::asm::sev();
        }
        fifo_push_blocking(sio, cmd);
        let response = fifo_pop_blocking(sio);
        // Restart the handshake on a bad echo.
        i = if response == cmd { i + 1 } else { 0 };
    }
}
