//! PIO + DMA video backend.
//!
//! The pixel path is a two-channel chain: the control channel reads the next
//! slot pointer from the ring's control list (its read address wraps on a
//! power-of-two ring) and writes it to the data channel's triggering read
//! address; the data channel streams one scanline into the pixel state
//! machine's FIFO and chains back to the control channel. Nothing on a core
//! touches this loop while video runs -- the CPUs only ever write into slots
//! the DMA has already left behind.
//!
//! The data channel's completion interrupt, taken on core 1, is the
//! per-scanline event the composition loop paces itself by.

use super::{clock, pins, pio_prog, timing_sm};
use crate::frame;
use crate::ring::ScanlineBuffer;
use crate::timing::VgaMode;
use crate::util::rolling::Rolling;
use crate::util::spin_lock::SpinLock;
use crate::VideoError;
use portable_atomic::{AtomicU32, Ordering};
use rp2040_pac as pac;
use rp2040_pac::interrupt;

pub const TIMING_SM: usize = 0;
pub const SCANLINE_SM: usize = 1;

pub const TIMING_DMA_CH: usize = timing_sm::TIMING_DMA_CH; // 0
pub const CTRL_DMA_CH: usize = 1;
pub const DATA_DMA_CH: usize = 2;
/// Reserved for a second pixel plane.
pub const SPARE_DMA_CH: usize = 3;

/// Slot pointers for the pixel chain, one per raster line of the ring, in a
/// naturally aligned block so the control channel's read address can wrap as
/// a hardware ring (max 16 entries = 64 bytes).
#[repr(align(64))]
struct ControlList([u32; 16]);

static mut CONTROL_LIST: ControlList = ControlList([0; 16]);

/// Raster lines completed by the data channel since video start.
static RASTER_LINE: AtomicU32 = AtomicU32::new(0);
/// Logical (rendered) lines completed; advances every `2^vss` raster lines.
static LOGICAL_LINE: AtomicU32 = AtomicU32::new(0);
static VSS_MASK: AtomicU32 = AtomicU32::new(0);

static TIMING: SpinLock<Option<timing_sm::TimingSm>> = SpinLock::new(None);

/// The rolling logical line index the display has consumed.
#[cfg_attr(target_os = "none", link_section = ".data.rp2vga.displayed")]
pub fn displayed_line() -> Rolling {
    Rolling(LOGICAL_LINE.load(Ordering::Acquire))
}

/// Pattern for acquiring state loaned to an ISR in a static: both failure
/// modes (lock held at ISR time, ISR before provisioning) are driver bugs.
fn with_timing_sm(f: impl FnOnce(&mut timing_sm::TimingSm)) {
    let mut guard = TIMING.try_lock().expect("timing state held at ISR");
    f(guard.as_mut().expect("timing ISR before start"))
}

/// Brings up the whole video backend. On return the sync and pixel state
/// machines run and the DMA chain is live; the caller still has to enable
/// the two DMA interrupts on the rendering core (`enable_irqs`).
///
/// # Safety
///
/// Single-caller (guarded by `controller`); steals peripherals and claims
/// the resources in the module docs.
pub unsafe fn start(mode: &VgaMode, ring: &ScanlineBuffer) -> Result<(), VideoError> {
    let p = pac::Peripherals::steal();

    // Release PIO0 and DMA from reset.
    p.RESETS
        .reset()
        .modify(|_, w| w.pio0().clear_bit().dma().clear_bit());
    while p.RESETS.reset_done().read().pio0().bit_is_clear() {}
    while p.RESETS.reset_done().read().dma().bit_is_clear() {}

    pins::connect_to_pio();

    let pio = &*pac::PIO0::ptr();
    let dma = &*pac::DMA::ptr();

    // ---- program memory ----
    let timing_prog = pio_prog::timing_program();
    let scan_prog = pio_prog::scanline_program();
    let timing_origin = 0usize;
    let scan_origin = timing_prog.code.len();
    assert!(scan_origin + scan_prog.code.len() <= 32);
    for (i, instr) in timing_prog.code.iter().enumerate() {
        let instr = *instr as u32;
        pio.instr_mem(timing_origin + i)
            .write(|w| unsafe { w.bits(instr) });
    }
    for (i, instr) in scan_prog.code.iter().enumerate() {
        let instr = *instr as u32;
        pio.instr_mem(scan_origin + i)
            .write(|w| unsafe { w.bits(instr) });
    }

    // ---- state machine config ----
    let pin_cfg = pio_prog::pin_config();
    let sys_hz = clock::current_sys_hz();

    {
        let sm = pio.sm(TIMING_SM);
        let div = pio_prog::clkdiv(sys_hz, mode.pixel_clock);
        sm.sm_clkdiv().write(|w| unsafe { w.bits(div) });
        // wrap range + optional side-set enable (bit 30)
        let wrap_top = (timing_origin + timing_prog.wrap.source as usize) as u32;
        let wrap_bottom = (timing_origin + timing_prog.wrap.target as usize) as u32;
        sm.sm_execctrl()
            .write(|w| unsafe { w.bits((1 << 30) | wrap_top << 12 | wrap_bottom << 7) });
        // autopull (17), shift right (19), threshold 32
        sm.sm_shiftctrl()
            .write(|w| unsafe { w.bits((1 << 17) | (1 << 19)) });
        sm.sm_pinctrl()
            .write(|w| unsafe { w.bits(pin_cfg.timing_pinctrl) });

        // sync pins to outputs at idle level, DEN to output low
        exec(pio, TIMING_SM, set_pindirs(0b11));
        exec(pio, TIMING_SM, pio_prog::idle_sync_instr(mode));
        with_set_base(pio, TIMING_SM, pins::DEN_PIN, 1, |pio| {
            exec(pio, TIMING_SM, set_pindirs(1));
        });
        exec(pio, TIMING_SM, jmp_instr(timing_origin as u8));
    }

    {
        let sm = pio.sm(SCANLINE_SM);
        // two machine cycles per pixel
        let div = pio_prog::clkdiv(sys_hz, mode.pixel_clock * 2);
        sm.sm_clkdiv().write(|w| unsafe { w.bits(div) });
        let wrap_top = (scan_origin + scan_prog.wrap.source as usize) as u32;
        let wrap_bottom = (scan_origin + scan_prog.wrap.target as usize) as u32;
        sm.sm_execctrl()
            .write(|w| unsafe { w.bits(wrap_top << 12 | wrap_bottom << 7) });
        sm.sm_shiftctrl()
            .write(|w| unsafe { w.bits((1 << 17) | (1 << 19)) });
        sm.sm_pinctrl()
            .write(|w| unsafe { w.bits(pin_cfg.scanline_pinctrl) });

        // color pins to outputs, five at a time (SET is 5 bits wide)
        let mut pin = pins::COLOR_PIN_BASE;
        let mut left = pins::COLOR_PIN_COUNT;
        while left > 0 {
            let n = left.min(5);
            with_set_base(pio, SCANLINE_SM, pin, n, |pio| {
                exec(pio, SCANLINE_SM, set_pindirs((1 << n) - 1));
            });
            pin += n;
            left -= n;
        }

        // preload Y with pixels-per-line - 1
        let pixels = mode.h_active() - 1;
        pio.txf(SCANLINE_SM).write(|w| unsafe { w.bits(pixels) });
        let (pull, out_y) = pio_prog::preload_y();
        exec(pio, SCANLINE_SM, pull);
        exec(pio, SCANLINE_SM, out_y);
        exec(pio, SCANLINE_SM, jmp_instr(scan_origin as u8));
    }

    // ---- control list + counters ----
    let raster_count = ring.raster_count();
    {
        let list = &mut *core::ptr::addr_of_mut!(CONTROL_LIST);
        for i in 0..raster_count {
            list.0[i as usize] = ring.raster_ptr(i) as u32;
        }
    }
    RASTER_LINE.store(0, Ordering::Relaxed);
    LOGICAL_LINE.store(0, Ordering::Relaxed);
    VSS_MASK.store((1 << mode.vss) - 1, Ordering::Relaxed);
    frame::set_current_scanline(Rolling::ZERO);

    // ---- DMA ----
    const SIZE_WORD: u32 = 2 << 2;
    const INCR_READ: u32 = 1 << 4;
    const HIGH_PRIORITY: u32 = 1 << 1;
    const EN: u32 = 1;
    let treq = |n: u32| n << 15;
    let chain_to = |n: u32| n << 11;
    let ring_bits = |words: u32| (words * 4).trailing_zeros() << 6;

    // control channel: list -> data channel read trigger
    {
        let ch = dma.ch(CTRL_DMA_CH);
        let list_addr = core::ptr::addr_of!(CONTROL_LIST) as u32;
        ch.ch_read_addr().write(|w| unsafe { w.bits(list_addr) });
        let trig_addr = dma.ch(DATA_DMA_CH).ch_al3_read_addr_trig().as_ptr() as u32;
        ch.ch_write_addr().write(|w| unsafe { w.bits(trig_addr) });
        ch.ch_trans_count().write(|w| unsafe { w.bits(1) });
        // permanent request (0x3f), read ring over the slot pointers
        let ctrl = EN
            | HIGH_PRIORITY
            | SIZE_WORD
            | INCR_READ
            | ring_bits(raster_count)
            | treq(0x3f)
            | chain_to(CTRL_DMA_CH as u32);
        ch.ch_al1_ctrl().write(|w| unsafe { w.bits(ctrl) });
    }

    // data channel: slot -> pixel FIFO, chains back to the control channel
    {
        let ch = dma.ch(DATA_DMA_CH);
        let txf = pio.txf(SCANLINE_SM).as_ptr() as u32;
        ch.ch_write_addr().write(|w| unsafe { w.bits(txf) });
        let words = ring.words_per_slot() as u32;
        ch.ch_trans_count().write(|w| unsafe { w.bits(words) });
        // DREQ_PIO0_TX1 = 1
        let ctrl = EN
            | HIGH_PRIORITY
            | SIZE_WORD
            | INCR_READ
            | treq(1)
            | chain_to(CTRL_DMA_CH as u32);
        ch.ch_al1_ctrl().write(|w| unsafe { w.bits(ctrl) });
    }

    // timing channel: microprograms -> timing FIFO. DREQ_PIO0_TX0 = 0.
    {
        let ch = dma.ch(TIMING_DMA_CH);
        let txf = pio.txf(TIMING_SM).as_ptr() as u32;
        ch.ch_write_addr().write(|w| unsafe { w.bits(txf) });
        let ctrl = EN
            | HIGH_PRIORITY
            | SIZE_WORD
            | INCR_READ
            | treq(0)
            | chain_to(TIMING_DMA_CH as u32);
        ch.ch_al1_ctrl().write(|w| unsafe { w.bits(ctrl) });
    }

    // per-line IRQ from the data channel; phase IRQ from the timing channel
    dma.inte0()
        .modify(|r, w| unsafe { w.bits(r.bits() | 1 << DATA_DMA_CH) });
    dma.inte1()
        .modify(|r, w| unsafe { w.bits(r.bits() | 1 << TIMING_DMA_CH) });

    *TIMING.lock() = Some(timing_sm::TimingSm::new(mode));

    // Prime the pixel chain, start the vertical loop, release the machines.
    dma.multi_chan_trigger()
        .write(|w| unsafe { w.bits(1 << CTRL_DMA_CH) });
    with_timing_sm(|t| unsafe { t.start() });
    pio.ctrl()
        .modify(|r, w| unsafe { w.bits(r.bits() | (1 << TIMING_SM | 1 << SCANLINE_SM)) });

    #[cfg(feature = "defmt")]
    defmt::info!(
        "video backend up: {}x{} vss={} ring={} lines",
        mode.width,
        mode.height,
        mode.vss,
        ring.count()
    );

    Ok(())
}

/// Enables the scanline and phase interrupts in this core's NVIC. Called by
/// the rendering loop once it runs on core 1.
pub fn enable_irqs() {
    unsafe {
        pac::NVIC::unmask(pac::Interrupt::DMA_IRQ_0);
        pac::NVIC::unmask(pac::Interrupt::DMA_IRQ_1);
    }
}

/// Tears the backend down: DMA first, then the state machines, then the
/// pins. The scanline ring is released by the controller afterwards.
///
/// # Safety
///
/// Single-caller; the rendering loop must already have stopped.
pub unsafe fn stop() {
    let pio = &*pac::PIO0::ptr();
    let dma = &*pac::DMA::ptr();

    let mask = (1 << TIMING_DMA_CH) | (1 << CTRL_DMA_CH) | (1 << DATA_DMA_CH);
    dma.chan_abort().write(|w| unsafe { w.bits(mask) });
    while dma.chan_abort().read().bits() != 0 {}
    dma.inte0()
        .modify(|r, w| unsafe { w.bits(r.bits() & !(1 << DATA_DMA_CH)) });
    dma.inte1()
        .modify(|r, w| unsafe { w.bits(r.bits() & !(1 << TIMING_DMA_CH)) });
    for ch in [TIMING_DMA_CH, CTRL_DMA_CH, DATA_DMA_CH] {
        dma.ch(ch).ch_al1_ctrl().write(|w| unsafe { w.bits(0) });
    }

    pio.ctrl()
        .modify(|r, w| unsafe { w.bits(r.bits() & !(1 << TIMING_SM | 1 << SCANLINE_SM)) });

    pins::disconnect();
    *TIMING.lock() = None;
}

// ---- helpers ----

fn exec(pio: &pac::pio0::RegisterBlock, sm: usize, instr: u16) {
    pio.sm(sm)
        .sm_instr()
        .write(|w| unsafe { w.bits(instr as u32) });
}

fn set_pindirs(dirs: u8) -> u16 {
    pio::Instruction {
        operands: pio::InstructionOperands::SET {
            destination: pio::SetDestination::PINDIRS,
            data: dirs,
        },
        delay: 0,
        side_set: None,
    }
    .encode(pio::SideSet::new(true, 1, false))
}

fn jmp_instr(address: u8) -> u16 {
    pio::Instruction {
        operands: pio::InstructionOperands::JMP {
            condition: pio::JmpCondition::Always,
            address,
        },
        delay: 0,
        side_set: None,
    }
    .encode(pio::SideSet::new(true, 1, false))
}

/// Runs `f` with the SET pin group temporarily rebased.
fn with_set_base(
    pio: &pac::pio0::RegisterBlock,
    sm: usize,
    base: u8,
    count: u8,
    f: impl FnOnce(&pac::pio0::RegisterBlock),
) {
    let saved = pio.sm(sm).sm_pinctrl().read().bits();
    let restore = scopeguard::guard((), |_| {
        pio.sm(sm).sm_pinctrl().write(|w| unsafe { w.bits(saved) });
    });
    let temp = ((base as u32) << 5) | ((count as u32) << 26);
    pio.sm(sm).sm_pinctrl().write(|w| unsafe { w.bits(temp) });
    f(pio);
    drop(restore);
}

// ---- interrupt handlers, rendering core ----

/// Data channel completed one scanline transfer.
#[interrupt]
fn DMA_IRQ_0() {
    let dma = unsafe { &*pac::DMA::ptr() };
    dma.ints0()
        .write(|w| unsafe { w.bits(1 << DATA_DMA_CH) });

    let raster = RASTER_LINE.load(Ordering::Relaxed).wrapping_add(1);
    RASTER_LINE.store(raster, Ordering::Relaxed);
    if raster & VSS_MASK.load(Ordering::Relaxed) == 0 {
        let logical = LOGICAL_LINE.load(Ordering::Relaxed).wrapping_add(1);
        LOGICAL_LINE.store(logical, Ordering::Release);
        frame::set_current_scanline(Rolling(logical));
    }
    cortex_m::asm::sev();
}

/// Timing channel finished a vertical phase.
#[interrupt]
fn DMA_IRQ_1() {
    let dma = unsafe { &*pac::DMA::ptr() };
    dma.ints1()
        .write(|w| unsafe { w.bits(1 << TIMING_DMA_CH) });
    with_timing_sm(|t| t.on_phase_end());
    cortex_m::asm::sev();
}
