//! PIO programs for sync generation and pixel shift-out.
//!
//! The timing state machine executes a stream of 32-bit records, four per
//! scanline, fed by the timing DMA. Each record is `{instr:16, delay:16}`:
//! the embedded instruction sets the sync pins (or raises irq 4 at the start
//! of active video, with DEN on the side-set pin), then the machine burns
//! `delay` pixel clocks. Three 4-record microprograms cover the vertical
//! phases: active lines, blank lines (front/back porch) and vsync-pulse
//! lines.
//!
//! The scanline state machine waits for irq 4, then shifts one pixel to the
//! color pins every two of its cycles from the DMA-fed FIFO, so it runs at
//! twice the pixel clock.

use super::pins;
use crate::timing::VgaMode;
use pio::{
    Instruction, InstructionOperands, MovDestination, MovOperation, MovSource, OutDestination,
    SetDestination, SideSet,
};

/// Cycles a timing record spends outside its delay loop.
const RECORD_OVERHEAD: u32 = 4;

pub fn timing_program() -> pio::Program<{ pio::RP2040_MAX_PROGRAM_SIZE }> {
    pio_proc::pio_asm!(
        "
        .side_set 1 opt
        .wrap_target
            out exec, 16
            out x, 16
        delay:
            jmp x-- delay
        .wrap
        "
    )
    .program
}

#[cfg(not(feature = "color-8bit"))]
pub fn scanline_program() -> pio::Program<{ pio::RP2040_MAX_PROGRAM_SIZE }> {
    pio_proc::pio_asm!(
        "
        .wrap_target
            wait 1 irq 4
            mov x, y
        pixels:
            out pins, 16
            jmp x-- pixels
            mov pins, null
        .wrap
        "
    )
    .program
}

#[cfg(feature = "color-8bit")]
pub fn scanline_program() -> pio::Program<{ pio::RP2040_MAX_PROGRAM_SIZE }> {
    pio_proc::pio_asm!(
        "
        .wrap_target
            wait 1 irq 4
            mov x, y
        pixels:
            out pins, 8
            jmp x-- pixels
            mov pins, null
        .wrap
        "
    )
    .program
}

fn side_set() -> SideSet {
    SideSet::new(true, 1, false)
}

fn encode(operands: InstructionOperands, den: Option<bool>) -> u16 {
    Instruction {
        operands,
        delay: 0,
        side_set: den.map(|d| d as u8),
    }
    .encode(side_set())
}

/// `set pins, value` for the {hsync, vsync} group.
fn set_sync(hsync: bool, vsync: bool, den: Option<bool>) -> u16 {
    let data = (hsync as u8) | (vsync as u8) << 1;
    encode(
        InstructionOperands::SET {
            destination: SetDestination::PINS,
            data,
        },
        den,
    )
}

/// Both sync pins at their idle levels; used to park the outputs during
/// setup and teardown.
pub fn idle_sync_instr(mode: &VgaMode) -> u16 {
    set_sync(!mode.h_sync_polarity, !mode.v_sync_polarity, Some(false))
}

/// `irq nowait 4`, gating the scanline machine into one active line.
fn raise_line_gate(den: bool) -> u16 {
    encode(
        InstructionOperands::IRQ {
            clear: false,
            wait: false,
            index: 4,
            relative: false,
        },
        Some(den),
    )
}

fn nop(den: bool) -> u16 {
    encode(
        InstructionOperands::MOV {
            destination: MovDestination::Y,
            op: MovOperation::None,
            source: MovSource::Y,
        },
        Some(den),
    )
}

fn record(instr: u16, pixels: u32) -> u32 {
    debug_assert!(pixels >= RECORD_OVERHEAD && pixels - RECORD_OVERHEAD < 0x1_0000);
    instr as u32 | (pixels - RECORD_OVERHEAD) << 16
}

/// The three vertical-phase microprograms, four records per scanline.
pub struct TimingPrograms {
    pub active: [u32; 4],
    pub blank: [u32; 4],
    pub vpulse: [u32; 4],
}

impl TimingPrograms {
    pub fn for_mode(mode: &VgaMode) -> TimingPrograms {
        let h_pulse = mode.h_pulse as u32;
        let h_back = mode.h_back_porch as u32;
        let h_active = mode.h_active();
        let h_front = mode.h_front_porch as u32;

        let hp = mode.h_sync_polarity; // pulse level
        let hi = !mode.h_sync_polarity; // idle level
        let vp = mode.v_sync_polarity;
        let vi = !mode.v_sync_polarity;

        let line = |vsync: bool, mid: u16| -> [u32; 4] {
            [
                record(set_sync(hp, vsync, None), h_pulse),
                record(set_sync(hi, vsync, None), h_back),
                record(mid, h_active),
                record(set_sync(hi, vsync, Some(false)), h_front),
            ]
        };

        TimingPrograms {
            active: line(vi, raise_line_gate(true)),
            blank: line(vi, nop(false)),
            vpulse: line(vp, nop(false)),
        }
    }
}

/// 16.8 fixed-point clock divider for one state machine.
pub fn clkdiv(sys_hz: u32, sm_hz: u32) -> u32 {
    let fixed = (sys_hz as u64 * 256).div_ceil(sm_hz as u64) as u32;
    fixed << 8
}

/// Instructions used once at startup to preload the pixel-count register.
pub fn preload_y() -> (u16, u16) {
    let pull = encode(
        InstructionOperands::PULL {
            if_empty: false,
            block: true,
        },
        None,
    );
    let out_y = encode(
        InstructionOperands::OUT {
            destination: OutDestination::Y,
            bit_count: 32,
        },
        None,
    );
    (pull, out_y)
}

/// Pin groups for the state machines, encoded for the PINCTRL registers.
pub struct PinConfig {
    pub timing_pinctrl: u32,
    pub scanline_pinctrl: u32,
}

pub fn pin_config() -> PinConfig {
    // PINCTRL fields: OUT_BASE[4:0] SET_BASE[9:5] SIDESET_BASE[14:10]
    // OUT_COUNT[25:20] SET_COUNT[28:26] SIDESET_COUNT[31:29]
    let timing_pinctrl = ((pins::SYNC_PIN_BASE as u32) << 5)    // set base
        | (2 << 26)                                             // set count
        | ((pins::DEN_PIN as u32) << 10)                        // side-set base
        | (2 << 29); // side-set count incl. enable bit
    let scanline_pinctrl = (pins::COLOR_PIN_BASE as u32)        // out base
        | ((pins::COLOR_PIN_COUNT as u32) << 20); // out count, no side-set
    PinConfig {
        timing_pinctrl,
        scanline_pinctrl,
    }
}
