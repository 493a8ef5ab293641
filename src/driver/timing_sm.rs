//! The four-phase vertical state machine.
//!
//! The timing DMA streams one of three 4-word microprograms into the timing
//! state machine, `lines * 4` words per phase. Its completion interrupt is
//! the phase boundary: the handler reloads the channel with the next phase's
//! program and length, and publishes the frame bookkeeping (frame number,
//! rolling line at frame start, vblank flag).
//!
//! ```text
//! active --end--> front_porch --end--> vsync_pulse --end--> back_porch --+
//!    ^                                                                  |
//!    +------------------------------------------------------------------+
//! ```

use super::{clock, pio_prog::TimingPrograms};
use crate::frame;
use crate::timing::VgaMode;
use crate::util::rolling::Rolling;
use rp2040_pac as pac;

pub const TIMING_DMA_CH: usize = 0;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    Active,
    FrontPorch,
    VsyncPulse,
    BackPorch,
}

pub struct TimingSm {
    programs: TimingPrograms,
    /// Raster lines per phase, in phase order.
    lines: [u32; 4],
    phase: Phase,
    /// Rolling raster line index at the start of the current frame.
    raster_line: Rolling,
    raster_per_frame: u32,
    vss: u32,
}

impl TimingSm {
    pub fn new(mode: &VgaMode) -> TimingSm {
        TimingSm {
            programs: TimingPrograms::for_mode(mode),
            lines: [
                mode.v_active(),
                mode.v_front_porch as u32,
                mode.v_pulse as u32,
                mode.v_back_porch as u32,
            ],
            // The DMA is started loaded with the back porch so the first
            // IRQ rolls into a clean frame.
            phase: Phase::BackPorch,
            raster_line: Rolling::ZERO,
            raster_per_frame: mode.v_active(),
            vss: mode.vss,
        }
    }

    fn phase_program(&self, phase: Phase) -> (&[u32; 4], u32) {
        match phase {
            Phase::Active => (&self.programs.active, self.lines[0]),
            Phase::FrontPorch => (&self.programs.blank, self.lines[1]),
            Phase::VsyncPulse => (&self.programs.vpulse, self.lines[2]),
            Phase::BackPorch => (&self.programs.blank, self.lines[3]),
        }
    }

    /// Kicks off the vertical loop from the back porch, so the first
    /// phase-end interrupt opens a clean frame.
    ///
    /// # Safety
    ///
    /// The timing DMA channel must be configured and idle.
    pub unsafe fn start(&mut self) {
        self.phase = Phase::BackPorch;
        let (program, lines) = self.phase_program(Phase::BackPorch);
        let addr = program.as_ptr() as u32;
        let dma = &*pac::DMA::ptr();
        let ch = dma.ch(TIMING_DMA_CH);
        ch.ch_trans_count().write(|w| unsafe { w.bits(lines * 4) });
        ch.ch_al3_read_addr_trig().write(|w| unsafe { w.bits(addr) });
    }

    /// Phase-boundary interrupt: advance the vertical state machine.
    #[cfg_attr(target_os = "none", link_section = ".data.rp2vga.timing_isr")]
    pub fn on_phase_end(&mut self) {
        let next = match self.phase {
            Phase::Active => {
                // The active feed finished a little before the beam does;
                // renderers use the early flag to pre-position.
                frame::set_in_vblank(true);
                Phase::FrontPorch
            }
            Phase::FrontPorch => Phase::VsyncPulse,
            Phase::VsyncPulse => Phase::BackPorch,
            Phase::BackPorch => {
                frame::begin_frame(
                    Rolling(self.raster_line.0 >> self.vss),
                    clock::time_us(),
                    cycle_count(),
                );
                // line index the next frame will start at
                self.raster_line = self.raster_line.advance(self.raster_per_frame);
                Phase::Active
            }
        };
        self.phase = next;
        let (program, lines) = self.phase_program(next);
        let addr = program.as_ptr() as u32;
        // Safety: the channel finished (that is why we are here).
        let dma = unsafe { &*pac::DMA::ptr() };
        let ch = dma.ch(TIMING_DMA_CH);
        ch.ch_trans_count().write(|w| unsafe { w.bits(lines * 4) });
        ch.ch_al3_read_addr_trig().write(|w| unsafe { w.bits(addr) });
    }
}

fn cycle_count() -> u32 {
    // Approximate clock-cycle timestamp derived from the microsecond timer;
    // the M0+ has no cycle counter.
    clock::time_us().wrapping_mul(clock::current_sys_hz() / 1_000_000)
}
