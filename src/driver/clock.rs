//! System clock synthesis.
//!
//! The pixel clock comes from the PIO clock dividers, so the only hard
//! requirement on the system clock is that it is an exact, achievable PLL
//! setting; video modes look terrible when the line frequency drifts. The
//! solver walks the feedback/post-divider space for an exact match and
//! refuses anything else.

use crate::VideoError;
use rp2040_pac as pac;

pub const XOSC_HZ: u32 = 12_000_000;

const VCO_MIN_HZ: u64 = 756_000_000;
const VCO_MAX_HZ: u64 = 1_596_000_000;

#[derive(Copy, Clone, Debug)]
pub struct PllParams {
    pub fbdiv: u32,
    pub postdiv1: u32,
    pub postdiv2: u32,
}

/// Finds exact PLL settings for `sys_hz`, preferring high VCO frequencies
/// (less jitter).
pub fn solve_sys_pll(sys_hz: u32) -> Result<PllParams, VideoError> {
    let mut best: Option<PllParams> = None;
    for fbdiv in (16..=320u32).rev() {
        let vco = XOSC_HZ as u64 * fbdiv as u64;
        if !(VCO_MIN_HZ..=VCO_MAX_HZ).contains(&vco) {
            continue;
        }
        for postdiv1 in (1..=7u32).rev() {
            for postdiv2 in 1..=postdiv1 {
                if vco == sys_hz as u64 * postdiv1 as u64 * postdiv2 as u64 {
                    let p = PllParams {
                        fbdiv,
                        postdiv1,
                        postdiv2,
                    };
                    if best.is_none() {
                        best = Some(p);
                    }
                }
            }
        }
        if best.is_some() {
            break;
        }
    }
    best.ok_or(VideoError::UnsupportedSystemClock)
}

/// Reconfigures the system PLL for `sys_hz` and returns the achieved
/// frequency. Pass 0 to leave the clocks alone.
///
/// # Safety
///
/// Steals peripherals; call once during `start_video` while nothing else is
/// reconfiguring clocks.
pub unsafe fn configure_system_clock(sys_hz: u32) -> Result<u32, VideoError> {
    if sys_hz == 0 {
        return Ok(current_sys_hz());
    }
    let params = solve_sys_pll(sys_hz)?;

    let p = pac::Peripherals::steal();

    // Core voltage first when speeding up past the stock 125 MHz.
    if sys_hz > 133_000_000 {
        // VSEL 0b1100 = 1.15 V
        p.VREG_AND_CHIP_RESET
            .vreg()
            .modify(|_, w| unsafe { w.vsel().bits(0b1100) });
        cortex_m::asm::delay(10_000);
    }

    // Run clk_sys from the reference clock while the PLL is reprogrammed.
    p.CLOCKS.clk_sys_ctrl().modify(|_, w| w.src().clk_ref());
    while p.CLOCKS.clk_sys_selected().read().bits() != 1 {}

    // Cycle the PLL through reset.
    p.RESETS.reset().modify(|_, w| w.pll_sys().set_bit());
    p.RESETS.reset().modify(|_, w| w.pll_sys().clear_bit());
    while p.RESETS.reset_done().read().pll_sys().bit_is_clear() {}

    let pll = p.PLL_SYS;
    pll.cs().write(|w| unsafe { w.refdiv().bits(1) });
    pll.fbdiv_int().write(|w| unsafe { w.bits(params.fbdiv) });
    // Power up VCO and main generator.
    pll.pwr()
        .modify(|_, w| w.pd().clear_bit().vcopd().clear_bit());
    while pll.cs().read().lock().bit_is_clear() {}
    pll.prim().write(|w| {
        w.postdiv1()
            .bits(params.postdiv1 as u8)
            .postdiv2()
            .bits(params.postdiv2 as u8)
    });
    pll.pwr().modify(|_, w| w.postdivpd().clear_bit());

    // Back onto the PLL.
    p.CLOCKS
        .clk_sys_ctrl()
        .modify(|_, w| w.auxsrc().clksrc_pll_sys());
    p.CLOCKS
        .clk_sys_ctrl()
        .modify(|_, w| w.src().clksrc_clk_sys_aux());
    while p.CLOCKS.clk_sys_selected().read().bits() != 2 {}

    // Peripheral clock follows clk_sys.
    p.CLOCKS
        .clk_peri_ctrl()
        .write(|w| w.auxsrc().clk_sys().enable().set_bit());

    SYS_HZ.store(sys_hz, core::sync::atomic::Ordering::Relaxed);

    #[cfg(feature = "defmt")]
    defmt::debug!(
        "clk_sys = {} Hz (fbdiv {} pd {}x{})",
        sys_hz,
        params.fbdiv,
        params.postdiv1,
        params.postdiv2
    );

    Ok(sys_hz)
}

static SYS_HZ: core::sync::atomic::AtomicU32 =
    core::sync::atomic::AtomicU32::new(125_000_000);

pub fn current_sys_hz() -> u32 {
    SYS_HZ.load(core::sync::atomic::Ordering::Relaxed)
}

/// Microsecond timestamp from the always-running timer.
pub fn time_us() -> u32 {
    // Safety: TIMERAWL is a read-only snapshot register.
    unsafe { (*pac::TIMER::ptr()).timerawl().read().bits() }
}
