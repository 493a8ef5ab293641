//! Hardware-assisted palette lookup.
//!
//! The RP2040's SIO block contains two interpolators per core. Configured as
//! a table-lookup engine, one pop per pixel performs
//!
//! ```text
//! color_ptr = palette_base + ((accum >> 0) & mask)   // lane 1, cross input
//! accum     = accum >> bits_per_index                // lane 0 writeback
//! ```
//!
//! in a single cycle, which is what makes the 4/8-bit indexed and
//! hold-and-modify inner loops fit their scanline budget. The accumulator is
//! loaded with pixel bytes pre-shifted by `SS_COLOR` so the masked field is
//! already a byte offset into the palette.
//!
//! Interpolators are per-core state. The rendering loop on core 1 owns both
//! of its units; they are reconfigured once per frame from `vblank` (or per
//! scanline with the `interp-per-scanline` feature, when incompatible planes
//! are tiled).
//!
//! On hosted builds the same API drives a small software model so the
//! renderers can be tested off-target.

use crate::color::Color;

/// log2 of the size of a `Color`, i.e. the shift that turns a palette index
/// into a byte offset.
pub const SS_COLOR: u32 = (core::mem::size_of::<Color>() / 2) as u32;

/// Which of the core's two interpolators to use.
///
/// By convention in this crate: unit 0 belongs to the hold-and-modify
/// renderer, unit 1 to the 4/8-bit indexed renderers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InterpUnit {
    I0,
    I1,
}

/// Handle on one interpolator, preconfigured for palette lookup.
#[derive(Copy, Clone, Debug)]
pub struct Interp {
    unit: InterpUnit,
}

impl Interp {
    pub const fn new(unit: InterpUnit) -> Interp {
        Interp { unit }
    }

    /// Loads the accumulator with packed pixel indices. The low
    /// `bits_per_index` bits are the next pixel; each pop shifts the rest
    /// down.
    pub fn set_pixels(&self, value: u32) {
        self.write_accum(value << SS_COLOR);
    }

    /// Pops one palette entry address and advances the accumulator.
    pub fn pop(&self) -> *const Color {
        self.pop_raw() as *const Color
    }

    /// Pops one palette entry and advances the accumulator.
    pub fn next_color(&self) -> Color {
        // Safety: `configure` checked that every index the mask can produce
        // lands inside the palette slice, and the palette is kept alive by
        // the renderer that owns this unit.
        unsafe { *self.pop() }
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "none")] {
        /// Register-level interpolator lane configuration, kept as a plain
        /// word so it can be built in const context.
        #[derive(Copy, Clone)]
        struct LaneConfig(u32);

        impl LaneConfig {
            const SHIFT_LSB: u32 = 0;
            const MASK_LSB_LSB: u32 = 5;
            const MASK_MSB_LSB: u32 = 10;
            const CROSS_INPUT: u32 = 1 << 16;

            /// Mask everything: MASK_MSB = 31.
            const fn new() -> LaneConfig {
                LaneConfig(31 << Self::MASK_MSB_LSB)
            }

            const fn shift(self, n: u32) -> LaneConfig {
                LaneConfig((self.0 & !(31 << Self::SHIFT_LSB)) | (n << Self::SHIFT_LSB))
            }

            const fn mask(self, lsb: u32, msb: u32) -> LaneConfig {
                LaneConfig(
                    (self.0 & !((31 << Self::MASK_LSB_LSB) | (31 << Self::MASK_MSB_LSB)))
                        | (lsb << Self::MASK_LSB_LSB)
                        | (msb << Self::MASK_MSB_LSB),
                )
            }

            const fn cross_input(self) -> LaneConfig {
                LaneConfig(self.0 | Self::CROSS_INPUT)
            }
        }

        impl Interp {
            fn sio() -> &'static rp2040_pac::sio::RegisterBlock {
                // Safety: the SIO interpolator registers are per-core and are
                // only driven from the rendering loop of the core that owns
                // them.
                unsafe { &*rp2040_pac::SIO::ptr() }
            }

            /// Configures this unit for `bits_per_index`-wide lookups into
            /// `palette`.
            ///
            /// # Panics
            ///
            /// If the palette is too short for the index width.
            pub fn configure(&self, bits_per_index: u32, palette: &[Color]) {
                assert!(palette.len() >= 1 << bits_per_index);

                let lane0 = LaneConfig::new().shift(bits_per_index);
                let lane1 = LaneConfig::new()
                    .cross_input()
                    .mask(SS_COLOR, SS_COLOR + bits_per_index - 1);
                let base = palette.as_ptr() as u32;

                let sio = Self::sio();
                match self.unit {
                    InterpUnit::I0 => {
                        sio.interp0_ctrl_lane0().write(|w| unsafe { w.bits(lane0.0) });
                        sio.interp0_ctrl_lane1().write(|w| unsafe { w.bits(lane1.0) });
                        sio.interp0_base1().write(|w| unsafe { w.bits(base) });
                    }
                    InterpUnit::I1 => {
                        sio.interp1_ctrl_lane0().write(|w| unsafe { w.bits(lane0.0) });
                        sio.interp1_ctrl_lane1().write(|w| unsafe { w.bits(lane1.0) });
                        sio.interp1_base1().write(|w| unsafe { w.bits(base) });
                    }
                }
            }

            fn write_accum(&self, value: u32) {
                let sio = Self::sio();
                match self.unit {
                    InterpUnit::I0 => sio.interp0_accum0().write(|w| unsafe { w.bits(value) }),
                    InterpUnit::I1 => sio.interp1_accum0().write(|w| unsafe { w.bits(value) }),
                }
            }

            fn pop_raw(&self) -> usize {
                let sio = Self::sio();
                let v = match self.unit {
                    InterpUnit::I0 => sio.interp0_pop_lane1().read().bits(),
                    InterpUnit::I1 => sio.interp1_pop_lane1().read().bits(),
                };
                v as usize
            }
        }
    } else {
        use core::cell::UnsafeCell;

        #[derive(Default)]
        struct SoftUnit {
            shift: u32,
            mask: u32,
            base: usize,
            accum: u32,
        }

        struct SoftUnits(UnsafeCell<[SoftUnit; 2]>);

        // Safety: like the hardware, the model is only driven from the
        // rendering loop; host tests are single-threaded per unit.
        unsafe impl Sync for SoftUnits {}

        static SOFT: SoftUnits =
            SoftUnits(UnsafeCell::new([
                SoftUnit { shift: 0, mask: 0, base: 0, accum: 0 },
                SoftUnit { shift: 0, mask: 0, base: 0, accum: 0 },
            ]));

        impl Interp {
            fn with_unit<R>(&self, f: impl FnOnce(&mut SoftUnit) -> R) -> R {
                let units = unsafe { &mut *SOFT.0.get() };
                f(&mut units[self.unit as usize])
            }

            /// Configures this unit for `bits_per_index`-wide lookups into
            /// `palette`.
            ///
            /// # Panics
            ///
            /// If the palette is too short for the index width.
            pub fn configure(&self, bits_per_index: u32, palette: &[Color]) {
                assert!(palette.len() >= 1 << bits_per_index);
                self.with_unit(|u| {
                    u.shift = bits_per_index;
                    u.mask = ((1u32 << bits_per_index) - 1) << SS_COLOR;
                    u.base = palette.as_ptr() as usize;
                });
            }

            fn write_accum(&self, value: u32) {
                self.with_unit(|u| u.accum = value);
            }

            fn pop_raw(&self) -> usize {
                self.with_unit(|u| {
                    let offset = (u.accum & u.mask) as usize;
                    u.accum >>= u.shift;
                    u.base + offset
                })
            }
        }
    }
}

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    use super::*;

    #[test]
    fn pops_advance_through_packed_indices() {
        let palette: [Color; 16] = core::array::from_fn(|i| Color::from_raw(i as _));
        let ip = Interp::new(InterpUnit::I1);
        ip.configure(4, &palette);
        // two bytes = four nibbles, low nibble first
        ip.set_pixels(0x4321);
        assert_eq!(ip.next_color().raw, 1);
        assert_eq!(ip.next_color().raw, 2);
        assert_eq!(ip.next_color().raw, 3);
        assert_eq!(ip.next_color().raw, 4);
    }

    #[test]
    fn units_are_independent() {
        let pal_a: [Color; 2] = [Color::from_raw(10), Color::from_raw(11)];
        let pal_b: [Color; 2] = [Color::from_raw(20), Color::from_raw(21)];
        let a = Interp::new(InterpUnit::I0);
        let b = Interp::new(InterpUnit::I1);
        a.configure(1, &pal_a);
        b.configure(1, &pal_b);
        a.set_pixels(0b10);
        b.set_pixels(0b01);
        assert_eq!(a.next_color().raw, 10);
        assert_eq!(b.next_color().raw, 21);
        assert_eq!(a.next_color().raw, 11);
        assert_eq!(b.next_color().raw, 20);
    }
}
