//! Bitbang SPI helpers
//!
//! For ports that implement SPI by toggling GPIO lines in software
//! (e.g. `linux_gpio`). Hardware SPI ports implement [`SpiBus`](super::SpiBus)
//! directly and never use this module.
//!
//! Configuration is write-only, so only SCK and MOSI are driven here. The
//! clock idles at CPOL; with CPHA=0 data is set up while the clock idles and
//! sampled on the leading edge, with CPHA=1 it changes on the leading edge
//! and is sampled on the trailing edge.

use crate::spi::{BitOrder, ClockMode};

/// Trait for low-level bitbang SPI operations
pub trait BitbangSpi {
    /// Set clock line value
    fn set_sck(&mut self, high: bool);

    /// Set MOSI line value
    fn set_mosi(&mut self, high: bool);

    /// Delay for half a clock period
    fn half_period_delay(&self);

    /// Optional: Set SCK and MOSI atomically (optimization)
    ///
    /// Default implementation calls `set_sck` then `set_mosi`.
    fn set_sck_set_mosi(&mut self, sck: bool, mosi: bool) {
        self.set_sck(sck);
        self.set_mosi(mosi);
    }
}

/// Park the clock at its idle level for the given mode
pub fn idle<M: BitbangSpi + ?Sized>(master: &mut M, mode: ClockMode) {
    master.set_sck(mode.cpol());
}

/// Write a single bit
fn write_bit<M: BitbangSpi + ?Sized>(master: &mut M, bit: bool, mode: ClockMode) {
    let idle = mode.cpol();
    if mode.cpha() {
        master.set_sck_set_mosi(!idle, bit);
        master.half_period_delay();
        master.set_sck(idle);
        master.half_period_delay();
    } else {
        master.set_sck_set_mosi(idle, bit);
        master.half_period_delay();
        master.set_sck(!idle);
        master.half_period_delay();
        master.set_sck(idle);
    }
}

/// Write a byte in the given bit order
pub fn write_byte<M: BitbangSpi + ?Sized>(
    master: &mut M,
    byte: u8,
    mode: ClockMode,
    order: BitOrder,
) {
    for i in 0..8 {
        let shift = match order {
            BitOrder::MsbFirst => 7 - i,
            BitOrder::LsbFirst => i,
        };
        write_bit(master, (byte >> shift) & 1 != 0, mode);
    }
}

/// Write multiple bytes
pub fn write_bytes<M: BitbangSpi + ?Sized>(
    master: &mut M,
    bytes: &[u8],
    mode: ClockMode,
    order: BitOrder,
) {
    for &byte in bytes {
        write_byte(master, byte, mode, order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records the MOSI value seen at each SCK edge
    struct EdgeRecorder {
        sck: bool,
        mosi: bool,
        rising: [bool; 16],
        falling: [bool; 16],
        n_rising: usize,
        n_falling: usize,
    }

    impl EdgeRecorder {
        fn new(sck: bool) -> Self {
            Self {
                sck,
                mosi: false,
                rising: [false; 16],
                falling: [false; 16],
                n_rising: 0,
                n_falling: 0,
            }
        }
    }

    impl BitbangSpi for EdgeRecorder {
        fn set_sck(&mut self, high: bool) {
            if high && !self.sck {
                self.rising[self.n_rising] = self.mosi;
                self.n_rising += 1;
            } else if !high && self.sck {
                self.falling[self.n_falling] = self.mosi;
                self.n_falling += 1;
            }
            self.sck = high;
        }

        fn set_mosi(&mut self, high: bool) {
            self.mosi = high;
        }

        fn half_period_delay(&self) {}
    }

    fn bits(byte: u8) -> [bool; 8] {
        let mut out = [false; 8];
        for (i, b) in out.iter_mut().enumerate() {
            *b = (byte >> (7 - i)) & 1 != 0;
        }
        out
    }

    #[test]
    fn test_mode2_samples_on_falling_edge() {
        let mut rec = EdgeRecorder::new(true);
        write_byte(&mut rec, 0xA5, ClockMode::Mode2, BitOrder::MsbFirst);
        assert_eq!(rec.n_falling, 8);
        assert_eq!(rec.falling[..8], bits(0xA5));
        // Clock returns to idle high
        assert!(rec.sck);
    }

    #[test]
    fn test_mode0_samples_on_rising_edge() {
        let mut rec = EdgeRecorder::new(false);
        write_byte(&mut rec, 0x3C, ClockMode::Mode0, BitOrder::MsbFirst);
        assert_eq!(rec.n_rising, 8);
        assert_eq!(rec.rising[..8], bits(0x3C));
        assert!(!rec.sck);
    }

    #[test]
    fn test_lsb_first() {
        let mut rec = EdgeRecorder::new(false);
        write_byte(&mut rec, 0x01, ClockMode::Mode0, BitOrder::LsbFirst);
        assert!(rec.rising[0]);
        assert!(rec.rising[1..8].iter().all(|&b| !b));
    }
}
