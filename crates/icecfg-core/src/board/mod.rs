//! Board descriptions
//!
//! A [`Board`] maps the protocol's logical lines (per-slot SS_B, CRESET_B
//! and CDONE, plus the shared flash-power and SPI-mux lines) to GPIO line
//! offsets. Two built-in profiles exist:
//!
//! - [`Board::multiplexed`]: two iCE40 slots and a configuration flash on one
//!   SPI bus, with a mux line and a flash power switch
//! - [`Board::single`]: one iCE40 wired to the Raspberry Pi header the way
//!   the classic single-device setup does it (SS_B on pin 24, CRESET_B on
//!   pin 11, CDONE on pin 7)
//!
//! With the `std` feature a board can also be read from a TOML file, see
//! [`Board::from_toml_str`].

#[cfg(feature = "std")]
mod toml;

#[cfg(feature = "std")]
pub use self::toml::BoardFileError;

use heapless::Vec;

use crate::error::{Error, Result};
use crate::port::{Direction, Pin};
use crate::spi::DEFAULT_CORE_CLOCK_HZ;

/// Maximum number of GPIO lines a board can name
pub const MAX_LINES: usize = 12;

/// Default CDONE poll bound for multiplexed boards
pub const DEFAULT_POLL_BOUND: u32 = 100;

/// CDONE poll bound of the single-device wiring
pub const SINGLE_POLL_BOUND: u32 = 512;

/// Control lines of one FPGA slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPins {
    /// SPI_SS_B (slave select, active low)
    pub ss: Pin,
    /// CRESET_B (reset, active low)
    pub creset: Pin,
    /// CDONE (configuration done, input)
    pub cdone: Pin,
}

/// Lines shared by every target on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedLines {
    /// Configuration flash power enable (active high)
    pub flash_power: Pin,
    /// SPI routing mux select
    pub spi_mux: Pin,
}

/// Lines used when the bus is bit-banged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitbangLines {
    /// Serial clock
    pub sck: Pin,
    /// Master out, slave in
    pub mosi: Pin,
    /// Software chip select for CS0, if wired
    pub ce0: Option<Pin>,
    /// Software chip select for CS1, if wired
    pub ce1: Option<Pin>,
}

/// CDONE polling parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Maximum number of samples per polling phase
    pub bound: u32,
    /// Delay between samples in microseconds (0 = busy poll)
    pub delay_us: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            bound: DEFAULT_POLL_BOUND,
            delay_us: 0,
        }
    }
}

/// Pin assignment and timing parameters of one board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    /// First FPGA slot; its bus path is shared with the flash
    pub slot_a: SlotPins,
    /// Second FPGA slot, if present
    pub slot_b: Option<SlotPins>,
    /// Flash power and mux lines, absent on single-device boards
    pub shared: Option<SharedLines>,
    /// Lines for the bit-banged bus
    pub bitbang: BitbangLines,
    /// SPI controller core clock the divider applies to
    pub core_clock_hz: u32,
    /// CDONE polling
    pub poll: PollConfig,
}

impl Default for Board {
    fn default() -> Self {
        Self::multiplexed()
    }
}

impl Board {
    /// Two iCE40 slots plus configuration flash behind a mux
    pub fn multiplexed() -> Self {
        Self {
            slot_a: SlotPins {
                ss: Pin(25),
                creset: Pin(17),
                cdone: Pin(4),
            },
            slot_b: Some(SlotPins {
                ss: Pin(5),
                creset: Pin(27),
                cdone: Pin(22),
            }),
            shared: Some(SharedLines {
                flash_power: Pin(23),
                spi_mux: Pin(24),
            }),
            bitbang: BitbangLines {
                sck: Pin(11),
                mosi: Pin(10),
                ce0: Some(Pin(8)),
                ce1: Some(Pin(7)),
            },
            core_clock_hz: DEFAULT_CORE_CLOCK_HZ,
            poll: PollConfig::default(),
        }
    }

    /// A single iCE40 on the Raspberry Pi header
    ///
    /// SS_B sits on CE0 (GPIO8), so in native mode the kernel must not claim
    /// that line as a chip select.
    pub fn single() -> Self {
        Self {
            slot_a: SlotPins {
                ss: Pin(8),
                creset: Pin(17),
                cdone: Pin(4),
            },
            slot_b: None,
            shared: None,
            bitbang: BitbangLines {
                sck: Pin(11),
                mosi: Pin(10),
                ce0: None,
                ce1: None,
            },
            core_clock_hz: DEFAULT_CORE_CLOCK_HZ,
            poll: PollConfig {
                bound: SINGLE_POLL_BOUND,
                delay_us: 0,
            },
        }
    }

    /// Look up a built-in profile by name
    pub fn profile(name: &str) -> Option<Self> {
        match name {
            "multiplexed" | "mux" => Some(Self::multiplexed()),
            "single" | "legacy" => Some(Self::single()),
            _ => None,
        }
    }

    /// Whether the board has more than one possible target
    pub fn is_multiplexed(&self) -> bool {
        self.shared.is_some()
    }

    /// Every FPGA slot on the board
    pub fn slots(&self) -> impl Iterator<Item = &SlotPins> {
        core::iter::once(&self.slot_a).chain(self.slot_b.iter())
    }

    /// Control lines with the direction the protocol needs them in
    ///
    /// Covers every slot, not just the one being configured, since all slots
    /// share the bus. Bit-bang lines are owned by the bus and not listed.
    pub fn control_lines(&self) -> Vec<(Pin, Direction), MAX_LINES> {
        let mut lines = Vec::new();
        for slot in self.slots() {
            // Capacity covers two slots plus shared lines
            let _ = lines.push((slot.ss, Direction::Output));
            let _ = lines.push((slot.creset, Direction::Output));
            let _ = lines.push((slot.cdone, Direction::Input));
        }
        if let Some(shared) = &self.shared {
            let _ = lines.push((shared.flash_power, Direction::Output));
            let _ = lines.push((shared.spi_mux, Direction::Output));
        }
        lines
    }

    /// Bit-bang lines that are wired
    pub fn bitbang_lines(&self) -> Vec<Pin, 4> {
        let mut lines = Vec::new();
        let _ = lines.push(self.bitbang.sck);
        let _ = lines.push(self.bitbang.mosi);
        for ce in [self.bitbang.ce0, self.bitbang.ce1].into_iter().flatten() {
            let _ = lines.push(ce);
        }
        lines
    }

    /// Check that no GPIO line is assigned to two roles and the core clock
    /// can derive a bus clock
    pub fn validate(&self) -> Result<()> {
        if self.core_clock_hz == 0 {
            return Err(Error::InvalidCoreClock);
        }
        let mut seen: Vec<Pin, MAX_LINES> = Vec::new();
        let all = self
            .control_lines()
            .into_iter()
            .map(|(pin, _)| pin)
            .chain(self.bitbang_lines());
        for pin in all {
            if seen.contains(&pin) {
                return Err(Error::InvalidBoard { line: pin.0 });
            }
            let _ = seen.push(pin);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_profiles_are_valid() {
        assert_eq!(Board::multiplexed().validate(), Ok(()));
        assert_eq!(Board::single().validate(), Ok(()));
    }

    #[test]
    fn test_control_lines_cover_both_slots() {
        let board = Board::multiplexed();
        let lines = board.control_lines();
        assert_eq!(lines.len(), 8);
        let inputs: Vec<Pin, MAX_LINES> = lines
            .iter()
            .filter(|(_, dir)| *dir == Direction::Input)
            .map(|(pin, _)| *pin)
            .collect();
        assert_eq!(inputs.as_slice(), &[Pin(4), Pin(22)]);
    }

    #[test]
    fn test_single_profile() {
        let board = Board::single();
        assert!(!board.is_multiplexed());
        assert_eq!(board.slots().count(), 1);
        assert_eq!(board.control_lines().len(), 3);
        assert_eq!(board.poll.bound, SINGLE_POLL_BOUND);
        assert_eq!(board.slot_a.ss, Pin(8));
    }

    #[test]
    fn test_duplicate_line_rejected() {
        let mut board = Board::multiplexed();
        board.shared = Some(SharedLines {
            flash_power: Pin(17),
            spi_mux: Pin(24),
        });
        assert_eq!(board.validate(), Err(Error::InvalidBoard { line: 17 }));
    }

    #[test]
    fn test_zero_core_clock_rejected() {
        let mut board = Board::single();
        board.core_clock_hz = 0;
        assert_eq!(board.validate(), Err(Error::InvalidCoreClock));
    }

    #[test]
    fn test_profile_lookup() {
        assert_eq!(Board::profile("mux"), Some(Board::multiplexed()));
        assert_eq!(Board::profile("legacy"), Some(Board::single()));
        assert_eq!(Board::profile("nope"), None);
    }
}
