//! SPI bus configuration types
//!
//! The configuration protocol always uses the same bus framing (MSB first,
//! clock mode 2, active-low chip select); only the clock divider is left to
//! the caller.

use core::fmt;

/// Default SPI core clock of the BCM283x SPI block (250 MHz)
pub const DEFAULT_CORE_CLOCK_HZ: u32 = 250_000_000;

/// Divisor the BCM283x SPI block applies when CDIV is 0
const MAX_DIVISOR: u32 = 65536;

/// Bus transfer backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpiMode {
    /// Hardware SPI controller (Linux spidev)
    #[default]
    Native,
    /// Software SPI on GPIO lines
    Bitbang,
}

impl fmt::Display for SpiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Bitbang => write!(f, "bitbang"),
        }
    }
}

/// Bit order on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOrder {
    /// Most significant bit first
    MsbFirst,
    /// Least significant bit first
    LsbFirst,
}

/// SPI clock polarity/phase mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    /// CPOL=0, CPHA=0
    Mode0,
    /// CPOL=0, CPHA=1
    Mode1,
    /// CPOL=1, CPHA=0
    Mode2,
    /// CPOL=1, CPHA=1
    Mode3,
}

impl ClockMode {
    /// Clock idle level (CPOL)
    pub fn cpol(self) -> bool {
        matches!(self, Self::Mode2 | Self::Mode3)
    }

    /// Data is sampled on the trailing clock edge (CPHA)
    pub fn cpha(self) -> bool {
        matches!(self, Self::Mode1 | Self::Mode3)
    }

    /// Numeric mode as used by spidev (0-3)
    pub fn bits(self) -> u8 {
        match self {
            Self::Mode0 => 0,
            Self::Mode1 => 1,
            Self::Mode2 => 2,
            Self::Mode3 => 3,
        }
    }
}

/// Hardware chip-select line of the SPI controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipSelect {
    /// CE0
    Cs0,
    /// CE1
    Cs1,
}

impl ChipSelect {
    /// Chip-select index (the `Y` in `/dev/spidevX.Y`)
    pub fn index(self) -> u8 {
        match self {
            Self::Cs0 => 0,
            Self::Cs1 => 1,
        }
    }
}

impl fmt::Display for ChipSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CS{}", self.index())
    }
}

/// Chip-select polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsPolarity {
    /// Selected when low
    ActiveLow,
    /// Selected when high
    ActiveHigh,
}

/// SPI clock divider relative to the controller core clock
///
/// Follows the BCM283x CDIV register: 0 and 1 both select the maximum
/// divisor of 65536.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockDivider(pub u16);

impl Default for ClockDivider {
    fn default() -> Self {
        Self(1)
    }
}

impl ClockDivider {
    /// Divisor actually applied to the core clock
    pub fn effective(self) -> u32 {
        match self.0 {
            0 | 1 => MAX_DIVISOR,
            n => n as u32,
        }
    }

    /// Resulting SCLK frequency in Hz
    pub fn speed_hz(self, core_clock_hz: u32) -> u32 {
        (core_clock_hz / self.effective()).max(1)
    }

    /// Half of one SCLK period in nanoseconds
    pub fn half_period_ns(self, core_clock_hz: u32) -> u64 {
        500_000_000 / self.speed_hz(core_clock_hz) as u64
    }
}

/// Complete bus setup for one transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Bit order
    pub bit_order: BitOrder,
    /// Clock polarity/phase
    pub clock_mode: ClockMode,
    /// Clock divider
    pub divider: ClockDivider,
    /// Chip-select line to assert during the transfer
    pub chip_select: ChipSelect,
    /// Chip-select polarity
    pub cs_polarity: CsPolarity,
}

impl BusConfig {
    /// Bus setup used for iCE40 peripheral-mode configuration
    pub fn configuration(chip_select: ChipSelect, divider: ClockDivider) -> Self {
        Self {
            bit_order: BitOrder::MsbFirst,
            clock_mode: ClockMode::Mode2,
            divider,
            chip_select,
            cs_polarity: CsPolarity::ActiveLow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divider_effective() {
        assert_eq!(ClockDivider(0).effective(), 65536);
        assert_eq!(ClockDivider(1).effective(), 65536);
        assert_eq!(ClockDivider(256).effective(), 256);
        assert_eq!(ClockDivider::default(), ClockDivider(1));
    }

    #[test]
    fn test_divider_speed() {
        assert_eq!(ClockDivider(256).speed_hz(DEFAULT_CORE_CLOCK_HZ), 976_562);
        assert_eq!(ClockDivider(250).speed_hz(DEFAULT_CORE_CLOCK_HZ), 1_000_000);
        assert_eq!(ClockDivider(250).half_period_ns(DEFAULT_CORE_CLOCK_HZ), 500);
        // Never rounds down to 0 Hz
        assert_eq!(ClockDivider(2).speed_hz(1), 1);
    }

    #[test]
    fn test_configuration_framing() {
        let cfg = BusConfig::configuration(ChipSelect::Cs1, ClockDivider(64));
        assert_eq!(cfg.bit_order, BitOrder::MsbFirst);
        assert_eq!(cfg.clock_mode, ClockMode::Mode2);
        assert!(cfg.clock_mode.cpol());
        assert!(!cfg.clock_mode.cpha());
        assert_eq!(cfg.cs_polarity, CsPolarity::ActiveLow);
        assert_eq!(cfg.chip_select.index(), 1);
    }
}
