//! Hardware access port traits
//!
//! The configuration protocol never touches hardware directly. It drives
//! GPIO lines through [`PinControl`] and streams the bitstream through
//! [`SpiBus`]. A port implementing both is a [`HardwarePort`].

pub mod bitbang;

use core::fmt;
use core::ops::{Deref, DerefMut};

use crate::error::Result;
use crate::spi::BusConfig;

pub use bitbang::BitbangSpi;

/// GPIO line offset on the GPIO chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pin(pub u32);

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO{}", self.0)
    }
}

/// Logic level of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Logic low
    Low,
    /// Logic high
    High,
}

impl Level {
    /// `true` for [`Level::High`]
    pub fn is_high(self) -> bool {
        self == Self::High
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Self::High
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Line direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Line is sampled
    Input,
    /// Line is driven
    Output,
}

/// Discrete control line access
pub trait PinControl {
    /// Configure the direction of a line
    fn set_direction(&mut self, pin: Pin, direction: Direction) -> Result<()>;

    /// Drive an output line
    fn write(&mut self, pin: Pin, level: Level) -> Result<()>;

    /// Sample a line
    fn read(&mut self, pin: Pin) -> Result<Level>;

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);

    /// Delay for the specified number of milliseconds
    fn delay_ms(&mut self, ms: u32) {
        self.delay_us(ms.saturating_mul(1000));
    }
}

/// Write-only synchronous serial bus
pub trait SpiBus {
    /// Take exclusive use of the bus
    fn acquire(&mut self) -> Result<()>;

    /// Give up the bus
    fn release(&mut self);

    /// Apply bit order, clock mode, divider and chip select
    fn configure(&mut self, config: &BusConfig) -> Result<()>;

    /// Blocking write of the whole buffer; nothing is read back
    fn write(&mut self, data: &[u8]) -> Result<()>;
}

/// A port providing both control lines and the bus
pub trait HardwarePort: PinControl + SpiBus {}

impl<T: PinControl + SpiBus + ?Sized> HardwarePort for T {}

/// Port built from independent pin and bus implementations
///
/// Used when the control lines and the SPI controller live behind different
/// kernel interfaces (GPIO character device + spidev).
pub struct SplitPort<P, B> {
    pins: P,
    bus: B,
}

impl<P: PinControl, B: SpiBus> SplitPort<P, B> {
    /// Combine a pin implementation with a bus implementation
    pub fn new(pins: P, bus: B) -> Self {
        Self { pins, bus }
    }
}

impl<P: PinControl, B> PinControl for SplitPort<P, B> {
    fn set_direction(&mut self, pin: Pin, direction: Direction) -> Result<()> {
        self.pins.set_direction(pin, direction)
    }

    fn write(&mut self, pin: Pin, level: Level) -> Result<()> {
        self.pins.write(pin, level)
    }

    fn read(&mut self, pin: Pin) -> Result<Level> {
        self.pins.read(pin)
    }

    fn delay_us(&mut self, us: u32) {
        self.pins.delay_us(us)
    }

    fn delay_ms(&mut self, ms: u32) {
        self.pins.delay_ms(ms)
    }
}

impl<P, B: SpiBus> SpiBus for SplitPort<P, B> {
    fn acquire(&mut self) -> Result<()> {
        self.bus.acquire()
    }

    fn release(&mut self) {
        self.bus.release()
    }

    fn configure(&mut self, config: &BusConfig) -> Result<()> {
        self.bus.configure(config)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.bus.write(data)
    }
}

/// Exclusive bus ownership, released when dropped
pub struct BusGuard<'a, B: SpiBus + ?Sized> {
    bus: &'a mut B,
}

impl<'a, B: SpiBus + ?Sized> BusGuard<'a, B> {
    /// Acquire the bus
    pub fn acquire(bus: &'a mut B) -> Result<Self> {
        bus.acquire()?;
        Ok(Self { bus })
    }
}

impl<B: SpiBus + ?Sized> Deref for BusGuard<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        self.bus
    }
}

impl<B: SpiBus + ?Sized> DerefMut for BusGuard<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        self.bus
    }
}

impl<B: SpiBus + ?Sized> Drop for BusGuard<'_, B> {
    fn drop(&mut self) {
        self.bus.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::spi::{ChipSelect, ClockDivider};

    #[derive(Default)]
    struct CountingBus {
        acquired: bool,
        releases: u32,
        fail_acquire: bool,
    }

    impl SpiBus for CountingBus {
        fn acquire(&mut self) -> Result<()> {
            if self.fail_acquire {
                return Err(Error::BusInitFailed);
            }
            self.acquired = true;
            Ok(())
        }

        fn release(&mut self) {
            self.acquired = false;
            self.releases += 1;
        }

        fn configure(&mut self, _config: &BusConfig) -> Result<()> {
            Ok(())
        }

        fn write(&mut self, _data: &[u8]) -> Result<()> {
            if self.acquired {
                Ok(())
            } else {
                Err(Error::BusNotAcquired)
            }
        }
    }

    #[test]
    fn test_guard_releases_on_error_path() {
        let mut bus = CountingBus::default();
        let result: Result<()> = (|| {
            let mut guard = BusGuard::acquire(&mut bus)?;
            guard.configure(&BusConfig::configuration(
                ChipSelect::Cs0,
                ClockDivider::default(),
            ))?;
            guard.write(&[0u8; 4])?;
            Err(Error::SpiTransferFailed)
        })();
        assert_eq!(result, Err(Error::SpiTransferFailed));
        assert!(!bus.acquired);
        assert_eq!(bus.releases, 1);
    }

    #[test]
    fn test_guard_not_released_when_acquire_fails() {
        let mut bus = CountingBus {
            fail_acquire: true,
            ..Default::default()
        };
        assert!(matches!(
            BusGuard::acquire(&mut bus),
            Err(Error::BusInitFailed)
        ));
        assert_eq!(bus.releases, 0);
    }

    #[test]
    fn test_level_from_bool() {
        assert_eq!(Level::from(true), Level::High);
        assert_eq!(Level::from(false), Level::Low);
        assert!(Level::High.is_high());
    }
}
