//! icecfg-dummy - Emulated iCE40 board for testing
//!
//! This crate provides a hardware port that records every line and bus
//! operation in memory and answers CDONE samples from a script. It's useful
//! for testing the configuration sequence without real hardware.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::collections::BTreeMap;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use icecfg_core::error::{Error, Result};
use icecfg_core::port::{Direction, Level, Pin, PinControl, SpiBus};
use icecfg_core::spi::BusConfig;

/// Scripted behaviour of the emulated board
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// CDONE sample (1-based) at which it first reads low before a
    /// transfer, `None` to never go low
    pub done_low_after: Option<u32>,
    /// CDONE sample (1-based) at which it first reads high after a
    /// transfer, `None` to never go high
    pub done_high_after: Option<u32>,
    /// Refuse to hand out the bus
    pub fail_bus_acquire: bool,
    /// Fail every bus write
    pub fail_transfer: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            done_low_after: Some(1),
            done_high_after: Some(1),
            fail_bus_acquire: false,
            fail_transfer: false,
        }
    }
}

/// One recorded port operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Line direction set
    Direction(Pin, Direction),
    /// Output driven
    Write(Pin, Level),
    /// Line sampled, with the level returned
    Read(Pin, Level),
    /// Delay in microseconds
    Delay(u32),
    /// Bus taken
    Acquire,
    /// Bus given back
    Release,
    /// Bus configuration applied
    Configure(BusConfig),
    /// Bytes written to the bus
    Transfer(usize),
}

/// Emulated board port
///
/// Every line configured as an input is treated as a CDONE line. Before the
/// first transfer CDONE reads high until `done_low_after` samples were
/// taken; after a transfer it reads low until `done_high_after` samples
/// were taken.
#[cfg(feature = "alloc")]
pub struct DummyPort {
    config: DummyConfig,
    directions: BTreeMap<Pin, Direction>,
    levels: BTreeMap<Pin, Level>,
    events: Vec<Event>,
    transfers: Vec<Vec<u8>>,
    bus_config: Option<BusConfig>,
    acquired: bool,
    transferred: bool,
    samples: u32,
}

#[cfg(feature = "alloc")]
impl DummyPort {
    /// Create a new emulated board with the given script
    pub fn new(config: DummyConfig) -> Self {
        Self {
            config,
            directions: BTreeMap::new(),
            levels: BTreeMap::new(),
            events: Vec::new(),
            transfers: Vec::new(),
            bus_config: None,
            acquired: false,
            transferred: false,
            samples: 0,
        }
    }

    /// Create an emulated board whose device configures successfully
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Every operation in order
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Data of each bus write
    pub fn transfers(&self) -> &[Vec<u8>] {
        &self.transfers
    }

    /// Last applied bus configuration
    pub fn bus_config(&self) -> Option<&BusConfig> {
        self.bus_config.as_ref()
    }

    /// Level last driven on an output line
    pub fn level(&self, pin: Pin) -> Option<Level> {
        self.levels.get(&pin).copied()
    }

    /// Direction a line was configured with
    pub fn direction(&self, pin: Pin) -> Option<Direction> {
        self.directions.get(&pin).copied()
    }

    /// Whether the bus is currently held
    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    /// Number of samples taken of `pin`
    pub fn reads_of(&self, pin: Pin) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::Read(p, _) if *p == pin))
            .count()
    }

    /// Sum of all delays in microseconds
    pub fn total_delay_us(&self) -> u64 {
        self.events
            .iter()
            .map(|e| match e {
                Event::Delay(us) => *us as u64,
                _ => 0,
            })
            .sum()
    }

    fn sample_done(&mut self) -> Level {
        self.samples = self.samples.saturating_add(1);
        let reached = |after: Option<u32>| after.is_some_and(|n| self.samples >= n);
        if self.transferred {
            Level::from(reached(self.config.done_high_after))
        } else {
            Level::from(!reached(self.config.done_low_after))
        }
    }
}

#[cfg(feature = "alloc")]
impl PinControl for DummyPort {
    fn set_direction(&mut self, pin: Pin, direction: Direction) -> Result<()> {
        self.directions.insert(pin, direction);
        self.events.push(Event::Direction(pin, direction));
        Ok(())
    }

    fn write(&mut self, pin: Pin, level: Level) -> Result<()> {
        // Only lines requested as outputs can be driven
        if self.directions.get(&pin) != Some(&Direction::Output) {
            return Err(Error::PinIoFailed);
        }
        self.levels.insert(pin, level);
        self.events.push(Event::Write(pin, level));
        Ok(())
    }

    fn read(&mut self, pin: Pin) -> Result<Level> {
        let level = match self.directions.get(&pin) {
            Some(Direction::Input) => self.sample_done(),
            Some(Direction::Output) => self.levels.get(&pin).copied().unwrap_or(Level::Low),
            None => return Err(Error::PinIoFailed),
        };
        self.events.push(Event::Read(pin, level));
        Ok(level)
    }

    fn delay_us(&mut self, us: u32) {
        // No real delay needed for an emulated board
        self.events.push(Event::Delay(us));
    }
}

#[cfg(feature = "alloc")]
impl SpiBus for DummyPort {
    fn acquire(&mut self) -> Result<()> {
        if self.config.fail_bus_acquire || self.acquired {
            return Err(Error::BusInitFailed);
        }
        self.acquired = true;
        self.events.push(Event::Acquire);
        Ok(())
    }

    fn release(&mut self) {
        self.acquired = false;
        self.events.push(Event::Release);
    }

    fn configure(&mut self, config: &BusConfig) -> Result<()> {
        if !self.acquired {
            return Err(Error::BusNotAcquired);
        }
        self.bus_config = Some(*config);
        self.events.push(Event::Configure(*config));
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        if !self.acquired {
            return Err(Error::BusNotAcquired);
        }
        if self.config.fail_transfer {
            return Err(Error::SpiTransferFailed);
        }
        log::trace!("dummy: transfer of {} bytes", data.len());
        self.transfers.push(data.to_vec());
        self.events.push(Event::Transfer(data.len()));
        self.transferred = true;
        self.samples = 0;
        Ok(())
    }
}
