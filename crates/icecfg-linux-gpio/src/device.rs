//! Linux GPIO port implementation
//!
//! This module provides the `LinuxGpioPort` struct that implements the
//! `PinControl` trait using Linux's GPIO character device interface
//! (gpiocdev), and optionally an `SpiBus` bit-banged on SCK/MOSI.
//!
//! All lines of the board are requested in a single line request when the
//! port is opened. Control lines start as inputs and are switched to outputs
//! by `set_direction`; bit-bang lines are outputs from the start.

use std::time::Duration;

use crate::error::{LinuxGpioError, Result};

use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

use icecfg_core::board::{BitbangLines, Board};
use icecfg_core::error::{Error as CoreError, Result as CoreResult};
use icecfg_core::port::bitbang::{self, BitbangSpi};
use icecfg_core::port::{Direction, Level, Pin, PinControl, SpiBus};
use icecfg_core::spi::{BusConfig, ChipSelect, CsPolarity, SpiMode};

/// Default GPIO chip on a Raspberry Pi
pub const DEFAULT_DEVICE: &str = "/dev/gpiochip0";

/// Consumer label shown by `gpioinfo`
const CONSUMER: &str = "icecfg";

/// Configuration for opening a Linux GPIO port
#[derive(Debug, Clone)]
pub struct LinuxGpioConfig {
    /// Device path (e.g., "/dev/gpiochip0")
    pub device: String,
    /// Control line offsets
    pub control: Vec<Offset>,
    /// Lines for the bit-banged bus, `None` when the bus is native
    pub bitbang: Option<BitbangLines>,
    /// Core clock the bus divider applies to
    pub core_clock_hz: u32,
}

impl LinuxGpioConfig {
    /// Take the lines a board needs in the given bus mode
    pub fn from_board(device: impl Into<String>, board: &Board, mode: SpiMode) -> Self {
        Self {
            device: device.into(),
            control: board.control_lines().iter().map(|(pin, _)| pin.0).collect(),
            bitbang: (mode == SpiMode::Bitbang).then_some(board.bitbang),
            core_clock_hz: board.core_clock_hz,
        }
    }
}

/// Turn a chip number or path into a device path
///
/// `"0"` becomes `/dev/gpiochip0`, anything else is taken as a path.
pub fn chip_path(name: &str) -> String {
    match name.parse::<u32>() {
        Ok(n) => format!("/dev/gpiochip{}", n),
        Err(_) => name.to_string(),
    }
}

/// State of one requested line
#[derive(Debug, Clone, Copy)]
struct LineState {
    offset: Offset,
    direction: Direction,
    level: Level,
}

fn value(level: Level) -> Value {
    match level {
        Level::High => Value::Active,
        Level::Low => Value::Inactive,
    }
}

/// Linux GPIO port
///
/// Implements `PinControl` for the board's control lines. When opened with
/// bit-bang lines it also implements a write-only `SpiBus`.
pub struct LinuxGpioPort {
    /// GPIO line request handle
    request: Request,
    /// Every requested line
    lines: Vec<LineState>,
    /// Bit-bang lines, if requested
    bitbang: Option<BitbangLines>,
    /// Core clock for divider conversion
    core_clock_hz: u32,
    /// Active bus configuration
    bus_config: Option<BusConfig>,
    /// Half-period delay in nanoseconds
    half_period_ns: u64,
    /// Bus held by the protocol
    acquired: bool,
    /// A bit-bang line write failed during the current transfer
    bitbang_error: bool,
}

impl LinuxGpioPort {
    /// Open a Linux GPIO port with the given configuration
    pub fn open(config: &LinuxGpioConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxGpioError::NoDevice);
        }

        log::debug!("linux_gpio: Opening device {}", config.device);

        let mut lines: Vec<LineState> = config
            .control
            .iter()
            .map(|&offset| LineState {
                offset,
                direction: Direction::Input,
                level: Level::Low,
            })
            .collect();

        if let Some(bb) = &config.bitbang {
            // SCK and MOSI start low, software chip selects deselected
            for offset in [bb.sck.0, bb.mosi.0] {
                lines.push(LineState {
                    offset,
                    direction: Direction::Output,
                    level: Level::Low,
                });
            }
            for ce in [bb.ce0, bb.ce1].into_iter().flatten() {
                lines.push(LineState {
                    offset: ce.0,
                    direction: Direction::Output,
                    level: Level::High,
                });
            }
        }

        let request = Request::from_config(line_config(&lines))
            .on_chip(&config.device)
            .with_consumer(CONSUMER)
            .request()
            .map_err(|source| LinuxGpioError::LineRequestFailed {
                path: config.device.clone(),
                source,
            })?;

        log::info!(
            "linux_gpio: Opened {} ({} lines{})",
            config.device,
            lines.len(),
            match &config.bitbang {
                Some(bb) => format!(", bitbang sck={} mosi={}", bb.sck.0, bb.mosi.0),
                None => String::new(),
            }
        );

        Ok(Self {
            request,
            lines,
            bitbang: config.bitbang,
            core_clock_hz: config.core_clock_hz,
            bus_config: None,
            half_period_ns: 0,
            acquired: false,
            bitbang_error: false,
        })
    }

    fn line_mut(&mut self, pin: Pin) -> Result<&mut LineState> {
        self.lines
            .iter_mut()
            .find(|l| l.offset == pin.0)
            .ok_or(LinuxGpioError::UnknownLine(pin.0))
    }

    fn set_line(&mut self, pin: Pin, level: Level) -> Result<()> {
        self.line_mut(pin)?.level = level;
        self.request
            .set_value(pin.0, value(level))
            .map_err(|source| LinuxGpioError::SetValueFailed { line: pin.0, source })
    }

    fn get_line(&self, pin: Pin) -> Result<Level> {
        match self.request.value(pin.0) {
            Ok(Value::Active) => Ok(Level::High),
            Ok(Value::Inactive) => Ok(Level::Low),
            Err(source) => Err(LinuxGpioError::GetValueFailed { line: pin.0, source }),
        }
    }

    fn reconfigure(&mut self, pin: Pin, direction: Direction) -> Result<()> {
        self.line_mut(pin)?.direction = direction;
        self.request
            .reconfigure(&line_config(&self.lines))
            .map_err(LinuxGpioError::ReconfigureFailed)
    }

    /// Software chip-select line for `cs`, if wired
    fn chip_select_line(&self, cs: ChipSelect) -> Option<Pin> {
        let bb = self.bitbang.as_ref()?;
        match cs {
            ChipSelect::Cs0 => bb.ce0,
            ChipSelect::Cs1 => bb.ce1,
        }
    }

    /// Drive the software chip select of the configured device
    fn select(&mut self, active: bool) -> CoreResult<()> {
        let Some(config) = self.bus_config else {
            return Ok(());
        };
        let Some(pin) = self.chip_select_line(config.chip_select) else {
            return Ok(());
        };
        let high = match config.cs_polarity {
            CsPolarity::ActiveLow => !active,
            CsPolarity::ActiveHigh => active,
        };
        self.set_line(pin, Level::from(high)).map_err(core_err)
    }

    fn bitbang_line(&mut self, pin: Pin, high: bool, name: &str) {
        if let Err(e) = self
            .request
            .set_value(pin.0, if high { Value::Active } else { Value::Inactive })
        {
            log::error!("Failed to set {}: {}", name, e);
            self.bitbang_error = true;
        }
    }
}

/// Build a request configuration covering every line
fn line_config(lines: &[LineState]) -> Config {
    let mut cfg = Config::default();
    for line in lines {
        match line.direction {
            Direction::Output => {
                cfg.with_line(line.offset).as_output(value(line.level));
            }
            Direction::Input => {
                cfg.with_line(line.offset).as_input();
            }
        }
    }
    cfg
}

fn core_err(e: LinuxGpioError) -> CoreError {
    log::error!("linux_gpio: {}", e);
    e.into()
}

impl PinControl for LinuxGpioPort {
    fn set_direction(&mut self, pin: Pin, direction: Direction) -> CoreResult<()> {
        log::trace!("linux_gpio: {} as {:?}", pin, direction);
        self.reconfigure(pin, direction).map_err(core_err)
    }

    fn write(&mut self, pin: Pin, level: Level) -> CoreResult<()> {
        self.set_line(pin, level).map_err(core_err)
    }

    fn read(&mut self, pin: Pin) -> CoreResult<Level> {
        self.get_line(pin).map_err(core_err)
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(Duration::from_micros(us as u64));
    }
}

// Implement BitbangSpi trait
impl BitbangSpi for LinuxGpioPort {
    fn set_sck(&mut self, high: bool) {
        if let Some(bb) = self.bitbang {
            self.bitbang_line(bb.sck, high, "SCK");
        }
    }

    fn set_mosi(&mut self, high: bool) {
        if let Some(bb) = self.bitbang {
            self.bitbang_line(bb.mosi, high, "MOSI");
        }
    }

    fn half_period_delay(&self) {
        if self.half_period_ns > 0 {
            std::thread::sleep(Duration::from_nanos(self.half_period_ns));
        }
    }
}

impl SpiBus for LinuxGpioPort {
    fn acquire(&mut self) -> CoreResult<()> {
        if self.bitbang.is_none() {
            log::error!("linux_gpio: no bit-bang lines requested");
            return Err(CoreError::BusInitFailed);
        }
        if self.acquired {
            return Err(CoreError::BusInitFailed);
        }
        self.acquired = true;
        Ok(())
    }

    fn release(&mut self) {
        if let Err(e) = self.select(false) {
            log::warn!("linux_gpio: failed to deselect on release: {}", e);
        }
        self.acquired = false;
    }

    fn configure(&mut self, config: &BusConfig) -> CoreResult<()> {
        if !self.acquired {
            return Err(CoreError::BusNotAcquired);
        }
        self.bus_config = Some(*config);
        self.half_period_ns = config.divider.half_period_ns(self.core_clock_hz);
        log::debug!(
            "linux_gpio: {} mode {} at {} Hz ({} ns half period)",
            config.chip_select,
            config.clock_mode.bits(),
            config.divider.speed_hz(self.core_clock_hz),
            self.half_period_ns
        );

        self.bitbang_error = false;
        bitbang::idle(self, config.clock_mode);
        self.select(false)?;
        if self.bitbang_error {
            return Err(CoreError::SpiConfigFailed);
        }
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> CoreResult<()> {
        if !self.acquired {
            return Err(CoreError::BusNotAcquired);
        }
        let config = self.bus_config.ok_or(CoreError::SpiConfigFailed)?;

        self.bitbang_error = false;
        self.select(true)?;
        bitbang::write_bytes(self, data, config.clock_mode, config.bit_order);
        bitbang::idle(self, config.clock_mode);
        self.half_period_delay();
        self.select(false)?;

        if self.bitbang_error {
            return Err(CoreError::SpiTransferFailed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chip_path() {
        assert_eq!(chip_path("0"), "/dev/gpiochip0");
        assert_eq!(chip_path("4"), "/dev/gpiochip4");
        assert_eq!(chip_path("/dev/gpiochip1"), "/dev/gpiochip1");
    }

    #[test]
    fn test_config_from_board() {
        let board = Board::multiplexed();

        let native = LinuxGpioConfig::from_board(DEFAULT_DEVICE, &board, SpiMode::Native);
        assert_eq!(native.control, vec![25, 17, 4, 5, 27, 22, 23, 24]);
        assert!(native.bitbang.is_none());

        let bb = LinuxGpioConfig::from_board(DEFAULT_DEVICE, &board, SpiMode::Bitbang);
        let lines = bb.bitbang.unwrap();
        assert_eq!(lines.sck, Pin(11));
        assert_eq!(lines.ce1, Some(Pin(7)));
        assert_eq!(bb.core_clock_hz, board.core_clock_hz);
    }
}
