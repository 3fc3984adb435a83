//! icecfg-linux-gpio - Linux GPIO port for iCE40 configuration
//!
//! This crate drives the control lines of an iCE40 board (SPI_SS_B,
//! CRESET_B, CDONE, flash power and SPI mux) through the Linux GPIO
//! character device interface (gpiocdev). It can also bit-bang the
//! configuration bus on SCK/MOSI when no hardware SPI controller is used.
//!
//! # Example
//!
//! ```no_run
//! use icecfg_core::board::Board;
//! use icecfg_core::spi::SpiMode;
//! use icecfg_linux_gpio::{LinuxGpioConfig, LinuxGpioPort};
//!
//! let board = Board::multiplexed();
//! let config = LinuxGpioConfig::from_board("/dev/gpiochip0", &board, SpiMode::Bitbang);
//! let port = LinuxGpioPort::open(&config)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel 4.8+ with GPIO character device support (kernel 5.5+ for v2 API)
//! - Access to `/dev/gpiochipN` devices (may require root or udev rules)
//! - In native bus mode the hardware chip-select lines belong to spidev and
//!   must not be part of the board's control lines

pub mod device;
pub mod error;

// Re-exports
pub use device::{chip_path, LinuxGpioConfig, LinuxGpioPort, DEFAULT_DEVICE};
pub use error::{LinuxGpioError, Result};
