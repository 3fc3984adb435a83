//! icecfg-linux-spi - Linux spidev bus for iCE40 configuration
//!
//! This crate streams iCE40 bitstreams through the hardware SPI controller
//! via the `/dev/spidevX.Y` device interface.
//!
//! # Overview
//!
//! The Linux SPI driver exposes SPI controllers through character devices
//! at `/dev/spidevX.Y` where X is the bus number and Y is the chip select.
//! Only the bus number is configured up front; the chip select comes from
//! the bus configuration of each run.
//!
//! # Example
//!
//! ```no_run
//! use icecfg_linux_spi::{LinuxSpiBus, LinuxSpiConfig};
//!
//! let bus = LinuxSpiBus::open(&LinuxSpiConfig::new(0))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support enabled (`CONFIG_SPI_SPIDEV`)
//! - Read/write access to `/dev/spidevX.Y` device
//! - Bitstreams larger than the spidev buffer (`spidev.bufsiz`, 4096 by
//!   default) are sent as several messages; raise `spidev.bufsiz` to send
//!   them in one

pub mod device;
pub mod error;

// Re-exports
pub use device::{spidev_mode, LinuxSpiBus, LinuxSpiConfig};
pub use error::{LinuxSpiError, Result};
