//! icecfg-core - Core protocol for configuring iCE40 FPGAs over SPI
//!
//! This crate implements the SPI peripheral-mode configuration handshake for
//! one or two iCE40 FPGAs (and a flash device) sharing a single SPI bus. It
//! is designed to be `no_std` compatible; hardware access goes through the
//! traits in [`port`].
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`, board files)
//! - `alloc` - Enable heap allocation for the padded bitstream buffer
//!
//! # Example
//!
//! ```ignore
//! use icecfg_core::bitstream::Bitstream;
//! use icecfg_core::port::HardwarePort;
//! use icecfg_core::{board::Board, protocol, spi::ClockDivider, target::Target};
//!
//! fn load<P: HardwarePort>(port: &mut P, image: &[u8]) -> icecfg_core::Result<()> {
//!     let board = Board::multiplexed();
//!     let bitstream = Bitstream::from_image(image);
//!     protocol::configure(port, &board, Some(Target::SlotA), ClockDivider(2), &bitstream)?;
//!     Ok(())
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

#[cfg(feature = "alloc")]
pub mod bitstream;
pub mod board;
pub mod error;
pub mod port;
#[cfg(feature = "alloc")]
pub mod protocol;
pub mod spi;
pub mod target;

pub use error::{Error, ErrorKind, Result};
