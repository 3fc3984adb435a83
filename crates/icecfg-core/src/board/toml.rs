//! TOML board file parsing
//!
//! Parses board files in TOML format. Sections that are left out fall back
//! to the multiplexed profile, except `slot_b` and `shared` which are simply
//! absent:
//!
//! ```toml
//! core_clock_hz = 250000000
//!
//! [slot_a]
//! ss = 25
//! creset = 17
//! cdone = 4
//!
//! [slot_b]
//! ss = 5
//! creset = 27
//! cdone = 22
//!
//! [shared]
//! flash_power = 23
//! spi_mux = 0x18
//!
//! [bitbang]
//! sck = 11
//! mosi = 10
//! ce0 = 8
//!
//! [poll]
//! bound = 100
//! delay_us = 10
//! ```

use std::fs;
use std::path::Path;
use std::string::{String, ToString};

use thiserror::Error;

use super::{BitbangLines, Board, PollConfig, SharedLines, SlotPins};
use crate::error::Error as CoreError;
use crate::port::Pin;

/// Errors from loading a board file
#[derive(Debug, Error)]
pub enum BoardFileError {
    /// File could not be read
    #[error("failed to read board file {path}: {source}")]
    Io {
        /// Path of the board file
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File is not a valid board description
    #[error("failed to parse board file: {0}")]
    Parse(#[from] ::toml::de::Error),

    /// Board description failed validation
    #[error("{0}")]
    Invalid(#[from] CoreError),
}

/// TOML board file structure
#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlBoard {
    #[serde(default, deserialize_with = "deserialize_opt_hex_u32")]
    core_clock_hz: Option<u32>,
    slot_a: Option<TomlSlot>,
    slot_b: Option<TomlSlot>,
    shared: Option<TomlShared>,
    bitbang: Option<TomlBitbang>,
    poll: Option<TomlPoll>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlSlot {
    #[serde(deserialize_with = "deserialize_hex_u32")]
    ss: u32,
    #[serde(deserialize_with = "deserialize_hex_u32")]
    creset: u32,
    #[serde(deserialize_with = "deserialize_hex_u32")]
    cdone: u32,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlShared {
    #[serde(deserialize_with = "deserialize_hex_u32")]
    flash_power: u32,
    #[serde(deserialize_with = "deserialize_hex_u32")]
    spi_mux: u32,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlBitbang {
    #[serde(deserialize_with = "deserialize_hex_u32")]
    sck: u32,
    #[serde(deserialize_with = "deserialize_hex_u32")]
    mosi: u32,
    #[serde(default, deserialize_with = "deserialize_opt_hex_u32")]
    ce0: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_hex_u32")]
    ce1: Option<u32>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlPoll {
    bound: Option<u32>,
    delay_us: Option<u32>,
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum HexOrInt {
    Int(u32),
    Str(String),
}

impl HexOrInt {
    fn into_u32(self) -> Result<u32, String> {
        match self {
            HexOrInt::Int(n) => Ok(n),
            HexOrInt::Str(s) => parse_number(&s),
        }
    }
}

/// Deserialize a u32 that can be hex (0x...) or decimal
fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    HexOrInt::deserialize(deserializer)?
        .into_u32()
        .map_err(serde::de::Error::custom)
}

fn deserialize_opt_hex_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    match Option::<HexOrInt>::deserialize(deserializer)? {
        Some(v) => v.into_u32().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Parse a number that can be hex (0x...) or decimal
fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| std::format!("invalid hex value '{}': {}", s, e))
    } else {
        s.parse::<u32>()
            .map_err(|e| std::format!("invalid number '{}': {}", s, e))
    }
}

impl From<TomlSlot> for SlotPins {
    fn from(slot: TomlSlot) -> Self {
        Self {
            ss: Pin(slot.ss),
            creset: Pin(slot.creset),
            cdone: Pin(slot.cdone),
        }
    }
}

impl Board {
    /// Load a board description from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, BoardFileError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| BoardFileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse a board description from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, BoardFileError> {
        let file: TomlBoard = ::toml::from_str(content)?;
        let defaults = Board::multiplexed();

        let board = Board {
            slot_a: file.slot_a.map(SlotPins::from).unwrap_or(defaults.slot_a),
            slot_b: file.slot_b.map(SlotPins::from),
            shared: file.shared.map(|s| SharedLines {
                flash_power: Pin(s.flash_power),
                spi_mux: Pin(s.spi_mux),
            }),
            bitbang: file
                .bitbang
                .map(|b| BitbangLines {
                    sck: Pin(b.sck),
                    mosi: Pin(b.mosi),
                    ce0: b.ce0.map(Pin),
                    ce1: b.ce1.map(Pin),
                })
                .unwrap_or(defaults.bitbang),
            core_clock_hz: file.core_clock_hz.unwrap_or(defaults.core_clock_hz),
            poll: file
                .poll
                .map(|p| PollConfig {
                    bound: p.bound.unwrap_or(defaults.poll.bound),
                    delay_us: p.delay_us.unwrap_or(defaults.poll.delay_us),
                })
                .unwrap_or(defaults.poll),
        };

        board.validate()?;
        log::debug!("Parsed board file ({} control lines)", board.control_lines().len());
        Ok(board)
    }
}
