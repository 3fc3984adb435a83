//! Command-line error type

use icecfg_core::board::BoardFileError;
use thiserror::Error;

/// Errors reported by the command-line tool
///
/// Every variant ends the process with exit status 1.
#[derive(Debug, Error)]
pub enum CliError {
    /// No bitstream file on the command line
    #[error("no file given")]
    NoFile,

    /// Bitstream file could not be read
    #[error("failed to open {path}: {source}")]
    FileOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Port name not known or not compiled in
    #[error("Unknown port: {name} [available: {available}]")]
    UnknownPort { name: String, available: String },

    /// Port/mode combination not compiled in
    #[error("{0}")]
    Unsupported(String),

    /// Board is neither a profile nor a board file
    #[error("Unknown board '{0}' (expected multiplexed, single or a .toml file)")]
    UnknownBoard(String),

    /// Board file could not be loaded
    #[error(transparent)]
    BoardFile(#[from] BoardFileError),

    /// GPIO access could not be set up
    #[error("failed to init: {0}")]
    PortInit(String),

    /// SPI controller could not be set up
    #[error("SPI failed to init: {0}")]
    BusInit(String),

    /// Target selection or configuration failure
    #[error(transparent)]
    Config(#[from] icecfg_core::Error),
}
