//! Error types for Linux SPI operations

use icecfg_core::error::Error as CoreError;
use thiserror::Error;

/// Linux SPI specific errors
#[derive(Debug, Error)]
pub enum LinuxSpiError {
    /// No spidev node exists for the bus
    #[error("No spidev device for SPI bus {bus}")]
    BusNotFound { bus: u8 },

    /// Failed to open device
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set SPI mode
    #[error("Failed to set SPI mode to {mode:#04x}: {source}")]
    SetModeFailed {
        mode: u8,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set bit order
    #[error("Failed to set LSB-first to {lsb_first}: {source}")]
    SetBitOrderFailed {
        lsb_first: u8,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set bits per word
    #[error("Failed to set bits per word to {bits}: {source}")]
    SetBitsPerWordFailed {
        bits: u8,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set clock speed
    #[error("Failed to set clock speed to {speed} Hz: {source}")]
    SetSpeedFailed {
        speed: u32,
        #[source]
        source: std::io::Error,
    },

    /// Write attempted before the bus was configured
    #[error("SPI bus is not configured")]
    NotConfigured,

    /// SPI transfer failed
    #[error("SPI transfer failed: {0}")]
    TransferFailed(#[source] std::io::Error),
}

impl From<LinuxSpiError> for CoreError {
    fn from(e: LinuxSpiError) -> Self {
        match e {
            LinuxSpiError::BusNotFound { .. } => CoreError::BusInitFailed,
            LinuxSpiError::TransferFailed(_) => CoreError::SpiTransferFailed,
            _ => CoreError::SpiConfigFailed,
        }
    }
}

/// Result type for Linux SPI operations
pub type Result<T> = std::result::Result<T, LinuxSpiError>;
