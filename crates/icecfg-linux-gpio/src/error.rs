//! Error types for Linux GPIO operations

use icecfg_core::error::Error as CoreError;
use thiserror::Error;

/// Linux GPIO specific errors
#[derive(Debug, Error)]
pub enum LinuxGpioError {
    /// Failed to request GPIO lines
    #[error("Failed to request GPIO lines on '{path}': {source}")]
    LineRequestFailed {
        path: String,
        #[source]
        source: gpiocdev::Error,
    },

    /// Failed to set GPIO line value
    #[error("Failed to set GPIO{line}: {source}")]
    SetValueFailed {
        line: u32,
        #[source]
        source: gpiocdev::Error,
    },

    /// Failed to get GPIO line value
    #[error("Failed to get GPIO{line}: {source}")]
    GetValueFailed {
        line: u32,
        #[source]
        source: gpiocdev::Error,
    },

    /// Failed to reconfigure GPIO lines
    #[error("Failed to reconfigure GPIO lines: {0}")]
    ReconfigureFailed(#[source] gpiocdev::Error),

    /// Line was not part of the request
    #[error("GPIO{0} is not managed by this port")]
    UnknownLine(u32),

    /// GPIO chip not specified
    #[error("No GPIO chip specified")]
    NoDevice,
}

impl From<LinuxGpioError> for CoreError {
    fn from(e: LinuxGpioError) -> Self {
        match e {
            LinuxGpioError::LineRequestFailed { .. } | LinuxGpioError::NoDevice => {
                CoreError::PortInitFailed
            }
            _ => CoreError::PinIoFailed,
        }
    }
}

/// Result type for Linux GPIO operations
pub type Result<T> = std::result::Result<T, LinuxGpioError>;
