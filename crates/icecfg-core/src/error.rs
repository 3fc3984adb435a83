//! Error types for icecfg-core
//!
//! This module provides a no_std compatible error type that is shared by the
//! protocol, the target resolver and every hardware port implementation.

use core::fmt;

use crate::target::Target;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Argument errors
    /// No configuration target was selected
    NoTarget,
    /// More than one configuration target was selected
    MultipleTargets,
    /// The board has no wiring for the requested target
    TargetNotWired(Target),
    /// The board description is inconsistent (a line used for two roles)
    InvalidBoard {
        /// GPIO line offset assigned more than once
        line: u32,
    },
    /// The board declares a zero SPI core clock
    InvalidCoreClock,

    // Initialization errors
    /// The hardware access layer could not be initialized
    PortInitFailed,
    /// The SPI bus could not be acquired
    BusInitFailed,

    // Hardware errors
    /// A bus operation was attempted without holding the bus
    BusNotAcquired,
    /// Setting, reading or reconfiguring a GPIO line failed
    PinIoFailed,
    /// Applying the bus configuration failed
    SpiConfigFailed,
    /// SPI transfer failed
    SpiTransferFailed,

    // Protocol errors
    /// CDONE never went low after reset
    DoneLowTimeout,
    /// CDONE never went high after the bitstream was sent
    DoneHighTimeout,
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Access layer or bus could not start
    Initialization,
    /// Invalid selection or board description
    Argument,
    /// A line or bus operation failed mid-run
    Hardware,
    /// Device never signalled readiness for configuration
    DoneLowTimeout,
    /// Device never signalled configuration success
    DoneHighTimeout,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoTarget
            | Self::MultipleTargets
            | Self::TargetNotWired(_)
            | Self::InvalidBoard { .. }
            | Self::InvalidCoreClock => ErrorKind::Argument,
            Self::PortInitFailed | Self::BusInitFailed => ErrorKind::Initialization,
            Self::BusNotAcquired
            | Self::PinIoFailed
            | Self::SpiConfigFailed
            | Self::SpiTransferFailed => ErrorKind::Hardware,
            Self::DoneLowTimeout => ErrorKind::DoneLowTimeout,
            Self::DoneHighTimeout => ErrorKind::DoneHighTimeout,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTarget => write!(f, "no target selected"),
            Self::MultipleTargets => write!(f, "can only set one target"),
            Self::TargetNotWired(target) => {
                write!(f, "target {} is not wired on this board", target)
            }
            Self::InvalidBoard { line } => {
                write!(f, "invalid board: GPIO line {} is assigned twice", line)
            }
            Self::InvalidCoreClock => write!(f, "invalid board: core clock must be non-zero"),
            Self::PortInitFailed => write!(f, "failed to init"),
            Self::BusInitFailed => write!(f, "SPI failed to init"),
            Self::BusNotAcquired => write!(f, "SPI bus used without being acquired"),
            Self::PinIoFailed => write!(f, "GPIO line access failed"),
            Self::SpiConfigFailed => write!(f, "failed to configure SPI bus"),
            Self::SpiTransferFailed => write!(f, "SPI transfer failed"),
            Self::DoneLowTimeout => write!(f, "timeout waiting for CDONE"),
            Self::DoneHighTimeout => {
                write!(f, "Configuration error. Timeout waiting for CDONE")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(Error::MultipleTargets.kind(), ErrorKind::Argument);
        assert_eq!(Error::NoTarget.kind(), ErrorKind::Argument);
        assert_eq!(Error::InvalidCoreClock.kind(), ErrorKind::Argument);
        assert_eq!(Error::PortInitFailed.kind(), ErrorKind::Initialization);
        assert_eq!(Error::BusInitFailed.kind(), ErrorKind::Initialization);
        assert_eq!(Error::SpiTransferFailed.kind(), ErrorKind::Hardware);
        assert_eq!(Error::DoneLowTimeout.kind(), ErrorKind::DoneLowTimeout);
        assert_eq!(Error::DoneHighTimeout.kind(), ErrorKind::DoneHighTimeout);
    }
}
