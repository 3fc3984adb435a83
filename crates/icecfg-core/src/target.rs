//! Configuration targets and their resolution to lines
//!
//! Both FPGA slots and the configuration flash hang off the same SPI bus.
//! [`resolve`] is the single place that decides which lines a run uses and
//! what state the shared flash-power and mux lines must be in, so that the
//! flash is never powered while an FPGA is being configured.

use core::fmt;

use crate::board::Board;
use crate::error::{Error, Result};
use crate::port::{Level, Pin};
use crate::spi::ChipSelect;

/// Device that receives the bitstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// FPGA in slot A
    SlotA,
    /// FPGA in slot B
    SlotB,
    /// Configuration flash (shares slot A's bus path)
    Flash,
}

impl Target {
    /// Build a target selection from independent flags
    ///
    /// Returns `Ok(None)` when no flag is set and
    /// [`Error::MultipleTargets`] when more than one is.
    pub fn from_flags(slot_a: bool, slot_b: bool, flash: bool) -> Result<Option<Self>> {
        let selected = [
            (slot_a, Self::SlotA),
            (slot_b, Self::SlotB),
            (flash, Self::Flash),
        ];
        let mut target = None;
        for (set, candidate) in selected {
            if !set {
                continue;
            }
            if target.is_some() {
                return Err(Error::MultipleTargets);
            }
            target = Some(candidate);
        }
        Ok(target)
    }

    /// Whether the target is an FPGA (and therefore has a CDONE line)
    pub fn is_fpga(self) -> bool {
        !matches!(self, Self::Flash)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SlotA => write!(f, "slot-a"),
            Self::SlotB => write!(f, "slot-b"),
            Self::Flash => write!(f, "flash"),
        }
    }
}

/// Flash power switch state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashPower {
    /// Flash unpowered
    Disabled,
    /// Flash powered
    Enabled,
}

impl FlashPower {
    /// Level to drive on the flash-power-enable line
    pub fn level(self) -> Level {
        match self {
            Self::Disabled => Level::Low,
            Self::Enabled => Level::High,
        }
    }
}

/// SPI mux routing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxRoute {
    /// Bus routed to slot A
    SlotA,
    /// Bus routed to the shared path (slot B and the flash)
    Shared,
}

impl MuxRoute {
    /// Level to drive on the mux select line
    pub fn level(self) -> Level {
        match self {
            Self::SlotA => Level::Low,
            Self::Shared => Level::High,
        }
    }
}

/// Lines a run drives, resolved from the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinBinding {
    /// Controller chip select used for the transfer
    pub chip_select: ChipSelect,
    /// SPI_SS_B of the addressed device
    pub ss: Pin,
    /// CRESET_B of the addressed device
    pub creset: Pin,
    /// CDONE of the addressed device
    pub cdone: Pin,
}

/// Full outcome of target resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    /// The selected target
    pub target: Target,
    /// Lines and chip select of the addressed device
    pub binding: PinBinding,
    /// Required flash power state
    pub flash_power: FlashPower,
    /// Required mux routing
    pub mux: MuxRoute,
}

/// Resolve a target selection against a board
///
/// On boards without shared lines only slot A exists and an empty selection
/// defaults to it.
pub fn resolve(board: &Board, target: Option<Target>) -> Result<Resolved> {
    let target = match (target, board.is_multiplexed()) {
        (Some(target), _) => target,
        (None, false) => Target::SlotA,
        (None, true) => return Err(Error::NoTarget),
    };

    let resolved = match target {
        Target::SlotA => Resolved {
            target,
            binding: PinBinding {
                chip_select: ChipSelect::Cs0,
                ss: board.slot_a.ss,
                creset: board.slot_a.creset,
                cdone: board.slot_a.cdone,
            },
            flash_power: FlashPower::Disabled,
            mux: MuxRoute::SlotA,
        },
        Target::SlotB => {
            let slot = match (board.slot_b, board.shared) {
                (Some(slot), Some(_)) => slot,
                _ => return Err(Error::TargetNotWired(target)),
            };
            Resolved {
                target,
                binding: PinBinding {
                    chip_select: ChipSelect::Cs1,
                    ss: slot.ss,
                    creset: slot.creset,
                    cdone: slot.cdone,
                },
                flash_power: FlashPower::Disabled,
                mux: MuxRoute::Shared,
            }
        }
        Target::Flash => {
            if board.shared.is_none() {
                return Err(Error::TargetNotWired(target));
            }
            Resolved {
                target,
                binding: PinBinding {
                    chip_select: ChipSelect::Cs0,
                    ss: board.slot_a.ss,
                    creset: board.slot_a.creset,
                    cdone: board.slot_a.cdone,
                },
                flash_power: FlashPower::Enabled,
                mux: MuxRoute::Shared,
            }
        }
    };

    log::debug!(
        "Resolved target {} -> {} ss={} creset={} cdone={} flash_power={:?} mux={:?}",
        target,
        resolved.binding.chip_select,
        resolved.binding.ss,
        resolved.binding.creset,
        resolved.binding.cdone,
        resolved.flash_power,
        resolved.mux
    );

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Target; 3] = [Target::SlotA, Target::SlotB, Target::Flash];

    #[test]
    fn test_flash_power_exclusive_with_fpgas() {
        let board = Board::multiplexed();
        for target in ALL {
            let r = resolve(&board, Some(target)).unwrap();
            let flash_on = r.flash_power == FlashPower::Enabled;
            assert_ne!(flash_on, r.target.is_fpga(), "{}", target);
        }
    }

    #[test]
    fn test_slot_bindings() {
        let board = Board::multiplexed();

        let a = resolve(&board, Some(Target::SlotA)).unwrap();
        assert_eq!(a.binding.chip_select, ChipSelect::Cs0);
        assert_eq!(a.binding.cdone, board.slot_a.cdone);
        assert_eq!(a.mux, MuxRoute::SlotA);

        let b = resolve(&board, Some(Target::SlotB)).unwrap();
        let slot_b = board.slot_b.unwrap();
        assert_eq!(b.binding.chip_select, ChipSelect::Cs1);
        assert_eq!(b.binding.ss, slot_b.ss);
        assert_eq!(b.binding.creset, slot_b.creset);
        assert_eq!(b.mux, MuxRoute::Shared);
    }

    #[test]
    fn test_flash_reuses_slot_a_path() {
        let board = Board::multiplexed();
        let a = resolve(&board, Some(Target::SlotA)).unwrap();
        let f = resolve(&board, Some(Target::Flash)).unwrap();
        assert_eq!(f.binding, a.binding);
        assert_eq!(f.flash_power.level(), Level::High);
        assert_eq!(f.mux, MuxRoute::Shared);
        assert_ne!(f.mux.level(), a.mux.level());
    }

    #[test]
    fn test_no_target() {
        assert_eq!(
            resolve(&Board::multiplexed(), None),
            Err(Error::NoTarget)
        );
        // Single-device boards only have one choice
        let r = resolve(&Board::single(), None).unwrap();
        assert_eq!(r.target, Target::SlotA);
    }

    #[test]
    fn test_unwired_targets() {
        let board = Board::single();
        assert_eq!(
            resolve(&board, Some(Target::SlotB)),
            Err(Error::TargetNotWired(Target::SlotB))
        );
        assert_eq!(
            resolve(&board, Some(Target::Flash)),
            Err(Error::TargetNotWired(Target::Flash))
        );
    }

    #[test]
    fn test_from_flags() {
        assert_eq!(Target::from_flags(false, false, false), Ok(None));
        assert_eq!(
            Target::from_flags(false, true, false),
            Ok(Some(Target::SlotB))
        );
        assert_eq!(
            Target::from_flags(true, false, true),
            Err(Error::MultipleTargets)
        );
        assert_eq!(
            Target::from_flags(true, true, true),
            Err(Error::MultipleTargets)
        );
    }
}
