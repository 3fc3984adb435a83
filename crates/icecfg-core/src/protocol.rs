//! iCE40 SPI peripheral-mode configuration sequence
//!
//! The sequence is strictly linear. Each step runs once, the two CDONE
//! polls are bounded, and any failure aborts the run with the lines left in
//! whatever state they were last driven to:
//!
//! 1. Configure every control line of the board (CDONE as input)
//! 2. Hold every FPGA in reset (CRESET_B low) for 10 ms
//! 3. Drive flash power and mux for the target
//! 4. FPGA targets only: wait for CDONE low
//! 5. SS_B low, 10 ms, CRESET_B high, 200 ms (SPI peripheral mode entry)
//! 6. Acquire and configure the bus, send image + padding, release the bus
//! 7. Wait for CDONE high

use core::fmt;

use crate::bitstream::Bitstream;
use crate::board::{Board, PollConfig};
use crate::error::{Error, Result};
use crate::port::{BusGuard, HardwarePort, Level, Pin, PinControl, SpiBus};
use crate::spi::{BusConfig, ClockDivider};
use crate::target::{self, Resolved, Target};

/// Reset hold time before anything else happens
pub const RESET_SETTLE_MS: u32 = 10;

/// Delay between SS_B low and CRESET_B release
pub const SS_SETUP_MS: u32 = 10;

/// Delay after CRESET_B release (clears configuration memory)
pub const RESET_RELEASE_MS: u32 = 200;

/// Steps of the configuration sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Target resolution and port acquisition
    Init,
    /// Line direction setup
    PinSetup,
    /// All FPGAs held in reset
    AssertReset,
    /// Flash power and mux
    DriveSharedLines,
    /// Waiting for CDONE low
    PrePollDoneLow,
    /// SS_B / CRESET_B sequencing
    EnterPeripheralMode,
    /// Taking the bus
    BusAcquire,
    /// Applying the bus configuration
    ConfigureBus,
    /// Sending the bitstream
    Transfer,
    /// Giving the bus back
    BusRelease,
    /// Waiting for CDONE high
    PostPollDoneHigh,
    /// Done
    Complete,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::PinSetup => "pin setup",
            Self::AssertReset => "assert reset",
            Self::DriveSharedLines => "drive shared lines",
            Self::PrePollDoneLow => "pre-poll CDONE low",
            Self::EnterPeripheralMode => "enter peripheral mode",
            Self::BusAcquire => "bus acquire",
            Self::ConfigureBus => "configure bus",
            Self::Transfer => "transfer",
            Self::BusRelease => "bus release",
            Self::PostPollDoneHigh => "post-poll CDONE high",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Summary of a successful run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    /// Target that was configured
    pub target: Target,
    /// Bytes sent over the bus, padding included
    pub bytes_sent: usize,
    /// CDONE samples until it read low (`None` if the poll was skipped)
    pub done_low_polls: Option<u32>,
    /// CDONE samples until it read high
    pub done_high_polls: u32,
}

/// Everything a step needs: the port, the board and the resolved binding
pub struct HardwareContext<'a, P: HardwarePort + ?Sized> {
    port: &'a mut P,
    board: &'a Board,
    resolved: Resolved,
    state: State,
}

impl<'a, P: HardwarePort + ?Sized> HardwareContext<'a, P> {
    /// Resolve the target and bind it to a port
    ///
    /// Fails before any line is touched if the selection is invalid.
    pub fn new(port: &'a mut P, board: &'a Board, target: Option<Target>) -> Result<Self> {
        board.validate()?;
        let resolved = target::resolve(board, target)?;
        Ok(Self {
            port,
            board,
            resolved,
            state: State::Init,
        })
    }

    /// Resolved binding for this run
    pub fn resolved(&self) -> &Resolved {
        &self.resolved
    }

    /// Step currently executing (or the one that failed)
    pub fn state(&self) -> State {
        self.state
    }

    fn enter(&mut self, state: State) {
        advance(&mut self.state, state);
    }

    fn drive(&mut self, pin: Pin, level: Level) -> Result<()> {
        log::trace!("icecfg: {} <- {}", pin, level);
        PinControl::write(&mut *self.port, pin, level)
    }

    /// Configure every control line of the board
    pub fn pin_setup(&mut self) -> Result<()> {
        self.enter(State::PinSetup);
        for (pin, direction) in self.board.control_lines() {
            self.port.set_direction(pin, direction)?;
        }
        Ok(())
    }

    /// Hold every FPGA on the bus in reset
    pub fn assert_reset(&mut self) -> Result<()> {
        self.enter(State::AssertReset);
        let board = self.board;
        for slot in board.slots() {
            self.drive(slot.creset, Level::Low)?;
        }
        self.port.delay_ms(RESET_SETTLE_MS);
        Ok(())
    }

    /// Drive flash power and mux (no-op on single-device boards)
    pub fn drive_shared_lines(&mut self) -> Result<()> {
        self.enter(State::DriveSharedLines);
        if let Some(shared) = self.board.shared {
            self.drive(shared.flash_power, self.resolved.flash_power.level())?;
            self.drive(shared.spi_mux, self.resolved.mux.level())?;
        }
        Ok(())
    }

    /// Wait for CDONE low; returns the number of samples taken
    pub fn pre_poll_done_low(&mut self) -> Result<u32> {
        self.enter(State::PrePollDoneLow);
        self.poll_done(Level::Low)?.ok_or(Error::DoneLowTimeout)
    }

    /// Select the device, then release it from reset
    pub fn enter_peripheral_mode(&mut self) -> Result<()> {
        self.enter(State::EnterPeripheralMode);
        let binding = self.resolved.binding;
        self.drive(binding.ss, Level::Low)?;
        self.port.delay_ms(SS_SETUP_MS);
        self.drive(binding.creset, Level::High)?;
        self.port.delay_ms(RESET_RELEASE_MS);
        Ok(())
    }

    /// Send the bitstream under exclusive bus ownership
    pub fn transfer(&mut self, divider: ClockDivider, bitstream: &Bitstream) -> Result<usize> {
        self.enter(State::BusAcquire);
        let config = BusConfig::configuration(self.resolved.binding.chip_select, divider);

        let mut bus = BusGuard::acquire(&mut *self.port)?;
        advance(&mut self.state, State::ConfigureBus);
        bus.configure(&config)?;
        advance(&mut self.state, State::Transfer);
        SpiBus::write(&mut *bus, bitstream.as_bytes())?;
        drop(bus);

        self.enter(State::BusRelease);
        Ok(bitstream.len())
    }

    /// Wait for CDONE high; returns the number of samples taken
    pub fn post_poll_done_high(&mut self) -> Result<u32> {
        self.enter(State::PostPollDoneHigh);
        self.poll_done(Level::High)?.ok_or(Error::DoneHighTimeout)
    }

    /// Sample CDONE until it reads `want`, at most `poll.bound` times
    ///
    /// `Ok(None)` means the bound was exhausted.
    fn poll_done(&mut self, want: Level) -> Result<Option<u32>> {
        let PollConfig { bound, delay_us } = self.board.poll;
        let cdone = self.resolved.binding.cdone;
        for i in 0..bound {
            if self.port.read(cdone)? == want {
                log::debug!("icecfg: CDONE {} after {} polls", want, i + 1);
                return Ok(Some(i + 1));
            }
            if delay_us > 0 {
                self.port.delay_us(delay_us);
            }
        }
        log::debug!("icecfg: CDONE not {} after {} polls", want, bound);
        Ok(None)
    }

    /// Run the whole sequence
    pub fn run(&mut self, divider: ClockDivider, bitstream: &Bitstream) -> Result<Report> {
        let target = self.resolved.target;

        self.pin_setup()?;
        self.assert_reset()?;
        self.drive_shared_lines()?;

        let done_low_polls = if target.is_fpga() {
            Some(self.pre_poll_done_low()?)
        } else {
            log::debug!("icecfg: {} has no CDONE, skipping pre-poll", target);
            None
        };

        self.enter_peripheral_mode()?;
        let bytes_sent = self.transfer(divider, bitstream)?;
        let done_high_polls = self.post_poll_done_high()?;

        self.enter(State::Complete);
        Ok(Report {
            target,
            bytes_sent,
            done_low_polls,
            done_high_polls,
        })
    }
}

fn advance(state: &mut State, next: State) {
    log::debug!("icecfg: {} -> {}", state, next);
    *state = next;
}

/// Configure `target` on `board` with `bitstream`
///
/// This is the one-shot entry point: resolve, run every step, report.
pub fn configure<P: HardwarePort + ?Sized>(
    port: &mut P,
    board: &Board,
    target: Option<Target>,
    divider: ClockDivider,
    bitstream: &Bitstream,
) -> Result<Report> {
    let mut ctx = HardwareContext::new(port, board, target)?;

    log::info!(
        "Configuring {} with {} bytes (+{} padding)",
        ctx.resolved().target,
        bitstream.image_len(),
        bitstream.padding().len()
    );

    match ctx.run(divider, bitstream) {
        Ok(report) => {
            log::info!("Configuration of {} complete", report.target);
            Ok(report)
        }
        Err(e) => {
            log::debug!("icecfg: aborted in {} state: {}", ctx.state(), e);
            Err(e)
        }
    }
}
