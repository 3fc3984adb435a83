//! icecfg - iCE40 FPGA SPI configuration tool
//!
//! Loads a bitstream into one of the iCE40 FPGAs of a board (or into the
//! configuration flash they share a bus with) using SPI peripheral-mode
//! configuration.
//!
//! # Architecture
//!
//! The configuration sequence lives in `icecfg-core` and runs against any
//! `HardwarePort`:
//! - **linux** - control lines over the GPIO character device, bitstream
//!   over spidev (`--mode native`) or bit-banged on GPIO (`--mode bitbang`)
//! - **dummy** - emulated board, nothing is driven

mod cli;
mod error;
mod ports;

use clap::Parser;
use cli::Cli;
use error::CliError;
use icecfg_core::bitstream::Bitstream;
use icecfg_core::board::Board;
use icecfg_core::protocol;
use icecfg_core::target::{self, Target};
use ports::PortOptions;
use std::path::Path;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version are not failures
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    // Initialize logger, RUST_LOG overrides the level picked by -v
    env_logger::Builder::new()
        .filter_level(log_level(cli.verbose))
        .parse_env(env_logger::Env::default())
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

/// Log level for a `-v` count
fn log_level(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let target = Target::from_flags(cli.slot_a, cli.slot_b, cli.flash)?;
    let file = cli.file.as_deref().ok_or(CliError::NoFile)?;

    let board = load_board(cli)?;
    // Reject the selection before any hardware is opened
    target::resolve(&board, target)?;

    let bitstream = load_bitstream(file)?;
    log::info!("bitmap size: {}", bitstream.image_len());

    let options = PortOptions {
        name: cli.port.clone(),
        mode: cli.mode,
        gpiochip: cli.gpiochip.clone(),
        spi_bus: cli.spi_bus,
    };

    let report = ports::with_port(&options, &board, |port| {
        protocol::configure(port, &board, target, cli.speed, &bitstream)
    })?;

    log::debug!(
        "Sent {} bytes, CDONE high after {} polls",
        report.bytes_sent,
        report.done_high_polls
    );
    Ok(())
}

/// Resolve `--board` and apply the poll overrides
fn load_board(cli: &Cli) -> Result<Board, CliError> {
    let mut board = match Board::profile(&cli.board) {
        Some(board) => board,
        None => {
            let path = Path::new(&cli.board);
            if path.extension().is_some_and(|ext| ext == "toml") || path.is_file() {
                let board = Board::from_toml_file(path)?;
                log::info!("Loaded board from {:?}", path);
                board
            } else {
                return Err(CliError::UnknownBoard(cli.board.clone()));
            }
        }
    };

    if let Some(bound) = cli.poll_bound {
        board.poll.bound = bound;
    }
    if let Some(delay) = cli.poll_delay_us {
        board.poll.delay_us = delay;
    }
    if board.poll.bound == 0 {
        log::warn!("CDONE poll bound is 0, every wait will time out");
    }

    Ok(board)
}

/// Read a bitstream file and pad it
fn load_bitstream(path: &Path) -> Result<Bitstream, CliError> {
    let image = std::fs::read(path).map_err(|source| CliError::FileOpen {
        path: path.display().to_string(),
        source,
    })?;
    if image.is_empty() {
        log::warn!("{} is empty, only padding will be sent", path.display());
    }
    Ok(Bitstream::from_vec(image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use icecfg_core::bitstream::DUMMY_PAD;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("icecfg").chain(args.iter().copied())).unwrap()
    }

    fn temp_file(name: &str, content: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("icecfg-{}-{}", std::process::id(), name));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(log_level(parse(&["x.bin"]).verbose), log::LevelFilter::Info);
        assert_eq!(log_level(parse(&["-v", "x.bin"]).verbose), log::LevelFilter::Debug);
        assert_eq!(log_level(parse(&["-vv", "x.bin"]).verbose), log::LevelFilter::Trace);
        assert_eq!(log_level(parse(&["-vvv", "x.bin"]).verbose), log::LevelFilter::Trace);
    }

    #[test]
    fn test_multiple_targets() {
        let cli = parse(&["-a", "-b", "x.bin"]);
        let err = run(&cli).unwrap_err();
        assert_eq!(err.to_string(), "can only set one target");
    }

    #[test]
    fn test_no_file() {
        let cli = parse(&["-a"]);
        let err = run(&cli).unwrap_err();
        assert!(matches!(err, CliError::NoFile));
        assert_eq!(err.to_string(), "no file given");
    }

    #[test]
    fn test_no_target_on_multiplexed_board() {
        let cli = parse(&["-p", "dummy", "x.bin"]);
        let err = run(&cli).unwrap_err();
        assert_eq!(err.to_string(), "no target selected");
    }

    #[test]
    fn test_missing_file() {
        let cli = parse(&["-a", "-p", "dummy", "/nonexistent/icecfg/top.bin"]);
        let err = run(&cli).unwrap_err();
        assert!(matches!(err, CliError::FileOpen { .. }));
        assert!(err.to_string().starts_with("failed to open /nonexistent/icecfg/top.bin"));
    }

    #[test]
    fn test_load_bitstream_pads() {
        let path = temp_file("pad.bin", &[0x7E; 100]);
        let bs = load_bitstream(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(bs.image_len(), 100);
        assert_eq!(bs.len(), 100 + DUMMY_PAD);
    }

    #[test]
    fn test_board_selection() {
        let board = load_board(&parse(&["--board", "single", "x.bin"])).unwrap();
        assert!(!board.is_multiplexed());

        let board = load_board(&parse(&["--poll-bound", "7", "--poll-delay-us", "3", "x.bin"]))
            .unwrap();
        assert!(board.is_multiplexed());
        assert_eq!(board.poll.bound, 7);
        assert_eq!(board.poll.delay_us, 3);

        let err = load_board(&parse(&["--board", "quad", "x.bin"])).unwrap_err();
        assert!(matches!(err, CliError::UnknownBoard(_)));
    }

    #[test]
    fn test_board_file() {
        let path = temp_file(
            "board.toml",
            b"[slot_a]\nss = 8\ncreset = 17\ncdone = 4\n\n[bitbang]\nsck = 11\nmosi = 10\n",
        );
        let cli = parse(&["--board", path.to_str().unwrap(), "x.bin"]);
        let board = load_board(&cli);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(board.unwrap().slot_a.ss.0, 8);
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_dummy_run() {
        let path = temp_file("run.bin", &[0xFF; 32]);
        let cli = parse(&["-b", "-p", "dummy", path.to_str().unwrap()]);
        let result = run(&cli);
        std::fs::remove_file(&path).unwrap();
        result.unwrap();
    }
}
