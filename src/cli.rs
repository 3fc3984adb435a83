//! CLI argument parsing

use crate::ports;
use clap::Parser;
use icecfg_core::spi::{ClockDivider, SpiMode};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u16
fn parse_hex_u16(s: &str) -> Result<u16, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u16>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a clock divider (0 and 1 both mean the slowest clock)
fn parse_divider(s: &str) -> Result<ClockDivider, String> {
    parse_hex_u16(s).map(ClockDivider)
}

/// Generate dynamic help text for the port argument
fn port_help() -> String {
    format!(
        "Hardware port to use [available: {}]",
        ports::port_names_short()
    )
}

/// Parse a bus transfer mode
fn parse_mode(s: &str) -> Result<SpiMode, String> {
    match s {
        "native" | "spi" => Ok(SpiMode::Native),
        "bitbang" | "bb" => Ok(SpiMode::Bitbang),
        _ => Err(format!("Invalid mode '{}' (expected native or bitbang)", s)),
    }
}

#[derive(Parser, Debug)]
#[command(name = "icecfg")]
#[command(author, version, about = "iCE40 FPGA SPI configuration tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Configure the FPGA in slot A
    #[arg(short = 'a', long)]
    pub slot_a: bool,

    /// Configure the FPGA in slot B
    #[arg(short = 'b', long)]
    pub slot_b: bool,

    /// Send the bitstream to the configuration flash
    #[arg(short = 'f', long)]
    pub flash: bool,

    /// Bus transfer mode [native, bitbang]
    #[arg(short, long, value_parser = parse_mode, default_value = "native")]
    pub mode: SpiMode,

    /// SPI clock divider of the 250 MHz core clock (0 or 1 = 65536)
    #[arg(short, long, value_parser = parse_divider, default_value = "1")]
    pub speed: ClockDivider,

    #[arg(short, long, default_value = "linux", help = port_help(), long_help = ports::port_help())]
    pub port: String,

    /// GPIO chip device path or number
    #[arg(long, default_value = "/dev/gpiochip0")]
    pub gpiochip: String,

    /// SPI bus number (the X in /dev/spidevX.Y)
    #[arg(long, default_value_t = 0)]
    pub spi_bus: u8,

    /// Board wiring: multiplexed, single, or a TOML board file
    #[arg(long, default_value = "multiplexed")]
    pub board: String,

    /// Maximum number of CDONE samples per wait
    #[arg(long)]
    pub poll_bound: Option<u32>,

    /// Delay between CDONE samples in microseconds
    #[arg(long)]
    pub poll_delay_us: Option<u32>,

    /// Bitstream file
    pub file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["icecfg", "-a", "top.bin"]).unwrap();
        assert!(cli.slot_a && !cli.slot_b && !cli.flash);
        assert_eq!(cli.mode, SpiMode::Native);
        assert_eq!(cli.speed, ClockDivider(1));
        assert_eq!(cli.port, "linux");
        assert_eq!(cli.board, "multiplexed");
        assert_eq!(cli.file, Some(PathBuf::from("top.bin")));
    }

    #[test]
    fn test_mode_and_speed() {
        let cli = Cli::try_parse_from(["icecfg", "-b", "-m", "bitbang", "-s", "0x40", "x.bin"])
            .unwrap();
        assert_eq!(cli.mode, SpiMode::Bitbang);
        assert_eq!(cli.speed, ClockDivider(64));

        assert!(Cli::try_parse_from(["icecfg", "-m", "quad", "x.bin"]).is_err());
        assert!(Cli::try_parse_from(["icecfg", "-s", "70000", "x.bin"]).is_err());
    }

    #[test]
    fn test_port_help_names_ports() {
        let help = port_help();
        assert!(help.starts_with("Hardware port to use [available: "));
        #[cfg(feature = "dummy")]
        assert!(help.contains("dummy"));
    }

    #[test]
    fn test_unknown_flag_is_an_error() {
        let err = Cli::try_parse_from(["icecfg", "--bogus"]).unwrap_err();
        assert!(err.use_stderr());
    }

    #[test]
    fn test_help_is_not_an_error_output() {
        let err = Cli::try_parse_from(["icecfg", "--help"]).unwrap_err();
        assert!(!err.use_stderr());
    }

    #[test]
    fn test_file_is_optional_for_parsing() {
        let cli = Cli::try_parse_from(["icecfg", "-f"]).unwrap();
        assert!(cli.flash);
        assert!(cli.file.is_none());
    }
}
