//! Hardware port registration and dispatch
//!
//! This module provides a centralized registry for all hardware ports, with
//! support for feature-gated inclusion and dynamic help text generation.

use crate::error::CliError;
use icecfg_core::board::Board;
use icecfg_core::port::HardwarePort;
use icecfg_core::spi::SpiMode;

/// Information about a port
pub struct PortInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available ports (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_ports() -> Vec<PortInfo> {
    let mut ports = Vec::new();

    #[cfg(feature = "linux-gpio")]
    ports.push(PortInfo {
        name: "linux",
        aliases: &["rpi", "gpiochip"],
        description: "GPIO character device lines, spidev (native) or bit-banged bus",
    });

    #[cfg(feature = "dummy")]
    ports.push(PortInfo {
        name: "dummy",
        aliases: &[],
        description: "Emulated board for testing",
    });

    ports
}

/// Generate help text listing all available ports
pub fn port_help() -> String {
    let ports = available_ports();

    if ports.is_empty() {
        return "No ports available (recompile with port features enabled)".to_string();
    }

    let mut help = String::from("Hardware port to use. Available ports:\n");
    for p in &ports {
        let aliases = if p.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", p.aliases.join(", "))
        };
        help.push_str(&format!("  {:8} - {}{}\n", p.name, p.description, aliases));
    }

    help
}

/// Generate a short list of port names for CLI help
pub fn port_names_short() -> String {
    let ports = available_ports();
    let names: Vec<&str> = ports.iter().map(|p| p.name).collect();
    names.join(", ")
}

/// Map a port name or alias to its primary name
pub fn find_port(name: &str) -> Option<&'static str> {
    available_ports()
        .into_iter()
        .find(|p| p.name == name || p.aliases.contains(&name))
        .map(|p| p.name)
}

/// Everything needed to open a port
#[derive(Debug, Clone)]
pub struct PortOptions {
    /// Port name
    pub name: String,
    /// Bus transfer mode
    pub mode: SpiMode,
    /// GPIO chip path or number
    pub gpiochip: String,
    /// spidev bus number
    pub spi_bus: u8,
}

/// Execute a function with the specified port opened for `board`
#[allow(unused_variables)]
pub fn with_port<T, F>(options: &PortOptions, board: &Board, f: F) -> Result<T, CliError>
where
    F: FnOnce(&mut dyn HardwarePort) -> icecfg_core::Result<T>,
{
    let canonical_name = find_port(&options.name).ok_or_else(|| CliError::UnknownPort {
        name: options.name.clone(),
        available: port_names_short(),
    })?;

    // Dispatch to the appropriate port
    match canonical_name {
        #[cfg(feature = "dummy")]
        "dummy" => {
            log::warn!("Using the emulated board, no hardware is driven");
            let mut port = icecfg_dummy::DummyPort::new_default();
            Ok(f(&mut port)?)
        }

        #[cfg(feature = "linux-gpio")]
        "linux" => {
            use icecfg_linux_gpio::{chip_path, LinuxGpioConfig, LinuxGpioPort};

            let device = chip_path(&options.gpiochip);
            log::info!("Opening {} ({} bus)...", device, options.mode);

            let config = LinuxGpioConfig::from_board(device, board, options.mode);
            let gpio = LinuxGpioPort::open(&config)
                .map_err(|e| CliError::PortInit(e.to_string()))?;

            match options.mode {
                SpiMode::Bitbang => {
                    let mut port = gpio;
                    Ok(f(&mut port)?)
                }
                SpiMode::Native => open_native(gpio, options, board, f),
            }
        }

        _ => Err(CliError::UnknownPort {
            name: options.name.clone(),
            available: port_names_short(),
        }),
    }
}

/// GPIO lines plus the spidev bus
#[cfg(all(feature = "linux-gpio", feature = "linux-spi"))]
fn open_native<T, F>(
    gpio: icecfg_linux_gpio::LinuxGpioPort,
    options: &PortOptions,
    board: &Board,
    f: F,
) -> Result<T, CliError>
where
    F: FnOnce(&mut dyn HardwarePort) -> icecfg_core::Result<T>,
{
    use icecfg_core::port::SplitPort;
    use icecfg_linux_spi::{LinuxSpiBus, LinuxSpiConfig};

    let config = LinuxSpiConfig::new(options.spi_bus).with_core_clock(board.core_clock_hz);
    let bus = LinuxSpiBus::open(&config).map_err(|e| CliError::BusInit(e.to_string()))?;

    let mut port = SplitPort::new(gpio, bus);
    Ok(f(&mut port)?)
}

#[cfg(all(feature = "linux-gpio", not(feature = "linux-spi")))]
fn open_native<T, F>(
    _gpio: icecfg_linux_gpio::LinuxGpioPort,
    _options: &PortOptions,
    _board: &Board,
    _f: F,
) -> Result<T, CliError>
where
    F: FnOnce(&mut dyn HardwarePort) -> icecfg_core::Result<T>,
{
    Err(CliError::Unsupported(
        "native mode requires the linux-spi feature, use --mode bitbang".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_port() {
        assert_eq!(find_port("nope"), None);
        #[cfg(feature = "dummy")]
        assert_eq!(find_port("dummy"), Some("dummy"));
        #[cfg(feature = "linux-gpio")]
        assert_eq!(find_port("rpi"), Some("linux"));
    }

    #[test]
    fn test_port_help_lists_descriptions() {
        let help = port_help();
        for p in available_ports() {
            assert!(help.contains(p.name));
            assert!(help.contains(p.description));
        }
        #[cfg(feature = "linux-gpio")]
        assert!(help.contains("aliases: rpi, gpiochip"));
    }

    #[test]
    fn test_unknown_port() {
        let options = PortOptions {
            name: "ch341a".into(),
            mode: SpiMode::Native,
            gpiochip: "0".into(),
            spi_bus: 0,
        };
        let result = with_port(&options, &Board::multiplexed(), |_| Ok(()));
        assert!(matches!(result, Err(CliError::UnknownPort { .. })));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_dummy_port_runs_closure() {
        let options = PortOptions {
            name: "dummy".into(),
            mode: SpiMode::Bitbang,
            gpiochip: "0".into(),
            spi_bus: 0,
        };
        let value = with_port(&options, &Board::multiplexed(), |_| Ok(7)).unwrap();
        assert_eq!(value, 7);
    }
}
