//! Linux SPI bus implementation
//!
//! This module provides the `LinuxSpiBus` struct that implements the write-only
//! `SpiBus` trait using Linux's spidev interface. The chip select chosen by
//! the bus configuration selects the device node (`/dev/spidevX.Y`, Y being
//! the chip select), so the node is opened on `configure` and closed again on
//! `release`.

use crate::error::{LinuxSpiError, Result};

use icecfg_core::error::{Error as CoreError, Result as CoreResult};
use icecfg_core::port::SpiBus;
use icecfg_core::spi::{BitOrder, BusConfig, ChipSelect, CsPolarity, DEFAULT_CORE_CLOCK_HZ};

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::Path;

/// Path to kernel spidev buffer size parameter
const BUF_SIZE_SYSFS: &str = "/sys/module/spidev/parameters/bufsiz";

/// spidev mode flags (`SPI_CPHA`, `SPI_CPOL` are the clock mode bits)
const SPI_CS_HIGH: u8 = 0x04;

/// Linux spidev ioctl constants
mod ioctl {
    use nix::ioctl_write_ptr;

    // SPI ioctl magic number
    const SPI_IOC_MAGIC: u8 = b'k';

    // SPI ioctl type numbers
    const SPI_IOC_TYPE_MODE: u8 = 1;
    const SPI_IOC_TYPE_LSB_FIRST: u8 = 2;
    const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
    const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;

    // Generate ioctl functions
    ioctl_write_ptr!(spi_ioc_wr_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_write_ptr!(
        spi_ioc_wr_lsb_first,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_LSB_FIRST,
        u8
    );
    ioctl_write_ptr!(
        spi_ioc_wr_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_write_ptr!(
        spi_ioc_wr_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );

    /// Size of spi_ioc_transfer struct
    pub const SPI_IOC_TRANSFER_SIZE: usize = 32;

    /// Calculate ioctl number for SPI_IOC_MESSAGE(n)
    pub fn spi_ioc_message(n: u8) -> libc::c_ulong {
        let size = (n as usize) * SPI_IOC_TRANSFER_SIZE;
        // _IOW(SPI_IOC_MAGIC, 0, char[size])
        ((1u32 << 30) | ((size as u32) << 16) | ((SPI_IOC_MAGIC as u32) << 8)) as libc::c_ulong
    }
}

/// SPI transfer structure for ioctl
/// This must match the kernel's struct spi_ioc_transfer layout
#[repr(C)]
#[derive(Debug, Default, Clone)]
struct SpiIocTransfer {
    tx_buf: u64,          // __u64 tx_buf
    rx_buf: u64,          // __u64 rx_buf
    len: u32,             // __u32 len
    speed_hz: u32,        // __u32 speed_hz
    delay_usecs: u16,     // __u16 delay_usecs
    bits_per_word: u8,    // __u8 bits_per_word
    cs_change: u8,        // __u8 cs_change
    tx_nbits: u8,         // __u8 tx_nbits
    rx_nbits: u8,         // __u8 rx_nbits
    word_delay_usecs: u8, // __u8 word_delay_usecs
    _pad: u8,             // padding
}

/// Configuration for opening a Linux SPI bus
#[derive(Debug, Clone)]
pub struct LinuxSpiConfig {
    /// SPI bus number (the X in `/dev/spidevX.Y`)
    pub bus: u8,
    /// Controller core clock the divider applies to
    pub core_clock_hz: u32,
}

impl Default for LinuxSpiConfig {
    fn default() -> Self {
        Self {
            bus: 0,
            core_clock_hz: DEFAULT_CORE_CLOCK_HZ,
        }
    }
}

impl LinuxSpiConfig {
    /// Create a new configuration for the given bus
    pub fn new(bus: u8) -> Self {
        Self {
            bus,
            ..Default::default()
        }
    }

    /// Set the controller core clock in Hz
    pub fn with_core_clock(mut self, hz: u32) -> Self {
        self.core_clock_hz = hz;
        self
    }

    /// Device node for a chip select on this bus
    pub fn device_path(&self, cs: ChipSelect) -> String {
        format!("/dev/spidev{}.{}", self.bus, cs.index())
    }
}

/// spidev mode byte for a bus configuration
pub fn spidev_mode(config: &BusConfig) -> u8 {
    let mut mode = config.clock_mode.bits();
    if config.cs_polarity == CsPolarity::ActiveHigh {
        mode |= SPI_CS_HIGH;
    }
    mode
}

/// Open spidev node and its settings
struct Device {
    file: File,
    speed_hz: u32,
}

/// Linux SPI bus using the spidev interface
pub struct LinuxSpiBus {
    config: LinuxSpiConfig,
    /// Maximum kernel buffer size
    max_kernel_buf_size: usize,
    /// Device node opened by the last `configure`
    device: Option<Device>,
    acquired: bool,
}

impl LinuxSpiBus {
    /// Prepare a Linux SPI bus with the given configuration
    ///
    /// No device node is opened yet; that happens once the chip select is
    /// known.
    pub fn open(config: &LinuxSpiConfig) -> Result<Self> {
        if !bus_present(config) {
            return Err(LinuxSpiError::BusNotFound { bus: config.bus });
        }

        // Read max kernel buffer size
        let max_kernel_buf_size = get_max_kernel_buf_size();
        log::debug!(
            "linux_spi: Max kernel buffer size: {} bytes",
            max_kernel_buf_size
        );

        Ok(Self {
            config: config.clone(),
            max_kernel_buf_size,
            device: None,
            acquired: false,
        })
    }

    fn open_device(&self, bus_config: &BusConfig) -> Result<Device> {
        let path = self.config.device_path(bus_config.chip_select);
        log::debug!("linux_spi: Opening device {}", path);

        // Open the device
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| LinuxSpiError::OpenFailed {
                path: path.clone(),
                source: e,
            })?;

        let fd = file.as_raw_fd();

        // Set SPI mode
        let mode = spidev_mode(bus_config);
        unsafe {
            ioctl::spi_ioc_wr_mode(fd, &mode).map_err(|e| LinuxSpiError::SetModeFailed {
                mode,
                source: std::io::Error::from_raw_os_error(e as i32),
            })?;
        }

        // Set bit order
        let lsb_first = u8::from(bus_config.bit_order == BitOrder::LsbFirst);
        unsafe {
            ioctl::spi_ioc_wr_lsb_first(fd, &lsb_first).map_err(|e| {
                LinuxSpiError::SetBitOrderFailed {
                    lsb_first,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }

        // Set bits per word (always 8)
        let bits: u8 = 8;
        unsafe {
            ioctl::spi_ioc_wr_bits_per_word(fd, &bits).map_err(|e| {
                LinuxSpiError::SetBitsPerWordFailed {
                    bits,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }

        // Set clock speed
        let speed = bus_config.divider.speed_hz(self.config.core_clock_hz);
        unsafe {
            ioctl::spi_ioc_wr_max_speed_hz(fd, &speed).map_err(|e| {
                LinuxSpiError::SetSpeedFailed {
                    speed,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }

        log::info!(
            "linux_spi: Opened {} (mode={}, speed={} kHz)",
            path,
            mode,
            speed / 1000
        );

        Ok(Device {
            file,
            speed_hz: speed,
        })
    }

    /// Write-only transfer, split at the kernel buffer size
    fn spi_write(&self, data: &[u8]) -> Result<()> {
        let device = self.device.as_ref().ok_or(LinuxSpiError::NotConfigured)?;
        let fd = device.file.as_raw_fd();

        let chunk_len = self.max_kernel_buf_size.max(1);
        let messages = message_count(data.len(), chunk_len);
        if messages > 1 {
            log::warn!(
                "linux_spi: {} bytes exceed the {} byte spidev buffer, sending {} messages; \
                 CS is released between them (raise spidev.bufsiz to avoid this)",
                data.len(),
                chunk_len,
                messages
            );
        }
        for chunk in data.chunks(chunk_len) {
            let transfer = SpiIocTransfer {
                tx_buf: chunk.as_ptr() as u64,
                len: chunk.len() as u32,
                speed_hz: device.speed_hz,
                bits_per_word: 8,
                ..Default::default()
            };

            // Perform ioctl
            let ret = unsafe {
                libc::ioctl(
                    fd,
                    ioctl::spi_ioc_message(1),
                    &transfer as *const SpiIocTransfer,
                )
            };

            if ret < 0 {
                return Err(LinuxSpiError::TransferFailed(
                    std::io::Error::last_os_error(),
                ));
            }
        }

        log::debug!(
            "linux_spi: Wrote {} bytes in {} message(s)",
            data.len(),
            messages
        );
        Ok(())
    }
}

fn core_err(e: LinuxSpiError) -> CoreError {
    log::error!("linux_spi: {}", e);
    e.into()
}

impl SpiBus for LinuxSpiBus {
    fn acquire(&mut self) -> CoreResult<()> {
        if self.acquired {
            return Err(CoreError::BusInitFailed);
        }
        if !bus_present(&self.config) {
            return Err(core_err(LinuxSpiError::BusNotFound {
                bus: self.config.bus,
            }));
        }
        self.acquired = true;
        Ok(())
    }

    fn release(&mut self) {
        // Closing the node hands the controller back to the kernel
        self.device = None;
        self.acquired = false;
    }

    fn configure(&mut self, config: &BusConfig) -> CoreResult<()> {
        if !self.acquired {
            return Err(CoreError::BusNotAcquired);
        }
        self.device = None;
        self.device = Some(self.open_device(config).map_err(core_err)?);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> CoreResult<()> {
        if !self.acquired {
            return Err(CoreError::BusNotAcquired);
        }
        self.spi_write(data).map_err(core_err)
    }
}

/// Number of spidev messages needed to send `len` bytes
fn message_count(len: usize, chunk_len: usize) -> usize {
    len.div_ceil(chunk_len)
}

/// Whether any spidev node exists for the bus
fn bus_present(config: &LinuxSpiConfig) -> bool {
    [ChipSelect::Cs0, ChipSelect::Cs1]
        .into_iter()
        .any(|cs| Path::new(&config.device_path(cs)).exists())
}

/// Read the maximum kernel buffer size from sysfs, or use page size as fallback
fn get_max_kernel_buf_size() -> usize {
    // Try to read from sysfs
    if let Ok(content) = std::fs::read_to_string(BUF_SIZE_SYSFS) {
        if let Ok(size) = content.trim().parse::<usize>() {
            if size > 0 {
                log::debug!("linux_spi: Using buffer size {} from sysfs", size);
                return size;
            }
        }
        log::warn!("linux_spi: Invalid buffer size in {}", BUF_SIZE_SYSFS);
    } else {
        log::debug!("linux_spi: Cannot read {}, using page size", BUF_SIZE_SYSFS);
    }

    // Fall back to page size
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
    log::debug!("linux_spi: Using page size {} as buffer size", page_size);
    page_size
}

#[cfg(test)]
mod tests {
    use super::*;
    use icecfg_core::spi::ClockDivider;

    #[test]
    fn test_transfer_layout() {
        assert_eq!(
            std::mem::size_of::<SpiIocTransfer>(),
            ioctl::SPI_IOC_TRANSFER_SIZE
        );
        // SPI_IOC_MESSAGE(1) from linux/spi/spidev.h
        assert_eq!(ioctl::spi_ioc_message(1), 0x4020_6b00);
    }

    #[test]
    fn test_device_path() {
        let config = LinuxSpiConfig::new(1);
        assert_eq!(config.device_path(ChipSelect::Cs0), "/dev/spidev1.0");
        assert_eq!(config.device_path(ChipSelect::Cs1), "/dev/spidev1.1");
        assert_eq!(config.core_clock_hz, DEFAULT_CORE_CLOCK_HZ);
    }

    #[test]
    fn test_message_count() {
        assert_eq!(message_count(0, 4096), 0);
        assert_eq!(message_count(4096, 4096), 1);
        assert_eq!(message_count(4097, 4096), 2);
        // Typical UP5K image plus padding
        assert_eq!(message_count(104_090 + 7, 4096), 26);
    }

    #[test]
    fn test_spidev_mode() {
        let mut config = BusConfig::configuration(ChipSelect::Cs0, ClockDivider::default());
        assert_eq!(spidev_mode(&config), 2);
        config.cs_polarity = CsPolarity::ActiveHigh;
        assert_eq!(spidev_mode(&config), 2 | SPI_CS_HIGH);
    }
}
