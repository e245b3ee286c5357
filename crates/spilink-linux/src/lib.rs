//! spilink-linux - Linux spidev backend
//!
//! This crate opens SPI controllers through the `/dev/spidevX.Y`
//! character devices and drives them with the spidev ioctls.
//!
//! # Overview
//!
//! The Linux SPI driver exposes SPI controllers through character devices
//! at `/dev/spidevX.Y` where X is the bus number and Y is the chip select.
//!
//! # Example
//!
//! ```no_run
//! use spilink_core::SessionConfig;
//!
//! // Open with default settings (500 kHz, mode 0, 8 bits per word)
//! let mut spi = spilink_linux::open(SessionConfig::default())?;
//!
//! // Or with custom settings
//! let config = SessionConfig::new("/dev/spidev0.1")
//!     .with_speed(4_000_000)  // 4 MHz
//!     .with_mode(3);
//! let mut spi = spilink_linux::open(config)?;
//! println!("effective: {}", spi.config());
//!
//! let rx = spi.transfer(&[0x01, 0x02, 0x03])?;
//! assert_eq!(rx.len(), 3);
//! spi.close();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support enabled (`CONFIG_SPI_SPIDEV`)
//! - Read/write access to `/dev/spidevX.Y` device
//! - May require adding user to `spi` group or using udev rules

pub mod device;

// Re-exports
pub use device::{LinuxSpi, LinuxSpiHandle};

use spilink_core::{SessionConfig, SpiSession};

/// Open `config.device_path` and negotiate `config` on it
pub fn open(config: SessionConfig) -> spilink_core::Result<SpiSession<LinuxSpiHandle>> {
    SpiSession::open_and_configure(&LinuxSpi, config)
}
