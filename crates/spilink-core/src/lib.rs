//! spilink-core - SPI sessions over spidev-style devices
//!
//! This crate holds the parts of SPI access that have real contract
//! semantics: negotiating bus parameters with a device and running
//! synchronous full-duplex transfers. The OS side is behind the
//! [`SpiBackend`] / [`SpiHandle`] traits, implemented by
//! `spilink-linux` for real hardware and `spilink-dummy` for tests.
//!
//! # Example
//!
//! ```ignore
//! use spilink_core::{SessionConfig, SpiSession};
//! use spilink_linux::LinuxSpi;
//!
//! let config = SessionConfig::new("/dev/spidev0.0").with_speed(1_000_000);
//! let mut session = SpiSession::open_and_configure(&LinuxSpi, config)?;
//!
//! // The driver may have picked a slower clock
//! println!("running at {} Hz", session.config().speed_hz);
//!
//! let rx = session.transfer(&[0x9F, 0x00, 0x00, 0x00])?;
//! session.close();
//! ```
//!
//! Sessions are plain owned values. There is no global device state, and
//! nothing in this crate arbitrates access to a bus shared between threads.

pub mod config;
pub mod device;
pub mod error;
pub mod session;

pub use config::{ModeFlags, SessionConfig};
pub use device::{Segment, SpiBackend, SpiHandle};
pub use error::{Result, SpiError};
pub use session::SpiSession;
