//! Error types for SPI sessions

use thiserror::Error;

/// SPI session errors
///
/// Every variant except [`SpiError::SessionClosed`] wraps the OS error that
/// caused it, so callers can inspect the errno through [`SpiError::os_error`].
#[derive(Debug, Error)]
pub enum SpiError {
    /// Failed to open the device node
    #[error("Failed to open {path}: {source}")]
    DeviceOpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to apply or read back the SPI mode
    #[error("Failed to negotiate SPI mode 0x{mode:02X}: {source}")]
    ModeNegotiationFailed {
        mode: u8,
        #[source]
        source: std::io::Error,
    },

    /// Failed to apply or read back the word size
    #[error("Failed to negotiate {bits} bits per word: {source}")]
    WordSizeNegotiationFailed {
        bits: u8,
        #[source]
        source: std::io::Error,
    },

    /// Failed to apply or read back the clock speed
    #[error("Failed to negotiate clock speed of {speed} Hz: {source}")]
    SpeedNegotiationFailed {
        speed: u32,
        #[source]
        source: std::io::Error,
    },

    /// The full-duplex message was rejected or moved no data
    #[error("SPI transfer of {len} bytes failed: {source}")]
    TransferFailed {
        len: usize,
        #[source]
        source: std::io::Error,
    },

    /// The session has been closed
    #[error("SPI session is closed")]
    SessionClosed,
}

impl SpiError {
    /// The underlying OS error code, if the failure came from a syscall
    pub fn os_error(&self) -> Option<i32> {
        match self {
            Self::DeviceOpenFailed { source, .. }
            | Self::ModeNegotiationFailed { source, .. }
            | Self::WordSizeNegotiationFailed { source, .. }
            | Self::SpeedNegotiationFailed { source, .. }
            | Self::TransferFailed { source, .. } => source.raw_os_error(),
            Self::SessionClosed => None,
        }
    }
}

/// Result type for SPI session operations
pub type Result<T> = std::result::Result<T, SpiError>;
