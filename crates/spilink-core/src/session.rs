//! SPI session lifecycle
//!
//! A [`SpiSession`] owns one open device handle together with the
//! configuration the hardware accepted for it:
//!
//! ```text
//!   open_and_configure ──► Open ──► transfer / transfer_in_place (0..n)
//!                           │
//!                           ├──► reconfigure (failure closes the handle)
//!                           ▼
//!                 close / drop ──► Closed ──► transfer = SessionClosed
//! ```
//!
//! Negotiation writes each parameter and immediately reads it back, in the
//! order mode, bits-per-word, max-speed. Drivers are allowed to round the
//! clock down to a rate the controller can produce, so the read-back value
//! replaces the requested one in the session's config.

use std::io;

use crate::config::SessionConfig;
use crate::device::{Segment, SpiBackend, SpiHandle};
use crate::error::{Result, SpiError};

/// An open spidev session
pub struct SpiSession<H: SpiHandle> {
    /// `None` once the session has been closed
    handle: Option<H>,
    /// Effective configuration as read back from the device
    config: SessionConfig,
}

impl<H: SpiHandle> SpiSession<H> {
    /// Open `config.device_path` through `backend` and negotiate `config`
    ///
    /// On success the session is open and [`config`](Self::config) holds the
    /// effective parameters. On failure the device handle, if one was
    /// opened, is released before returning.
    pub fn open_and_configure<B>(backend: &B, config: SessionConfig) -> Result<Self>
    where
        B: SpiBackend<Handle = H>,
    {
        log::debug!(
            "{}: Opening device {}",
            backend.name(),
            config.device_path
        );

        let handle = backend
            .open(&config.device_path)
            .map_err(|source| SpiError::DeviceOpenFailed {
                path: config.device_path.clone(),
                source,
            })?;

        let session = Self::from_handle(handle, config)?;

        log::info!("{}: Opened {}", backend.name(), session.config);
        Ok(session)
    }

    /// Negotiate `config` on a handle that is already open
    ///
    /// `config.device_path` is kept as-is; it only labels the session.
    pub fn from_handle(mut handle: H, config: SessionConfig) -> Result<Self> {
        let config = negotiate(&mut handle, config)?;
        Ok(Self {
            handle: Some(handle),
            config,
        })
    }

    /// The effective configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether the session still holds its device handle
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Largest single transfer the driver accepts, if known
    pub fn max_transfer_len(&self) -> Option<usize> {
        self.handle.as_ref().and_then(|h| h.max_transfer_len())
    }

    /// Perform one full-duplex exchange
    ///
    /// Clocks out every byte of `tx` and returns the bytes clocked in at
    /// the same time, position for position. Chip select is held for the
    /// whole message and released at its end.
    ///
    /// An empty `tx` returns an empty vector without issuing a message.
    pub fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>> {
        let mut rx = vec![0u8; tx.len()];
        self.exchange(tx, &mut rx)?;
        Ok(rx)
    }

    /// Full-duplex exchange that overwrites `buf` with the received bytes
    pub fn transfer_in_place(&mut self, buf: &mut [u8]) -> Result<()> {
        let tx = buf.to_vec();
        self.exchange(&tx, buf)
    }

    /// Renegotiate bus parameters on the open handle
    ///
    /// The device path is not changed. A failure here is fatal to the
    /// session: the handle is released and later transfers report
    /// [`SpiError::SessionClosed`].
    pub fn reconfigure(&mut self, config: SessionConfig) -> Result<&SessionConfig> {
        let mut handle = self.handle.take().ok_or(SpiError::SessionClosed)?;

        let config = SessionConfig {
            device_path: self.config.device_path.clone(),
            ..config
        };

        match negotiate(&mut handle, config) {
            Ok(effective) => {
                log::info!("spilink: Reconfigured {}", effective);
                self.config = effective;
                self.handle = Some(handle);
                Ok(&self.config)
            }
            Err(e) => {
                log::warn!(
                    "spilink: Reconfiguring {} failed, closing: {}",
                    self.config.device_path,
                    e
                );
                drop(handle);
                Err(e)
            }
        }
    }

    /// Release the device handle
    ///
    /// Closing an already closed session does nothing.
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            drop(handle);
            log::info!("spilink: Closed {}", self.config.device_path);
        }
    }

    fn exchange(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        let handle = self.handle.as_mut().ok_or(SpiError::SessionClosed)?;

        if tx.is_empty() {
            log::trace!("spilink: Skipping zero-length transfer");
            return Ok(());
        }

        let len = tx.len();
        let mut segment = Segment::new(tx, rx);
        segment.speed_hz = self.config.speed_hz;
        segment.delay_usecs = self.config.delay_usecs;
        segment.bits_per_word = self.config.bits_per_word;
        segment.cs_change = true;

        let transferred = handle
            .transfer(&mut segment)
            .map_err(|source| SpiError::TransferFailed { len, source })?;

        if transferred < 1 {
            return Err(SpiError::TransferFailed {
                len,
                source: io::Error::new(io::ErrorKind::WriteZero, "no bytes transferred"),
            });
        }
        if transferred < len {
            log::warn!(
                "spilink: Short transfer, {} of {} bytes",
                transferred,
                len
            );
        }

        log::trace!("spilink: Transferred {} bytes", transferred);
        Ok(())
    }
}

impl<H: SpiHandle> Drop for SpiSession<H> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            log::debug!(
                "spilink: Session for {} dropped while open",
                self.config.device_path
            );
        }
    }
}

impl<H: SpiHandle> core::fmt::Debug for SpiSession<H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpiSession")
            .field("config", &self.config)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Apply and read back mode, word size and speed, in that order
fn negotiate<H: SpiHandle>(handle: &mut H, requested: SessionConfig) -> Result<SessionConfig> {
    let mode = requested.mode;
    log::debug!("spilink: Setting mode 0x{:02X}", mode);
    let effective_mode = handle
        .write_mode(mode)
        .and_then(|()| handle.read_mode())
        .map_err(|source| SpiError::ModeNegotiationFailed { mode, source })?;

    let bits = requested.bits_per_word;
    log::debug!("spilink: Setting {} bits per word", bits);
    let effective_bits = handle
        .write_bits_per_word(bits)
        .and_then(|()| handle.read_bits_per_word())
        .map_err(|source| SpiError::WordSizeNegotiationFailed { bits, source })?;

    let speed = requested.speed_hz;
    log::debug!("spilink: Setting max speed {} Hz", speed);
    let effective_speed = handle
        .write_max_speed_hz(speed)
        .and_then(|()| handle.read_max_speed_hz())
        .map_err(|source| SpiError::SpeedNegotiationFailed { speed, source })?;

    if effective_mode != mode {
        log::warn!(
            "spilink: Mode 0x{:02X} requested, device reports 0x{:02X}",
            mode,
            effective_mode
        );
    }
    if effective_bits != bits {
        log::warn!(
            "spilink: {} bits per word requested, device reports {}",
            bits,
            effective_bits
        );
    }
    if effective_speed != speed {
        log::info!(
            "spilink: {} Hz requested, device runs at {} Hz",
            speed,
            effective_speed
        );
    }

    Ok(SessionConfig {
        mode: effective_mode,
        bits_per_word: effective_bits,
        speed_hz: effective_speed,
        ..requested
    })
}
