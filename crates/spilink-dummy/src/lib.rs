//! spilink-dummy - In-memory spidev emulator for testing
//!
//! This crate provides a dummy SPI backend that behaves like a spidev
//! controller without any hardware. It's useful for testing and development
//! on machines that have no SPI bus.
//!
//! The emulated controller:
//! - derives its clock from a fixed base clock through an even divider, so
//!   the effective rate is the fastest one at or below the request
//! - rejects a clock rate of 0 and mode bits outside its supported mask
//! - reports `ENOENT` for device nodes listed as missing
//! - treats 0 bits per word as 8, like `spi_setup()` does
//! - answers transfers with a loopback of the sent bytes or a fill byte
//!
//! Every call that reaches a handle is appended to a log shared with the
//! [`DummySpi`] that opened it, so tests can check exactly which ioctls a
//! session issued.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use spilink_core::{Segment, SpiBackend, SpiHandle};

/// Largest clock divider the emulated controller supports
pub const MAX_CLOCK_DIVIDER: u32 = 65_536;

/// How the emulated bus answers a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// MISO wired to MOSI: every byte comes back unchanged
    Loopback,
    /// MISO held at a constant byte (0xFF for a floating, pulled-up line)
    Fill(u8),
}

/// A failure to inject into the emulated controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Opening the node fails with `ENOENT`
    Open,
    /// Writing the mode fails with `EINVAL`
    WriteMode,
    /// Reading the mode back fails with `EIO`
    ReadMode,
    /// Writing the word size fails with `EINVAL`
    WriteBitsPerWord,
    /// Reading the word size back fails with `EIO`
    ReadBitsPerWord,
    /// Writing the clock rate fails with `EINVAL`
    WriteMaxSpeed,
    /// Reading the clock rate back fails with `EIO`
    ReadMaxSpeed,
    /// The message ioctl fails with `EIO`
    Transfer,
    /// The message ioctl succeeds but reports 0 bytes
    EmptyReply,
}

/// Configuration for the dummy controller
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Controller input clock in Hz
    pub base_clock_hz: u32,
    /// Mode bits the controller accepts
    pub mode_mask: u8,
    /// How transfers are answered
    pub response: Response,
    /// Injected failure, if any
    pub fault: Option<Fault>,
    /// Refuse a second open while a handle is live (`EBUSY`)
    pub exclusive: bool,
    /// Largest message accepted (`EMSGSIZE` beyond it)
    pub max_transfer_len: Option<usize>,
    /// Device nodes that do not exist (`ENOENT` on open)
    pub missing_paths: Vec<String>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            base_clock_hz: 250_000_000, // BCM2835 core clock
            mode_mask: 0xFF,
            response: Response::Loopback,
            fault: None,
            exclusive: false,
            max_transfer_len: Some(4096),
            missing_paths: Vec::new(),
        }
    }
}

/// One call that reached the emulated device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(String),
    WriteMode(u8),
    ReadMode,
    WriteBitsPerWord(u8),
    ReadBitsPerWord,
    WriteMaxSpeed(u32),
    ReadMaxSpeed,
    Transfer {
        tx: Vec<u8>,
        speed_hz: u32,
        delay_usecs: u16,
        bits_per_word: u8,
        cs_change: bool,
    },
    Close,
}

#[derive(Debug, Default)]
struct DummyState {
    calls: Vec<Call>,
    open_handles: usize,
    closes: usize,
}

/// Dummy SPI backend
///
/// Cloning shares the call log, so a test can keep one clone for
/// inspection while a session owns a handle opened from another.
#[derive(Debug, Clone)]
pub struct DummySpi {
    config: Rc<DummyConfig>,
    state: Rc<RefCell<DummyState>>,
}

impl DummySpi {
    /// Create a new dummy controller with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        Self {
            config: Rc::new(config),
            state: Rc::new(RefCell::new(DummyState::default())),
        }
    }

    /// Create a loopback controller with default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a controller that fails at `fault`
    pub fn with_fault(fault: Fault) -> Self {
        Self::new(DummyConfig {
            fault: Some(fault),
            ..Default::default()
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Number of handles that have been closed
    pub fn close_count(&self) -> usize {
        self.state.borrow().closes
    }

    /// Number of handles currently open
    pub fn open_handles(&self) -> usize {
        self.state.borrow().open_handles
    }

    /// Clock rate the controller produces for a requested maximum
    ///
    /// The controller divides its base clock by an even divider, choosing
    /// the smallest divider that does not exceed the request. Requests below
    /// the slowest divided rate are kept as-is.
    pub fn effective_speed(&self, requested: u32) -> u32 {
        let base = self.config.base_clock_hz;
        if requested == 0 || requested >= base {
            return requested.min(base);
        }

        let mut divider = base.div_ceil(requested);
        if divider % 2 == 1 {
            divider += 1;
        }
        if divider > MAX_CLOCK_DIVIDER {
            return requested;
        }
        base / divider
    }
}

impl SpiBackend for DummySpi {
    type Handle = DummyHandle;

    fn name(&self) -> &'static str {
        "dummy"
    }

    fn open(&self, path: &str) -> io::Result<DummyHandle> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Open(path.to_string()));

        if self.config.fault == Some(Fault::Open)
            || self.config.missing_paths.iter().any(|p| p == path)
        {
            return Err(io::Error::from_raw_os_error(libc::ENOENT));
        }
        if self.config.exclusive && state.open_handles > 0 {
            return Err(io::Error::from_raw_os_error(libc::EBUSY));
        }

        state.open_handles += 1;
        log::debug!("dummy: Opened {}", path);

        Ok(DummyHandle {
            spi: self.clone(),
            mode: 0,
            bits_per_word: 8,
            speed_hz: self.config.base_clock_hz,
        })
    }
}

/// An open emulated spidev node
#[derive(Debug)]
pub struct DummyHandle {
    spi: DummySpi,
    mode: u8,
    bits_per_word: u8,
    speed_hz: u32,
}

impl DummyHandle {
    fn record(&self, call: Call) {
        self.spi.state.borrow_mut().calls.push(call);
    }

    fn check(&self, fault: Fault, errno: i32) -> io::Result<()> {
        if self.spi.config.fault == Some(fault) {
            log::debug!("dummy: Injecting {:?}", fault);
            return Err(io::Error::from_raw_os_error(errno));
        }
        Ok(())
    }
}

impl SpiHandle for DummyHandle {
    fn write_mode(&mut self, mode: u8) -> io::Result<()> {
        self.record(Call::WriteMode(mode));
        self.check(Fault::WriteMode, libc::EINVAL)?;

        if mode & !self.spi.config.mode_mask != 0 {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        self.mode = mode;
        Ok(())
    }

    fn read_mode(&mut self) -> io::Result<u8> {
        self.record(Call::ReadMode);
        self.check(Fault::ReadMode, libc::EIO)?;
        Ok(self.mode)
    }

    fn write_bits_per_word(&mut self, bits: u8) -> io::Result<()> {
        self.record(Call::WriteBitsPerWord(bits));
        self.check(Fault::WriteBitsPerWord, libc::EINVAL)?;

        // spi_setup() substitutes the default word size for 0
        self.bits_per_word = if bits == 0 { 8 } else { bits };
        Ok(())
    }

    fn read_bits_per_word(&mut self) -> io::Result<u8> {
        self.record(Call::ReadBitsPerWord);
        self.check(Fault::ReadBitsPerWord, libc::EIO)?;
        Ok(self.bits_per_word)
    }

    fn write_max_speed_hz(&mut self, speed_hz: u32) -> io::Result<()> {
        self.record(Call::WriteMaxSpeed(speed_hz));
        self.check(Fault::WriteMaxSpeed, libc::EINVAL)?;

        if speed_hz == 0 {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        self.speed_hz = self.spi.effective_speed(speed_hz);
        Ok(())
    }

    fn read_max_speed_hz(&mut self) -> io::Result<u32> {
        self.record(Call::ReadMaxSpeed);
        self.check(Fault::ReadMaxSpeed, libc::EIO)?;
        Ok(self.speed_hz)
    }

    fn transfer(&mut self, segment: &mut Segment<'_>) -> io::Result<usize> {
        self.record(Call::Transfer {
            tx: segment.tx.to_vec(),
            speed_hz: segment.speed_hz,
            delay_usecs: segment.delay_usecs,
            bits_per_word: segment.bits_per_word,
            cs_change: segment.cs_change,
        });
        self.check(Fault::Transfer, libc::EIO)?;

        if let Some(max) = self.spi.config.max_transfer_len {
            if segment.len() > max {
                return Err(io::Error::from_raw_os_error(libc::EMSGSIZE));
            }
        }
        if self.spi.config.fault == Some(Fault::EmptyReply) {
            return Ok(0);
        }

        match self.spi.config.response {
            Response::Loopback => segment.rx.copy_from_slice(segment.tx),
            Response::Fill(byte) => segment.rx.fill(byte),
        }
        Ok(segment.len())
    }

    fn max_transfer_len(&self) -> Option<usize> {
        self.spi.config.max_transfer_len
    }
}

impl Drop for DummyHandle {
    fn drop(&mut self) {
        let mut state = self.spi.state.borrow_mut();
        state.calls.push(Call::Close);
        state.open_handles -= 1;
        state.closes += 1;
        log::debug!("dummy: Closed handle");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spilink_core::{SessionConfig, SpiError, SpiSession};

    fn open(
        spi: &DummySpi,
        config: SessionConfig,
    ) -> spilink_core::Result<SpiSession<DummyHandle>> {
        SpiSession::open_and_configure(spi, config)
    }

    #[test]
    fn test_default_configuration() {
        let spi = DummySpi::new_default();
        let session = open(&spi, SessionConfig::default()).unwrap();

        let config = session.config();
        assert_eq!(config.device_path, "/dev/spidev0.0");
        assert_eq!(config.mode, 0);
        assert_eq!(config.bits_per_word, 8);
        assert_eq!(config.delay_usecs, 0);
        assert!(config.speed_hz <= 500_000);
        assert!(session.is_open());
    }

    #[test]
    fn test_negotiation_order() {
        let spi = DummySpi::new_default();
        let _session = open(&spi, SessionConfig::default().with_mode(1)).unwrap();

        assert_eq!(
            spi.calls(),
            vec![
                Call::Open("/dev/spidev0.0".to_string()),
                Call::WriteMode(1),
                Call::ReadMode,
                Call::WriteBitsPerWord(8),
                Call::ReadBitsPerWord,
                Call::WriteMaxSpeed(500_000),
                Call::ReadMaxSpeed,
            ]
        );
    }

    #[test]
    fn test_speed_readback_never_exceeds_request() {
        let spi = DummySpi::new_default();
        let requests = [
            1, 1_000, 3_814, 3_815, 100_000, 333_333, 500_000, 1_000_001, 7_812_500, 9_999_999,
            125_000_000, 249_999_999, 250_000_000, 300_000_000, u32::MAX,
        ];

        for requested in requests {
            let session = open(&spi, SessionConfig::default().with_speed(requested)).unwrap();
            let effective = session.config().speed_hz;
            assert!(
                effective <= requested,
                "requested {} Hz, got {} Hz",
                requested,
                effective
            );
            assert!(effective > 0);
        }
    }

    #[test]
    fn test_speed_rounds_down_to_divider() {
        let spi = DummySpi::new_default();
        // 250 MHz / 24 (23.8 rounded up to even)
        let session = open(&spi, SessionConfig::default().with_speed(10_500_000)).unwrap();
        assert_eq!(session.config().speed_hz, 250_000_000 / 24);
    }

    #[test]
    fn test_loopback_round_trip() {
        let spi = DummySpi::new_default();
        let mut session = open(&spi, SessionConfig::default()).unwrap();
        assert_eq!(
            session.transfer(&[0x01, 0x02, 0x03]).unwrap(),
            vec![0x01, 0x02, 0x03]
        );
    }

    #[test]
    fn test_full_duplex_length() {
        let spi = DummySpi::new(DummyConfig {
            response: Response::Fill(0xFF),
            ..Default::default()
        });
        let mut session = open(&spi, SessionConfig::default()).unwrap();

        for len in [0usize, 1, 2, 3, 7, 64, 255, 256, 1000, 4096] {
            let tx: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let rx = session.transfer(&tx).unwrap();
            assert_eq!(rx.len(), len);
            assert!(rx.iter().all(|&b| b == 0xFF));
        }
    }

    #[test]
    fn test_transfer_uses_session_parameters() {
        let spi = DummySpi::new_default();
        let config = SessionConfig::default()
            .with_bits_per_word(16)
            .with_speed(1_000_000)
            .with_delay(25);
        let mut session = open(&spi, config).unwrap();
        session.transfer(&[0xAB, 0xCD]).unwrap();

        assert_eq!(
            spi.calls().last(),
            Some(&Call::Transfer {
                tx: vec![0xAB, 0xCD],
                speed_hz: 1_000_000,
                delay_usecs: 25,
                bits_per_word: 16,
                cs_change: true,
            })
        );
    }

    #[test]
    fn test_zero_length_transfer_skips_ioctl() {
        let spi = DummySpi::new_default();
        let mut session = open(&spi, SessionConfig::default()).unwrap();
        let before = spi.calls().len();

        assert_eq!(session.transfer(&[]).unwrap(), Vec::<u8>::new());
        assert_eq!(spi.calls().len(), before);
    }

    #[test]
    fn test_transfer_after_close() {
        let spi = DummySpi::new_default();
        let mut session = open(&spi, SessionConfig::default()).unwrap();
        session.close();
        let calls_at_close = spi.calls();
        assert_eq!(calls_at_close.last(), Some(&Call::Close));

        let err = session.transfer(&[0x01]).unwrap_err();
        assert!(matches!(err, SpiError::SessionClosed));
        let err = session.transfer(&[]).unwrap_err();
        assert!(matches!(err, SpiError::SessionClosed));

        assert_eq!(spi.calls(), calls_at_close);
        assert!(!session.is_open());
    }

    #[test]
    fn test_close_twice() {
        let spi = DummySpi::new_default();
        let mut session = open(&spi, SessionConfig::default()).unwrap();
        session.close();
        session.close();
        drop(session);

        assert_eq!(spi.close_count(), 1);
        assert_eq!(spi.open_handles(), 0);
    }

    #[test]
    fn test_drop_closes_handle() {
        let spi = DummySpi::new_default();
        {
            let _session = open(&spi, SessionConfig::default()).unwrap();
            assert_eq!(spi.open_handles(), 1);
        }
        assert_eq!(spi.open_handles(), 0);
        assert_eq!(spi.close_count(), 1);
    }

    #[test]
    fn test_open_failure() {
        let spi = DummySpi::with_fault(Fault::Open);
        let err = open(&spi, SessionConfig::new("/dev/spidev9.9")).unwrap_err();
        match err {
            SpiError::DeviceOpenFailed { path, source } => {
                assert_eq!(path, "/dev/spidev9.9");
                assert_eq!(source.raw_os_error(), Some(libc::ENOENT));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(spi.open_handles(), 0);
    }

    #[test]
    fn test_missing_path() {
        let spi = DummySpi::new(DummyConfig {
            missing_paths: vec!["/dev/spidev1.0".to_string()],
            ..Default::default()
        });

        let err = open(&spi, SessionConfig::new("/dev/spidev1.0")).unwrap_err();
        assert!(matches!(
            err,
            SpiError::DeviceOpenFailed { ref path, .. } if path == "/dev/spidev1.0"
        ));
        assert_eq!(err.os_error(), Some(libc::ENOENT));
        assert_eq!(spi.open_handles(), 0);
        assert_eq!(spi.calls(), vec![Call::Open("/dev/spidev1.0".to_string())]);

        let session = open(&spi, SessionConfig::new("/dev/spidev0.0")).unwrap();
        assert!(session.is_open());
    }

    #[test]
    fn test_exclusive_open() {
        let spi = DummySpi::new(DummyConfig {
            exclusive: true,
            ..Default::default()
        });
        let _first = open(&spi, SessionConfig::default()).unwrap();
        let err = open(&spi, SessionConfig::default()).unwrap_err();
        assert!(matches!(err, SpiError::DeviceOpenFailed { .. }));
        assert_eq!(err.os_error(), Some(libc::EBUSY));
    }

    #[test]
    fn test_negotiation_failures_close_handle() {
        let cases = [
            (Fault::WriteMode, libc::EINVAL),
            (Fault::ReadMode, libc::EIO),
            (Fault::WriteBitsPerWord, libc::EINVAL),
            (Fault::ReadBitsPerWord, libc::EIO),
            (Fault::WriteMaxSpeed, libc::EINVAL),
            (Fault::ReadMaxSpeed, libc::EIO),
        ];

        for (fault, errno) in cases {
            let spi = DummySpi::with_fault(fault);
            let err = open(&spi, SessionConfig::default()).unwrap_err();

            let matched = match fault {
                Fault::WriteMode | Fault::ReadMode => {
                    matches!(err, SpiError::ModeNegotiationFailed { .. })
                }
                Fault::WriteBitsPerWord | Fault::ReadBitsPerWord => {
                    matches!(err, SpiError::WordSizeNegotiationFailed { .. })
                }
                _ => matches!(err, SpiError::SpeedNegotiationFailed { .. }),
            };
            assert!(matched, "{:?} produced {}", fault, err);
            assert_eq!(err.os_error(), Some(errno));
            assert_eq!(spi.open_handles(), 0, "{:?} leaked the handle", fault);
            assert_eq!(spi.calls().last(), Some(&Call::Close));
        }
    }

    #[test]
    fn test_zero_speed_rejected() {
        let spi = DummySpi::new_default();
        let err = open(&spi, SessionConfig::default().with_speed(0)).unwrap_err();
        assert!(matches!(err, SpiError::SpeedNegotiationFailed { speed: 0, .. }));
    }

    #[test]
    fn test_unsupported_mode_bits() {
        let spi = DummySpi::new(DummyConfig {
            mode_mask: 0x0B, // CPHA | CPOL | LSB_FIRST
            ..Default::default()
        });
        assert!(open(&spi, SessionConfig::default().with_mode(0x0B)).is_ok());

        let err = open(&spi, SessionConfig::default().with_mode(0x04)).unwrap_err();
        assert!(matches!(err, SpiError::ModeNegotiationFailed { mode: 0x04, .. }));
    }

    #[test]
    fn test_zero_bits_reads_back_default() {
        let spi = DummySpi::new_default();
        let session = open(&spi, SessionConfig::default().with_bits_per_word(0)).unwrap();
        assert_eq!(session.config().bits_per_word, 8);
    }

    #[test]
    fn test_truncated_bits_per_word_accepted() {
        let spi = DummySpi::new_default();
        let config = SessionConfig::default().with_bits_per_word(500u32 as u8);
        let session = open(&spi, config).unwrap();
        assert_eq!(session.config().bits_per_word, 244);
    }

    #[test]
    fn test_transfer_failure_keeps_session_open() {
        let spi = DummySpi::with_fault(Fault::Transfer);
        let mut session = open(&spi, SessionConfig::default()).unwrap();

        let err = session.transfer(&[0x01, 0x02]).unwrap_err();
        assert!(matches!(err, SpiError::TransferFailed { len: 2, .. }));
        assert_eq!(err.os_error(), Some(libc::EIO));
        assert!(session.is_open());
        assert_eq!(spi.open_handles(), 1);
    }

    #[test]
    fn test_empty_reply_is_failure() {
        let spi = DummySpi::with_fault(Fault::EmptyReply);
        let mut session = open(&spi, SessionConfig::default()).unwrap();
        let err = session.transfer(&[0x55]).unwrap_err();
        assert!(matches!(err, SpiError::TransferFailed { len: 1, .. }));
        assert_eq!(err.os_error(), None);
    }

    #[test]
    fn test_oversized_transfer() {
        let spi = DummySpi::new(DummyConfig {
            max_transfer_len: Some(16),
            ..Default::default()
        });
        let mut session = open(&spi, SessionConfig::default()).unwrap();
        assert_eq!(session.max_transfer_len(), Some(16));

        assert_eq!(session.transfer(&[0u8; 16]).unwrap().len(), 16);
        let err = session.transfer(&[0u8; 17]).unwrap_err();
        assert_eq!(err.os_error(), Some(libc::EMSGSIZE));
    }

    #[test]
    fn test_reconfigure() {
        let spi = DummySpi::new_default();
        let mut session = open(&spi, SessionConfig::default()).unwrap();

        let effective = session
            .reconfigure(SessionConfig::default().with_mode(3).with_speed(1_250_000))
            .unwrap()
            .clone();
        assert_eq!(effective.mode, 3);
        assert_eq!(effective.speed_hz, 1_250_000);
        assert_eq!(session.config(), &effective);
        assert_eq!(spi.open_handles(), 1);
    }

    #[test]
    fn test_failed_reconfigure_closes_session() {
        let spi = DummySpi::new_default();
        let mut session = open(&spi, SessionConfig::default()).unwrap();

        let err = session
            .reconfigure(SessionConfig::default().with_speed(0))
            .unwrap_err();
        assert!(matches!(err, SpiError::SpeedNegotiationFailed { .. }));
        assert!(!session.is_open());
        assert_eq!(spi.open_handles(), 0);
        assert!(matches!(
            session.transfer(&[0x01]),
            Err(SpiError::SessionClosed)
        ));
    }

    #[test]
    fn test_independent_sessions() {
        let spi = DummySpi::new_default();
        let mut a = open(&spi, SessionConfig::new("/dev/spidev0.0")).unwrap();
        let config = SessionConfig::new("/dev/spidev0.1").with_speed(1_000_000);
        let mut b = open(&spi, config).unwrap();

        a.close();
        assert!(!a.is_open());
        assert_eq!(b.transfer(&[0x42]).unwrap(), vec![0x42]);
        assert_eq!(b.config().speed_hz, 1_000_000);
        assert_eq!(spi.open_handles(), 1);
    }
}
