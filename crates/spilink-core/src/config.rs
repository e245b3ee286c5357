//! Bus parameters for an SPI session
//!
//! A [`SessionConfig`] is what the caller asks for when opening a session,
//! and, after negotiation, what the hardware actually accepted. The driver
//! may coerce values (most commonly the clock rate, which is rounded down to
//! a rate the controller can generate), so the config handed back by
//! [`SpiSession::config`](crate::SpiSession::config) is the one to trust.

use bitflags::bitflags;

/// Default device node
pub const DEFAULT_DEVICE: &str = "/dev/spidev0.0";

/// Default word size in bits
pub const DEFAULT_BITS_PER_WORD: u8 = 8;

/// Default maximum clock rate in Hz (500 kHz)
pub const DEFAULT_SPEED_HZ: u32 = 500_000;

/// Default inter-word delay in microseconds
pub const DEFAULT_DELAY_USECS: u16 = 0;

bitflags! {
    /// spidev mode byte
    ///
    /// Bit positions match `SPI_CPHA`, `SPI_CPOL`, ... from
    /// `linux/spi/spidev.h`, so the raw value can be handed to the
    /// `SPI_IOC_WR_MODE` ioctl unchanged.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModeFlags: u8 {
        /// Clock phase: sample on the trailing edge
        const CPHA       = 0x01;
        /// Clock polarity: clock idles high
        const CPOL       = 0x02;
        /// Chip select is active high
        const CS_HIGH    = 0x04;
        /// Shift out the least significant bit first
        const LSB_FIRST  = 0x08;
        /// SI/SO signals shared
        const THREE_WIRE = 0x10;
        /// Internal loopback (controller dependent)
        const LOOP       = 0x20;
        /// No chip select line
        const NO_CS      = 0x40;
        /// Slave pulls low to pause
        const READY      = 0x80;

        /// SPI mode 0: CPOL=0, CPHA=0
        const MODE_0 = 0;
        /// SPI mode 1: CPOL=0, CPHA=1
        const MODE_1 = Self::CPHA.bits();
        /// SPI mode 2: CPOL=1, CPHA=0
        const MODE_2 = Self::CPOL.bits();
        /// SPI mode 3: CPOL=1, CPHA=1
        const MODE_3 = Self::CPOL.bits() | Self::CPHA.bits();
    }
}

impl ModeFlags {
    /// The classic 0-3 SPI mode number encoded in the CPOL/CPHA bits
    pub fn spi_mode(self) -> u8 {
        self.bits() & (Self::CPOL.bits() | Self::CPHA.bits())
    }
}

impl Default for ModeFlags {
    fn default() -> Self {
        ModeFlags::MODE_0
    }
}

/// Negotiable SPI bus parameters
///
/// Unset fields fall back to the spidev defaults used by most single board
/// computers: `/dev/spidev0.0`, mode 0, 8 bits per word, 500 kHz, no delay.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct SessionConfig {
    /// Device node, e.g. `/dev/spidev0.0`
    pub device_path: String,
    /// Raw mode byte, see [`ModeFlags`]
    pub mode: u8,
    /// Word size in bits
    pub bits_per_word: u8,
    /// Maximum clock rate in Hz
    pub speed_hz: u32,
    /// Delay after each transfer, in microseconds
    pub delay_usecs: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_path: DEFAULT_DEVICE.to_string(),
            mode: ModeFlags::MODE_0.bits(),
            bits_per_word: DEFAULT_BITS_PER_WORD,
            speed_hz: DEFAULT_SPEED_HZ,
            delay_usecs: DEFAULT_DELAY_USECS,
        }
    }
}

impl SessionConfig {
    /// Create a configuration for the given device with default parameters
    pub fn new(device_path: impl Into<String>) -> Self {
        Self {
            device_path: device_path.into(),
            ..Default::default()
        }
    }

    /// Set the raw mode byte
    pub fn with_mode(mut self, mode: u8) -> Self {
        self.mode = mode;
        self
    }

    /// Set the mode from typed flags
    pub fn with_mode_flags(mut self, flags: ModeFlags) -> Self {
        self.mode = flags.bits();
        self
    }

    /// Set the word size in bits
    pub fn with_bits_per_word(mut self, bits: u8) -> Self {
        self.bits_per_word = bits;
        self
    }

    /// Set the maximum clock rate in Hz
    pub fn with_speed(mut self, speed_hz: u32) -> Self {
        self.speed_hz = speed_hz;
        self
    }

    /// Set the inter-word delay in microseconds
    pub fn with_delay(mut self, delay_usecs: u16) -> Self {
        self.delay_usecs = delay_usecs;
        self
    }

    /// Mode byte as typed flags
    pub fn mode_flags(&self) -> ModeFlags {
        ModeFlags::from_bits_retain(self.mode)
    }
}

impl core::fmt::Display for SessionConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} (mode=0x{:02X}, bits={}, speed={} Hz, delay={} us)",
            self.device_path, self.mode, self.bits_per_word, self.speed_hz, self.delay_usecs
        )
    }
}
