//! Device traits
//!
//! A session only talks to the hardware through these two traits:
//! [`SpiBackend`] opens a device node and [`SpiHandle`] is the open node.
//! Every method maps onto one spidev ioctl, so a backend is a thin layer over
//! the OS and all the policy (ordering, readback, error mapping) stays in
//! [`SpiSession`](crate::SpiSession).
//!
//! Handles release their OS resource when dropped. They are not `Clone`, so a
//! handle can only ever be owned by one session.

use std::io;

/// Opens SPI device nodes
pub trait SpiBackend {
    /// The open device type produced by this backend
    type Handle: SpiHandle;

    /// Short backend name, used in log messages
    fn name(&self) -> &'static str;

    /// Open the device node at `path` for reading and writing
    fn open(&self, path: &str) -> io::Result<Self::Handle>;
}

/// An open SPI device node
///
/// The `write_*` methods correspond to the `SPI_IOC_WR_*` ioctls and the
/// `read_*` methods to `SPI_IOC_RD_*`. A driver is free to store a different
/// value than the one written; the read-back is what counts.
pub trait SpiHandle {
    /// Apply the mode byte
    fn write_mode(&mut self, mode: u8) -> io::Result<()>;

    /// Read back the effective mode byte
    fn read_mode(&mut self) -> io::Result<u8>;

    /// Apply the word size
    fn write_bits_per_word(&mut self, bits: u8) -> io::Result<()>;

    /// Read back the effective word size
    fn read_bits_per_word(&mut self) -> io::Result<u8>;

    /// Apply the maximum clock rate
    fn write_max_speed_hz(&mut self, speed_hz: u32) -> io::Result<()>;

    /// Read back the effective maximum clock rate
    fn read_max_speed_hz(&mut self) -> io::Result<u32>;

    /// Run a single-segment message (`SPI_IOC_MESSAGE(1)`)
    ///
    /// Returns the number of bytes the driver reports as transferred.
    fn transfer(&mut self, segment: &mut Segment<'_>) -> io::Result<usize>;

    /// Largest message the driver accepts, if known
    fn max_transfer_len(&self) -> Option<usize> {
        None
    }
}

/// One full-duplex transfer segment
///
/// Mirrors the kernel's `struct spi_ioc_transfer`. `tx` and `rx` always have
/// the same length; the session allocates `rx` to match.
#[derive(Debug)]
pub struct Segment<'a> {
    /// Bytes to clock out
    pub tx: &'a [u8],
    /// Buffer for the bytes clocked in
    pub rx: &'a mut [u8],
    /// Clock rate override for this segment (0 = device default)
    pub speed_hz: u32,
    /// Delay after the segment, in microseconds
    pub delay_usecs: u16,
    /// Word size override for this segment (0 = device default)
    pub bits_per_word: u8,
    /// Deassert chip select after this segment
    pub cs_change: bool,
}

impl<'a> Segment<'a> {
    /// Create a segment with device-default parameters
    ///
    /// # Panics
    ///
    /// Panics if `tx` and `rx` differ in length.
    pub fn new(tx: &'a [u8], rx: &'a mut [u8]) -> Self {
        assert_eq!(tx.len(), rx.len(), "full-duplex buffers must match");
        Self {
            tx,
            rx,
            speed_hz: 0,
            delay_usecs: 0,
            bits_per_word: 0,
            cs_change: false,
        }
    }

    /// Number of bytes in each direction
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// Whether the segment moves no data
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}
