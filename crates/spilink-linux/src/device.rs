//! Linux spidev handle
//!
//! This module provides `LinuxSpi`, the `SpiBackend` that opens
//! `/dev/spidevX.Y` nodes, and `LinuxSpiHandle`, the open node, which maps
//! each `SpiHandle` method onto one spidev ioctl.

use spilink_core::{Segment, SpiBackend, SpiHandle};

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;

/// Path to kernel spidev buffer size parameter
const BUF_SIZE_SYSFS: &str = "/sys/module/spidev/parameters/bufsiz";

/// Linux spidev ioctl constants
mod ioctl {
    use nix::ioctl_read;
    use nix::ioctl_write_ptr;

    // SPI ioctl magic number
    const SPI_IOC_MAGIC: u8 = b'k';

    // SPI ioctl type numbers
    const SPI_IOC_TYPE_MESSAGE: u8 = 0;
    const SPI_IOC_TYPE_MODE: u8 = 1;
    const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
    const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;

    // Generate ioctl functions
    ioctl_read!(spi_ioc_rd_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_write_ptr!(spi_ioc_wr_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_read!(
        spi_ioc_rd_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_write_ptr!(
        spi_ioc_wr_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_read!(
        spi_ioc_rd_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );
    ioctl_write_ptr!(
        spi_ioc_wr_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );

    /// Calculate ioctl number for SPI_IOC_MESSAGE(n)
    ///
    /// SPI_IOC_MESSAGE(n) = _IOW(SPI_IOC_MAGIC, 0, char[n * sizeof(struct spi_ioc_transfer)])
    pub fn spi_ioc_message(n: u32) -> libc::c_ulong {
        let size = n * core::mem::size_of::<super::SpiIocTransfer>() as u32;
        // _IOC(dir, type, nr, size) = ((dir)<<30)|((size)<<16)|((type)<<8)|(nr)
        // _IOC_WRITE = 1
        ((1u32 << 30)
            | (size << 16)
            | ((SPI_IOC_MAGIC as u32) << 8)
            | SPI_IOC_TYPE_MESSAGE as u32) as libc::c_ulong
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

impl SpiIocTransfer {
    /// Describe `segment` to the kernel
    ///
    /// The returned struct holds raw pointers into the segment's buffers, so
    /// it must not outlive the borrow of `segment`.
    fn from_segment(segment: &mut Segment<'_>) -> io::Result<Self> {
        Ok(Self {
            tx_buf: segment.tx.as_ptr() as u64,
            rx_buf: segment.rx.as_mut_ptr() as u64,
            len: message_len(segment.len())?,
            speed_hz: segment.speed_hz,
            delay_usecs: segment.delay_usecs,
            bits_per_word: segment.bits_per_word,
            cs_change: segment.cs_change as u8,
            ..Default::default()
        })
    }
}

/// Length field of `spi_ioc_transfer`, which is only 32 bits wide
fn message_len(len: usize) -> io::Result<u32> {
    u32::try_from(len).map_err(|_| io::Error::from_raw_os_error(libc::EMSGSIZE))
}

/// Backend for `/dev/spidevX.Y` nodes
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxSpi;

impl SpiBackend for LinuxSpi {
    type Handle = LinuxSpiHandle;

    fn name(&self) -> &'static str {
        "linux_spi"
    }

    fn open(&self, path: &str) -> io::Result<LinuxSpiHandle> {
        LinuxSpiHandle::open(path)
    }
}

/// An open spidev node
///
/// The file descriptor is closed when the handle is dropped.
#[derive(Debug)]
pub struct LinuxSpiHandle {
    /// File handle for spidev device
    file: File,
    /// Maximum kernel buffer size
    max_kernel_buf_size: usize,
}

impl LinuxSpiHandle {
    /// Open a spidev node for reading and writing
    pub fn open(path: &str) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let max_kernel_buf_size = get_max_kernel_buf_size();
        log::debug!(
            "linux_spi: Max kernel buffer size: {} bytes",
            max_kernel_buf_size
        );

        Ok(Self {
            file,
            max_kernel_buf_size,
        })
    }
}

fn errno(e: nix::errno::Errno) -> io::Error {
    io::Error::from_raw_os_error(e as i32)
}

impl SpiHandle for LinuxSpiHandle {
    fn write_mode(&mut self, mode: u8) -> io::Result<()> {
        let fd = self.file.as_raw_fd();
        unsafe {
            ioctl::spi_ioc_wr_mode(fd, &mode).map_err(errno)?;
        }
        Ok(())
    }

    fn read_mode(&mut self) -> io::Result<u8> {
        let fd = self.file.as_raw_fd();
        let mut mode = 0u8;
        unsafe {
            ioctl::spi_ioc_rd_mode(fd, &mut mode).map_err(errno)?;
        }
        Ok(mode)
    }

    fn write_bits_per_word(&mut self, bits: u8) -> io::Result<()> {
        let fd = self.file.as_raw_fd();
        unsafe {
            ioctl::spi_ioc_wr_bits_per_word(fd, &bits).map_err(errno)?;
        }
        Ok(())
    }

    fn read_bits_per_word(&mut self) -> io::Result<u8> {
        let fd = self.file.as_raw_fd();
        let mut bits = 0u8;
        unsafe {
            ioctl::spi_ioc_rd_bits_per_word(fd, &mut bits).map_err(errno)?;
        }
        Ok(bits)
    }

    fn write_max_speed_hz(&mut self, speed_hz: u32) -> io::Result<()> {
        let fd = self.file.as_raw_fd();
        unsafe {
            ioctl::spi_ioc_wr_max_speed_hz(fd, &speed_hz).map_err(errno)?;
        }
        Ok(())
    }

    fn read_max_speed_hz(&mut self) -> io::Result<u32> {
        let fd = self.file.as_raw_fd();
        let mut speed_hz = 0u32;
        unsafe {
            ioctl::spi_ioc_rd_max_speed_hz(fd, &mut speed_hz).map_err(errno)?;
        }
        Ok(speed_hz)
    }

    fn transfer(&mut self, segment: &mut Segment<'_>) -> io::Result<usize> {
        let fd = self.file.as_raw_fd();
        let xfer = SpiIocTransfer::from_segment(segment)?;

        // Perform ioctl
        let request = ioctl::spi_ioc_message(1);
        let ret = unsafe { libc::ioctl(fd, request as _, &xfer as *const SpiIocTransfer) };

        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(ret as usize)
    }

    fn max_transfer_len(&self) -> Option<usize> {
        Some(self.max_kernel_buf_size)
    }
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
