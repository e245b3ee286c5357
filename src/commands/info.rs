//! Info command implementation

use spilink_core::{SpiHandle, SpiSession};

/// Print the settings the driver accepted for `session`
pub fn run_info<H: SpiHandle>(
    backend: &str,
    session: &SpiSession<H>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = session.config();
    let flags = config.mode_flags();

    println!("SPI Session Information");
    println!("=======================");
    println!();
    println!("Backend:         {}", backend);
    println!("Device:          {}", config.device_path);
    println!(
        "Mode:            0x{:02X} (SPI mode {}{})",
        config.mode,
        flags.spi_mode(),
        extra_flags(flags)
    );
    println!("Bits per word:   {}", config.bits_per_word);
    println!(
        "Speed:           {} Hz ({} kHz)",
        config.speed_hz,
        config.speed_hz / 1000
    );
    println!("Delay:           {} us", config.delay_usecs);
    match session.max_transfer_len() {
        Some(len) => println!("Max transfer:    {} bytes", len),
        None => println!("Max transfer:    unlimited"),
    }

    Ok(())
}

/// Names of the mode bits beyond CPOL/CPHA, prefixed for display
fn extra_flags(flags: spilink_core::ModeFlags) -> String {
    use spilink_core::ModeFlags;

    let names: Vec<&str> = [
        (ModeFlags::CS_HIGH, "cs-high"),
        (ModeFlags::LSB_FIRST, "lsb-first"),
        (ModeFlags::THREE_WIRE, "3-wire"),
        (ModeFlags::LOOP, "loop"),
        (ModeFlags::NO_CS, "no-cs"),
        (ModeFlags::READY, "ready"),
    ]
    .iter()
    .filter(|(flag, _)| flags.contains(*flag))
    .map(|(_, name)| *name)
    .collect();

    if names.is_empty() {
        String::new()
    } else {
        format!(", {}", names.join(", "))
    }
}
