//! Transfer command implementation

use spilink_core::{SpiHandle, SpiSession};

/// Send `data` `count` times and print each reply
pub fn run_transfer<H: SpiHandle>(
    session: &mut SpiSession<H>,
    data: &[u8],
    count: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(max) = session.max_transfer_len() {
        if data.len() > max {
            log::warn!(
                "Transfer of {} bytes exceeds the driver buffer of {} bytes",
                data.len(),
                max
            );
        }
    }

    for i in 0..count {
        let rx = session.transfer(data)?;
        log::debug!("Transfer {}: {} bytes", i + 1, rx.len());
        println!("{}", format_hex(&rx));
    }

    Ok(())
}

/// Format bytes as space separated hex
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
