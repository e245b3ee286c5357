//! Backend registration
//!
//! This module lists the backends compiled into the binary and turns
//! backend-specific parameters into backend values.

use crate::options::{parse_int, OptionError, SESSION_KEYS};
use std::collections::HashMap;

/// Information about a backend
pub struct BackendInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available backends (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_backends() -> Vec<BackendInfo> {
    let mut backends = Vec::new();

    #[cfg(feature = "linux-spi")]
    backends.push(BackendInfo {
        name: "linux_spi",
        aliases: &["linux-spi", "spidev"],
        description: "Linux spidev interface (dev=/dev/spidevX.Y,mode=,bits=,speed=<Hz>,delay=<us>)",
    });

    #[cfg(feature = "dummy")]
    backends.push(BackendInfo {
        name: "dummy",
        aliases: &[],
        description: "In-memory spidev emulator (fill=<byte>,clock=<Hz>,bufsiz=<bytes>)",
    });

    backends
}

/// Generate help text listing all available backends
pub fn backend_help() -> String {
    let backends = available_backends();

    if backends.is_empty() {
        return "No backends available (recompile with backend features enabled)".to_string();
    }

    let mut help = String::from("Available backends:\n");
    for b in &backends {
        help.push_str(&format!("  {:10} - {}\n", b.name, b.description));
        if !b.aliases.is_empty() {
            help.push_str(&format!("  {:10}   aliases: {}\n", "", b.aliases.join(", ")));
        }
    }

    help
}

/// Resolve a backend name or alias to its primary name
pub fn find_backend(name: &str) -> Option<&'static str> {
    available_backends()
        .into_iter()
        .find(|b| b.name == name || b.aliases.contains(&name))
        .map(|b| b.name)
}

/// Log parameters that neither the session nor the backend understands
pub fn warn_unknown_params(
    backend: &str,
    params: &HashMap<String, String>,
    backend_keys: &[&str],
) {
    for (key, value) in params {
        if !SESSION_KEYS.contains(&key.as_str()) && !backend_keys.contains(&key.as_str()) {
            log::warn!("{}: Unknown option: {}={}", backend, key, value);
        }
    }
}

/// Keys understood by the dummy backend
#[cfg(feature = "dummy")]
pub const DUMMY_KEYS: &[&str] = &["fill", "clock", "bufsiz"];

/// Build a dummy controller from its parameters
#[cfg(feature = "dummy")]
pub fn dummy_backend(
    params: &HashMap<String, String>,
) -> Result<spilink_dummy::DummySpi, OptionError> {
    use spilink_dummy::{DummyConfig, DummySpi, Response};

    let mut config = DummyConfig::default();

    if let Some(value) = params.get("fill") {
        config.response = Response::Fill(parse_int("fill", value)? as u8);
    }
    if let Some(value) = params.get("clock") {
        config.base_clock_hz = parse_int("clock", value)? as u32;
    }
    if let Some(value) = params.get("bufsiz") {
        config.max_transfer_len = Some(parse_int("bufsiz", value)? as usize);
    }

    Ok(DummySpi::new(config))
}
