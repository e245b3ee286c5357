//! Backend string and profile parsing
//!
//! A backend string names a backend and optionally a list of parameters:
//!
//! ```text
//! linux_spi
//! linux_spi:dev=/dev/spidev0.1,mode=3,speed=1000000
//! dummy:fill=0xff,bits=16
//! ```
//!
//! The session keys (`dev`, `mode`, `bits`, `speed`, `delay`) are folded
//! into a [`SessionConfig`]. Integer values are parsed as 64-bit numbers and
//! then cut down to the width of their field, so `bits=500` becomes 244.
//! This matches how the values always behaved when they were handed to the
//! driver, and the effective value is logged.

use spilink_core::SessionConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Keys consumed by [`apply_session_params`]
pub const SESSION_KEYS: &[&str] = &["dev", "mode", "bits", "speed", "delay"];

/// Errors from parsing backend strings and profiles
#[derive(Debug, Error)]
pub enum OptionError {
    /// Parameter without `=`
    #[error("Invalid parameter format: '{0}' (expected key=value)")]
    Format(String),

    /// Value that is not a decimal or `0x` hex integer
    #[error("Invalid {key} value: {value}")]
    Number { key: String, value: String },

    /// Empty `dev=`
    #[error("No device specified. Use dev=/dev/spidevX.Y")]
    NoDevice,

    /// Backend name not compiled in
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    /// Profile file could not be read
    #[error("Failed to read profile {path}: {source}")]
    ProfileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Profile file is not a valid session profile
    #[error("Invalid profile {path}: {source}")]
    ProfileParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Parsed backend string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSpec {
    /// Backend name as given
    pub name: String,
    /// Key-value parameters
    pub params: HashMap<String, String>,
}

/// Parse a backend string into name and parameters
///
/// Format: "name" or "name:key1=value1,key2=value2"
pub fn parse_backend_spec(s: &str) -> Result<BackendSpec, OptionError> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));

    let mut params = HashMap::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            let (key, value) = opt
                .split_once('=')
                .ok_or_else(|| OptionError::Format(opt.to_string()))?;
            params.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    Ok(BackendSpec {
        name: name.trim().to_string(),
        params,
    })
}

/// Fold the session keys of `params` into `config`
pub fn apply_session_params(
    config: &mut SessionConfig,
    params: &HashMap<String, String>,
) -> Result<(), OptionError> {
    for (key, value) in params {
        match key.as_str() {
            "dev" => {
                if value.is_empty() {
                    return Err(OptionError::NoDevice);
                }
                config.device_path = value.clone();
            }
            "mode" => config.mode = truncated(key, value, |v| v as u8)?,
            "bits" => config.bits_per_word = truncated(key, value, |v| v as u8)?,
            "speed" => config.speed_hz = truncated(key, value, |v| v as u32)?,
            "delay" => config.delay_usecs = truncated(key, value, |v| v as u16)?,
            _ => {}
        }
    }
    Ok(())
}

/// Load a session profile from a TOML file
///
/// Fields missing from the file keep their defaults.
pub fn load_profile(path: &Path) -> Result<SessionConfig, OptionError> {
    let content = std::fs::read_to_string(path).map_err(|source| OptionError::ProfileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let config = toml::from_str(&content).map_err(|source| OptionError::ProfileParse {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("Loaded profile from {}", path.display());
    Ok(config)
}

/// Build the session configuration for a backend string and optional profile
pub fn session_config(
    spec: &BackendSpec,
    profile: Option<&Path>,
) -> Result<SessionConfig, OptionError> {
    let mut config = match profile {
        Some(path) => load_profile(path)?,
        None => SessionConfig::default(),
    };
    apply_session_params(&mut config, &spec.params)?;
    Ok(config)
}

/// Parse a signed decimal or `0x` hex integer
pub fn parse_int(key: &str, value: &str) -> Result<i64, OptionError> {
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };

    let invalid = || OptionError::Number {
        key: key.to_string(),
        value: value.to_string(),
    };

    let (radix, body) = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => (16, hex),
        None => (10, digits),
    };

    // from_str_radix takes its own sign, which would let "--5" through
    if body.starts_with(['+', '-']) {
        return Err(invalid());
    }

    i64::from_str_radix(body, radix)
        .map(|v| if negative { -v } else { v })
        .map_err(|_| invalid())
}

/// Parse `value` and cut it down to the field width with `cast`
fn truncated<T>(key: &str, value: &str, cast: fn(i64) -> T) -> Result<T, OptionError>
where
    T: Copy + Into<i64> + std::fmt::Display,
{
    let raw = parse_int(key, value)?;
    let field = cast(raw);
    if field.into() != raw {
        log::warn!("{}={} does not fit its field, using {}", key, raw, field);
    }
    Ok(field)
}
