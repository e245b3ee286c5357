//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal byte
fn parse_byte(s: &str) -> Result<u8, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex byte: {}", e))
    } else {
        s.parse::<u8>().map_err(|e| format!("Invalid byte: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "spilink")]
#[command(author, version, about = "SPI bus access through spidev", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Session options shared across commands
#[derive(clap::Args, Debug, Clone)]
pub struct SessionArgs {
    /// Backend to use, with optional parameters
    /// (e.g. linux_spi:dev=/dev/spidev0.1,mode=3,bits=8,speed=1000000,delay=0)
    #[arg(short, long, default_value = "linux_spi")]
    pub backend: String,

    /// Session profile (TOML format), overridden by backend parameters
    #[arg(long)]
    pub profile: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open a session and show the settings the driver accepted
    Info {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Clock bytes out and print the bytes clocked in
    Transfer {
        #[command(flatten)]
        session: SessionArgs,

        /// Bytes to send (hex with 0x prefix, or decimal)
        #[arg(required = true, value_parser = parse_byte)]
        data: Vec<u8>,

        /// Repeat the transfer this many times
        #[arg(short = 'n', long, default_value = "1")]
        count: u32,
    },

    /// List available backends
    ListBackends,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_byte() {
        assert_eq!(parse_byte("0xA5"), Ok(0xA5));
        assert_eq!(parse_byte("255"), Ok(255));
        assert!(parse_byte("256").is_err());
        assert!(parse_byte("0x").is_err());
    }

    #[test]
    fn test_transfer_args() {
        let cli = Cli::parse_from([
            "spilink",
            "-vv",
            "transfer",
            "-b",
            "dummy:speed=1000000",
            "0x9f",
            "0",
            "0",
            "-n",
            "2",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Transfer {
                session,
                data,
                count,
            } => {
                assert_eq!(session.backend, "dummy:speed=1000000");
                assert!(session.profile.is_none());
                assert_eq!(data, vec![0x9F, 0x00, 0x00]);
                assert_eq!(count, 2);
            }
            _ => panic!("expected transfer"),
        }
    }

    #[test]
    fn test_default_backend() {
        let cli = Cli::parse_from(["spilink", "info"]);
        match cli.command {
            Commands::Info { session } => assert_eq!(session.backend, "linux_spi"),
            _ => panic!("expected info"),
        }
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
