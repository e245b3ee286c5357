//! spilink - Command-line access to SPI buses
//!
//! spilink opens a spidev node, negotiates the bus settings with the driver
//! and clocks bytes through it.
//!
//! # Architecture
//!
//! The work is split between three crates:
//! - **spilink-core** - `SessionConfig`, the `SpiSession` state machine and
//!   the `SpiBackend`/`SpiHandle` traits the session drives
//! - **spilink-linux** - the spidev ioctl backend
//! - **spilink-dummy** - an in-memory controller for testing without hardware
//!
//! The commands only see an `SpiSession`, so they run unchanged against
//! every backend.

mod backends;
mod cli;
mod commands;
mod options;

use clap::Parser;
use cli::{Cli, Commands, SessionArgs};
use options::OptionError;
use spilink_core::{SessionConfig, SpiBackend, SpiSession};

/// What to do with an open session
enum Action {
    Info,
    Transfer { data: Vec<u8>, count: u32 },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logger, RUST_LOG still takes precedence
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(cli.verbose)),
    )
    .init();

    match cli.command {
        Commands::Info { session } => with_backend(&session, Action::Info),
        Commands::Transfer {
            session,
            data,
            count,
        } => with_backend(&session, Action::Transfer { data, count }),
        Commands::ListBackends => {
            commands::list_backends();
            Ok(())
        }
    }
}

/// Default log filter for a `-v` count
fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Resolve the backend string, build its configuration and run `action`
fn with_backend(args: &SessionArgs, action: Action) -> Result<(), Box<dyn std::error::Error>> {
    let spec = options::parse_backend_spec(&args.backend)?;
    let config = options::session_config(&spec, args.profile.as_deref())?;

    match backends::find_backend(&spec.name) {
        #[cfg(feature = "linux-spi")]
        Some("linux_spi") => {
            backends::warn_unknown_params("linux_spi", &spec.params, &[]);
            run(&spilink_linux::LinuxSpi, config, action)
        }
        #[cfg(feature = "dummy")]
        Some("dummy") => {
            backends::warn_unknown_params("dummy", &spec.params, backends::DUMMY_KEYS);
            let spi = backends::dummy_backend(&spec.params)?;
            run(&spi, config, action)
        }
        _ => Err(OptionError::UnknownBackend(spec.name).into()),
    }
}

/// Open a session on `backend`, run `action` and close the session
fn run<B: SpiBackend>(
    backend: &B,
    config: SessionConfig,
    action: Action,
) -> Result<(), Box<dyn std::error::Error>> {
    log::debug!("Opening {} with {}", backend.name(), config);
    let mut session = SpiSession::open_and_configure(backend, config)?;

    let result = match action {
        Action::Info => commands::run_info(backend.name(), &session),
        Action::Transfer { data, count } => commands::run_transfer(&mut session, &data, count),
    };

    session.close();
    result
}
