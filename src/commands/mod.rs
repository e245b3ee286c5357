//! CLI command implementations
//!
//! Commands take an already negotiated `SpiSession`, so they run the same
//! way against every backend.

mod info;
mod list;
mod transfer;

pub use info::run_info;
pub use list::list_backends;
pub use transfer::run_transfer;
