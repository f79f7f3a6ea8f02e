//! Decoy TCP listener that raises throttled alerts on every connection.

pub mod alert;
pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use alert::Dispatcher;
pub use config::Config;
pub use lifecycle::Shutdown;
pub use net::Acceptor;

/// Exit status for configuration and bind failures.
pub const FATAL_EXIT_CODE: u8 = 2;
