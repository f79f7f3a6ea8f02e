//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! environment (PORT, REPLY, ...)  ─┐
//! config file (conf.json / .toml) ─┼→ loader.rs (resolve per key, first hit wins)
//! built-in defaults               ─┘     → Config (typed, immutable)
//!                                         → shared via Arc with acceptor and dispatcher
//! ```
//!
//! # Design Decisions
//! - Config is resolved once at startup; there is no reload
//! - Any unparsable value is fatal before the socket is opened
//! - `handlers` always ends up as an ordered list, whatever the source

pub mod loader;
pub mod schema;

pub use loader::{load_config, resolve, split_handlers, ConfigError, FileConfig};
pub use schema::{Config, LogFormat, DEFAULT_CONFIG_PATH, MAX_READ_LIMIT};
