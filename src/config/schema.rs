//! Configuration schema definitions.
//!
//! `Config` is the resolved, typed view of every option. It is built once by
//! the loader and never mutated afterwards.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default config file, looked up relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "conf.json";

/// Largest accepted `read_limit`, in bytes.
pub const MAX_READ_LIMIT: usize = 64 * 1024;

/// Resolved configuration for the decoy listener.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port to listen on.
    pub port: u16,

    /// Bind interface. Empty means every IPv4 interface.
    pub interface: String,

    /// Static reply written to every connecting client.
    pub reply: String,

    /// Minimum spacing between two alert batches.
    pub cooldown: Duration,

    /// Handler names, in invocation order.
    pub handlers: Vec<String>,

    /// Interpreter or executable used to launch process handlers.
    pub handler_exec: PathBuf,

    /// Directory process handlers are resolved under.
    pub handlers_dir: PathBuf,

    /// Upper bound for the pre-reply read. Zero skips the read.
    /// Never above [`MAX_READ_LIMIT`].
    pub read_limit: usize,

    /// Request timeout for webhook handlers.
    pub webhook_timeout: Duration,

    pub log_format: LogFormat,

    /// Prometheus exporter bind address. Disabled when unset.
    pub metrics_address: Option<SocketAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8888,
            interface: String::new(),
            reply: "Hello, World!".to_string(),
            cooldown: Duration::from_secs(300),
            handlers: Vec::new(),
            handler_exec: PathBuf::from("/usr/bin/python3"),
            handlers_dir: PathBuf::from("handlers"),
            read_limit: 0,
            webhook_timeout: Duration::from_secs(10),
            log_format: LogFormat::Text,
            metrics_address: None,
        }
    }
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}' (expected text or json)", other)),
        }
    }
}
