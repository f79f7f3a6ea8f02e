//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! acceptor, sessions, dispatcher:
//!     → logging.rs (structured events on stderr)
//!     → metrics.rs (counters, optional Prometheus endpoint)
//! ```

pub mod logging;
pub mod metrics;
