//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Resolve config → init logging → build dispatcher → bind → accept
//!     (any failure before accept exits with status 2)
//!
//! Termination (shutdown.rs):
//!     SIGINT/SIGTERM → stop the accept loop → exit 0
//! ```

pub mod shutdown;

pub use shutdown::{termination_signal, Shutdown};
