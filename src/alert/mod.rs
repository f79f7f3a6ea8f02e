//! Alerting subsystem.
//!
//! # Data Flow
//! ```text
//! session reports offender address
//!     → dispatcher.rs (global cooldown gate, one batch per window)
//!     → payload.rs (hostname, ip, time)
//!     → handler.rs (each configured handler, in order)
//!         ├─ ProcessHandler: handler_exec <handlers_dir>/<name> '<json>'
//!         └─ webhook.rs: POST <url> with the json body
//! ```
//!
//! # Design Decisions
//! - The cooldown is global, not per address
//! - Handlers are independent; a failure is logged and the next one runs
//! - Handler outcomes never reach the connecting client

pub mod dispatcher;
pub mod handler;
pub mod payload;
pub mod webhook;

pub use dispatcher::Dispatcher;
pub use handler::{AlertHandler, HandlerError, HandlerFuture, HandlerOutput, ProcessHandler};
pub use payload::AlertPayload;
pub use webhook::WebhookHandler;
