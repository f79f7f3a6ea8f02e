//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, one task per connection)
//!     → connection.rs (id, offender address, accept instant)
//!     → session.rs (report offender, optional read, reply, close)
//! ```
//!
//! # Design Decisions
//! - No connection limit; a slow client only holds its own task
//! - Accept errors are logged and the loop continues
//! - Nothing that happens in alerting changes what the client sees

pub mod connection;
pub mod listener;
pub mod session;

pub use connection::{ConnectionEvent, ConnectionId};
pub use listener::{accept_loop, AcceptSource, Acceptor, ListenerError};
pub use session::{respond, SessionOutcome, SessionSettings};
