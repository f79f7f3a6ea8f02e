//! Per-connection identity and the event handed to a session.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Local};

/// Relaxed ordering is enough: ids only need to be unique.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection identifier, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next id.
    pub fn next() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One accepted connection: who connected and when.
///
/// Created by the acceptor, consumed by the session, never stored.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionEvent {
    pub id: ConnectionId,
    pub offender: SocketAddr,
    /// Monotonic accept instant, used for the cooldown check.
    pub accepted_at: Instant,
    /// Wall-clock accept time, reported in alerts.
    pub seen_at: DateTime<Local>,
}

impl ConnectionEvent {
    /// Stamp a connection from `offender` as accepted now.
    pub fn new(offender: SocketAddr) -> Self {
        Self {
            id: ConnectionId::next(),
            offender,
            accepted_at: Instant::now(),
            seen_at: Local::now(),
        }
    }
}
