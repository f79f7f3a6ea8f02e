//! Session responder: optional bounded read, one reply write, close.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::alert::Dispatcher;
use crate::net::connection::ConnectionEvent;
use crate::observability::metrics;

/// Longest client preview written to the debug log.
const PREVIEW_BYTES: usize = 128;

/// What a session needs besides its stream.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub reply: Arc<[u8]>,
    /// Bytes to read before replying. Zero skips the read.
    pub read_limit: usize,
}

/// How a session went. Never reported to the client.
#[derive(Debug, Default)]
pub struct SessionOutcome {
    pub bytes_read: usize,
    pub read_error: Option<io::ErrorKind>,
    pub write_error: Option<io::ErrorKind>,
}

impl SessionOutcome {
    /// Whether the reply write succeeded.
    pub fn replied(&self) -> bool {
        self.write_error.is_none()
    }
}

/// Drive one accepted connection.
///
/// The offender is reported to the dispatcher on its own task, so handler
/// latency never delays the reply.
pub async fn handle<S>(
    stream: S,
    event: ConnectionEvent,
    settings: SessionSettings,
    dispatcher: Arc<Dispatcher>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let offender = event.offender.ip();
    tokio::spawn(async move {
        dispatcher
            .maybe_dispatch_at(offender, event.accepted_at, event.seen_at)
            .await;
    });

    let outcome = respond(stream, &settings.reply, settings.read_limit).await;
    if outcome.replied() {
        tracing::debug!(
            connection_id = %event.id,
            offender = %event.offender,
            bytes_read = outcome.bytes_read,
            "Reply sent"
        );
    } else {
        metrics::record_write_failure();
        tracing::warn!(
            connection_id = %event.id,
            offender = %event.offender,
            error = ?outcome.write_error,
            "Reply could not be sent"
        );
    }
}

/// Reply to a client and close the stream.
///
/// The stream is consumed, so it is closed on every path: after a
/// successful write, after a read error and after a write error. A failed
/// write is not retried.
pub async fn respond<S>(mut stream: S, reply: &[u8], read_limit: usize) -> SessionOutcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut outcome = SessionOutcome::default();

    if read_limit > 0 {
        let mut buf = vec![0u8; read_limit];
        match stream.read(&mut buf).await {
            Ok(n) => {
                outcome.bytes_read = n;
                if n > 0 {
                    let preview = String::from_utf8_lossy(&buf[..n.min(PREVIEW_BYTES)]);
                    tracing::debug!(bytes = n, preview = %preview.escape_debug(), "Client sent data");
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Read before reply failed, replying anyway");
                outcome.read_error = Some(e.kind());
            }
        }
    }

    if let Err(e) = stream.write_all(reply).await {
        outcome.write_error = Some(e.kind());
    }

    if let Err(e) = stream.shutdown().await {
        tracing::trace!(error = %e, "Shutdown after reply failed");
    }
    drop(stream);

    outcome
}
