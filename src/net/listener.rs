//! TCP acceptor for the decoy port.
//!
//! # Responsibilities
//! - Resolve the configured interface and bind with a fixed backlog
//! - Accept connections forever, one spawned session each
//! - Keep accepting after a failed accept call

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::broadcast;

use crate::alert::Dispatcher;
use crate::config::Config;
use crate::net::connection::ConnectionEvent;
use crate::net::session::{self, SessionSettings};
use crate::observability::metrics;

/// Pending-connection queue length passed to `listen`.
pub const LISTEN_BACKLOG: u32 = 5;

/// Pause after a failed accept so a persistent error (e.g. out of file
/// descriptors) does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Error type for listener setup.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("failed to resolve interface '{interface}': {source}")]
    Resolve {
        interface: String,
        #[source]
        source: io::Error,
    },

    #[error("interface '{0}' did not resolve to any address")]
    NoAddress(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Where accepted connections come from.
pub trait AcceptSource: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn accept(&self) -> BoxFuture<'_, io::Result<(Self::Stream, SocketAddr)>>;
}

impl AcceptSource for TcpListener {
    type Stream = TcpStream;

    fn accept(&self) -> BoxFuture<'_, io::Result<(TcpStream, SocketAddr)>> {
        Box::pin(TcpListener::accept(self))
    }
}

/// Accepts connections on the decoy port and hands each to a session.
///
/// Sessions are unbounded: every accepted connection gets its own task and
/// the acceptor never waits for one to finish.
pub struct Acceptor {
    inner: TcpListener,
    settings: SessionSettings,
}

impl Acceptor {
    /// Bind to the configured interface and port.
    pub async fn bind(config: &Config) -> Result<Self, ListenerError> {
        let addr = resolve_bind_addr(&config.interface, config.port).await?;
        let inner = listen(addr).map_err(|source| ListenerError::Bind { addr, source })?;

        let local_addr = inner
            .local_addr()
            .map_err(|source| ListenerError::Bind { addr, source })?;
        tracing::info!(
            address = %local_addr,
            backlog = LISTEN_BACKLOG,
            "Listener bound"
        );

        Ok(Self {
            inner,
            settings: SessionSettings {
                reply: Arc::from(config.reply.as_bytes()),
                read_limit: config.read_limit,
            },
        })
    }

    /// Get the local address this acceptor is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Accept until `shutdown` fires or its sender is dropped.
    pub async fn run(self, dispatcher: Arc<Dispatcher>, shutdown: broadcast::Receiver<()>) {
        accept_loop(&self.inner, &self.settings, dispatcher, shutdown).await;
    }
}

/// Accept from `source` until `shutdown` fires, one spawned session per
/// connection. A failed accept is logged and the loop carries on.
pub async fn accept_loop<A>(
    source: &A,
    settings: &SessionSettings,
    dispatcher: Arc<Dispatcher>,
    mut shutdown: broadcast::Receiver<()>,
) where
    A: AcceptSource,
{
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Acceptor stopping");
                break;
            }
            accepted = source.accept() => match accepted {
                Ok((stream, peer)) => spawn_session(stream, peer, settings, &dispatcher),
                Err(e) => {
                    metrics::record_accept_error();
                    tracing::warn!(error = %e, "Accept failed, continuing");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
    }
}

fn spawn_session<S>(stream: S, peer: SocketAddr, settings: &SessionSettings, dispatcher: &Arc<Dispatcher>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let event = ConnectionEvent::new(peer);
    metrics::record_connection();
    tracing::info!(
        connection_id = %event.id,
        offender = %peer.ip(),
        port = peer.port(),
        "Connection attempt"
    );

    tokio::spawn(session::handle(
        stream,
        event,
        settings.clone(),
        Arc::clone(dispatcher),
    ));
}

fn listen(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    #[cfg(unix)]
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(LISTEN_BACKLOG)
}

/// Turn the configured interface into a socket address.
///
/// Empty means every IPv4 interface, an IP literal is used as is, and
/// anything else is looked up as a host name (first result wins).
pub async fn resolve_bind_addr(interface: &str, port: u16) -> Result<SocketAddr, ListenerError> {
    let interface = interface.trim();
    if interface.is_empty() {
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }
    if let Ok(ip) = interface.trim_matches(|c| c == '[' || c == ']').parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    let mut addrs = tokio::net::lookup_host((interface, port))
        .await
        .map_err(|source| ListenerError::Resolve {
            interface: interface.to_string(),
            source,
        })?;
    addrs
        .next()
        .ok_or_else(|| ListenerError::NoAddress(interface.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use std::net::Ipv6Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::AsyncReadExt;

    /// Listener that fails its first `failures` accepts.
    struct FlakySource {
        inner: TcpListener,
        failures: AtomicUsize,
        calls: AtomicUsize,
    }

    impl AcceptSource for FlakySource {
        type Stream = TcpStream;

        fn accept(&self) -> BoxFuture<'_, io::Result<(TcpStream, SocketAddr)>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if failing {
                return Box::pin(async { Err(io::Error::other("too many open files")) });
            }
            Box::pin(self.inner.accept())
        }
    }

    #[tokio::test]
    async fn empty_interface_binds_everything() {
        let addr = resolve_bind_addr("", 8888).await.unwrap();
        assert_eq!(addr, SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8888));
    }

    #[tokio::test]
    async fn literal_addresses_used_verbatim() {
        let v4 = resolve_bind_addr("127.0.0.1", 2222).await.unwrap();
        assert_eq!(v4, "127.0.0.1:2222".parse().unwrap());

        let v6 = resolve_bind_addr("[::1]", 2222).await.unwrap();
        assert_eq!(v6, SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 2222));
    }

    #[tokio::test]
    async fn occupied_port_is_a_bind_error() {
        let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = holder.local_addr().unwrap().port();
        let config = Config {
            interface: "127.0.0.1".into(),
            port,
            ..Config::default()
        };

        let err = Acceptor::bind(&config).await.err().unwrap();
        assert!(matches!(err, ListenerError::Bind { .. }));
    }

    #[tokio::test]
    async fn failed_accept_keeps_loop_running() {
        let inner = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = inner.local_addr().unwrap();
        let source = Arc::new(FlakySource {
            inner,
            failures: AtomicUsize::new(2),
            calls: AtomicUsize::new(0),
        });
        let settings = SessionSettings {
            reply: Arc::from(&b"Hello, World!"[..]),
            read_limit: 0,
        };
        let dispatcher = Arc::new(Dispatcher::new(Duration::from_secs(300), "decoy", Vec::new()));
        let shutdown = Shutdown::new();
        let receiver = shutdown.subscribe();

        let loop_source = Arc::clone(&source);
        let accept_task =
            tokio::spawn(async move { accept_loop(&*loop_source, &settings, dispatcher, receiver).await });

        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut received = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut received))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(received, b"Hello, World!");
        assert_eq!(source.failures.load(Ordering::SeqCst), 0);
        assert!(source.calls.load(Ordering::SeqCst) >= 3);

        shutdown.trigger();
        accept_task.await.unwrap();
    }
}
