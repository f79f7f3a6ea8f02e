//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use decoy_honeypot::alert::{AlertHandler, AlertPayload, HandlerError, HandlerFuture, HandlerOutput};
use decoy_honeypot::{Acceptor, Config, Dispatcher, Shutdown};

/// Handler that records every payload it is given.
#[derive(Clone)]
pub struct RecordingHandler {
    name: String,
    fail: bool,
    calls: Arc<Mutex<Vec<AlertPayload>>>,
}

impl RecordingHandler {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    pub fn calls(&self) -> Vec<AlertPayload> {
        self.calls.lock().unwrap().clone()
    }

    pub fn boxed(&self) -> Box<dyn AlertHandler> {
        Box::new(self.clone())
    }
}

impl AlertHandler for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, payload: &'a AlertPayload) -> HandlerFuture<'a> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(payload.clone());
            if self.fail {
                Err(HandlerError::Exit {
                    code: Some(2),
                    stderr: "simulated failure".into(),
                })
            } else {
                Ok(HandlerOutput::default())
            }
        })
    }
}

/// A running decoy on an ephemeral loopback port.
pub struct Decoy {
    pub addr: SocketAddr,
    pub dispatcher: Arc<Dispatcher>,
    pub shutdown: Shutdown,
}

impl Drop for Decoy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn loopback_config() -> Config {
    Config {
        interface: "127.0.0.1".into(),
        port: 0,
        ..Config::default()
    }
}

/// Bind a decoy with the given handlers and start its accept loop.
pub async fn start_decoy(config: Config, handlers: Vec<Box<dyn AlertHandler>>) -> Decoy {
    let dispatcher = Arc::new(Dispatcher::new(config.cooldown, "decoy-test", handlers));
    start_decoy_with(config, dispatcher).await
}

pub async fn start_decoy_with(config: Config, dispatcher: Arc<Dispatcher>) -> Decoy {
    let acceptor = Acceptor::bind(&config).await.unwrap();
    let addr = acceptor.local_addr().unwrap();
    let shutdown = Shutdown::new();
    tokio::spawn(acceptor.run(Arc::clone(&dispatcher), shutdown.subscribe()));
    Decoy {
        addr,
        dispatcher,
        shutdown,
    }
}

/// Connect, optionally send `send`, and read until the decoy closes.
pub async fn exchange(addr: SocketAddr, send: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    if !send.is_empty() {
        stream.write_all(send).await.unwrap();
    }
    let mut received = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut received))
        .await
        .expect("decoy did not close the connection")
        .unwrap();
    received
}

/// Poll `probe` until it returns at least `count` or the deadline passes.
pub async fn wait_for<F>(count: usize, probe: F) -> usize
where
    F: Fn() -> usize,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let seen = probe();
        if seen >= count || tokio::time::Instant::now() >= deadline {
            return seen;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Minimal HTTP endpoint that stores each request body and answers `status`.
pub async fn start_webhook_sink(status: u16) -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let bodies = Arc::new(Mutex::new(Vec::new()));
    let sink = bodies.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let sink = sink.clone();
            tokio::spawn(async move {
                let body = read_http_body(&mut socket).await;
                sink.lock().unwrap().push(body);
                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
                    status
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, bodies)
}

async fn read_http_body(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(split) = text.find("\r\n\r\n") {
            let headers = &text[..split];
            let length = headers
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            let body = &buf[split + 4..];
            if body.len() >= length {
                return String::from_utf8_lossy(&body[..length]).to_string();
            }
        }
    }
    String::new()
}
