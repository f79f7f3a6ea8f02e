//! Alert handler capability and the local-process transport.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use futures_util::future::BoxFuture;
use tokio::process::Command;

use crate::alert::payload::AlertPayload;
use crate::alert::webhook::WebhookHandler;
use crate::config::Config;

/// Future returned by [`AlertHandler::invoke`].
pub type HandlerFuture<'a> = BoxFuture<'a, Result<HandlerOutput, HandlerError>>;

/// Something that can be told about an intrusion attempt.
///
/// Implementations are independent of each other: one failing never stops
/// the dispatcher from calling the next.
pub trait AlertHandler: Send + Sync {
    /// Name used in logs and metric labels.
    fn name(&self) -> &str;

    fn invoke<'a>(&'a self, payload: &'a AlertPayload) -> HandlerFuture<'a>;
}

/// Whatever a handler printed while succeeding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Error type for handler construction and invocation.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("failed to encode alert payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to spawn {exec}: {source}")]
    Spawn {
        exec: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("handler exited unsuccessfully (code {code:?}): {stderr}")]
    Exit { code: Option<i32>, stderr: String },

    #[error("invalid webhook url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("webhook responded with status {0}")]
    Status(reqwest::StatusCode),
}

/// Runs `exec <handlers_dir>/<name> <payload json>` as a child process.
///
/// No shell is involved, so the payload reaches the handler as one argument
/// regardless of its content.
#[derive(Debug, Clone)]
pub struct ProcessHandler {
    name: String,
    exec: PathBuf,
    script: PathBuf,
}

impl ProcessHandler {
    pub fn new(name: impl Into<String>, exec: impl Into<PathBuf>, handlers_dir: &Path) -> Self {
        let name = name.into();
        let script = handlers_dir.join(&name);
        Self {
            name,
            exec: exec.into(),
            script,
        }
    }
}

impl AlertHandler for ProcessHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, payload: &'a AlertPayload) -> HandlerFuture<'a> {
        Box::pin(async move {
            let json = payload.to_json()?;

            let output = Command::new(&self.exec)
                .arg(&self.script)
                .arg(&json)
                .stdin(Stdio::null())
                .output()
                .await
                .map_err(|source| HandlerError::Spawn {
                    exec: self.exec.clone(),
                    source,
                })?;

            let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
            let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();

            if output.status.success() {
                Ok(HandlerOutput { stdout, stderr })
            } else {
                Err(HandlerError::Exit {
                    code: output.status.code(),
                    stderr,
                })
            }
        })
    }
}

/// Build the configured handlers, in order.
///
/// Names starting with `http://` or `https://` become webhooks; everything
/// else is a process handler under `handlers_dir`.
pub fn handlers_from_config(config: &Config) -> Result<Vec<Box<dyn AlertHandler>>, HandlerError> {
    let client = if config.handlers.iter().any(|name| WebhookHandler::accepts(name)) {
        Some(
            reqwest::Client::builder()
                .timeout(config.webhook_timeout)
                .build()?,
        )
    } else {
        None
    };

    config
        .handlers
        .iter()
        .map(|name| -> Result<Box<dyn AlertHandler>, HandlerError> {
            match &client {
                Some(client) if WebhookHandler::accepts(name) => {
                    Ok(Box::new(WebhookHandler::new(name, client.clone())?))
                }
                _ => Ok(Box::new(ProcessHandler::new(
                    name.as_str(),
                    config.handler_exec.as_path(),
                    &config.handlers_dir,
                ))),
            }
        })
        .collect()
}
