//! Cooldown-gated alert dispatch.
//!
//! # Invariant
//! At most one handler batch fires per cooldown window, no matter how many
//! sessions report an offender inside it. The window is global: two distinct
//! addresses in the same window share one alert.
//!
//! # Locking
//! The read-compare-update on `last_dispatch` runs under a mutex that is
//! released before any handler is awaited. The new instant is committed
//! before the handlers run, so a failing handler never reopens the window.

use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::alert::handler::{handlers_from_config, AlertHandler, HandlerError};
use crate::alert::payload::{local_hostname, AlertPayload};
use crate::config::Config;
use crate::observability::metrics;

pub struct Dispatcher {
    cooldown: Duration,
    hostname: String,
    handlers: Vec<Box<dyn AlertHandler>>,
    last_dispatch: Mutex<Option<Instant>>,
}

impl Dispatcher {
    pub fn new(cooldown: Duration, hostname: impl Into<String>, handlers: Vec<Box<dyn AlertHandler>>) -> Self {
        Self {
            cooldown,
            hostname: hostname.into(),
            handlers,
            last_dispatch: Mutex::new(None),
        }
    }

    /// Build a dispatcher for this host with the configured handlers.
    pub fn from_config(config: &Config) -> Result<Self, HandlerError> {
        let handlers = handlers_from_config(config)?;
        Ok(Self::new(config.cooldown, local_hostname(), handlers))
    }

    /// Report an offender now. Returns whether a handler batch fired.
    pub async fn maybe_dispatch(&self, offender: IpAddr) -> bool {
        self.maybe_dispatch_at(offender, Instant::now(), Local::now()).await
    }

    /// Report an offender seen at `now`, which is `seen_at` on the wall clock.
    ///
    /// `now` decides the cooldown and `seen_at` is the reported time. Fires
    /// when nothing has fired yet, or when strictly more than the cooldown has
    /// passed since the last batch. The window advances even if no handlers
    /// are configured.
    pub async fn maybe_dispatch_at(&self, offender: IpAddr, now: Instant, seen_at: DateTime<Local>) -> bool {
        if !self.try_claim(now) {
            tracing::debug!(offender = %offender, "Within cooldown window, alert suppressed");
            metrics::record_dispatch(false);
            return false;
        }
        metrics::record_dispatch(true);

        let payload = AlertPayload::new(self.hostname.as_str(), offender, seen_at);
        tracing::info!(
            offender = %payload.ip,
            handlers = self.handlers.len(),
            "Dispatching alert"
        );
        self.invoke_all(&payload).await;
        true
    }

    fn try_claim(&self, now: Instant) -> bool {
        // The guarded value is a plain instant, so a poisoned lock is still usable.
        let mut last = self
            .last_dispatch
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let elapsed = match *last {
            None => true,
            Some(previous) => now.saturating_duration_since(previous) > self.cooldown,
        };
        if elapsed {
            *last = Some(now);
        }
        elapsed
    }

    async fn invoke_all(&self, payload: &AlertPayload) {
        for handler in &self.handlers {
            match handler.invoke(payload).await {
                Ok(output) => {
                    tracing::info!(handler = handler.name(), "Handler succeeded");
                    if !output.stdout.is_empty() {
                        tracing::debug!(handler = handler.name(), stdout = %output.stdout, "Handler output");
                    }
                }
                Err(e) => {
                    tracing::warn!(handler = handler.name(), error = %e, "Handler failed");
                    metrics::record_handler_failure(handler.name());
                }
            }
        }
    }

    /// Instant of the last batch, if any fired.
    pub fn last_dispatch(&self) -> Option<Instant> {
        *self
            .last_dispatch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
