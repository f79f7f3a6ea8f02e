//! Webhook alert transport: POSTs the payload as JSON.
//!
//! The body carries the three payload fields plus a `text` summary, which is
//! the field chat incoming-webhooks (Slack, Mattermost) display.

use reqwest::{Client, Url};
use serde::Serialize;

use crate::alert::handler::{AlertHandler, HandlerError, HandlerFuture, HandlerOutput};
use crate::alert::payload::AlertPayload;

#[derive(Serialize)]
struct WebhookBody<'a> {
    text: String,
    #[serde(flatten)]
    payload: &'a AlertPayload,
}

impl<'a> WebhookBody<'a> {
    fn new(payload: &'a AlertPayload) -> Self {
        Self {
            text: payload.summary(),
            payload,
        }
    }
}

pub struct WebhookHandler {
    url: Url,
    // Webhook URLs usually embed a secret, so only scheme and host are logged.
    display_name: String,
    client: Client,
}

impl WebhookHandler {
    /// Whether a configured handler name designates a webhook.
    pub fn accepts(name: &str) -> bool {
        name.starts_with("http://") || name.starts_with("https://")
    }

    pub fn new(url: &str, client: Client) -> Result<Self, HandlerError> {
        let parsed = Url::parse(url).map_err(|e| HandlerError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let host = parsed.host_str().ok_or_else(|| HandlerError::InvalidUrl {
            url: url.to_string(),
            reason: "missing host".to_string(),
        })?;
        let display_name = match parsed.port() {
            Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
            None => format!("{}://{}", parsed.scheme(), host),
        };

        Ok(Self {
            url: parsed,
            display_name,
            client,
        })
    }
}

impl AlertHandler for WebhookHandler {
    fn name(&self) -> &str {
        &self.display_name
    }

    fn invoke<'a>(&'a self, payload: &'a AlertPayload) -> HandlerFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.url.clone())
                .json(&WebhookBody::new(payload))
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(HandlerError::Status(status));
            }

            let body = response.text().await.unwrap_or_default();
            Ok(HandlerOutput {
                stdout: body,
                stderr: String::new(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_http_names_are_webhooks() {
        assert!(WebhookHandler::accepts("https://hooks.example.com/x"));
        assert!(WebhookHandler::accepts("http://127.0.0.1:9000/alert"));
        assert!(!WebhookHandler::accepts("emailer.py"));
        assert!(!WebhookHandler::accepts("slack_notify.py"));
    }

    #[test]
    fn name_hides_path_and_query() {
        let handler =
            WebhookHandler::new("http://127.0.0.1:9000/services/SECRET?token=abc", Client::new()).unwrap();
        assert_eq!(handler.name(), "http://127.0.0.1:9000");
    }

    #[test]
    fn body_has_text_and_payload_fields() {
        let payload = AlertPayload {
            hostname: "decoy-01".into(),
            ip: "198.51.100.9".into(),
            time: "2024-03-01T12:30:00.000000+00:00".into(),
        };
        let body = serde_json::to_value(WebhookBody::new(&payload)).unwrap();

        assert_eq!(body["text"], payload.summary());
        assert_eq!(body["hostname"], "decoy-01");
        assert_eq!(body["ip"], "198.51.100.9");
        assert_eq!(body["time"], "2024-03-01T12:30:00.000000+00:00");
    }

    #[test]
    fn malformed_url_rejected() {
        assert!(matches!(
            WebhookHandler::new("https://", Client::new()),
            Err(HandlerError::InvalidUrl { .. })
        ));
    }
}
