//! Operator notifications
//!
//! Best-effort delivery of short operational alerts (low API key count, test
//! pings from the admin routes). Delivery goes through a JSON webhook so the
//! alert can be routed to mail, chat, or any other channel by the receiver.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while delivering a notification
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notification endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// A short alert for the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub subject: String,
    pub text: String,
}

impl Notification {
    pub fn new(subject: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            text: text.into(),
        }
    }

    /// The ping sent by `POST /api/game/notify`
    pub fn test_ping() -> Self {
        Self::new(
            "QuestGPT: Test Notification",
            "This is a test notification from QuestGPT. If you're seeing this, the notification system is working correctly.",
        )
    }
}

/// Something that can deliver a [`Notification`]
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

// ============================================================================
// Webhook Sender
// ============================================================================

#[derive(Serialize)]
struct WebhookPayload<'a> {
    subject: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    recipient: Option<&'a str>,
    sent_at: String,
}

/// Posts notifications as JSON to a configured URL
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
    recipient: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, recipient: Option<String>) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            url: url.into(),
            recipient,
        })
    }
}

#[async_trait]
impl NotificationSender for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            subject: &notification.subject,
            text: &notification.text,
            recipient: self.recipient.as_deref(),
            sent_at: chrono::Utc::now().to_rfc3339(),
        };

        tracing::debug!(subject = %notification.subject, "Posting notification webhook");

        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(subject = %notification.subject, "Notification delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use std::sync::{Arc, Mutex};

    async fn spawn_receiver(status: StatusCode) -> (String, Arc<Mutex<Vec<serde_json::Value>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let app = Router::new().route(
            "/hook",
            post(move |Json(body): Json<serde_json::Value>| {
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push(body);
                    status
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/hook", addr), received)
    }

    #[tokio::test]
    async fn test_webhook_delivers_payload() {
        let (url, received) = spawn_receiver(StatusCode::OK).await;
        let notifier = WebhookNotifier::new(url, Some("ops@example.com".to_string())).unwrap();

        notifier
            .send(&Notification::new("Low keys", "Only 1 key left"))
            .await
            .unwrap();

        let bodies = received.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["subject"], "Low keys");
        assert_eq!(bodies[0]["text"], "Only 1 key left");
        assert_eq!(bodies[0]["recipient"], "ops@example.com");
    }

    #[tokio::test]
    async fn test_webhook_rejection_is_an_error() {
        let (url, _) = spawn_receiver(StatusCode::BAD_GATEWAY).await;
        let notifier = WebhookNotifier::new(url, None).unwrap();

        let err = notifier.send(&Notification::test_ping()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { status: 502, .. }));
    }
}
