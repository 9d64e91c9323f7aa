//! Critical error alerting layer for tracing.
//!
//! This layer intercepts high-severity events (SLO breaches, internal errors)
//! and dispatches them to a console or webhook channel off the request path.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Event, Subscriber};
use tracing_subscriber::{Layer, layer::Context};

/// Alert message containing error details.
#[derive(Debug, Clone)]
pub struct AlertMessage {
    pub level: String,
    pub message: String,
    pub target: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub fields: Vec<(String, String)>,
}

impl AlertMessage {
    fn fields_line(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Configuration for the alert layer.
#[derive(Debug, Clone)]
pub struct AlertConfig {
    /// Least severe level that triggers an alert (default: ERROR).
    pub min_level: tracing::Level,
    /// Channel buffer size; alerts beyond it are dropped.
    pub buffer_size: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            min_level: tracing::Level::ERROR,
            buffer_size: 100,
        }
    }
}

/// Trait for alert senders - implement this for different backends.
#[async_trait::async_trait]
pub trait AlertSender: Send + Sync {
    async fn send(&self, alert: AlertMessage) -> Result<(), AlertError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("Failed to send alert: {0}")]
    SendError(String),
}

/// Console alert sender - writes alerts to stderr (for development).
pub struct ConsoleAlertSender;

#[async_trait::async_trait]
impl AlertSender for ConsoleAlertSender {
    async fn send(&self, alert: AlertMessage) -> Result<(), AlertError> {
        eprintln!(
            "\n[ALERT] {} {}\n  target: {}\n  message: {}\n  fields: {}\n",
            alert.timestamp,
            alert.level,
            alert.target,
            alert.message,
            alert.fields_line()
        );
        Ok(())
    }
}

/// Webhook alert sender - posts alerts to a webhook URL (Slack, Discord, etc.).
pub struct WebhookAlertSender {
    url: String,
    client: reqwest::Client,
}

impl WebhookAlertSender {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl AlertSender for WebhookAlertSender {
    async fn send(&self, alert: AlertMessage) -> Result<(), AlertError> {
        let payload = serde_json::json!({
            "text": format!(
                "*{}* `{}`\n{}\n{}\n_{}_",
                alert.level, alert.target, alert.message, alert.fields_line(), alert.timestamp
            )
        });

        self.client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|e| AlertError::SendError(e.to_string()))?;

        Ok(())
    }
}

/// Tracing layer that forwards severe events to an [`AlertSender`].
pub struct AlertLayer {
    sender: mpsc::Sender<AlertMessage>,
    min_level: tracing::Level,
}

impl AlertLayer {
    /// Create a new alert layer with the given sender.
    ///
    /// Spawns the dispatcher task, so it must be called inside a Tokio runtime.
    pub fn new(config: AlertConfig, alert_sender: Arc<dyn AlertSender>) -> Self {
        let (tx, mut rx) = mpsc::channel::<AlertMessage>(config.buffer_size.max(1));

        tokio::spawn(async move {
            while let Some(alert) = rx.recv().await {
                // Not a tracing event: it would loop back into this layer.
                if let Err(e) = alert_sender.send(alert).await {
                    eprintln!("Failed to send alert: {}", e);
                }
            }
        });

        Self {
            sender: tx,
            min_level: config.min_level,
        }
    }

    pub fn console(config: AlertConfig) -> Self {
        Self::new(config, Arc::new(ConsoleAlertSender))
    }

    pub fn webhook(config: AlertConfig, url: String) -> Self {
        Self::new(config, Arc::new(WebhookAlertSender::new(url)))
    }
}

/// Visitor to extract fields from events.
#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields
                .push((field.name().to_string(), format!("{:?}", value)));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields
                .push((field.name().to_string(), value.to_string()));
        }
    }
}

impl<S> Layer<S> for AlertLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        // ERROR < WARN < ... in tracing's ordering
        if *event.metadata().level() > self.min_level {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let alert = AlertMessage {
            level: event.metadata().level().to_string(),
            message: visitor.message,
            target: event.metadata().target().to_string(),
            timestamp: chrono::Utc::now(),
            fields: visitor.fields,
        };

        // Never block the emitting thread; drop when the channel is full.
        let _ = self.sender.try_send(alert);
    }
}
