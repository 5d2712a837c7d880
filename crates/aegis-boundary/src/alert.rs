//! Structured alerts for the external notification front-end
//!
//! The gate only produces alerts; rendering and delivery (chat, native
//! notifications) belong to whoever subscribes.

use aegis_types::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::broadcast;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Kill switch halted autonomous execution
    KillSwitchActivated,
    /// Kill switch decided warning only
    KillSwitchWarning,
    /// Golden test moved to quarantine
    TestQuarantined,
    /// Coverage gap or decline
    CoverageWarning,
}

/// Alert payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Alert kind
    pub kind: AlertKind,
    /// Severity of the triggering condition
    pub severity: Severity,
    /// Affected scope
    pub scope: String,
    /// Human-readable summary
    pub message: String,
    /// When the alert was raised
    pub raised_at: DateTime<Utc>,
    /// Structured details (decision record, test id, ...)
    #[serde(default)]
    pub details: serde_json::Value,
}

impl Alert {
    /// Create new alert
    #[must_use]
    pub fn new(
        kind: AlertKind,
        severity: Severity,
        scope: impl Into<String>,
        message: impl Into<String>,
        raised_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            severity,
            scope: scope.into(),
            message: message.into(),
            raised_at,
            details: serde_json::Value::Null,
        }
    }

    /// With structured details
    #[inline]
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Notification channel
#[async_trait::async_trait]
pub trait AlertSink: Send + Sync + Debug {
    /// Deliver an alert; delivery failures are the sink's concern
    async fn emit(&self, alert: Alert);
}

/// Sink that writes alerts to the tracing pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

#[async_trait::async_trait]
impl AlertSink for TracingAlertSink {
    async fn emit(&self, alert: Alert) {
        match alert.kind {
            AlertKind::KillSwitchActivated => tracing::error!(
                "ALERT {:?} [{}] scope={}: {}",
                alert.kind,
                alert.severity,
                alert.scope,
                alert.message
            ),
            _ => tracing::warn!(
                "ALERT {:?} [{}] scope={}: {}",
                alert.kind,
                alert.severity,
                alert.scope,
                alert.message
            ),
        }
    }
}

/// Sink that fans alerts out to in-process subscribers
#[derive(Debug, Clone)]
pub struct BroadcastAlertSink {
    sender: broadcast::Sender<Alert>,
}

impl BroadcastAlertSink {
    /// Create sink buffering up to `capacity` undelivered alerts per subscriber
    #[inline]
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to future alerts
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastAlertSink {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait::async_trait]
impl AlertSink for BroadcastAlertSink {
    async fn emit(&self, alert: Alert) {
        // No subscribers is not an error
        if self.sender.send(alert).is_err() {
            tracing::debug!("Alert dropped: no subscribers");
        }
    }
}

/// Sink delivering to several sinks in order
#[derive(Debug, Clone, Default)]
pub struct FanoutAlertSink {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl FanoutAlertSink {
    /// Create empty fan-out
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    #[inline]
    #[must_use]
    pub fn with(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait::async_trait]
impl AlertSink for FanoutAlertSink {
    async fn emit(&self, alert: Alert) {
        for sink in &self.sinks {
            sink.emit(alert.clone()).await;
        }
    }
}
