//! Collaborator interfaces consumed by the session core.
//!
//! These are constructor-injected services owned by the embedder; the
//! defaults here log through `tracing` and accept everything. The core
//! holds no global mutable state.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Validates a raw API key. Called once when a session binds a credential.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    async fn validate(&self, api_key: &str) -> bool;
}

/// Accepts any non-empty credential. Embedders supply a real validator.
pub struct AcceptNonEmptyValidator;

#[async_trait]
impl CredentialValidator for AcceptNonEmptyValidator {
    async fn validate(&self, api_key: &str) -> bool {
        !api_key.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AuditSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub event_type: String,
    pub severity: AuditSeverity,
    /// Who acted: session id or client name.
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl AuditEvent {
    pub fn new(
        event_type: impl Into<String>,
        severity: AuditSeverity,
        subject: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            severity,
            subject: subject.into(),
            resource: None,
            action: action.into(),
            timestamp: Utc::now(),
            details: None,
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Receives structured audit events (authz failures, non-retryable upstream
/// errors).
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Default sink: structured log lines.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let payload = serde_json::to_string(&event).unwrap_or_default();
        match event.severity {
            AuditSeverity::Info => info!(target: "audit", "{payload}"),
            AuditSeverity::Warning => warn!(target: "audit", "{payload}"),
            AuditSeverity::Error => tracing::error!(target: "audit", "{payload}"),
        }
    }
}

/// Receives per-method counters and durations.
pub trait MetricsSink: Send + Sync {
    fn request_started(&self, method: &str);
    fn request_finished(&self, method: &str, duration: Duration, ok: bool);
}

/// Default sink: debug-level log lines.
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn request_started(&self, method: &str) {
        debug!(target: "metrics", "request started: {method}");
    }

    fn request_finished(&self, method: &str, duration: Duration, ok: bool) {
        debug!(
            target: "metrics",
            "request finished: {method} ({}ms, ok: {ok})",
            duration.as_millis()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_credentials_are_rejected() {
        let validator = AcceptNonEmptyValidator;
        assert!(!validator.validate("").await);
        assert!(!validator.validate("   ").await);
        assert!(validator.validate("lin_api_x").await);
    }

    #[test]
    fn audit_events_serialize_with_camel_case_fields() {
        let event = AuditEvent::new(
            "authzFailure",
            AuditSeverity::Warning,
            "session-1",
            "initialize",
        )
        .with_resource("tracker.issue");

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["eventType"], "authzFailure");
        assert_eq!(value["severity"], "warning");
        assert_eq!(value["resource"], "tracker.issue");
        assert!(value.get("details").is_none());
    }
}
