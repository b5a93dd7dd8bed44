//! Security audit events.
//!
//! Handlers report protocol milestones (an assertion was issued, an
//! AuthnRequest was created, an issuer failed the trust check) as
//! [`AuditEvent`]s handed to an [`AuditSink`]. Auditing is optional: a chain
//! without a sink simply does not emit events.
//!
//! All events include:
//! - Timestamp (ISO 8601)
//! - Level and event type
//! - The auditing party (usually the application context path)
//! - The assertion or request identifier the event correlates to

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    /// The identity provider issued an assertion.
    CreatedAssertion,
    /// The service provider created an AuthnRequest.
    CreatedAssertionRequest,
    /// An issuer did not match any trusted domain.
    ErrorTrustedDomain,
    /// A received assertion was outside its validity window.
    ExpiredAssertion,
    /// The role validator rejected the extracted roles.
    InvalidRoles,
}

/// Severity of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    /// Normal protocol activity.
    Info,
    /// Security relevant failure.
    Error,
}

/// A security event for audit logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event identifier.
    pub id: Uuid,

    /// Timestamp of the event (ISO 8601).
    pub timestamp: DateTime<Utc>,

    /// Severity.
    pub level: AuditLevel,

    /// Type of event.
    pub event_type: AuditEventType,

    /// The party recording the event, e.g. the application context path.
    pub who_is_auditing: Option<String>,

    /// Assertion or request ID the event correlates to.
    pub assertion_id: Option<String>,

    /// Additional details as key-value pairs.
    pub details: Vec<(String, String)>,
}

impl AuditEvent {
    /// Creates a new event builder.
    #[must_use]
    pub const fn builder(event_type: AuditEventType) -> AuditEventBuilder {
        AuditEventBuilder::new(event_type)
    }
}

/// Builder for creating audit events.
pub struct AuditEventBuilder {
    event_type: AuditEventType,
    level: AuditLevel,
    who_is_auditing: Option<String>,
    assertion_id: Option<String>,
    details: Vec<(String, String)>,
}

impl AuditEventBuilder {
    /// Creates a new builder at [`AuditLevel::Info`].
    #[must_use]
    pub const fn new(event_type: AuditEventType) -> Self {
        Self {
            event_type,
            level: AuditLevel::Info,
            who_is_auditing: None,
            assertion_id: None,
            details: Vec::new(),
        }
    }

    /// Sets the level.
    #[must_use]
    pub const fn level(mut self, level: AuditLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets the auditing party.
    #[must_use]
    pub fn who_is_auditing(mut self, who: Option<impl Into<String>>) -> Self {
        self.who_is_auditing = who.map(Into::into);
        self
    }

    /// Sets the correlated assertion or request ID.
    #[must_use]
    pub fn assertion_id(mut self, id: impl Into<String>) -> Self {
        self.assertion_id = Some(id.into());
        self
    }

    /// Adds a detail key-value pair.
    #[must_use]
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.push((key.into(), value.into()));
        self
    }

    /// Builds the event.
    #[must_use]
    pub fn build(self) -> AuditEvent {
        AuditEvent {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            level: self.level,
            event_type: self.event_type,
            who_is_auditing: self.who_is_auditing,
            assertion_id: self.assertion_id,
            details: self.details,
        }
    }
}

/// Receiver of audit events.
///
/// Implementations must be cheap to call; handlers invoke them inline on
/// the request path.
pub trait AuditSink: Send + Sync {
    /// Records an event.
    fn audit(&self, event: AuditEvent);
}

/// Audit sink that writes events to the `audit` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn audit(&self, event: AuditEvent) {
        let who = event.who_is_auditing.as_deref().unwrap_or("-");
        let id = event.assertion_id.as_deref().unwrap_or("-");
        match event.level {
            AuditLevel::Info => tracing::info!(
                target: "audit",
                event_type = ?event.event_type,
                who_is_auditing = who,
                assertion_id = id,
                "audit event"
            ),
            AuditLevel::Error => tracing::error!(
                target: "audit",
                event_type = ?event.event_type,
                who_is_auditing = who,
                assertion_id = id,
                "audit event"
            ),
        }
    }
}

/// Audit sink that keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Returns the recorded events of the given type.
    #[must_use]
    pub fn events_of(&self, event_type: AuditEventType) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn audit(&self, event: AuditEvent) {
        self.events.lock().push(event);
    }
}
