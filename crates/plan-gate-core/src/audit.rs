// crates/plan-gate-core/src/audit.rs
// ============================================================================
// Module: Plan Gate Audit Logging
// Description: Structured audit events for gate passes and artifact custody.
// Purpose: Emit JSON-line audit logs without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every policy load, gate decision, hash, signature, and verification emits
//! one [`AuditEvent`]. Sinks decide where events go: stderr, an append-only
//! file, memory (tests), or nowhere. Events carry digests and identifiers
//! only, never raw plan attributes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::Timestamp;

// ============================================================================
// SECTION: Event Names
// ============================================================================

/// Policy set finished loading.
pub const EVENT_POLICY_SET_LOADED: &str = "policy_set_loaded";
/// Gate verdict produced.
pub const EVENT_GATE_EVALUATED: &str = "gate_evaluated";
/// Artifact digest computed.
pub const EVENT_ARTIFACT_HASHED: &str = "artifact_hashed";
/// Signed artifact assembled.
pub const EVENT_ARTIFACT_SIGNED: &str = "artifact_signed";
/// Verification finished.
pub const EVENT_ARTIFACT_VERIFIED: &str = "artifact_verified";
/// Verification ran without an identity pin.
pub const EVENT_IDENTITY_NOT_PINNED: &str = "identity_not_pinned";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Audit event level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditLevel {
    /// Routine event.
    Info,
    /// Degraded posture the operator should notice.
    Warn,
    /// Failed operation.
    Error,
}

/// Audit event payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event level.
    pub level: AuditLevel,
    /// Event timestamp when supplied by the host.
    pub timestamp: Option<Timestamp>,
    /// Event-specific fields.
    pub fields: Map<String, Value>,
}

impl AuditEvent {
    /// Creates an event with no fields.
    #[must_use]
    pub fn new(event: &'static str, level: AuditLevel) -> Self {
        Self {
            event,
            level,
            timestamp: None,
            fields: Map::new(),
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub const fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Returns a field value.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for gate and custody events.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &AuditEvent);
}

impl<T: AuditSink + ?Sized> AuditSink for Arc<T> {
    fn record(&self, event: &AuditEvent) {
        (**self).record(event);
    }
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// Audit sink that keeps events in memory.
#[derive(Default)]
pub struct MemoryAuditSink {
    /// Recorded events.
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    /// Creates an empty memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns the recorded events with the given name.
    #[must_use]
    pub fn events_named(&self, name: &str) -> Vec<AuditEvent> {
        self.events().into_iter().filter(|event| event.event == name).collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}
