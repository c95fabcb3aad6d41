// crates/remote-storage-core/src/audit.rs
// ============================================================================
// Module: Remote Storage Audit Logging
// Description: Structured audit events for version store operations.
// Purpose: Emit redacted JSON-line audit records without a logging framework.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Backends emit one [`StoreAuditEvent`] per public operation. Events carry
//! the variable name, the outcome, and size counters; dimension values and
//! stored content are never logged. Sinks are pluggable so deployments can
//! route events to their own pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Store operation classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOperation {
    /// Version write.
    Store,
    /// Latest-match read.
    RetrieveLatest,
    /// Version count.
    RetrieveCount,
    /// Version history listing.
    History,
}

/// Operation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOutcome {
    /// Operation succeeded.
    Ok,
    /// Latest-match read found nothing and returned an empty result.
    NotFound,
    /// Operation failed.
    Error,
}

/// Version store audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct StoreAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Operation performed.
    pub operation: StoreOperation,
    /// Variable name of the key or query.
    pub variable_name: String,
    /// Operation outcome.
    pub outcome: StoreOutcome,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// True when a write needed its collision retry.
    pub retried: bool,
    /// Versions evicted by a write.
    pub evicted: u64,
    /// Canonical content size in bytes (writes and hits).
    pub content_bytes: Option<usize>,
}

/// Inputs required to construct a store audit event.
pub struct StoreAuditEventParams {
    /// Operation performed.
    pub operation: StoreOperation,
    /// Variable name of the key or query.
    pub variable_name: String,
    /// Operation outcome.
    pub outcome: StoreOutcome,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// True when a write needed its collision retry.
    pub retried: bool,
    /// Versions evicted by a write.
    pub evicted: u64,
    /// Canonical content size in bytes.
    pub content_bytes: Option<usize>,
}

impl StoreAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: StoreAuditEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "version_store",
            timestamp_ms,
            operation: params.operation,
            variable_name: params.variable_name,
            outcome: params.outcome,
            error_kind: params.error_kind,
            retried: params.retried,
            evicted: params.evicted,
            content_bytes: params.content_bytes,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for version store events.
pub trait StoreAuditSink: Send + Sync {
    /// Records an audit event.
    fn record(&self, event: &StoreAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl StoreAuditSink for StderrAuditSink {
    fn record(&self, event: &StoreAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<File>,
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

impl StoreAuditSink for FileAuditSink {
    fn record(&self, event: &StoreAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl StoreAuditSink for NoopAuditSink {
    fn record(&self, _event: &StoreAuditEvent) {}
}
