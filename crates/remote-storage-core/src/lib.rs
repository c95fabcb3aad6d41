// crates/remote-storage-core/src/lib.rs
// ============================================================================
// Module: Remote Storage Core Library
// Description: Public API surface for the versioned key-value store core.
// Purpose: Expose key, time, content types, the store contract, and runtime helpers.
// Dependencies: crate::{audit, core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Remote storage keeps every write of a variable as a new timestamped
//! version under a composite key (variable name plus deployment-defined
//! dimensions). Readers ask for the newest version matching a partial key and
//! an optional time window. Each key retains a bounded number of versions.
//!
//! This crate is backend-agnostic: durable storage lives in separate crates
//! that implement [`VersionStore`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use audit::StoreAuditEvent;
pub use audit::StoreAuditEventParams;
pub use audit::StoreAuditSink;
pub use audit::StoreOperation;
pub use audit::StoreOutcome;
pub use interfaces::LatestQuery;
pub use interfaces::NotFoundPolicy;
pub use interfaces::StoreError;
pub use interfaces::StoreReceipt;
pub use interfaces::VersionStore;
pub use interfaces::VersionSummary;
pub use runtime::DEFAULT_COLLISION_BACKOFF;
pub use runtime::DEFAULT_MAX_VERSIONS;
pub use runtime::InMemoryVersionStore;
pub use runtime::InsertAttempt;
pub use runtime::RetentionPolicy;
pub use runtime::insert_with_retry;
