// crates/remote-storage-core/src/runtime/mod.rs
// ============================================================================
// Module: Remote Storage Runtime
// Description: Write protocol, retention arithmetic, and the in-memory store.
// Purpose: Share backend-independent store behavior.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules hold the parts of the write path every backend must
//! agree on: the single collision retry and the per-key retention cap. The
//! in-memory store composes them into a complete [`crate::VersionStore`].

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod retention;
pub mod store;
pub mod writer;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use retention::DEFAULT_MAX_VERSIONS;
pub use retention::RetentionPolicy;
pub use store::InMemoryVersionStore;
pub use writer::DEFAULT_COLLISION_BACKOFF;
pub use writer::InsertAttempt;
pub use writer::insert_with_retry;
