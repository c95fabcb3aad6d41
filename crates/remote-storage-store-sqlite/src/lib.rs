// crates/remote-storage-store-sqlite/src/lib.rs
// ============================================================================
// Module: Remote Storage SQLite Store
// Description: Durable VersionStore implementation backed by SQLite.
// Purpose: Persist versions across restarts with WAL and hash verification.
// Dependencies: remote-storage-core, rusqlite
// ============================================================================

//! ## Overview
//! The `SQLite` backend stores every version in one append-only table whose
//! key columns are derived from the deployment's [`DimensionSchema`]. Writes
//! are serialized and evict each key's oldest excess versions in the same
//! transaction; reads run on a pooled set of connections.
//!
//! [`DimensionSchema`]: remote_storage_core::DimensionSchema

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod eviction;
pub mod query;
pub mod schema;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use query::VersionFilter;
pub use schema::SCHEMA_VERSION;
pub use store::MAX_COLLISION_BACKOFF_MS;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
pub use store::SqliteVersionStore;
