// crates/remote-storage-store-sqlite/src/eviction.rs
// ============================================================================
// Module: SQLite Eviction
// Description: Per-key version counting and oldest-first deletion.
// Purpose: Restore the retention bound inside the writer's transaction.
// Dependencies: remote-storage-core, rusqlite
// ============================================================================

//! ## Overview
//! Eviction deletes the oldest versions of exactly one key, ordered by
//! timestamp then surrogate id. It never deletes more than requested and
//! never touches another key; asking for more rows than exist deletes what
//! is there.

// ============================================================================
// SECTION: Imports
// ============================================================================

use remote_storage_core::RetentionPolicy;
use remote_storage_core::VersionKey;
use rusqlite::Connection;
use rusqlite::types::Value;

use crate::query::VersionFilter;
use crate::query::count_statement;
use crate::schema::VERSIONS_TABLE;
use crate::store::SqliteStoreError;

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Counts the versions stored under exactly `key`.
///
/// # Errors
///
/// Returns [`SqliteStoreError::Db`] on engine failures and
/// [`SqliteStoreError::Corrupt`] for a negative count.
pub fn count_versions(connection: &Connection, key: &VersionKey) -> Result<u64, SqliteStoreError> {
    let filter = VersionFilter::for_key(key);
    let mut stmt = connection
        .prepare_cached(&count_statement(&filter))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let count: i64 = stmt
        .query_row(filter.params(), |row| row.get(0))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    u64::try_from(count).map_err(|_| SqliteStoreError::Corrupt(format!("negative count for {key}")))
}

/// Deletes up to `count` of the oldest versions of `key`; returns the number
/// deleted.
///
/// # Errors
///
/// Returns [`SqliteStoreError::Db`] on engine failures.
pub fn evict_oldest(
    connection: &Connection,
    key: &VersionKey,
    count: u64,
) -> Result<u64, SqliteStoreError> {
    if count == 0 {
        return Ok(0);
    }
    let filter = VersionFilter::for_key(key);
    let sql = format!(
        "DELETE FROM {VERSIONS_TABLE} WHERE id IN (SELECT id FROM {VERSIONS_TABLE} {} ORDER BY \
         recorded_at ASC, id ASC LIMIT ?{})",
        filter.where_clause(),
        filter.len() + 1
    );
    let filter = filter.with_value(Value::Integer(i64::try_from(count).unwrap_or(i64::MAX)));
    let mut stmt =
        connection.prepare_cached(&sql).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let deleted =
        stmt.execute(filter.params()).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(u64::try_from(deleted).unwrap_or(u64::MAX))
}

/// Evicts whatever exceeds `policy` for `key`; returns the number deleted.
///
/// # Errors
///
/// Returns [`SqliteStoreError`] when counting or deletion fails.
pub fn enforce_retention(
    connection: &Connection,
    key: &VersionKey,
    policy: RetentionPolicy,
) -> Result<u64, SqliteStoreError> {
    let excess = policy.excess(count_versions(connection, key)?);
    evict_oldest(connection, key, excess)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
