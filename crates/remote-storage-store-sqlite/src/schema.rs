// crates/remote-storage-store-sqlite/src/schema.rs
// ============================================================================
// Module: SQLite Schema Manager
// Description: Idempotent creation and validation of the version table.
// Purpose: Own the table layout derived from the deployment's dimensions.
// Dependencies: remote-storage-core, rusqlite, serde_json
// ============================================================================

//! ## Overview
//! The store keeps one append-only table, `variable_versions`, with one
//! `dim_<name>` column per configured dimension. A `store_meta` row records
//! the schema version and the dimension list the table was created with;
//! reopening with a different version or layout fails closed instead of
//! migrating silently.

// ============================================================================
// SECTION: Imports
// ============================================================================

use remote_storage_core::DimensionName;
use remote_storage_core::DimensionSchema;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;

use crate::store::SqliteStoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
pub const SCHEMA_VERSION: i64 = 1;
/// Name of the version table.
pub const VERSIONS_TABLE: &str = "variable_versions";

// ============================================================================
// SECTION: Layout
// ============================================================================

/// Returns the column name holding `dimension`.
#[must_use]
pub fn dimension_column(dimension: &DimensionName) -> String {
    format!("dim_{dimension}")
}

/// Returns the key columns in canonical order (name, then dimensions).
fn key_columns(schema: &DimensionSchema) -> Vec<String> {
    std::iter::once("variable_name".to_string())
        .chain(schema.names().iter().map(dimension_column))
        .collect()
}

/// Renders the table and index DDL for `schema`.
fn create_statements(schema: &DimensionSchema) -> String {
    let dimension_columns: String = schema
        .names()
        .iter()
        .map(|name| format!("{} TEXT NOT NULL DEFAULT '',\n", dimension_column(name)))
        .collect();
    let mut unique_columns = key_columns(schema);
    unique_columns.push("recorded_at".to_string());
    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {VERSIONS_TABLE} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            variable_name TEXT NOT NULL,
            {dimension_columns}recorded_at REAL NOT NULL,
            content TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            hash_algorithm TEXT NOT NULL,
            UNIQUE ({})
        );\n",
        unique_columns.join(", ")
    );
    for column in unique_columns {
        sql.push_str(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{VERSIONS_TABLE}_{column} ON {VERSIONS_TABLE} \
             ({column});\n"
        ));
    }
    sql
}

/// Serializes the dimension list recorded in `store_meta`.
fn layout_label(schema: &DimensionSchema) -> Result<String, SqliteStoreError> {
    serde_json::to_string(schema).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

// ============================================================================
// SECTION: Initialization
// ============================================================================

/// Initializes the `SQLite` schema or validates the existing one.
///
/// # Errors
///
/// Returns [`SqliteStoreError::VersionMismatch`] when the database was created
/// with another schema version or dimension list, and
/// [`SqliteStoreError::Db`] on engine failures.
pub fn initialize_schema(
    connection: &mut Connection,
    schema: &DimensionSchema,
) -> Result<(), SqliteStoreError> {
    let expected_layout = layout_label(schema)?;
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS store_meta (
            schema_version INTEGER NOT NULL,
            dimensions TEXT NOT NULL
        );",
    )
    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let recorded: Option<(i64, String)> = tx
        .query_row("SELECT schema_version, dimensions FROM store_meta LIMIT 1", params![], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match recorded {
        None => {
            tx.execute(
                "INSERT INTO store_meta (schema_version, dimensions) VALUES (?1, ?2)",
                params![SCHEMA_VERSION, expected_layout],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some((version, _)) if version != SCHEMA_VERSION => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {version}"
            )));
        }
        Some((_, layout)) if layout != expected_layout => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "dimension layout mismatch: store has {layout}, configured {expected_layout}"
            )));
        }
        Some(_) => {}
    }
    tx.execute_batch(&create_statements(schema))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
