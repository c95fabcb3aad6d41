// crates/remote-storage-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Version Store
// Description: Durable VersionStore backed by SQLite WAL.
// Purpose: Persist timestamped versions with bounded per-key retention.
// Dependencies: remote-storage-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`VersionStore`] using `SQLite`. Each
//! write appends one row to an append-only version table, then evicts the
//! key's oldest excess rows in the same transaction. Writes go through a
//! single mutex-guarded connection; reads use a small round-robin pool so
//! they proceed in parallel under WAL with read-committed visibility.
//! Reads re-verify the stored content hash and fail closed on mismatch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use remote_storage_core::Clock;
use remote_storage_core::ContentError;
use remote_storage_core::DimensionSchema;
use remote_storage_core::EncodedContent;
use remote_storage_core::HashAlgorithm;
use remote_storage_core::HashDigest;
use remote_storage_core::InsertAttempt;
use remote_storage_core::LatestQuery;
use remote_storage_core::NoopAuditSink;
use remote_storage_core::NotFoundPolicy;
use remote_storage_core::RetentionPolicy;
use remote_storage_core::StoreAuditEvent;
use remote_storage_core::StoreAuditEventParams;
use remote_storage_core::StoreAuditSink;
use remote_storage_core::StoreError;
use remote_storage_core::StoreOperation;
use remote_storage_core::StoreOutcome;
use remote_storage_core::StoreReceipt;
use remote_storage_core::SystemClock;
use remote_storage_core::Timestamp;
use remote_storage_core::VariableName;
use remote_storage_core::VersionKey;
use remote_storage_core::VersionStore;
use remote_storage_core::VersionSummary;
use remote_storage_core::insert_with_retry;
use remote_storage_core::runtime::DEFAULT_MAX_VERSIONS;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::TransactionBehavior;
use rusqlite::params_from_iter;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::eviction::count_versions;
use crate::eviction::enforce_retention;
use crate::query::VersionFilter;
use crate::query::history_statement;
use crate::query::insert_statement;
use crate::query::insert_values;
use crate::query::latest_statement;
use crate::schema::initialize_schema;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default pause before the collision retry (ms).
const DEFAULT_COLLISION_BACKOFF_MS: u64 = 10;
/// Upper bound on the collision backoff (ms).
pub const MAX_COLLISION_BACKOFF_MS: u64 = 1_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended; readers do not block the writer).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` version store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `max_versions` and `read_pool_size` are greater than zero.
/// - `collision_backoff_ms` is at most [`MAX_COLLISION_BACKOFF_MS`].
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Maximum versions kept per key (oldest evicted first).
    #[serde(default = "default_max_versions")]
    pub max_versions: u64,
    /// Pause before retrying a colliding insert (milliseconds).
    #[serde(default = "default_collision_backoff_ms")]
    pub collision_backoff_ms: u64,
    /// Number of read-only connections used for parallel reads.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

impl SqliteStoreConfig {
    /// Creates a configuration with defaults for everything but the path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            max_versions: default_max_versions(),
            collision_backoff_ms: default_collision_backoff_ms(),
            read_pool_size: default_read_pool_size(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default per-key version cap.
const fn default_max_versions() -> u64 {
    DEFAULT_MAX_VERSIONS
}

/// Returns the default collision backoff.
const fn default_collision_backoff_ms() -> u64 {
    DEFAULT_COLLISION_BACKOFF_MS
}

/// Returns the default read connection pool size.
const fn default_read_pool_size() -> usize {
    4
}

/// Validates runtime limits in the store configuration.
fn validate_runtime_limits(
    config: &SqliteStoreConfig,
) -> Result<RetentionPolicy, SqliteStoreError> {
    if config.read_pool_size == 0 {
        return Err(SqliteStoreError::Invalid(
            "read_pool_size must be greater than zero".to_string(),
        ));
    }
    if config.collision_backoff_ms > MAX_COLLISION_BACKOFF_MS {
        return Err(SqliteStoreError::Invalid(format!(
            "collision_backoff_ms out of range: {} (max {MAX_COLLISION_BACKOFF_MS})",
            config.collision_backoff_ms
        )));
    }
    RetentionPolicy::from_count(config.max_versions).map_err(|_| {
        SqliteStoreError::Invalid("max_versions must be greater than zero".to_string())
    })
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding stored content or dimension values.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version or dimension layout mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store configuration or data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Stored content exceeded size limits.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::TooLarge {
                max_bytes,
                actual_bytes,
            },
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed version store with WAL support.
///
/// # Invariants
/// - All write transactions are serialized through one connection.
/// - Loads verify stored hashes before deserialization.
/// - Keys and queries must conform to the store's [`DimensionSchema`].
#[derive(Clone)]
pub struct SqliteVersionStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Dimension layout the table was created with.
    schema: DimensionSchema,
    /// Per-key retention cap.
    retention: RetentionPolicy,
    /// Parameterized insert for the configured layout.
    insert_sql: Arc<str>,
    /// Timestamp source.
    clock: Arc<dyn Clock>,
    /// Audit sink for per-operation events.
    audit: Arc<dyn StoreAuditSink>,
    /// Shared writer connection guarded by a mutex.
    write_connection: Arc<Mutex<Connection>>,
    /// Read connection pool used for read path isolation under WAL.
    read_connections: Arc<Vec<Mutex<Connection>>>,
    /// Round-robin cursor for read connection selection.
    read_cursor: Arc<AtomicUsize>,
}

impl SqliteVersionStore {
    /// Opens an `SQLite`-backed version store using the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the configuration is invalid or the
    /// database cannot be opened or initialized.
    pub fn open(
        config: SqliteStoreConfig,
        schema: DimensionSchema,
    ) -> Result<Self, SqliteStoreError> {
        Self::open_with_clock(config, schema, Arc::new(SystemClock::new()))
    }

    /// Opens an `SQLite`-backed version store reading time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the configuration is invalid or the
    /// database cannot be opened or initialized.
    pub fn open_with_clock(
        config: SqliteStoreConfig,
        schema: DimensionSchema,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let retention = validate_runtime_limits(&config)?;
        let mut write_connection = open_connection(&config)?;
        initialize_schema(&mut write_connection, &schema)?;
        let mut read_connections = Vec::with_capacity(config.read_pool_size);
        for _ in 0 .. config.read_pool_size {
            let mut read_connection = open_connection(&config)?;
            initialize_schema(&mut read_connection, &schema)?;
            read_connections.push(Mutex::new(read_connection));
        }
        Ok(Self {
            insert_sql: Arc::from(insert_statement(&schema)),
            config,
            schema,
            retention,
            clock,
            audit: Arc::new(NoopAuditSink),
            write_connection: Arc::new(Mutex::new(write_connection)),
            read_connections: Arc::new(read_connections),
            read_cursor: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Routes audit events to `sink`.
    #[must_use]
    pub fn with_audit_sink(mut self, sink: Arc<dyn StoreAuditSink>) -> Self {
        self.audit = sink;
        self
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Returns the per-key retention policy.
    #[must_use]
    pub const fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    /// Returns the next read connection using round-robin selection.
    fn read_connection(&self) -> &Mutex<Connection> {
        let len = self.read_connections.len();
        let index = self.read_cursor.fetch_add(1, Ordering::Relaxed) % len;
        &self.read_connections[index]
    }

    /// Emits one audit event.
    fn emit(&self, params: StoreAuditEventParams) {
        self.audit.record(&StoreAuditEvent::new(params));
    }

    /// Runs one insert attempt: insert, count, evict, commit.
    fn try_insert(
        &self,
        key: &VersionKey,
        timestamp: Timestamp,
        content: &EncodedContent,
    ) -> Result<InsertAttempt, SqliteStoreError> {
        let mut guard = self
            .write_connection
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite write mutex poisoned".to_string()))?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let inserted = {
            let mut stmt = tx
                .prepare_cached(&self.insert_sql)
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let values = insert_values(key, timestamp, content);
            stmt.execute(params_from_iter(values.iter()))
        };
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                return Ok(InsertAttempt::Collision);
            }
            Err(err) => return Err(SqliteStoreError::Db(err.to_string())),
        }
        let evicted = enforce_retention(&tx, key, self.retention)?;
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(InsertAttempt::Inserted {
            evicted,
        })
    }

    /// Validates, encodes, and writes one version.
    fn store_version(
        &self,
        key: &VersionKey,
        value: &Value,
    ) -> Result<(StoreReceipt, usize), StoreError> {
        self.schema.conforms_key(key)?;
        let content = EncodedContent::encode(value)?;
        let backoff = Duration::from_millis(self.config.collision_backoff_ms);
        let receipt = insert_with_retry(self.clock.as_ref(), backoff, key, |timestamp| {
            self.try_insert(key, timestamp, &content).map_err(StoreError::from)
        })?;
        Ok((receipt, content.len()))
    }

    /// Selects the newest version matching `query` with its content size.
    fn find_latest(&self, query: &LatestQuery) -> Result<Option<(Value, usize)>, StoreError> {
        self.schema.conforms_partial(&query.key)?;
        if query.is_empty_window() {
            return Ok(None);
        }
        let filter = VersionFilter::for_query(query);
        let row: Option<(f64, String, String, String)> = {
            let guard = self
                .read_connection()
                .lock()
                .map_err(|_| SqliteStoreError::Io("sqlite read mutex poisoned".to_string()))?;
            let mut stmt = guard
                .prepare_cached(&latest_statement(&filter))
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            stmt.query_row(filter.params(), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?
        };
        let Some((recorded_at, text, hash, algorithm)) = row else {
            return Ok(None);
        };
        let context = format!("{} at {recorded_at}", query.key);
        let content = stored_content(text, hash, &algorithm, &context)?;
        let size = content.len();
        Ok(Some((content.decode()?, size)))
    }

    /// Lists version summaries of exactly `key`, newest first.
    fn list_history(&self, key: &VersionKey) -> Result<Vec<VersionSummary>, StoreError> {
        self.schema.conforms_key(key)?;
        let filter = VersionFilter::for_key(key);
        let rows: Vec<(f64, String, String, i64)> = {
            let guard = self
                .read_connection()
                .lock()
                .map_err(|_| SqliteStoreError::Io("sqlite read mutex poisoned".to_string()))?;
            let mut stmt = guard
                .prepare_cached(&history_statement(&filter))
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let mapped = stmt
                .query_map(filter.params(), |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            mapped
                .collect::<Result<_, _>>()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?
        };
        rows.into_iter()
            .map(|(recorded_at, hash, algorithm, size)| {
                let timestamp = Timestamp::from_secs(recorded_at).map_err(|err| {
                    SqliteStoreError::Corrupt(format!("invalid recorded_at for {key}: {err}"))
                })?;
                let algorithm = parse_hash_algorithm(&algorithm)?;
                let content_bytes = u64::try_from(size).map_err(|_| {
                    SqliteStoreError::Corrupt(format!("negative content size for {key}"))
                })?;
                Ok(VersionSummary {
                    timestamp,
                    content_hash: HashDigest {
                        algorithm,
                        value: hash,
                    },
                    content_bytes,
                })
            })
            .collect()
    }

    /// Counts the versions of exactly `key` on a read connection.
    fn count(&self, key: &VersionKey) -> Result<u64, StoreError> {
        self.schema.conforms_key(key)?;
        let guard = self
            .read_connection()
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite read mutex poisoned".to_string()))?;
        Ok(count_versions(&guard, key)?)
    }
}

impl VersionStore for SqliteVersionStore {
    fn schema(&self) -> &DimensionSchema {
        &self.schema
    }

    fn store(&self, key: &VersionKey, value: &Value) -> Result<StoreReceipt, StoreError> {
        let result = self.store_version(key, value);
        let mut params = audit_params(StoreOperation::Store, key.name(), result.as_ref().err());
        if let Ok((receipt, content_bytes)) = &result {
            params.retried = receipt.retried;
            params.evicted = receipt.evicted;
            params.content_bytes = Some(*content_bytes);
        }
        self.emit(params);
        result.map(|(receipt, _)| receipt)
    }

    fn retrieve_latest(
        &self,
        query: &LatestQuery,
        policy: NotFoundPolicy,
    ) -> Result<Option<Value>, StoreError> {
        let found = self.find_latest(query);
        let mut params =
            audit_params(StoreOperation::RetrieveLatest, query.key.name(), found.as_ref().err());
        match &found {
            Ok(Some((_, content_bytes))) => params.content_bytes = Some(*content_bytes),
            Ok(None) => params.outcome = StoreOutcome::NotFound,
            Err(_) => {}
        }
        self.emit(params);
        policy.apply(query, found?.map(|(value, _)| value))
    }

    fn retrieve_count(&self, key: &VersionKey) -> Result<u64, StoreError> {
        let result = self.count(key);
        self.emit(audit_params(StoreOperation::RetrieveCount, key.name(), result.as_ref().err()));
        result
    }

    fn history(&self, key: &VersionKey) -> Result<Vec<VersionSummary>, StoreError> {
        let result = self.list_history(key);
        self.emit(audit_params(StoreOperation::History, key.name(), result.as_ref().err()));
        result
    }

    fn current_timestamp(&self) -> Timestamp {
        self.clock.now()
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds audit parameters for an operation outcome.
fn audit_params(
    operation: StoreOperation,
    variable_name: &VariableName,
    error: Option<&StoreError>,
) -> StoreAuditEventParams {
    StoreAuditEventParams {
        operation,
        variable_name: variable_name.to_string(),
        outcome: if error.is_some() { StoreOutcome::Error } else { StoreOutcome::Ok },
        error_kind: error.map(StoreError::kind),
        retried: false,
        evicted: 0,
        content_bytes: None,
    }
}

/// Rebuilds stored content, failing closed on digest mismatch.
fn stored_content(
    text: String,
    hash: String,
    algorithm: &str,
    context: &str,
) -> Result<EncodedContent, SqliteStoreError> {
    let digest = HashDigest {
        algorithm: parse_hash_algorithm(algorithm)?,
        value: hash,
    };
    EncodedContent::from_stored(text, digest).map_err(|err| match err {
        ContentError::DigestMismatch => {
            SqliteStoreError::Corrupt(format!("hash mismatch for {context}"))
        }
        ContentError::TooLarge {
            max_bytes,
            actual_bytes,
        } => SqliteStoreError::TooLarge {
            max_bytes,
            actual_bytes,
        },
        ContentError::Serialization(message) => SqliteStoreError::Invalid(message),
    })
}

/// Parses a hash algorithm label.
fn parse_hash_algorithm(label: &str) -> Result<HashAlgorithm, SqliteStoreError> {
    HashAlgorithm::from_label(label)
        .ok_or_else(|| SqliteStoreError::Invalid(format!("unsupported hash algorithm: {label}")))
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    if path.display().to_string().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    if path
        .components()
        .any(|component| component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(SqliteStoreError::Invalid(
            "store path contains an overlong component".to_string(),
        ));
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}
