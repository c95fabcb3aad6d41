// crates/remote-storage-config/src/config.rs
// ============================================================================
// Module: Remote Storage Configuration
// Description: TOML configuration model, loading guards, and validation.
// Purpose: Turn a deployment config file into a ready version store.
// Dependencies: remote-storage-core, remote-storage-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is read from an explicit path, else the path named by
//! [`CONFIG_ENV_VAR`], else `./remote-storage.toml`. Loading is fail-closed:
//! path length limits, a 1 MiB size cap, UTF-8 only, unknown keys rejected,
//! and every value range-checked before any store is opened.
//!
//! ```toml
//! [store]
//! path = "remotestorage.db"
//!
//! [versioning]
//! max_versions = 365
//! dimensions = ["environment", "test_set", "test_id"]
//!
//! [audit]
//! sink = "file"
//! path = "remote-storage-audit.jsonl"
//! ```

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ffi::OsString;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use remote_storage_core::DimensionSchema;
use remote_storage_core::FileAuditSink;
use remote_storage_core::NoopAuditSink;
use remote_storage_core::StderrAuditSink;
use remote_storage_core::StoreAuditSink;
use remote_storage_store_sqlite::MAX_COLLISION_BACKOFF_MS;
use remote_storage_store_sqlite::SqliteStoreConfig;
use remote_storage_store_sqlite::SqliteStoreMode;
use remote_storage_store_sqlite::SqliteSyncMode;
use remote_storage_store_sqlite::SqliteVersionStore;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "REMOTE_STORAGE_CONFIG";
/// Config file used when neither a path nor the environment names one.
pub const DEFAULT_CONFIG_NAME: &str = "remote-storage.toml";
/// Maximum config file size in bytes.
pub const MAX_CONFIG_FILE_BYTES: usize = 1024 * 1024;
/// Upper bound on the per-key version cap.
pub const MAX_VERSIONS_LIMIT: u64 = 1_000_000;
/// Maximum total config path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of one config path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Upper bound on the busy timeout (ms).
const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;
/// Upper bound on the read pool size.
const MAX_READ_POOL_SIZE: usize = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// The config file is not valid TOML for this model.
    #[error("config parse error: {0}")]
    Parse(String),
    /// A config value is out of range or inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// The configured store or audit sink could not be opened.
    #[error("config store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Model
// ============================================================================

/// Root configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteStorageConfig {
    /// `SQLite` store settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Key layout and retention settings.
    #[serde(default)]
    pub versioning: VersioningConfig,
    /// Audit sink settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

/// `[store]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Database file path.
    #[serde(default = "default_store_path")]
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
    /// Number of pooled read connections.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            read_pool_size: default_read_pool_size(),
        }
    }
}

/// `[versioning]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VersioningConfig {
    /// Maximum versions kept per key.
    #[serde(default = "default_max_versions")]
    pub max_versions: u64,
    /// Ordered dimension names of the composite key.
    #[serde(default = "default_dimensions")]
    pub dimensions: Vec<String>,
    /// Pause before retrying a colliding write (milliseconds).
    #[serde(default = "default_collision_backoff_ms")]
    pub collision_backoff_ms: u64,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            max_versions: default_max_versions(),
            dimensions: default_dimensions(),
            collision_backoff_ms: default_collision_backoff_ms(),
        }
    }
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// Discard audit events.
    #[default]
    None,
    /// JSON lines on stderr.
    Stderr,
    /// JSON lines appended to `audit.path`.
    File,
}

/// `[audit]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Selected sink.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Output file; required iff `sink = "file"`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Default database path.
fn default_store_path() -> PathBuf {
    PathBuf::from("remotestorage.db")
}

/// Default busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// Default read pool size.
const fn default_read_pool_size() -> usize {
    4
}

/// Default per-key cap.
const fn default_max_versions() -> u64 {
    remote_storage_core::DEFAULT_MAX_VERSIONS
}

/// Default dimension layout.
fn default_dimensions() -> Vec<String> {
    ["environment", "test_set", "test_id"].map(ToString::to_string).to_vec()
}

/// Default collision backoff.
const fn default_collision_backoff_ms() -> u64 {
    10
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl RemoteStorageConfig {
    /// Loads and validates the config file.
    ///
    /// `path` wins over [`CONFIG_ENV_VAR`], which wins over
    /// [`DEFAULT_CONFIG_NAME`] in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the path is unsafe, the file is oversized,
    /// unreadable, not UTF-8, malformed, or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_config_path(path, std::env::var_os(CONFIG_ENV_VAR));
        validate_config_path(&resolved)?;
        let text = read_config_text(&resolved)?;
        Self::from_toml_str(&text)
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] when validation fails.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.versioning.validate()?;
        self.audit.validate()
    }

    /// Builds the dimension schema of the composite key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for bad or repeated dimension names.
    pub fn dimension_schema(&self) -> Result<DimensionSchema, ConfigError> {
        self.versioning.dimension_schema()
    }

    /// Builds the `SQLite` store configuration.
    #[must_use]
    pub fn sqlite_config(&self) -> SqliteStoreConfig {
        let mut config = SqliteStoreConfig::new(self.store.path.clone());
        config.busy_timeout_ms = self.store.busy_timeout_ms;
        config.journal_mode = self.store.journal_mode;
        config.sync_mode = self.store.sync_mode;
        config.read_pool_size = self.store.read_pool_size;
        config.max_versions = self.versioning.max_versions;
        config.collision_backoff_ms = self.versioning.collision_backoff_ms;
        config
    }

    /// Builds the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Store`] when the audit file cannot be opened.
    pub fn audit_sink(&self) -> Result<Arc<dyn StoreAuditSink>, ConfigError> {
        match (self.audit.sink, &self.audit.path) {
            (AuditSinkKind::None, _) => Ok(Arc::new(NoopAuditSink)),
            (AuditSinkKind::Stderr, _) => Ok(Arc::new(StderrAuditSink)),
            (AuditSinkKind::File, Some(path)) => FileAuditSink::new(path)
                .map(|sink| Arc::new(sink) as Arc<dyn StoreAuditSink>)
                .map_err(|err| ConfigError::Store(format!("audit sink: {err}"))),
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path required for file sink".to_string()))
            }
        }
    }

    /// Opens the configured store with its audit sink attached.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the schema, store, or sink cannot be built.
    pub fn open_store(&self) -> Result<SqliteVersionStore, ConfigError> {
        let schema = self.dimension_schema()?;
        let sink = self.audit_sink()?;
        let store = SqliteVersionStore::open(self.sqlite_config(), schema)
            .map_err(|err| ConfigError::Store(err.to_string()))?;
        Ok(store.with_audit_sink(sink))
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

impl StoreConfig {
    /// Validates store limits.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("store.path must be non-empty".to_string()));
        }
        if self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "store.busy_timeout_ms must be at most {MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        if self.read_pool_size == 0 || self.read_pool_size > MAX_READ_POOL_SIZE {
            return Err(ConfigError::Invalid(format!(
                "store.read_pool_size must be between 1 and {MAX_READ_POOL_SIZE}"
            )));
        }
        Ok(())
    }
}

impl VersioningConfig {
    /// Validates the cap, backoff, and dimension names.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_versions == 0 || self.max_versions > MAX_VERSIONS_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "versioning.max_versions must be between 1 and {MAX_VERSIONS_LIMIT}"
            )));
        }
        if self.collision_backoff_ms == 0 || self.collision_backoff_ms > MAX_COLLISION_BACKOFF_MS {
            return Err(ConfigError::Invalid(format!(
                "versioning.collision_backoff_ms must be between 1 and {MAX_COLLISION_BACKOFF_MS}"
            )));
        }
        self.dimension_schema().map(|_| ())
    }

    /// Builds the dimension schema.
    fn dimension_schema(&self) -> Result<DimensionSchema, ConfigError> {
        DimensionSchema::new(self.dimensions.iter().map(String::as_str))
            .map_err(|err| ConfigError::Invalid(format!("versioning.dimensions: {err}")))
    }
}

impl AuditConfig {
    /// Validates that a file sink names a file.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path required for file sink".to_string()))
            }
            (AuditSinkKind::File, Some(path)) if path.as_os_str().is_empty() => {
                Err(ConfigError::Invalid("audit.path must be non-empty".to_string()))
            }
            (AuditSinkKind::None | AuditSinkKind::Stderr, Some(_)) => Err(ConfigError::Invalid(
                "audit.path only applies to the file sink".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: File Helpers
// ============================================================================

/// Picks the config path: explicit path, then environment, then default.
#[must_use]
pub fn resolve_config_path(explicit: Option<&Path>, env_value: Option<OsString>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match env_value {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from(DEFAULT_CONFIG_NAME),
    }
}

/// Enforces path length limits.
fn validate_config_path(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    if path
        .components()
        .any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(ConfigError::Invalid("config path component too long".to_string()));
    }
    Ok(())
}

/// Reads the config file with a size cap and UTF-8 check.
fn read_config_text(path: &Path) -> Result<String, ConfigError> {
    let file = File::open(path)
        .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
    let limit = u64::try_from(MAX_CONFIG_FILE_BYTES).unwrap_or(u64::MAX);
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
    if bytes.len() > MAX_CONFIG_FILE_BYTES {
        return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
    }
    String::from_utf8(bytes)
        .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))
}
