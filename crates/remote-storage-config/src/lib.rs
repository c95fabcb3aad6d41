// crates/remote-storage-config/src/lib.rs
// ============================================================================
// Module: Remote Storage Config Library
// Description: Configuration entry points for remote storage deployments.
// Purpose: Load `remote-storage.toml` and assemble the configured store.
// Dependencies: crate::config
// ============================================================================

//! ## Overview
//! Loads and validates deployment configuration, then builds the dimension
//! schema, the `SQLite` store, and the audit sink from it.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::AuditConfig;
pub use config::AuditSinkKind;
pub use config::CONFIG_ENV_VAR;
pub use config::ConfigError;
pub use config::DEFAULT_CONFIG_NAME;
pub use config::MAX_CONFIG_FILE_BYTES;
pub use config::MAX_VERSIONS_LIMIT;
pub use config::RemoteStorageConfig;
pub use config::StoreConfig;
pub use config::VersioningConfig;
pub use config::resolve_config_path;
