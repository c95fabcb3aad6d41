//! Config load validation tests for remote-storage-config.
// crates/remote-storage-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards (path, size, encoding, syntax).
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

use std::ffi::OsString;
use std::path::Path;
use std::path::PathBuf;

use remote_storage_config::AuditSinkKind;
use remote_storage_config::DEFAULT_CONFIG_NAME;
use remote_storage_config::MAX_CONFIG_FILE_BYTES;
use remote_storage_config::RemoteStorageConfig;
use remote_storage_config::resolve_config_path;
use remote_storage_store_sqlite::SqliteStoreMode;

mod common;

type TestResult = Result<(), String>;

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    let path = Path::new(&long_path);
    common::assert_invalid(RemoteStorageConfig::load(Some(path)), "config path exceeds max length")
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    let path = Path::new(&long_component);
    common::assert_invalid(RemoteStorageConfig::load(Some(path)), "config path component too long")
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let file = common::config_file(&vec![b'#'; MAX_CONFIG_FILE_BYTES + 1])?;
    common::assert_invalid(
        RemoteStorageConfig::load(Some(file.path())),
        "config file exceeds size limit",
    )
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let file = common::config_file(&[0xFF, 0xFE, 0xFF])?;
    common::assert_invalid(
        RemoteStorageConfig::load(Some(file.path())),
        "config file must be utf-8",
    )
}

#[test]
fn load_reports_missing_file_as_io() -> TestResult {
    let path = PathBuf::from("definitely-missing-remote-storage.toml");
    common::assert_invalid(RemoteStorageConfig::load(Some(&path)), "config io error")
}

#[test]
fn load_rejects_unknown_keys() -> TestResult {
    let file = common::config_file(b"[store]\npath = \"x.db\"\nretention = 3\n")?;
    common::assert_invalid(RemoteStorageConfig::load(Some(file.path())), "config parse error")
}

#[test]
fn load_reads_a_complete_file() -> TestResult {
    let file = common::config_file(
        br#"
[store]
path = "data/versions.db"
journal_mode = "delete"
read_pool_size = 2

[versioning]
max_versions = 3
dimensions = ["test_set", "test_id"]
collision_backoff_ms = 25

[audit]
sink = "stderr"
"#,
    )?;
    let config = RemoteStorageConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    if config.store.journal_mode != SqliteStoreMode::Delete || config.store.read_pool_size != 2 {
        return Err("store section not applied".to_string());
    }
    if config.versioning.max_versions != 3 || config.versioning.collision_backoff_ms != 25 {
        return Err("versioning section not applied".to_string());
    }
    if config.audit.sink != AuditSinkKind::Stderr {
        return Err("audit section not applied".to_string());
    }
    let sqlite = config.sqlite_config();
    if sqlite.max_versions != 3 || sqlite.path != Path::new("data/versions.db") {
        return Err("sqlite config not derived from file".to_string());
    }
    Ok(())
}

#[test]
fn empty_document_uses_defaults() -> TestResult {
    let config = RemoteStorageConfig::from_toml_str("").map_err(|err| err.to_string())?;
    let names: Vec<String> = config
        .dimension_schema()
        .map_err(|err| err.to_string())?
        .names()
        .iter()
        .map(ToString::to_string)
        .collect();
    if names != ["environment", "test_set", "test_id"] {
        return Err(format!("unexpected default dimensions: {}", names.join(", ")));
    }
    if config.versioning.max_versions != 365 || config.store.path != Path::new("remotestorage.db")
    {
        return Err("unexpected defaults".to_string());
    }
    Ok(())
}

#[test]
fn explicit_path_wins_over_environment() -> TestResult {
    let explicit = Path::new("explicit.toml");
    let resolved = resolve_config_path(Some(explicit), Some(OsString::from("env.toml")));
    if resolved != explicit {
        return Err(format!("expected explicit path, got {}", resolved.display()));
    }
    let resolved = resolve_config_path(None, Some(OsString::from("env.toml")));
    if resolved != Path::new("env.toml") {
        return Err(format!("expected env path, got {}", resolved.display()));
    }
    let resolved = resolve_config_path(None, Some(OsString::new()));
    if resolved != Path::new(DEFAULT_CONFIG_NAME) {
        return Err(format!("expected default path, got {}", resolved.display()));
    }
    Ok(())
}
