//! Store, versioning, and audit validation tests for remote-storage-config.
// crates/remote-storage-config/tests/store_validation.rs
// =============================================================================
// Module: Config Section Validation Tests
// Description: Validate range checks and store assembly from config.
// Purpose: Ensure invalid settings fail closed before any store is opened.
// =============================================================================

use std::fs;
use std::path::PathBuf;

use remote_storage_config::AuditSinkKind;
use remote_storage_config::MAX_VERSIONS_LIMIT;
use remote_storage_core::LatestQuery;
use remote_storage_core::NotFoundPolicy;
use remote_storage_core::PartialKey;
use remote_storage_core::VersionStore;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

mod common;

type TestResult = Result<(), String>;

fn temp_dir() -> Result<TempDir, String> {
    TempDir::new().map_err(|err| err.to_string())
}

#[test]
fn zero_max_versions_is_rejected() -> TestResult {
    let dir = temp_dir()?;
    let mut config = common::minimal_config(dir.path()).map_err(|err| err.to_string())?;
    config.versioning.max_versions = 0;
    common::assert_invalid(config.validate(), "versioning.max_versions")
}

#[test]
fn max_versions_above_limit_is_rejected() -> TestResult {
    let dir = temp_dir()?;
    let mut config = common::minimal_config(dir.path()).map_err(|err| err.to_string())?;
    config.versioning.max_versions = MAX_VERSIONS_LIMIT + 1;
    common::assert_invalid(config.validate(), "versioning.max_versions")
}

#[test]
fn collision_backoff_must_be_positive_and_bounded() -> TestResult {
    let dir = temp_dir()?;
    let mut config = common::minimal_config(dir.path()).map_err(|err| err.to_string())?;
    config.versioning.collision_backoff_ms = 0;
    common::assert_invalid(config.validate(), "versioning.collision_backoff_ms")?;
    config.versioning.collision_backoff_ms = 1_001;
    common::assert_invalid(config.validate(), "versioning.collision_backoff_ms")
}

#[test]
fn invalid_dimension_names_are_rejected() -> TestResult {
    let dir = temp_dir()?;
    let mut config = common::minimal_config(dir.path()).map_err(|err| err.to_string())?;
    config.versioning.dimensions = vec!["Test-Id".to_string()];
    common::assert_invalid(config.validate(), "versioning.dimensions")?;
    config.versioning.dimensions = vec!["test_id".to_string(), "test_id".to_string()];
    common::assert_invalid(config.validate(), "versioning.dimensions")
}

#[test]
fn read_pool_must_be_positive() -> TestResult {
    let dir = temp_dir()?;
    let mut config = common::minimal_config(dir.path()).map_err(|err| err.to_string())?;
    config.store.read_pool_size = 0;
    common::assert_invalid(config.validate(), "store.read_pool_size")
}

#[test]
fn file_sink_requires_path() -> TestResult {
    let dir = temp_dir()?;
    let mut config = common::minimal_config(dir.path()).map_err(|err| err.to_string())?;
    config.audit.sink = AuditSinkKind::File;
    config.audit.path = None;
    common::assert_invalid(config.validate(), "audit.path required for file sink")
}

#[test]
fn audit_path_without_file_sink_is_rejected() -> TestResult {
    let dir = temp_dir()?;
    let mut config = common::minimal_config(dir.path()).map_err(|err| err.to_string())?;
    config.audit.sink = AuditSinkKind::Stderr;
    config.audit.path = Some(PathBuf::from("audit.jsonl"));
    common::assert_invalid(config.validate(), "audit.path only applies to the file sink")
}

#[test]
fn open_store_round_trips_and_writes_audit_lines() -> TestResult {
    let dir = temp_dir()?;
    let audit_path = dir.path().join("audit.jsonl");
    let mut config = common::minimal_config(dir.path()).map_err(|err| err.to_string())?;
    config.audit.sink = AuditSinkKind::File;
    config.audit.path = Some(audit_path.clone());
    config.validate().map_err(|err| err.to_string())?;

    let store = config.open_store().map_err(|err| err.to_string())?;
    let key = store
        .schema()
        .key(Some("var"), [("environment", "ci")])
        .map_err(|err| err.to_string())?;
    store.store(&key, &json!({"ok": true})).map_err(|err| err.to_string())?;
    let query = LatestQuery::new(PartialKey::exact(&key));
    let found =
        store.retrieve_latest(&query, NotFoundPolicy::Fail).map_err(|err| err.to_string())?;
    if found != Some(json!({"ok": true})) {
        return Err("stored value not returned".to_string());
    }

    let text = fs::read_to_string(&audit_path).map_err(|err| err.to_string())?;
    let operations: Vec<String> = text
        .lines()
        .map(|line| {
            serde_json::from_str::<Value>(line)
                .map(|event| event["operation"].as_str().unwrap_or_default().to_string())
                .map_err(|err| err.to_string())
        })
        .collect::<Result<_, _>>()?;
    if operations != ["store", "retrieve_latest"] {
        return Err(format!("unexpected audit operations: {}", operations.join(", ")));
    }
    Ok(())
}

#[test]
fn open_store_fails_closed_on_layout_change() -> TestResult {
    let dir = temp_dir()?;
    let config = common::minimal_config(dir.path()).map_err(|err| err.to_string())?;
    drop(config.open_store().map_err(|err| err.to_string())?);
    let mut changed = config;
    changed.versioning.dimensions = vec!["region".to_string()];
    common::assert_invalid(changed.open_store(), "dimension layout mismatch")
}
