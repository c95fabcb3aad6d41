// crates/remote-storage-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared fixtures for remote-storage-config tests.
// Purpose: Build minimal valid configs and on-disk config files.
// =============================================================================

//! Shared helpers for config integration tests.

#![allow(dead_code, reason = "Each test binary uses a subset of the helpers.")]

use std::io::Write;
use std::path::Path;

use remote_storage_config::ConfigError;
use remote_storage_config::RemoteStorageConfig;
use tempfile::NamedTempFile;

/// Minimal config pointing the store inside `dir`.
pub fn minimal_config(dir: &Path) -> Result<RemoteStorageConfig, ConfigError> {
    let text = format!("[store]\npath = '{}'\n", dir.join("versions.db").display());
    RemoteStorageConfig::from_toml_str(&text)
}

/// Writes `text` to a fresh temporary file.
pub fn config_file(text: &[u8]) -> Result<NamedTempFile, String> {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(text).map_err(|err| err.to_string())?;
    Ok(file)
}

/// Asserts `result` failed with a message containing `needle`.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> Result<(), String> {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
