// crates/remote-storage-core/src/interfaces/mod.rs
// ============================================================================
// Module: Remote Storage Interfaces
// Description: Backend-agnostic contract for versioned key-value stores.
// Purpose: Define the store operations, query shapes, and error taxonomy.
// Dependencies: crate::core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`VersionStore`] is the single contract every backend implements. Writes
//! append a new timestamped version; reads select the newest version matching
//! a partial key and an inclusive time window.
//!
//! Errors are split into a true failure channel ([`StoreError`]) and an
//! optional result channel for "not found", gated by [`NotFoundPolicy`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::ContentError;
use crate::core::DimensionSchema;
use crate::core::HashDigest;
use crate::core::KeyError;
use crate::core::PartialKey;
use crate::core::Timestamp;
use crate::core::VersionKey;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Version store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The mandatory variable name was absent or empty.
    #[error("variable name is missing; it is a mandatory key component")]
    MissingPrimaryName,
    /// The key does not fit the store's dimension schema.
    #[error("invalid key: {0}")]
    InvalidKey(String),
    /// Both the insert and its single retry collided on key and timestamp.
    #[error("duplicate version for {key} at {timestamp}")]
    DuplicateVersion {
        /// Rendered canonical key.
        key: String,
        /// Timestamp of the failed retry.
        timestamp: Timestamp,
    },
    /// No version matched and the caller asked for strict failure.
    #[error("no version found for {query}")]
    VersionNotFound {
        /// Rendered query.
        query: String,
    },
    /// The value could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The serialized value exceeds the size limit.
    #[error("value too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual size in bytes.
        actual_bytes: usize,
    },
    /// Store I/O error.
    #[error("version store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("version store corruption: {0}")]
    Corrupt(String),
    /// Store layout or schema version is incompatible.
    #[error("version store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store configuration or input is invalid.
    #[error("version store invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("version store error: {0}")]
    Store(String),
}

impl StoreError {
    /// Returns a stable label for the error class.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingPrimaryName => "missing_primary_name",
            Self::InvalidKey(_) => "invalid_key",
            Self::DuplicateVersion {
                ..
            } => "duplicate_version",
            Self::VersionNotFound {
                ..
            } => "version_not_found",
            Self::Serialization(_) => "serialization",
            Self::TooLarge {
                ..
            } => "too_large",
            Self::Io(_) => "io",
            Self::Corrupt(_) => "corrupt",
            Self::VersionMismatch(_) => "version_mismatch",
            Self::Invalid(_) => "invalid",
            Self::Store(_) => "store",
        }
    }
}

impl From<KeyError> for StoreError {
    fn from(error: KeyError) -> Self {
        match error {
            KeyError::MissingPrimaryName => Self::MissingPrimaryName,
            other => Self::InvalidKey(other.to_string()),
        }
    }
}

impl From<ContentError> for StoreError {
    fn from(error: ContentError) -> Self {
        match error {
            ContentError::Serialization(message) => Self::Serialization(message),
            ContentError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::TooLarge {
                max_bytes,
                actual_bytes,
            },
            ContentError::DigestMismatch => Self::Corrupt("content digest mismatch".to_string()),
        }
    }
}

// ============================================================================
// SECTION: Queries
// ============================================================================

/// Latest-match query: partial key plus inclusive time bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestQuery {
    /// Key filter; wildcard dimensions match any stored value.
    pub key: PartialKey,
    /// Inclusive lower bound.
    pub after: Option<Timestamp>,
    /// Inclusive upper bound.
    pub before: Option<Timestamp>,
}

impl LatestQuery {
    /// Creates an unbounded query for `key`.
    #[must_use]
    pub const fn new(key: PartialKey) -> Self {
        Self {
            key,
            after: None,
            before: None,
        }
    }

    /// Sets the inclusive lower bound.
    #[must_use]
    pub fn after(mut self, after: Option<Timestamp>) -> Self {
        self.after = after;
        self
    }

    /// Sets the inclusive upper bound.
    #[must_use]
    pub fn before(mut self, before: Option<Timestamp>) -> Self {
        self.before = before;
        self
    }

    /// Returns true when `timestamp` lies inside the window.
    #[must_use]
    pub fn admits(&self, timestamp: Timestamp) -> bool {
        self.after.is_none_or(|after| after <= timestamp)
            && self.before.is_none_or(|before| timestamp <= before)
    }

    /// Returns true when the bounds exclude every timestamp.
    #[must_use]
    pub fn is_empty_window(&self) -> bool {
        matches!((self.after, self.before), (Some(after), Some(before)) if after > before)
    }
}

impl fmt::Display for LatestQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        if let Some(after) = self.after {
            write!(f, " after {after}")?;
        }
        if let Some(before) = self.before {
            write!(f, " before {before}")?;
        }
        Ok(())
    }
}

/// Behavior of [`VersionStore::retrieve_latest`] when nothing matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotFoundPolicy {
    /// Return `Ok(None)`.
    #[default]
    ReturnNone,
    /// Fail with [`StoreError::VersionNotFound`].
    Fail,
}

impl NotFoundPolicy {
    /// Maps a `fail_if_not_found` flag onto a policy.
    #[must_use]
    pub const fn from_flag(fail_if_not_found: bool) -> Self {
        if fail_if_not_found { Self::Fail } else { Self::ReturnNone }
    }

    /// Applies the policy to a lookup result.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VersionNotFound`] for [`NotFoundPolicy::Fail`] and
    /// an empty result.
    pub fn apply<T>(self, query: &LatestQuery, found: Option<T>) -> Result<Option<T>, StoreError> {
        match (found, self) {
            (Some(value), _) => Ok(Some(value)),
            (None, Self::ReturnNone) => Ok(None),
            (None, Self::Fail) => Err(StoreError::VersionNotFound {
                query: query.to_string(),
            }),
        }
    }
}

// ============================================================================
// SECTION: Results
// ============================================================================

/// Diagnostic outcome of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreReceipt {
    /// Timestamp assigned to the new version.
    pub timestamp: Timestamp,
    /// True when the first insert collided and the retry succeeded.
    pub retried: bool,
    /// Versions evicted to restore the retention bound.
    pub evicted: u64,
}

/// Per-version summary returned by [`VersionStore::history`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSummary {
    /// Version timestamp.
    pub timestamp: Timestamp,
    /// Digest of the stored content.
    pub content_hash: HashDigest,
    /// Stored content size in bytes.
    pub content_bytes: u64,
}

// ============================================================================
// SECTION: Version Store
// ============================================================================

/// Versioned key-value store.
pub trait VersionStore: Send + Sync {
    /// Returns the dimension schema keys must conform to.
    fn schema(&self) -> &DimensionSchema;

    /// Appends `value` as a new version of `key`, then restores the
    /// retention bound.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateVersion`] when the retry also collides,
    /// and other [`StoreError`] variants for invalid input or storage faults.
    fn store(&self, key: &VersionKey, value: &Value) -> Result<StoreReceipt, StoreError>;

    /// Returns the newest version matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VersionNotFound`] when nothing matches under
    /// [`NotFoundPolicy::Fail`], and other [`StoreError`] variants on faults.
    fn retrieve_latest(
        &self,
        query: &LatestQuery,
        policy: NotFoundPolicy,
    ) -> Result<Option<Value>, StoreError>;

    /// Counts the versions stored under exactly `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the key is invalid or the count fails.
    fn retrieve_count(&self, key: &VersionKey) -> Result<u64, StoreError>;

    /// Lists version summaries of exactly `key`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the key is invalid or the listing fails.
    fn history(&self, key: &VersionKey) -> Result<Vec<VersionSummary>, StoreError>;

    /// Returns the store's current time.
    fn current_timestamp(&self) -> Timestamp;
}
