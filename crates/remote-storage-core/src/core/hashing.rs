// crates/remote-storage-core/src/core/hashing.rs
// ============================================================================
// Module: Remote Storage Content Hashing
// Description: Deterministic JSON serialization and content digests.
// Purpose: Make identical values serialize and hash identically across writes.
// Dependencies: serde, serde_json, sha2
// ============================================================================

//! ## Overview
//! Every stored value is serialized as compact JSON with sorted object keys,
//! so structurally equal values produce equal bytes and equal digests.
//! Numbers are written as serde_json represents them: integral floats keep
//! their fractional form, so a value reloads exactly as it was stored.
//! History can therefore be hashed and diffed reproducibly even though the
//! engine itself never diffs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Hash Algorithm
// ============================================================================

/// Supported content digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256.
    Sha256,
}

impl HashAlgorithm {
    /// Returns the stable storage label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }

    /// Parses a storage label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "sha256" => Some(Self::Sha256),
            _ => None,
        }
    }
}

/// Digest algorithm used for new versions.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

/// Content digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashDigest {
    /// Digest algorithm.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex digest.
    pub value: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Serialization errors.
#[derive(Debug, Error)]
pub enum HashError {
    /// The value could not be serialized.
    #[error("failed to serialize json: {0}")]
    Serialization(String),
    /// Serialized bytes exceed the caller's limit.
    #[error("serialized json exceeds size limit: {actual} bytes (max {limit})")]
    SizeLimitExceeded {
        /// Maximum allowed bytes.
        limit: usize,
        /// Actual serialized size.
        actual: usize,
    },
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the stored JSON bytes for `value`, rejecting output larger than
/// `limit`.
///
/// Object keys serialize in sorted order and numbers keep their integer or
/// float representation, so `2.0` stays distinct from `2` on reload.
///
/// # Errors
///
/// Returns [`HashError::Serialization`] when serialization fails or
/// [`HashError::SizeLimitExceeded`] when the output exceeds `limit`.
pub fn json_bytes_with_limit<T: Serialize + ?Sized>(
    value: &T,
    limit: usize,
) -> Result<Vec<u8>, HashError> {
    let bytes =
        serde_json::to_vec(value).map_err(|err| HashError::Serialization(err.to_string()))?;
    if bytes.len() > limit {
        return Err(HashError::SizeLimitExceeded {
            limit,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}

/// Hashes raw bytes.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    let raw = match algorithm {
        HashAlgorithm::Sha256 => Sha256::digest(bytes).to_vec(),
    };
    HashDigest {
        algorithm,
        value: hex_encode(&raw),
    }
}

/// Lowercase hex encoding.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}
