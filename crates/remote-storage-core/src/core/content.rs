// crates/remote-storage-core/src/core/content.rs
// ============================================================================
// Module: Remote Storage Content Encoding
// Description: Stored text form of values with integrity digests.
// Purpose: Serialize values deterministically and verify them on read.
// Dependencies: crate::core::hashing, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A stored value is any JSON structure (string, number, boolean, null, list,
//! or mapping). It is persisted as sorted-key JSON text together with the
//! digest of that exact text; reads recompute the digest and fail closed on
//! mismatch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_bytes;
use crate::core::hashing::json_bytes_with_limit;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum serialized size of a stored value in bytes.
pub const MAX_CONTENT_BYTES: usize = 16 * 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Content encoding and integrity errors.
#[derive(Debug, Error)]
pub enum ContentError {
    /// The value could not be serialized or parsed.
    #[error("content serialization error: {0}")]
    Serialization(String),
    /// The serialized value exceeds [`MAX_CONTENT_BYTES`].
    #[error("content too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual size in bytes.
        actual_bytes: usize,
    },
    /// Stored text does not match its digest.
    #[error("content digest mismatch")]
    DigestMismatch,
}

impl From<HashError> for ContentError {
    fn from(error: HashError) -> Self {
        match error {
            HashError::Serialization(message) => Self::Serialization(message),
            HashError::SizeLimitExceeded {
                limit,
                actual,
            } => Self::TooLarge {
                max_bytes: limit,
                actual_bytes: actual,
            },
        }
    }
}

// ============================================================================
// SECTION: Encoded Content
// ============================================================================

/// Stored JSON text of a value plus its digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedContent {
    /// Stored JSON text.
    text: String,
    /// Digest of `text`.
    digest: HashDigest,
}

impl EncodedContent {
    /// Serializes and hashes a value for storage.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Serialization`] or [`ContentError::TooLarge`].
    pub fn encode(value: &Value) -> Result<Self, ContentError> {
        let bytes = json_bytes_with_limit(value, MAX_CONTENT_BYTES)?;
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, &bytes);
        let text =
            String::from_utf8(bytes).map_err(|err| ContentError::Serialization(err.to_string()))?;
        Ok(Self {
            text,
            digest,
        })
    }

    /// Rebuilds stored content, verifying size and digest.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::TooLarge`] or [`ContentError::DigestMismatch`].
    pub fn from_stored(text: String, digest: HashDigest) -> Result<Self, ContentError> {
        if text.len() > MAX_CONTENT_BYTES {
            return Err(ContentError::TooLarge {
                max_bytes: MAX_CONTENT_BYTES,
                actual_bytes: text.len(),
            });
        }
        if hash_bytes(digest.algorithm, text.as_bytes()) != digest {
            return Err(ContentError::DigestMismatch);
        }
        Ok(Self {
            text,
            digest,
        })
    }

    /// Returns the stored JSON text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the content digest.
    #[must_use]
    pub const fn digest(&self) -> &HashDigest {
        &self.digest
    }

    /// Returns the stored size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Returns true for empty text (never produced by [`EncodedContent::encode`]).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Parses the stored text back into a value.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Serialization`] when the text is not JSON.
    pub fn decode(&self) -> Result<Value, ContentError> {
        serde_json::from_str(&self.text).map_err(|err| ContentError::Serialization(err.to_string()))
    }
}
