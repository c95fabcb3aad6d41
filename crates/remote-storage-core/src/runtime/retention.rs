// crates/remote-storage-core/src/runtime/retention.rs
// ============================================================================
// Module: Remote Storage Retention Policy
// Description: Per-key version cap and eviction arithmetic.
// Purpose: Decide how many of a key's oldest versions must be removed.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! Every distinct key keeps at most `max_versions` versions. After each
//! insert the writer asks [`RetentionPolicy::excess`] how many of the oldest
//! versions to delete, and evicts them in the same transaction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::num::NonZeroU64;

use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum versions kept per key.
pub const DEFAULT_MAX_VERSIONS: u64 = 365;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Bounded retention policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Maximum versions per key.
    max_versions: NonZeroU64,
}

impl RetentionPolicy {
    /// Creates a policy with a non-zero cap.
    #[must_use]
    pub const fn new(max_versions: NonZeroU64) -> Self {
        Self {
            max_versions,
        }
    }

    /// Creates a policy from a raw cap.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when `max_versions` is zero.
    pub fn from_count(max_versions: u64) -> Result<Self, StoreError> {
        NonZeroU64::new(max_versions).map(Self::new).ok_or_else(|| {
            StoreError::Invalid("max_versions must be greater than zero".to_string())
        })
    }

    /// Returns the per-key cap.
    #[must_use]
    pub const fn max_versions(self) -> u64 {
        self.max_versions.get()
    }

    /// Returns how many versions exceed the cap for a key holding `count`.
    #[must_use]
    pub const fn excess(self, count: u64) -> u64 {
        count.saturating_sub(self.max_versions.get())
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(NonZeroU64::MIN.saturating_add(DEFAULT_MAX_VERSIONS - 1))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
