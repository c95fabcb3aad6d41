// crates/remote-storage-core/src/core/mod.rs
// ============================================================================
// Module: Remote Storage Core Types
// Description: Key, time, and content types shared by every store backend.
// Purpose: Provide stable, validated building blocks for versioned storage.
// Dependencies: serde, serde_json, sha2, thiserror
// ============================================================================

//! ## Overview
//! Core types define how keys are normalized, how version timestamps are
//! sourced, and how stored values are serialized and hashed. Backends
//! depend on these types; they never re-derive the rules themselves.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod content;
pub mod hashing;
pub mod key;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use content::ContentError;
pub use content::EncodedContent;
pub use content::MAX_CONTENT_BYTES;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use key::DimensionFilter;
pub use key::DimensionName;
pub use key::DimensionPredicate;
pub use key::DimensionSchema;
pub use key::DimensionValue;
pub use key::KeyError;
pub use key::MAX_DIMENSIONS;
pub use key::MAX_KEY_COMPONENT_BYTES;
pub use key::PartialKey;
pub use key::VariableName;
pub use key::VersionKey;
pub use time::Clock;
pub use time::ManualClock;
pub use time::SystemClock;
pub use time::TimeError;
pub use time::Timestamp;
