// crates/remote-storage-core/src/runtime/store.rs
// ============================================================================
// Module: Remote Storage In-Memory Store
// Description: Process-local version store for tests and embedding.
// Purpose: Provide a deterministic store implementation without external deps.
// Dependencies: crate::core, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! [`InMemoryVersionStore`] implements [`VersionStore`] over a mutex-guarded
//! map with the same semantics as the durable backends: per-key timestamp
//! uniqueness with a single collision retry, synchronous retention, inclusive
//! windows, wildcard matching, and hash-verified reads. Nothing survives the
//! process.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use serde_json::Value;

use crate::core::Clock;
use crate::core::DimensionSchema;
use crate::core::EncodedContent;
use crate::core::SystemClock;
use crate::core::Timestamp;
use crate::core::VersionKey;
use crate::interfaces::LatestQuery;
use crate::interfaces::NotFoundPolicy;
use crate::interfaces::StoreError;
use crate::interfaces::StoreReceipt;
use crate::interfaces::VersionStore;
use crate::interfaces::VersionSummary;
use crate::runtime::retention::RetentionPolicy;
use crate::runtime::writer::DEFAULT_COLLISION_BACKOFF;
use crate::runtime::writer::InsertAttempt;
use crate::runtime::writer::insert_with_retry;

// ============================================================================
// SECTION: State
// ============================================================================

/// One stored version.
#[derive(Debug, Clone)]
struct StoredVersion {
    /// Version timestamp.
    timestamp: Timestamp,
    /// Insertion order; breaks timestamp ties.
    sequence: u64,
    /// Canonical content.
    content: EncodedContent,
}

impl StoredVersion {
    /// Orders versions oldest first.
    fn age_order(&self, other: &Self) -> Ordering {
        self.timestamp.cmp(&other.timestamp).then(self.sequence.cmp(&other.sequence))
    }
}

/// Mutable store contents.
#[derive(Debug, Default)]
struct MemoryState {
    /// Versions per canonical key.
    versions: HashMap<VersionKey, Vec<StoredVersion>>,
    /// Next insertion sequence.
    next_sequence: u64,
}

impl MemoryState {
    /// Inserts one version and evicts the oldest excess versions.
    fn insert(
        &mut self,
        key: &VersionKey,
        timestamp: Timestamp,
        content: &EncodedContent,
        retention: RetentionPolicy,
    ) -> InsertAttempt {
        let versions = self.versions.entry(key.clone()).or_default();
        if versions.iter().any(|version| version.timestamp == timestamp) {
            return InsertAttempt::Collision;
        }
        versions.push(StoredVersion {
            timestamp,
            sequence: self.next_sequence,
            content: content.clone(),
        });
        self.next_sequence += 1;

        let count = u64::try_from(versions.len()).unwrap_or(u64::MAX);
        let excess = retention.excess(count);
        if excess > 0 {
            versions.sort_by(StoredVersion::age_order);
            let remove = usize::try_from(excess).unwrap_or(usize::MAX).min(versions.len());
            versions.drain(..remove);
        }
        InsertAttempt::Inserted {
            evicted: excess,
        }
    }
}

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory version store for tests and examples.
pub struct InMemoryVersionStore {
    /// Dimension schema keys must conform to.
    schema: DimensionSchema,
    /// Per-key retention cap.
    retention: RetentionPolicy,
    /// Pause before the collision retry.
    collision_backoff: Duration,
    /// Timestamp source.
    clock: Arc<dyn Clock>,
    /// Store contents.
    state: Mutex<MemoryState>,
}

impl InMemoryVersionStore {
    /// Creates an empty store using the system clock and default retention.
    #[must_use]
    pub fn new(schema: DimensionSchema) -> Self {
        Self::with_clock(schema, Arc::new(SystemClock::new()))
    }

    /// Creates an empty store using `clock`.
    #[must_use]
    pub fn with_clock(schema: DimensionSchema, clock: Arc<dyn Clock>) -> Self {
        Self {
            schema,
            retention: RetentionPolicy::default(),
            collision_backoff: DEFAULT_COLLISION_BACKOFF,
            clock,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Replaces the retention policy.
    #[must_use]
    pub const fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Replaces the collision backoff.
    #[must_use]
    pub const fn with_collision_backoff(mut self, backoff: Duration) -> Self {
        self.collision_backoff = backoff;
        self
    }

    /// Locks the store contents.
    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Store("version store mutex poisoned".to_string()))
    }
}

impl VersionStore for InMemoryVersionStore {
    fn schema(&self) -> &DimensionSchema {
        &self.schema
    }

    fn store(&self, key: &VersionKey, value: &Value) -> Result<StoreReceipt, StoreError> {
        self.schema.conforms_key(key)?;
        let content = EncodedContent::encode(value)?;
        insert_with_retry(self.clock.as_ref(), self.collision_backoff, key, |timestamp| {
            Ok(self.lock()?.insert(key, timestamp, &content, self.retention))
        })
    }

    fn retrieve_latest(
        &self,
        query: &LatestQuery,
        policy: NotFoundPolicy,
    ) -> Result<Option<Value>, StoreError> {
        self.schema.conforms_partial(&query.key)?;
        let latest = if query.is_empty_window() {
            None
        } else {
            let state = self.lock()?;
            state
                .versions
                .iter()
                .filter(|(key, _)| query.key.matches(key))
                .flat_map(|(_, versions)| versions.iter())
                .filter(|version| query.admits(version.timestamp))
                .max_by(|left, right| left.age_order(right))
                .map(|version| version.content.clone())
        };
        let value = latest.map(|content| content.decode()).transpose()?;
        policy.apply(query, value)
    }

    fn retrieve_count(&self, key: &VersionKey) -> Result<u64, StoreError> {
        self.schema.conforms_key(key)?;
        let state = self.lock()?;
        let count = state.versions.get(key).map_or(0, Vec::len);
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    fn history(&self, key: &VersionKey) -> Result<Vec<VersionSummary>, StoreError> {
        self.schema.conforms_key(key)?;
        let mut versions = {
            let state = self.lock()?;
            state.versions.get(key).cloned().unwrap_or_default()
        };
        versions.sort_by(|left, right| right.age_order(left));
        Ok(versions
            .into_iter()
            .map(|version| VersionSummary {
                timestamp: version.timestamp,
                content_bytes: u64::try_from(version.content.len()).unwrap_or(u64::MAX),
                content_hash: version.content.digest().clone(),
            })
            .collect())
    }

    fn current_timestamp(&self) -> Timestamp {
        self.clock.now()
    }
}
