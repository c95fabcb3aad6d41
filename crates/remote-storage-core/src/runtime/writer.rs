// crates/remote-storage-core/src/runtime/writer.rs
// ============================================================================
// Module: Remote Storage Writer Retry
// Description: Timestamp assignment with a single retry on collision.
// Purpose: Share the collision protocol between every store backend.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Backends supply one insert attempt as a closure; this module reads the
//! clock, runs the attempt, and on a key/timestamp collision sleeps for the
//! fixed backoff, re-reads the clock and tries exactly once more. A second
//! collision surfaces as [`StoreError::DuplicateVersion`]. Backend errors are
//! never retried.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::thread;
use std::time::Duration;

use crate::core::Clock;
use crate::core::Timestamp;
use crate::core::VersionKey;
use crate::interfaces::StoreError;
use crate::interfaces::StoreReceipt;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default pause before the collision retry.
pub const DEFAULT_COLLISION_BACKOFF: Duration = Duration::from_millis(10);

// ============================================================================
// SECTION: Insert Attempts
// ============================================================================

/// Result of a single insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertAttempt {
    /// The version was inserted and retention restored.
    Inserted {
        /// Versions evicted after the insert.
        evicted: u64,
    },
    /// A version with the same key and timestamp already exists.
    Collision,
}

/// Runs `attempt` at the current time, retrying once after `backoff` on a
/// collision.
///
/// # Errors
///
/// Returns [`StoreError::DuplicateVersion`] when the retry also collides and
/// propagates any error returned by `attempt` unchanged.
pub fn insert_with_retry<F>(
    clock: &dyn Clock,
    backoff: Duration,
    key: &VersionKey,
    mut attempt: F,
) -> Result<StoreReceipt, StoreError>
where
    F: FnMut(Timestamp) -> Result<InsertAttempt, StoreError>,
{
    let first = clock.now();
    if let InsertAttempt::Inserted {
        evicted,
    } = attempt(first)?
    {
        return Ok(StoreReceipt {
            timestamp: first,
            retried: false,
            evicted,
        });
    }

    thread::sleep(backoff);
    let second = clock.now();
    match attempt(second)? {
        InsertAttempt::Inserted {
            evicted,
        } => Ok(StoreReceipt {
            timestamp: second,
            retried: true,
            evicted,
        }),
        InsertAttempt::Collision => Err(StoreError::DuplicateVersion {
            key: key.to_string(),
            timestamp: second,
        }),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "Test-only assertions are permitted."
    )]

    use super::*;
    use crate::core::DimensionSchema;
    use crate::core::ManualClock;

    fn key() -> VersionKey {
        DimensionSchema::new(["test_id"]).unwrap().key(Some("var"), [("test_id", "t")]).unwrap()
    }

    fn clock() -> ManualClock {
        ManualClock::new(Timestamp::from_secs(100.0).unwrap())
    }

    #[test]
    fn first_attempt_success_is_not_retried() {
        let clock = clock();
        let mut calls = 0;
        let receipt = insert_with_retry(&clock, Duration::ZERO, &key(), |_| {
            calls += 1;
            Ok(InsertAttempt::Inserted {
                evicted: 2,
            })
        })
        .unwrap();
        assert_eq!(calls, 1);
        assert!(!receipt.retried);
        assert_eq!(receipt.evicted, 2);
    }

    #[test]
    fn collision_retries_exactly_once() {
        let clock = clock();
        let mut seen = Vec::new();
        let result = insert_with_retry(&clock, Duration::ZERO, &key(), |timestamp| {
            seen.push(timestamp);
            Ok(InsertAttempt::Collision)
        });
        assert_eq!(seen.len(), 2);
        match result {
            Err(StoreError::DuplicateVersion {
                key,
                ..
            }) => assert_eq!(key, "var[test_id='t']"),
            other => panic!("expected duplicate version, got {other:?}"),
        }
    }

    #[test]
    fn backend_errors_are_not_retried() {
        let clock = clock();
        let mut calls = 0;
        let result = insert_with_retry(&clock, Duration::ZERO, &key(), |_| {
            calls += 1;
            Err(StoreError::Io("disk".to_string()))
        });
        assert_eq!(calls, 1);
        assert!(matches!(result, Err(StoreError::Io(_))));
    }
}
