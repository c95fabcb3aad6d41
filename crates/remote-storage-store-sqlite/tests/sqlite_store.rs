// crates/remote-storage-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Version Store Behavior Tests
// Description: Store contract tests against a real SQLite database.
// Purpose: Validate round trips, wildcards, windows, retention, collisions,
//          persistence, and concurrent access.
// ============================================================================

//! ## Overview
//! Behavioral tests for [`SqliteVersionStore`]:
//! - Round trips and wildcard matching
//! - Inclusive time windows and not-found policies
//! - Per-key retention with oldest-first eviction
//! - Collision retry and duplicate failure
//! - Persistence across reopen and multi-threaded writers

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::Barrier;
use std::sync::Mutex;
use std::thread;

use proptest::prelude::*;
use remote_storage_core::Clock;
use remote_storage_core::DimensionSchema;
use remote_storage_core::LatestQuery;
use remote_storage_core::ManualClock;
use remote_storage_core::NotFoundPolicy;
use remote_storage_core::PartialKey;
use remote_storage_core::StoreError;
use remote_storage_core::Timestamp;
use remote_storage_core::VersionStore;
use remote_storage_store_sqlite::SqliteStoreConfig;
use remote_storage_store_sqlite::SqliteVersionStore;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Clock that replays scripted readings, then repeats the last one.
struct ScriptedClock {
    /// Readings still to hand out.
    readings: Mutex<VecDeque<f64>>,
    /// Most recent reading.
    last: Mutex<f64>,
}

impl ScriptedClock {
    fn new(readings: &[f64]) -> Self {
        Self {
            readings: Mutex::new(readings.iter().copied().collect()),
            last: Mutex::new(0.0),
        }
    }
}

impl Clock for ScriptedClock {
    fn now(&self) -> Timestamp {
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.readings.lock().unwrap().pop_front() {
            *last = next;
        }
        Timestamp::from_secs(*last).unwrap()
    }
}

fn ts(secs: f64) -> Timestamp {
    Timestamp::from_secs(secs).unwrap()
}

fn schema() -> DimensionSchema {
    DimensionSchema::new(["test_set", "test_id"]).unwrap()
}

fn config_for(path: &Path, max_versions: u64) -> SqliteStoreConfig {
    let mut config = SqliteStoreConfig::new(path.join("versions.db"));
    config.busy_timeout_ms = 1_000;
    config.max_versions = max_versions;
    config.collision_backoff_ms = 0;
    config
}

fn open_with(path: &Path, max_versions: u64, clock: Arc<dyn Clock>) -> SqliteVersionStore {
    SqliteVersionStore::open_with_clock(config_for(path, max_versions), schema(), clock)
        .expect("store init")
}

fn manual_store(path: &Path, start: f64) -> (SqliteVersionStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(ts(start)));
    (open_with(path, 365, clock.clone()), clock)
}

fn json_value_strategy(max_depth: u32) -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|v| Value::Number(v.into())),
        any::<u64>().prop_map(|v| Value::Number(v.into())),
        any::<f64>()
            .prop_filter("finite", |v| v.is_finite())
            .prop_map(|v| serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)),
        (-1_000i32 .. 1_000).prop_map(|v| json!(f64::from(v))),
        ".*".prop_map(Value::String),
    ];

    leaf.prop_recursive(max_depth, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0 .. 4).prop_map(Value::Array),
            prop::collection::btree_map(".{0,6}", inner, 0 .. 4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

fn latest(store: &SqliteVersionStore, query: &LatestQuery) -> Option<Value> {
    store.retrieve_latest(query, NotFoundPolicy::ReturnNone).unwrap()
}

// ============================================================================
// SECTION: Round Trip and Wildcards
// ============================================================================

#[test]
fn integral_floats_round_trip_as_floats() {
    let temp = TempDir::new().unwrap();
    let (store, _clock) = manual_store(temp.path(), 1.0);
    let key = schema().key(Some("var"), []).unwrap();
    let value = json!({"ratio": 2.0, "xs": [1.0, 0.5], "count": 3});
    store.store(&key, &value).unwrap();
    let found = latest(&store, &LatestQuery::new(PartialKey::exact(&key))).unwrap();
    assert!(found["ratio"].is_f64());
    assert_eq!(found, value);
}

#[test]
fn store_then_retrieve_exact_round_trips() {
    let temp = TempDir::new().unwrap();
    let (store, _clock) = manual_store(temp.path(), 1.0);
    let key = schema().key(Some("var"), [("test_set", "s"), ("test_id", "t")]).unwrap();
    let value = json!({"list": [1, 2.5, "three"], "nested": {"flag": false}, "none": null});
    let receipt = store.store(&key, &value).unwrap();
    assert_eq!(receipt.timestamp, ts(1.0));
    assert!(!receipt.retried);
    assert_eq!(receipt.evicted, 0);

    let query = LatestQuery::new(PartialKey::exact(&key));
    assert_eq!(store.retrieve_latest(&query, NotFoundPolicy::Fail).unwrap(), Some(value));
}

#[test]
fn wildcard_returns_newest_across_matching_keys() {
    let temp = TempDir::new().unwrap();
    let (store, clock) = manual_store(temp.path(), 10.0);
    let schema = schema();
    let first = schema.key(Some("var"), [("test_set", "a"), ("test_id", "1")]).unwrap();
    let second = schema.key(Some("var"), [("test_set", "b"), ("test_id", "1")]).unwrap();
    let other = schema.key(Some("other"), [("test_set", "a")]).unwrap();
    store.store(&first, &json!("first")).unwrap();
    clock.advance(1.0);
    store.store(&second, &json!("second")).unwrap();
    clock.advance(1.0);
    store.store(&other, &json!("other")).unwrap();

    let wide = LatestQuery::new(schema.partial_key(Some("var"), []).unwrap());
    assert_eq!(latest(&store, &wide), Some(json!("second")));
    let narrow = LatestQuery::new(schema.partial_key(Some("var"), [("test_set", "a")]).unwrap());
    assert_eq!(latest(&store, &narrow), Some(json!("first")));
}

#[test]
fn explicit_empty_value_does_not_match_populated_dimension() {
    let temp = TempDir::new().unwrap();
    let (store, _clock) = manual_store(temp.path(), 1.0);
    let key = schema().key(Some("var"), [("test_set", "s"), ("test_id", "t")]).unwrap();
    store.store(&key, &json!(1)).unwrap();

    let empty = LatestQuery::new(
        schema().partial_key(Some("var"), [("test_set", "s"), ("test_id", "")]).unwrap(),
    );
    assert_eq!(latest(&store, &empty), None);
    let wildcard =
        LatestQuery::new(schema().partial_key(Some("var"), [("test_set", "s")]).unwrap());
    assert_eq!(latest(&store, &wildcard), Some(json!(1)));
}

// ============================================================================
// SECTION: Time Windows and Not Found
// ============================================================================

#[test]
fn window_bounds_are_inclusive() {
    let temp = TempDir::new().unwrap();
    let (store, clock) = manual_store(temp.path(), 10.0);
    let key = schema().key(Some("var"), []).unwrap();
    for (secs, value) in [(10.0, "ten"), (20.0, "twenty"), (30.0, "thirty")] {
        clock.set(ts(secs));
        store.store(&key, &json!(value)).unwrap();
    }
    let base = LatestQuery::new(PartialKey::exact(&key));

    assert_eq!(latest(&store, &base.clone().before(Some(ts(20.0)))), Some(json!("twenty")));
    assert_eq!(latest(&store, &base.clone().before(Some(ts(19.9)))), Some(json!("ten")));
    assert_eq!(latest(&store, &base.clone().after(Some(ts(30.0)))), Some(json!("thirty")));
    assert_eq!(latest(&store, &base.clone().after(Some(ts(30.1)))), None);
    let window = base.clone().after(Some(ts(15.0))).before(Some(ts(25.0)));
    assert_eq!(latest(&store, &window), Some(json!("twenty")));
    let inverted = base.after(Some(ts(25.0))).before(Some(ts(15.0)));
    assert_eq!(latest(&store, &inverted), None);
}

#[test]
fn not_found_policy_selects_none_or_error() {
    let temp = TempDir::new().unwrap();
    let (store, _clock) = manual_store(temp.path(), 1.0);
    let query = LatestQuery::new(schema().partial_key(Some("missing"), []).unwrap());
    assert_eq!(store.retrieve_latest(&query, NotFoundPolicy::ReturnNone).unwrap(), None);
    let err = store.retrieve_latest(&query, NotFoundPolicy::Fail).unwrap_err();
    assert!(matches!(err, StoreError::VersionNotFound { .. }));
    assert_eq!(err.to_string(), "no version found for missing[test_set=*, test_id=*]");
}

#[test]
fn missing_name_is_rejected_before_touching_the_store() {
    let temp = TempDir::new().unwrap();
    let (store, _clock) = manual_store(temp.path(), 1.0);
    let err = schema().key(None, []).unwrap_err();
    assert!(matches!(StoreError::from(err), StoreError::MissingPrimaryName));
    assert_eq!(store.retrieve_count(&schema().key(Some("var"), []).unwrap()).unwrap(), 0);
}

// ============================================================================
// SECTION: Retention
// ============================================================================

#[test]
fn retention_keeps_newest_versions_per_key() {
    let temp = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(ts(1.0)));
    let store = open_with(temp.path(), 3, clock.clone());
    let key = schema().key(Some("var"), [("test_id", "a")]).unwrap();
    let neighbour = schema().key(Some("var"), [("test_id", "b")]).unwrap();
    store.store(&neighbour, &json!("kept")).unwrap();
    let mut evicted = 0;
    for step in 0 .. 5 {
        clock.advance(1.0);
        evicted += store.store(&key, &json!(step)).unwrap().evicted;
    }
    assert_eq!(evicted, 2);
    assert_eq!(store.retrieve_count(&key).unwrap(), 3);
    assert_eq!(store.retrieve_count(&neighbour).unwrap(), 1);

    let history = store.history(&key).unwrap();
    let times: Vec<f64> = history.iter().map(|summary| summary.timestamp.as_secs()).collect();
    assert_eq!(times, [6.0, 5.0, 4.0]);
    let oldest = LatestQuery::new(PartialKey::exact(&key)).before(Some(ts(3.0)));
    assert_eq!(latest(&store, &oldest), None);
}

#[test]
fn history_reports_content_size_and_hash() {
    let temp = TempDir::new().unwrap();
    let (store, _clock) = manual_store(temp.path(), 1.0);
    let key = schema().key(Some("var"), []).unwrap();
    store.store(&key, &json!({"b": 1, "a": 2})).unwrap();
    let history = store.history(&key).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content_bytes, br#"{"a":2,"b":1}"#.len() as u64);
    assert_eq!(history[0].content_hash.value.len(), 64);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn retention_never_exceeds_cap(cap in 1_u32 .. 6, extra in 0_u32 .. 6) {
        let temp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(ts(0.0)));
        let store = open_with(temp.path(), u64::from(cap), clock.clone());
        let key = schema().key(Some("var"), []).unwrap();
        for _ in 0 .. cap + extra {
            clock.advance(1.0);
            store.store(&key, &json!(null)).unwrap();
        }
        prop_assert_eq!(store.retrieve_count(&key).unwrap(), u64::from(cap));
        let newest = store.history(&key).unwrap()[0].timestamp;
        prop_assert_eq!(newest.as_secs(), f64::from(cap + extra));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_value_round_trips_through_sqlite(value in json_value_strategy(4)) {
        let temp = TempDir::new().unwrap();
        let (store, _clock) = manual_store(temp.path(), 1.0);
        let key = schema().key(Some("var"), [("test_id", "t")]).unwrap();
        store.store(&key, &value).unwrap();
        let query = LatestQuery::new(PartialKey::exact(&key));
        prop_assert_eq!(store.retrieve_latest(&query, NotFoundPolicy::Fail).unwrap(), Some(value));
    }
}

// ============================================================================
// SECTION: Collisions
// ============================================================================

#[test]
fn collision_retries_with_fresh_timestamp() {
    let temp = TempDir::new().unwrap();
    let store = open_with(temp.path(), 365, Arc::new(ScriptedClock::new(&[5.0, 5.0, 6.0])));
    let key = schema().key(Some("var"), []).unwrap();
    assert!(!store.store(&key, &json!(1)).unwrap().retried);
    let receipt = store.store(&key, &json!(2)).unwrap();
    assert!(receipt.retried);
    assert_eq!(receipt.timestamp, ts(6.0));
    assert_eq!(store.retrieve_count(&key).unwrap(), 2);
}

#[test]
fn second_collision_fails_with_duplicate_version() {
    let temp = TempDir::new().unwrap();
    let store = open_with(temp.path(), 365, Arc::new(ScriptedClock::new(&[5.0])));
    let key = schema().key(Some("var"), [("test_set", "s")]).unwrap();
    store.store(&key, &json!(1)).unwrap();
    let err = store.store(&key, &json!(2)).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateVersion { .. }));
    assert_eq!(
        err.to_string(),
        "duplicate version for var[test_set='s', test_id=''] at 5.000000"
    );
    assert_eq!(store.retrieve_count(&key).unwrap(), 1);
}

#[test]
fn concurrent_writers_on_one_timestamp_retry_once() {
    let temp = TempDir::new().unwrap();
    let store = open_with(temp.path(), 365, Arc::new(ScriptedClock::new(&[5.0, 5.0, 6.0])));
    let key = schema().key(Some("var"), [("test_id", "t")]).unwrap();
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0 .. 2)
        .map(|worker| {
            let store = store.clone();
            let key = key.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.store(&key, &json!(worker)).unwrap()
            })
        })
        .collect();
    let mut receipts: Vec<_> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();
    receipts.sort_by(|left, right| left.timestamp.cmp(&right.timestamp));
    assert_eq!(receipts[0].timestamp, ts(5.0));
    assert!(!receipts[0].retried);
    assert_eq!(receipts[1].timestamp, ts(6.0));
    assert!(receipts[1].retried);
    let history = store.history(&key).unwrap();
    let times: Vec<f64> = history.iter().map(|summary| summary.timestamp.as_secs()).collect();
    assert_eq!(times, [6.0, 5.0]);
}

#[test]
fn same_timestamp_on_distinct_keys_is_not_a_collision() {
    let temp = TempDir::new().unwrap();
    let store = open_with(temp.path(), 365, Arc::new(ScriptedClock::new(&[5.0])));
    let left = schema().key(Some("var"), [("test_id", "l")]).unwrap();
    let right = schema().key(Some("var"), [("test_id", "r")]).unwrap();
    assert!(!store.store(&left, &json!(1)).unwrap().retried);
    assert!(!store.store(&right, &json!(2)).unwrap().retried);
}

// ============================================================================
// SECTION: Persistence and Concurrency
// ============================================================================

#[test]
fn versions_survive_reopen() {
    let temp = TempDir::new().unwrap();
    let key = schema().key(Some("var"), [("test_id", "t")]).unwrap();
    {
        let (store, _clock) = manual_store(temp.path(), 42.0);
        store.store(&key, &json!({"persisted": true})).unwrap();
    }
    let (reopened, _clock) = manual_store(temp.path(), 100.0);
    let query = LatestQuery::new(PartialKey::exact(&key));
    assert_eq!(latest(&reopened, &query), Some(json!({"persisted": true})));
    assert_eq!(reopened.history(&key).unwrap()[0].timestamp, ts(42.0));
}

#[test]
fn concurrent_writers_and_readers_share_the_store() {
    let temp = TempDir::new().unwrap();
    let mut config = config_for(temp.path(), 365);
    config.collision_backoff_ms = 10;
    let store = SqliteVersionStore::open(config, schema()).unwrap();
    let mut handles = Vec::new();
    for worker in 0 .. 4 {
        let store = store.clone();
        handles.push(thread::spawn(move || {
            let test_id = worker.to_string();
            let key = schema().key(Some("var"), [("test_id", test_id.as_str())]).unwrap();
            for step in 0 .. 5 {
                store.store(&key, &json!(step)).unwrap();
                let query = LatestQuery::new(PartialKey::exact(&key));
                assert!(store.retrieve_latest(&query, NotFoundPolicy::Fail).unwrap().is_some());
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    let total: u64 = (0 .. 4)
        .map(|worker: u32| {
            let test_id = worker.to_string();
            let key = schema().key(Some("var"), [("test_id", test_id.as_str())]).unwrap();
            store.retrieve_count(&key).unwrap()
        })
        .sum();
    assert_eq!(total, 20);
}

#[test]
fn current_timestamp_reads_the_store_clock() {
    let temp = TempDir::new().unwrap();
    let (store, clock) = manual_store(temp.path(), 7.5);
    assert_eq!(store.current_timestamp(), ts(7.5));
    clock.advance(0.5);
    assert_eq!(store.current_timestamp(), ts(8.0));
}
