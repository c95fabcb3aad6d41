// crates/remote-storage-core/src/core/time.rs
// ============================================================================
// Module: Remote Storage Time Model
// Description: Version timestamps and the clock abstraction that sources them.
// Purpose: Give stores an injectable, high-resolution time source.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Version timestamps are fractional epoch seconds. Stores never read the wall
//! clock directly; they are handed a [`Clock`] at construction so tests and
//! replays can control time. [`SystemClock`] never moves backwards within a
//! process but may repeat a value, which is the collision case the writer's
//! single retry absorbs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Timestamp construction errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimeError {
    /// The value is NaN or infinite.
    #[error("timestamp must be a finite number of seconds: {0}")]
    NonFinite(f64),
    /// The text is not a number.
    #[error("timestamp is not a number: {0}")]
    Parse(String),
}

/// Version timestamp in fractional epoch seconds.
///
/// # Invariants
/// - Always finite; `-0.0` is normalized to `0.0`.
/// - Ordering and equality are total (`f64::total_cmp`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Timestamp(f64);

impl Timestamp {
    /// Creates a timestamp from epoch seconds.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::NonFinite`] for NaN or infinite input.
    pub fn from_secs(secs: f64) -> Result<Self, TimeError> {
        if !secs.is_finite() {
            return Err(TimeError::NonFinite(secs));
        }
        Ok(Self(secs + 0.0))
    }

    /// Returns the timestamp as epoch seconds.
    #[must_use]
    pub const fn as_secs(self) -> f64 {
        self.0
    }

    /// Converts a system time into a timestamp (pre-epoch clamps to zero).
    #[must_use]
    pub fn from_system_time(time: SystemTime) -> Self {
        Self(time.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64())
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

impl TryFrom<f64> for Timestamp {
    type Error = TimeError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::from_secs(value)
    }
}

impl From<Timestamp> for f64 {
    fn from(value: Timestamp) -> Self {
        value.0
    }
}

impl FromStr for Timestamp {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let secs: f64 = s.trim().parse().map_err(|_| TimeError::Parse(s.to_string()))?;
        Self::from_secs(secs)
    }
}

// ============================================================================
// SECTION: Clocks
// ============================================================================

/// Time source for version timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time that never moves backwards within the process.
#[derive(Debug, Default)]
pub struct SystemClock {
    /// Highest value handed out so far.
    last: Mutex<f64>,
}

impl SystemClock {
    /// Creates a system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let wall = Timestamp::from_system_time(SystemTime::now()).as_secs();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let value = wall.max(*last);
        *last = value;
        drop(last);
        Timestamp(value)
    }
}

/// Manually driven clock for tests and deterministic replays.
#[derive(Debug)]
pub struct ManualClock {
    /// Current reading.
    current: Mutex<Timestamp>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    #[must_use]
    pub const fn new(start: Timestamp) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Sets the current reading.
    pub fn set(&self, timestamp: Timestamp) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = timestamp;
    }

    /// Moves the reading forward by `secs` (ignored if the result is not finite).
    pub fn advance(&self, secs: f64) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Ok(next) = Timestamp::from_secs(current.as_secs() + secs) {
            *current = next;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
