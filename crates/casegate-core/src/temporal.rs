//! # Temporal Types — UTC-Only Timestamps and Clocks
//!
//! Defines [`Timestamp`], a UTC-only timestamp truncated to millisecond
//! precision, and the [`Clock`] seam through which the core reads the
//! current time.
//!
//! Audit events are totally ordered per case by `(timestamp, sequence)`.
//! Millisecond precision keeps the timestamp component meaningful for
//! point-in-time reconstruction while the sequence number breaks ties.
//!
//! Non-UTC inputs are **rejected at construction** by [`Timestamp::parse`].

use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A UTC-only timestamp, truncated to milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated to milliseconds.
    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    /// From a `DateTime<Utc>`, truncating sub-millisecond components.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_millis(dt))
    }

    /// Parse an RFC 3339 timestamp. Only the `Z` suffix is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Timestamp`] for malformed input or any explicit
    /// offset, including `+00:00`.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if !s.ends_with('Z') {
            return Err(CoreError::Timestamp(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| CoreError::Timestamp(format!("invalid RFC 3339 timestamp {s:?}: {e}")))?;
        Ok(Self::from_utc(dt.with_timezone(&Utc)))
    }

    /// Create a timestamp from Unix epoch milliseconds.
    pub fn from_epoch_millis(millis: i64) -> Result<Self, CoreError> {
        DateTime::from_timestamp_millis(millis)
            .map(Self)
            .ok_or_else(|| CoreError::Timestamp(format!("invalid Unix millis: {millis}")))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Unix epoch milliseconds.
    pub fn epoch_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// This instant shifted forward by `hours`.
    pub fn plus_hours(&self, hours: u32) -> Self {
        Self(self.0 + Duration::hours(i64::from(hours)))
    }

    /// This instant shifted forward by `millis`.
    pub fn plus_millis(&self, millis: i64) -> Self {
        Self(self.0 + Duration::milliseconds(millis))
    }

    /// Render as ISO 8601 with millisecond precision and Z suffix.
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

fn truncate_to_millis(dt: DateTime<Utc>) -> DateTime<Utc> {
    let millis = dt.nanosecond() / 1_000_000;
    dt.with_nanosecond(millis * 1_000_000).unwrap_or(dt)
}

// ── Clocks ───────────────────────────────────────────────────────────

/// Source of the current time.
///
/// Everything in the core that stamps an event or compares against an SLA
/// deadline reads time through this trait.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to.
///
/// Cloning shares the underlying instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    /// Start the clock at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward by `millis`.
    pub fn advance_millis(&self, millis: i64) {
        let mut current = self.current.lock();
        *current = current.plus_millis(millis);
    }

    /// Move the clock forward by `hours`.
    pub fn advance_hours(&self, hours: u32) {
        let mut current = self.current.lock();
        *current = current.plus_hours(hours);
    }

    /// Jump to an explicit instant.
    pub fn set(&self, to: Timestamp) {
        *self.current.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.lock()
    }
}
