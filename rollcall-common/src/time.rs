//! Timestamp utilities and the server-side clock
//!
//! Every instant handled by rollcall is UTC. The persisted form is RFC 3339 with
//! millisecond precision and a `Z` suffix (`2025-12-08T10:00:00.000Z`), so string
//! order in SQLite matches chronological order.
//!
//! Session windows are always evaluated against a [`Clock`] owned by the server;
//! clients never supply "now".
//!
//! Instants are cut to whole milliseconds where they enter the system (clock
//! reads, parsed input), so an in-memory comparison agrees with one made on
//! the stored text.

use crate::{Error, Result};
use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use std::sync::{Arc, Mutex, PoisonError};

/// Source of the current time for eligibility checks
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        to_millis(Utc::now())
    }
}

/// Clock that only moves when told to
///
/// Clones share the same instant, so a test can hold one handle and move time
/// under a running service.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(to_millis(start))),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = to_millis(instant);
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current = to_millis(*current + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drop precision below the millisecond
pub fn to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(3)
}

/// Canonical storage form of an instant
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a client-supplied timestamp into UTC
///
/// Accepts RFC 3339 with any offset (normalized to UTC) or a naive
/// `YYYY-MM-DDTHH:MM[:SS[.fff]]` value, which is taken to already be UTC.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("Timestamp is empty".to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(to_millis(dt.with_timezone(&Utc)));
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(to_millis(naive.and_utc()));
        }
    }

    Err(Error::InvalidInput(format!(
        "Unrecognized timestamp '{}': expected RFC 3339 or YYYY-MM-DDTHH:MM[:SS]",
        input
    )))
}

/// Serde adapter writing instants in canonical storage form
pub mod canonical {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}
