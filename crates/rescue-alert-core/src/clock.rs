//! Injected time source
//!
//! Evaluation never reads wall-clock time directly. Callers pass a [`Clock`]
//! per call: [`SystemClock`] in production, [`FixedClock`] in tests and for
//! offline re-evaluation of a recorded log.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of the current instant
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current instant in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by real time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a single instant
///
/// Counts how often it is read so tests can assert that an evaluation takes
/// exactly one reading.
#[derive(Debug)]
pub struct FixedClock {
    instant: DateTime<Utc>,
    reads: AtomicUsize,
}

impl FixedClock {
    /// Create a clock that always returns `instant`
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant,
            reads: AtomicUsize::new(0),
        }
    }

    /// Create a clock from an RFC 3339 / ISO-8601 timestamp
    pub fn parse(timestamp: &str) -> Result<Self, chrono::ParseError> {
        Ok(Self::new(parse_timestamp(timestamp)?))
    }

    /// Number of times `now` has been called
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.instant
    }
}

impl Clone for FixedClock {
    fn clone(&self) -> Self {
        Self::new(self.instant)
    }
}

/// Render an instant the way audit events carry it: `2026-03-01T12:00:00.000Z`
pub fn format_timestamp(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

const ISO_WITH_OFFSET: &str = "%Y-%m-%dT%H:%M:%S%.f%z";
const ISO_NAIVE: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Parse an ISO-8601 timestamp into UTC
///
/// Accepts RFC 3339, basic offsets such as `+0000`, and offset-free forms,
/// which are read as UTC.
pub fn parse_timestamp(timestamp: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(timestamp) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(timestamp, ISO_WITH_OFFSET) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(timestamp, ISO_NAIVE).map(|naive| Utc.from_utc_datetime(&naive))
}
