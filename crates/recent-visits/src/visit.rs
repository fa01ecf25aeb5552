//! Visit value types
//!
//! A [`Visit`] is one recorded page visit. Visits are ordered for recency
//! purposes by their [`Timestamp`] only.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of nanoseconds in one second
pub const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Wall-clock instant split into whole seconds and sub-second nanoseconds
///
/// Ordering compares `(seconds, nanos)` lexicographically, which is the
/// single key used for both query ordering and eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Seconds since the Unix epoch
    pub seconds: i64,
    /// Nanoseconds within the second, always below [`NANOS_PER_SEC`]
    pub nanos: u32,
}

impl Timestamp {
    /// Create a timestamp, returning `None` if `nanos` is out of range
    pub fn new(seconds: i64, nanos: u32) -> Option<Self> {
        (nanos < NANOS_PER_SEC).then_some(Self { seconds, nanos })
    }

    /// Convert back into a chrono datetime, if representable
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, self.nanos)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    /// Leap-second instants (chrono reports nanos past one second) are
    /// pinned to the last nanosecond of that second.
    fn from(dt: DateTime<Utc>) -> Self {
        Self {
            seconds: dt.timestamp(),
            nanos: dt.timestamp_subsec_nanos().min(NANOS_PER_SEC - 1),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

/// One recorded page visit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    /// Identifier, unique within the owning user's history
    pub visit_id: u32,
    /// Visited URL
    pub url: String,
    /// Display text for the visit
    pub text: String,
    /// Wall-clock time the visit was recorded
    pub timestamp: Timestamp,
}

impl Visit {
    /// Create a new visit
    pub fn new(
        visit_id: u32,
        url: impl Into<String>,
        text: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            visit_id,
            url: url.into(),
            text: text.into(),
            timestamp,
        }
    }

    /// Newest-first comparison used when sorting query results
    pub fn cmp_recency(&self, other: &Self) -> Ordering {
        other.timestamp.cmp(&self.timestamp)
    }
}
