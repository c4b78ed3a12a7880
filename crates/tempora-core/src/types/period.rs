//! Period keys: orderable bucket identifiers.

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::{Date, Granularity, Timestamp};

/// Canonical identifier of a time bucket.
///
/// Carries the bucket's anchor date (the orderable instant) together with a
/// display label. Equality, hashing and ordering use only the anchor and the
/// granularity; the label is derived from them and is never compared, so
/// short labels like `Feb-2024` can never sort out of chronological order.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodKey {
    start: Date,
    granularity: Granularity,
    label: String,
}

impl PeriodKey {
    /// Creates a key for the bucket anchored on `start`.
    ///
    /// `start` must already be the canonical anchor for `granularity`; use
    /// [`crate::bucketing::PeriodBucketer`] to derive it from a timestamp.
    #[must_use]
    pub fn new(start: Date, granularity: Granularity) -> Self {
        Self {
            start,
            granularity,
            label: granularity.format_label(start),
        }
    }

    /// Returns the anchor date.
    #[must_use]
    pub fn start(&self) -> Date {
        self.start
    }

    /// Returns the anchor as an instant (midnight).
    #[must_use]
    pub fn instant(&self) -> Timestamp {
        Timestamp::from_date(self.start)
    }

    /// Returns the bucket granularity.
    #[must_use]
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Returns the display label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl PartialEq for PeriodKey {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start && self.granularity == other.granularity
    }
}

impl Eq for PeriodKey {}

impl Hash for PeriodKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.start.hash(state);
        self.granularity.hash(state);
    }
}

impl PartialOrd for PeriodKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PeriodKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start
            .cmp(&other.start)
            .then(self.granularity.cmp(&other.granularity))
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}
