use std::fmt;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

/// One concrete, time-bounded instance of a calendar entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub summary: String,
}

impl Occurrence {
    /// `start <= now < end`. Inverted occurrences are never active.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now < self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Half-open `[start, end)` range used to bound recurrence expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn forward(now: DateTime<Utc>, days: i64) -> Self {
        Self {
            start: now,
            end: now + Duration::days(days),
        }
    }

    /// Whether an occurrence belongs to this window. Occurrences that started
    /// earlier but are still running are kept, as are inverted occurrences
    /// that start inside the window.
    pub fn admits(&self, occurrence: &Occurrence) -> bool {
        occurrence.start < self.end
            && (occurrence.end > self.start || occurrence.start >= self.start)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccurrenceSet {
    occurrences: Vec<Occurrence>,
}

impl OccurrenceSet {
    /// Sorts by start; equal starts keep their input order.
    pub fn new(mut occurrences: Vec<Occurrence>) -> Self {
        occurrences.sort_by_key(|occurrence| occurrence.start);
        Self { occurrences }
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }

    pub fn len(&self) -> usize {
        self.occurrences.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Occurrence> {
        self.occurrences.iter()
    }

    pub fn active_at(&self, now: DateTime<Utc>) -> Option<&Occurrence> {
        self.occurrences
            .iter()
            .find(|occurrence| occurrence.is_active_at(now))
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.active_at(now).is_some()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Sha256::new();
        for occurrence in &self.occurrences {
            hasher.update(
                occurrence
                    .start
                    .to_rfc3339_opts(SecondsFormat::Secs, true)
                    .as_bytes(),
            );
            hasher.update(
                occurrence
                    .end
                    .to_rfc3339_opts(SecondsFormat::Secs, true)
                    .as_bytes(),
            );
        }
        Fingerprint(hasher.finalize().into())
    }
}

impl<'a> IntoIterator for &'a OccurrenceSet {
    type Item = &'a Occurrence;
    type IntoIter = std::slice::Iter<'a, Occurrence>;

    fn into_iter(self) -> Self::IntoIter {
        self.occurrences.iter()
    }
}

/// Digest over the `(start, end)` pairs of a sorted occurrence set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

pub fn changed(previous: &Fingerprint, current: &Fingerprint) -> bool {
    previous != current
}
