//! Deduplication of outstanding decimation requests.

use std::time::{Duration, Instant};

use hashbrown::HashMap;
use wavestrip_core::{Lod, SampleRange};

/// Identity of one decimation request: the slot it fills and the range it covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub lod: Lod,
    pub range: SampleRange,
}

impl FetchKey {
    pub const fn new(lod: Lod, range: SampleRange) -> Self {
        Self { lod, range }
    }
}

impl std::fmt::Display for FetchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.lod, self.range)
    }
}

/// Requests dispatched but not yet committed, at most one per LOD.
#[derive(Debug, Default)]
pub struct InFlightSet {
    pending: HashMap<Lod, (FetchKey, Instant)>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key` as in flight.
    ///
    /// Returns `false` without inserting when any request for the same LOD is
    /// still pending.
    pub fn try_insert(&mut self, key: FetchKey, now: Instant) -> bool {
        if self.pending.contains_key(&key.lod) {
            return false;
        }
        self.pending.insert(key.lod, (key, now));
        true
    }

    pub fn contains(&self, key: &FetchKey) -> bool {
        self.pending
            .get(&key.lod)
            .is_some_and(|(pending, _)| pending == key)
    }

    pub fn is_pending(&self, lod: Lod) -> bool {
        self.pending.contains_key(&lod)
    }

    /// The outstanding request for `lod`, if any.
    pub fn pending(&self, lod: Lod) -> Option<FetchKey> {
        self.pending.get(&lod).map(|(key, _)| *key)
    }

    /// Remove `key` if it is the exact request pending for its LOD.
    pub fn complete(&mut self, key: &FetchKey) -> bool {
        if self.contains(key) {
            self.pending.remove(&key.lod);
            true
        } else {
            false
        }
    }

    pub fn count_for(&self, lod: Lod) -> usize {
        usize::from(self.is_pending(lod))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Requests issued more than `timeout` before `now`, oldest first.
    pub fn expired(&self, now: Instant, timeout: Duration) -> Vec<FetchKey> {
        let mut expired: Vec<_> = self
            .pending
            .values()
            .filter(|(_, issued)| now.saturating_duration_since(*issued) > timeout)
            .map(|(key, issued)| (*issued, *key))
            .collect();
        expired.sort_by_key(|(issued, key)| (*issued, key.lod));
        expired.into_iter().map(|(_, key)| key).collect()
    }

    /// Forget whatever is pending for `lod`; its result will be discarded.
    pub fn abandon(&mut self, lod: Lod) -> Option<FetchKey> {
        self.pending.remove(&lod).map(|(key, _)| key)
    }

    /// Iterate over all outstanding requests.
    pub fn iter(&self) -> impl Iterator<Item = &FetchKey> {
        self.pending.values().map(|(key, _)| key)
    }
}
