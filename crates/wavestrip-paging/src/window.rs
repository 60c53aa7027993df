//! Per-LOD record of which sample range each atlas slot holds.

use wavestrip_core::{Lod, SampleRange};

/// Resident sample range of every atlas slot.
///
/// A slot starts out empty and only changes when a decimation for that LOD
/// commits.
#[derive(Debug, Clone)]
pub struct WindowTracker {
    windows: Vec<SampleRange>,
}

impl WindowTracker {
    pub fn new(lod_count: usize) -> Self {
        Self {
            windows: vec![SampleRange::EMPTY; lod_count],
        }
    }

    /// Resident range of `lod` (empty for LODs past the tracker).
    pub fn get(&self, lod: Lod) -> SampleRange {
        self.windows
            .get(lod.index())
            .copied()
            .unwrap_or(SampleRange::EMPTY)
    }

    pub fn set(&mut self, lod: Lod, range: SampleRange) {
        if let Some(window) = self.windows.get_mut(lod.index()) {
            *window = range;
        }
    }

    /// Whether the slot for `lod` already holds all of `needed`.
    pub fn covers(&self, lod: Lod, needed: &SampleRange) -> bool {
        self.get(lod).covers(needed)
    }

    pub fn reset(&mut self, lod: Lod) {
        self.set(lod, SampleRange::EMPTY);
    }

    /// All resident windows, indexed by LOD.
    pub fn as_slice(&self) -> &[SampleRange] {
        &self.windows
    }

    pub fn lod_count(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let tracker = WindowTracker::new(12);
        assert!(tracker.as_slice().iter().all(SampleRange::is_empty));
        assert!(!tracker.covers(Lod(0), &SampleRange::new(0, 1)));
        // An empty requirement is always satisfied.
        assert!(tracker.covers(Lod(0), &SampleRange::EMPTY));
    }

    #[test]
    fn set_only_touches_its_lod() {
        let mut tracker = WindowTracker::new(4);
        tracker.set(Lod(2), SampleRange::new(100, 5000));
        assert!(tracker.covers(Lod(2), &SampleRange::new(100, 5000)));
        assert!(tracker.covers(Lod(2), &SampleRange::new(200, 300)));
        assert!(!tracker.covers(Lod(2), &SampleRange::new(50, 300)));
        assert!(!tracker.covers(Lod(1), &SampleRange::new(200, 300)));

        tracker.reset(Lod(2));
        assert!(tracker.get(Lod(2)).is_empty());
    }

    #[test]
    fn out_of_range_lod_is_ignored() {
        let mut tracker = WindowTracker::new(2);
        tracker.set(Lod(7), SampleRange::new(0, 10));
        assert_eq!(tracker.get(Lod(7)), SampleRange::EMPTY);
        assert_eq!(tracker.lod_count(), 2);
    }
}
