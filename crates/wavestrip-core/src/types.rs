//! Core paging types.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Level of detail index.
///
/// LOD `k` summarizes `2^k` input samples per output texel.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct Lod(pub u8);

impl Lod {
    /// Finest level (one sample per texel)
    pub const ZERO: Self = Self(0);

    /// Samples per output texel at this level.
    #[inline]
    pub const fn factor(self) -> u64 {
        1u64 << self.0
    }

    /// Index into per-LOD tables.
    #[inline]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// Clamp to the last valid level for `lod_count` levels.
    #[inline]
    pub fn clamp_to(self, lod_count: usize) -> Self {
        let last = u8::try_from(lod_count.saturating_sub(1)).unwrap_or(u8::MAX);
        Self(self.0.min(last))
    }
}

impl std::fmt::Display for Lod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lod{}", self.0)
    }
}

/// Half-open range `[start, end)` of sample indices.
///
/// Indices are signed so viewport math may run past either end of the track
/// before clamping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleRange {
    pub start: i64,
    pub end: i64,
}

impl SampleRange {
    /// The empty range at index 0 (initial resident window).
    pub const EMPTY: Self = Self { start: 0, end: 0 };

    /// Create a new range. `end` below `start` collapses to an empty range.
    #[inline]
    pub const fn new(start: i64, end: i64) -> Self {
        if end < start {
            Self { start, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Number of indices in the range.
    #[inline]
    pub const fn len(&self) -> u64 {
        self.end.abs_diff(self.start)
    }

    /// Returns true if the range holds no indices.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Check if an index lies inside the range.
    #[inline]
    pub const fn contains(&self, index: i64) -> bool {
        index >= self.start && index < self.end
    }

    /// Check if this range fully covers `other`. Empty ranges are always covered.
    #[inline]
    pub const fn covers(&self, other: &Self) -> bool {
        other.is_empty() || (self.start <= other.start && other.end <= self.end)
    }

    /// Intersection of two ranges (empty when disjoint).
    #[inline]
    pub fn intersect(&self, other: &Self) -> Self {
        Self::new(self.start.max(other.start), self.end.min(other.end))
    }

    /// Clamp to `[0, n)`.
    ///
    /// A range entirely outside the track collapses to an empty range at the
    /// nearest edge.
    #[inline]
    pub fn clamp_to(&self, n: u64) -> Self {
        let n = i64::try_from(n).unwrap_or(i64::MAX);
        let start = self.start.clamp(0, n);
        let end = self.end.clamp(start, n);
        Self { start, end }
    }
}

impl std::fmt::Display for SampleRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// One atlas texel: representative low and high amplitude.
///
/// The pair is sign-assigned by the decimator, so `lo > hi` marks a falling
/// bucket. Slices cast to interleaved `f32` pairs for upload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Texel {
    pub lo: f32,
    pub hi: f32,
}

impl Texel {
    /// Silent texel
    pub const ZERO: Self = Self { lo: 0.0, hi: 0.0 };

    /// Create a new texel
    #[inline]
    pub const fn new(lo: f32, hi: f32) -> Self {
        Self { lo, hi }
    }

    /// Smaller of the two channels
    #[inline]
    pub fn min(&self) -> f32 {
        self.lo.min(self.hi)
    }

    /// Larger of the two channels
    #[inline]
    pub fn max(&self) -> f32 {
        self.lo.max(self.hi)
    }
}

/// What the viewport currently shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportState {
    /// Leftmost visible sample (may be negative or beyond the track)
    pub offset: i64,
    /// Samples spanned by the viewport width
    pub window: u64,
    /// Selected level of detail
    pub lod: Lod,
}

impl ViewportState {
    /// Create a new viewport state
    #[inline]
    pub const fn new(offset: i64, window: u64, lod: Lod) -> Self {
        Self {
            offset,
            window,
            lod,
        }
    }

    /// Sample index at the horizontal centre of the viewport.
    #[inline]
    pub fn center(&self) -> i64 {
        self.offset
            .saturating_add(i64::try_from(self.window / 2).unwrap_or(i64::MAX))
    }

    /// Visible range `[offset, offset + window)`.
    #[inline]
    pub fn visible(&self) -> SampleRange {
        let window = i64::try_from(self.window).unwrap_or(i64::MAX);
        SampleRange::new(self.offset, self.offset.saturating_add(window))
    }
}
