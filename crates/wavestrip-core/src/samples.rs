//! Shared, immutable sample storage.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::SampleRange;

/// Immutable mono sample track.
///
/// Cloning is cheap (reference counted), so every decimation job can hold its
/// own handle without copying the samples.
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    data: Arc<[f32]>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Create a sample buffer from decoded samples.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            data: samples.into(),
            sample_rate,
        }
    }

    /// Create a sample buffer from raw little-endian `f32` PCM bytes.
    pub fn from_f32_le_bytes(bytes: &[u8], sample_rate: u32) -> Result<Self> {
        if bytes.len() % 4 != 0 {
            return Err(Error::InvalidData(format!(
                "PCM byte length {} is not a multiple of 4",
                bytes.len()
            )));
        }
        let samples = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Ok(Self::new(samples, sample_rate))
    }

    /// Number of samples (`N`).
    #[inline]
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    /// Returns true if the track holds no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sample rate in Hz.
    #[inline]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Track duration in seconds (0 for a zero sample rate).
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.data.len() as f64 / f64::from(self.sample_rate)
    }

    /// Read a sample; indices outside `[0, N)` read as silence.
    #[inline]
    pub fn get(&self, index: i64) -> f32 {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.data.get(i))
            .copied()
            .unwrap_or(0.0)
    }

    /// All samples.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Samples inside `range`, clamped to the track.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn slice(&self, range: SampleRange) -> &[f32] {
        let clamped = range.clamp_to(self.len());
        &self.data[clamped.start as usize..clamped.end as usize]
    }

    /// Full track as a range.
    #[inline]
    pub fn full_range(&self) -> SampleRange {
        SampleRange::new(0, i64::try_from(self.len()).unwrap_or(i64::MAX))
    }
}
