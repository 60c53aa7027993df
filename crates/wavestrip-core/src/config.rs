//! Engine configuration, fixed at construction.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ATTENUATION, DEFAULT_LOD_COUNT, DEFAULT_MAX_TEXTURE_SIZE, MAX_LOD_COUNT,
};
use crate::error::{Error, Result};

/// Configuration for decimation and paging behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of LOD levels (`L`).
    pub lod_count: usize,
    /// Viewport width in pixels.
    pub viewport_width: u32,
    /// Atlas row width in texels (shared by every slot).
    pub atlas_row_width: u32,
    /// Hardware limit for texture width and height.
    pub max_texture_size: u32,
    /// Extra rows added to each block beyond the viewport width.
    pub block_padding: f32,
    /// Samples of look-back before each decimation bucket.
    pub bucket_lookbehind: u32,
    /// Samples of look-ahead after each decimation bucket.
    pub bucket_lookahead: u32,
    /// Divisor applied to every decimated value.
    pub attenuation: f32,
    /// Multiple of the window that must stay resident past the offset.
    pub coverage_margin: f32,
    /// Fractional band around LOD thresholds (0 = hard thresholds).
    pub lod_hysteresis: f32,
    /// Background decimation threads.
    pub worker_threads: usize,
    /// Capacity of the decimation request queue.
    pub queue_depth: usize,
    /// Decimate on the calling thread when `block_size * factor` is within this budget.
    pub inline_sample_budget: u64,
    /// Abandon in-flight requests older than this (disabled when `None`).
    pub completion_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lod_count: DEFAULT_LOD_COUNT,
            viewport_width: 2048,
            atlas_row_width: 2048,
            max_texture_size: DEFAULT_MAX_TEXTURE_SIZE,
            block_padding: 2.0,
            bucket_lookbehind: 1,
            bucket_lookahead: 1,
            attenuation: DEFAULT_ATTENUATION,
            coverage_margin: 2.0,
            lod_hysteresis: 0.0,
            worker_threads: 2,
            queue_depth: 16,
            inline_sample_budget: 0,
            completion_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    /// Check every field against its allowed bounds.
    pub fn validate(&self) -> Result<()> {
        if self.lod_count == 0 || self.lod_count > MAX_LOD_COUNT {
            return Err(Error::InvalidConfig(format!(
                "lod_count must be in 1..={MAX_LOD_COUNT}, got {}",
                self.lod_count
            )));
        }
        if self.viewport_width == 0 {
            return Err(Error::InvalidConfig("viewport_width must be > 0".into()));
        }
        if self.atlas_row_width == 0 || self.max_texture_size == 0 {
            return Err(Error::InvalidConfig(
                "atlas_row_width and max_texture_size must be > 0".into(),
            ));
        }
        if !self.block_padding.is_finite() || self.block_padding < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "block_padding must be finite and >= 0, got {}",
                self.block_padding
            )));
        }
        if !self.attenuation.is_finite() || self.attenuation <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "attenuation must be finite and > 0, got {}",
                self.attenuation
            )));
        }
        if !self.coverage_margin.is_finite() || self.coverage_margin < 1.0 {
            return Err(Error::InvalidConfig(format!(
                "coverage_margin must be finite and >= 1, got {}",
                self.coverage_margin
            )));
        }
        if !(0.0..0.5).contains(&self.lod_hysteresis) {
            return Err(Error::InvalidConfig(format!(
                "lod_hysteresis must be in [0, 0.5), got {}",
                self.lod_hysteresis
            )));
        }
        if self.worker_threads == 0 || self.queue_depth == 0 {
            return Err(Error::InvalidConfig(
                "worker_threads and queue_depth must be >= 1".into(),
            ));
        }
        Ok(())
    }

    /// Completion timeout as a `Duration`.
    pub fn completion_timeout(&self) -> Option<Duration> {
        self.completion_timeout_ms.map(Duration::from_millis)
    }
}
