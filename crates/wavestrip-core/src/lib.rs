//! Core types, sample storage and configuration for wavestrip.
//!
//! This crate provides the foundational types used throughout the workspace:
//! - Level-of-detail indices, sample ranges and viewport state
//! - The shared, immutable sample buffer
//! - Engine configuration and the common error type

pub mod config;
pub mod error;
pub mod samples;
pub mod types;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use samples::SampleBuffer;
pub use types::{Lod, SampleRange, Texel, ViewportState};

/// Engine-wide constants
pub mod constants {
    /// Default number of LOD levels
    pub const DEFAULT_LOD_COUNT: usize = 12;
    /// Upper bound on LOD levels (factor 2^31 samples per texel)
    pub const MAX_LOD_COUNT: usize = 32;
    /// Float channels per atlas texel (min and max)
    pub const TEXEL_CHANNELS: usize = 2;
    /// Headroom divisor applied to every decimated value
    pub const DEFAULT_ATTENUATION: f32 = 1.4;
    /// Common hardware limit for 2D texture width and height
    pub const DEFAULT_MAX_TEXTURE_SIZE: u32 = 16384;
}
