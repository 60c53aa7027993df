//! Test harness for wavestrip.
//!
//! Synthetic signals, a decimation backend the test drives by hand, and
//! helpers that run the paging coordinator until a view is resident.

pub mod backend;
pub mod harness;
pub mod signals;

pub use backend::{ManualBackend, ManualHandle};
pub use harness::PagingHarness;

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TestError {
    #[error("engine error: {0}")]
    Engine(#[from] wavestrip_core::Error),
    #[error("atlas mismatch: {0}")]
    Mismatch(String),
    #[error("timed out: {0}")]
    Timeout(String),
}

pub type Result<T> = std::result::Result<T, TestError>;

/// Harness limits.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Ticks to run before giving up on residency.
    pub max_ticks: usize,
    /// Wall-clock limit when waiting on worker threads.
    pub timeout: Duration,
    /// Longest wait for in-flight results between ticks.
    pub settle_interval: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            max_ticks: 256,
            timeout: Duration::from_secs(10),
            settle_interval: Duration::from_millis(10),
        }
    }
}
