//! Virtual texture paging for wavestrip.
//!
//! Tracks which sample range each LOD slot holds, deduplicates outstanding
//! decimation requests, and commits finished blocks into the atlas once per
//! render tick.

pub mod coordinator;
pub mod inflight;
pub mod window;
pub mod worker;

pub use coordinator::{EngineState, PagingCoordinator, PagingStats, RequestOutcome, TickOutcome};
pub use inflight::{FetchKey, InFlightSet};
pub use window::WindowTracker;
pub use worker::{
    DecimationBackend, DecimationJob, DecimationResult, DecimationWorkers, SubmitError,
};
