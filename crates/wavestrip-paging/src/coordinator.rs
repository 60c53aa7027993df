//! Per-tick paging decisions.
//!
//! Each render tick the coordinator commits finished decimations, works out
//! which sample range the current LOD's slot should hold, and requests a new
//! block when the resident one no longer covers the view.

use std::time::{Duration, Instant};

use wavestrip_core::{EngineConfig, Lod, Result, SampleBuffer, SampleRange, Texel, ViewportState};
use wavestrip_lod::{Atlas, AtlasLayout, DecimationParams, Decimator, SlotUpload};

use crate::inflight::{FetchKey, InFlightSet};
use crate::window::WindowTracker;
use crate::worker::{DecimationBackend, DecimationJob, DecimationWorkers, SubmitError};

/// Counters exposed for telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagingStats {
    pub ticks: u64,
    /// Jobs handed to the backend.
    pub dispatched: u64,
    /// Blocks decimated and committed on the calling thread.
    pub inline_commits: u64,
    /// Backend results committed.
    pub async_commits: u64,
    /// Requests dropped because their LOD was already in flight.
    pub skipped: u64,
    /// Requests postponed because the backend queue was full.
    pub deferred: u64,
    /// Results that arrived for an abandoned request.
    pub discarded: u64,
    /// In-flight requests abandoned after the completion timeout.
    pub timed_out: u64,
}

/// What [`PagingCoordinator::request`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Decimated inline and written to the atlas.
    Committed,
    /// Queued on the backend.
    Dispatched,
    /// The LOD already has a request in flight.
    Skipped,
    /// The backend queue was full; retried on a later tick.
    Deferred,
}

/// What [`PagingCoordinator::tick`] did for the viewport's LOD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The resident window already covers the view.
    Resident,
    Committed,
    Dispatched,
    Skipped,
    Deferred,
}

impl From<RequestOutcome> for TickOutcome {
    fn from(outcome: RequestOutcome) -> Self {
        match outcome {
            RequestOutcome::Committed => Self::Committed,
            RequestOutcome::Dispatched => Self::Dispatched,
            RequestOutcome::Skipped => Self::Skipped,
            RequestOutcome::Deferred => Self::Deferred,
        }
    }
}

/// Mutable paging state, owned by the coordinator and updated once per tick.
#[derive(Debug)]
pub struct EngineState {
    viewport: ViewportState,
    windows: WindowTracker,
    in_flight: InFlightSet,
    playback_cursor: Option<i64>,
    stats: PagingStats,
}

impl EngineState {
    fn new(lod_count: usize) -> Self {
        Self {
            viewport: ViewportState::default(),
            windows: WindowTracker::new(lod_count),
            in_flight: InFlightSet::new(),
            playback_cursor: None,
            stats: PagingStats::default(),
        }
    }

    /// Viewport passed to the most recent tick.
    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    pub fn windows(&self) -> &WindowTracker {
        &self.windows
    }

    pub fn in_flight(&self) -> &InFlightSet {
        &self.in_flight
    }

    pub fn playback_cursor(&self) -> Option<i64> {
        self.playback_cursor
    }

    pub fn stats(&self) -> &PagingStats {
        &self.stats
    }
}

/// Drives decimation and atlas paging for one track.
pub struct PagingCoordinator {
    config: EngineConfig,
    decimator: Decimator,
    atlas: Atlas,
    state: EngineState,
    /// Background executor (None for sync mode).
    backend: Option<Box<dyn DecimationBackend>>,
    uploads: Vec<SlotUpload>,
    /// Output buffers returned by committed jobs.
    spare_buffers: Vec<Vec<Texel>>,
}

impl PagingCoordinator {
    /// Create a coordinator that decimates on the calling thread.
    pub fn new(samples: SampleBuffer, config: EngineConfig) -> Result<Self> {
        Self::build(samples, config, None)
    }

    /// Create a coordinator backed by a pool of decimation threads.
    pub fn new_async(samples: SampleBuffer, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let decimator = Decimator::new(samples.clone(), DecimationParams::from_config(&config));
        let workers =
            DecimationWorkers::spawn(&decimator, config.worker_threads, config.queue_depth)?;
        Self::build(samples, config, Some(Box::new(workers)))
    }

    /// Create a coordinator that hands jobs to `backend`.
    pub fn with_backend(
        samples: SampleBuffer,
        config: EngineConfig,
        backend: Box<dyn DecimationBackend>,
    ) -> Result<Self> {
        Self::build(samples, config, Some(backend))
    }

    fn build(
        samples: SampleBuffer,
        config: EngineConfig,
        backend: Option<Box<dyn DecimationBackend>>,
    ) -> Result<Self> {
        config.validate()?;
        let layout = AtlasLayout::new(&config)?;
        tracing::debug!(
            block_width = layout.block_width(),
            block_height = layout.block_height(),
            lod_count = layout.lod_count(),
            samples = samples.len(),
            is_async = backend.is_some(),
            "paging coordinator created"
        );
        Ok(Self {
            decimator: Decimator::new(samples, DecimationParams::from_config(&config)),
            atlas: Atlas::new(layout),
            state: EngineState::new(config.lod_count),
            backend,
            uploads: Vec::new(),
            spare_buffers: Vec::new(),
            config,
        })
    }

    /// Check if decimation runs off the calling thread.
    pub fn is_async(&self) -> bool {
        self.backend.is_some()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn decimator(&self) -> &Decimator {
        &self.decimator
    }

    pub fn atlas(&self) -> &Atlas {
        &self.atlas
    }

    pub fn layout(&self) -> &AtlasLayout {
        self.atlas.layout()
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn stats(&self) -> &PagingStats {
        &self.state.stats
    }

    /// Resident sample range of every slot, indexed by LOD.
    pub fn resident_windows(&self) -> &[SampleRange] {
        self.state.windows.as_slice()
    }

    pub fn in_flight(&self) -> &InFlightSet {
        &self.state.in_flight
    }

    /// Store the playback position for display. Paging ignores it.
    pub fn set_playback_cursor(&mut self, sample: Option<i64>) {
        self.state.playback_cursor = sample;
    }

    pub fn playback_cursor(&self) -> Option<i64> {
        self.state.playback_cursor
    }

    /// Take and clear the slot writes committed since the last call.
    pub fn take_uploads(&mut self) -> Vec<SlotUpload> {
        std::mem::take(&mut self.uploads)
    }

    /// Range the slot for `lod` should hold: one block centred on the view.
    pub fn target_range(&self, viewport: &ViewportState, lod: Lod) -> SampleRange {
        let span = i64::try_from(self.layout().block_samples(lod)).unwrap_or(i64::MAX);
        let start = viewport.center().saturating_sub(span / 2);
        SampleRange::new(start, start.saturating_add(span)).clamp_to(self.decimator.samples().len())
    }

    /// Range that must be resident at `lod` for the view to count as covered.
    ///
    /// The visible range widened evenly on both sides to `margin × window`,
    /// with each side capped at a quarter of the block's spare width so a
    /// freshly committed block always leaves slack for pans in either
    /// direction. Clamped to the track.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn needed_range(&self, viewport: &ViewportState, lod: Lod) -> SampleRange {
        let window = i64::try_from(viewport.window).unwrap_or(i64::MAX);
        let span = i64::try_from(self.layout().block_samples(lod)).unwrap_or(i64::MAX);
        let extra = (viewport.window as f64 * f64::from(self.config.coverage_margin - 1.0) / 2.0)
            as i64;
        let guard = extra.min(span.saturating_sub(window).max(0) / 4);
        SampleRange::new(
            viewport.offset.saturating_sub(guard),
            viewport.offset.saturating_add(window).saturating_add(guard),
        )
        .clamp_to(self.decimator.samples().len())
    }

    /// Run one paging step for `viewport`.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn tick(&mut self, viewport: &ViewportState) -> TickOutcome {
        self.state.stats.ticks += 1;
        self.state.viewport = *viewport;

        self.drain_completions();
        self.abandon_expired(Instant::now());

        let lod = viewport.lod.clamp_to(self.config.lod_count);
        let target = self.target_range(viewport, lod);
        let needed = self.needed_range(viewport, lod).intersect(&target);
        if self.state.windows.covers(lod, &needed) {
            return TickOutcome::Resident;
        }
        self.request(lod, target).into()
    }

    /// Request a block of `range` for `lod`, unless one is already in flight.
    pub fn request(&mut self, lod: Lod, range: SampleRange) -> RequestOutcome {
        let lod = lod.clamp_to(self.config.lod_count);
        let range = range.clamp_to(self.decimator.samples().len());
        let key = FetchKey::new(lod, range);
        if !self.state.in_flight.try_insert(key, Instant::now()) {
            self.state.stats.skipped += 1;
            tracing::trace!(%key, pending = ?self.state.in_flight.pending(lod), "request skipped");
            return RequestOutcome::Skipped;
        }

        let factor = lod.factor();
        let output = self.take_buffer();
        let work = (output.len() as u64).saturating_mul(factor);
        let Some(backend) = self.backend.as_mut().filter(|_| work > self.config.inline_sample_budget)
        else {
            self.decimate_inline(key, output);
            return RequestOutcome::Committed;
        };

        match backend.submit(DecimationJob {
            key,
            factor,
            output,
        }) {
            Ok(()) => {
                self.state.stats.dispatched += 1;
                tracing::debug!(%key, "decimation dispatched");
                RequestOutcome::Dispatched
            }
            Err(SubmitError::Full(job)) => {
                self.state.in_flight.complete(&key);
                self.recycle_buffer(job.output);
                self.state.stats.deferred += 1;
                tracing::trace!(%key, "decimation queue full");
                RequestOutcome::Deferred
            }
            Err(SubmitError::Disconnected(job)) => {
                tracing::warn!(%key, "decimation backend disconnected, decimating inline");
                self.backend = None;
                self.decimate_inline(key, job.output);
                RequestOutcome::Committed
            }
        }
    }

    /// Block until nothing is in flight or `timeout` passes, committing results.
    ///
    /// Returns `true` when the in-flight set drained.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.state.in_flight.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let Some(result) = self.backend.as_mut().and_then(|b| b.wait(remaining)) else {
                return self.state.in_flight.is_empty();
            };
            if self.commit(result.key, result.texels) {
                self.state.stats.async_commits += 1;
            }
        }
        true
    }

    fn decimate_inline(&mut self, key: FetchKey, mut output: Vec<Texel>) {
        self.decimator.run(key.range, key.lod.factor(), &mut output);
        if self.commit(key, output) {
            self.state.stats.inline_commits += 1;
        }
    }

    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    fn drain_completions(&mut self) {
        while let Some(result) = self.backend.as_mut().and_then(|b| b.poll()) {
            tracing::trace!(key = %result.key, elapsed = ?result.elapsed, "decimation finished");
            if self.commit(result.key, result.texels) {
                self.state.stats.async_commits += 1;
            }
        }
    }

    fn abandon_expired(&mut self, now: Instant) {
        let Some(timeout) = self.config.completion_timeout() else {
            return;
        };
        for key in self.state.in_flight.expired(now, timeout) {
            self.state.in_flight.abandon(key.lod);
            self.state.stats.timed_out += 1;
            tracing::warn!(%key, ?timeout, "decimation timed out, abandoning");
        }
    }

    /// Write a finished block into its slot if its request is still in flight.
    fn commit(&mut self, key: FetchKey, texels: Vec<Texel>) -> bool {
        if !self.state.in_flight.complete(&key) {
            self.state.stats.discarded += 1;
            tracing::debug!(%key, "discarding result for abandoned request");
            self.recycle_buffer(texels);
            return false;
        }
        let upload = self.atlas.write_slot(key.lod, key.range, &texels);
        self.state.windows.set(key.lod, key.range);
        self.uploads.push(upload);
        self.recycle_buffer(texels);
        tracing::debug!(%key, "block committed");
        true
    }

    fn take_buffer(&mut self) -> Vec<Texel> {
        let size = self.layout().block_size();
        let mut buffer = self.spare_buffers.pop().unwrap_or_default();
        buffer.resize(size, Texel::ZERO);
        buffer
    }

    fn recycle_buffer(&mut self, buffer: Vec<Texel>) {
        if self.spare_buffers.len() < self.config.lod_count {
            self.spare_buffers.push(buffer);
        }
    }
}
