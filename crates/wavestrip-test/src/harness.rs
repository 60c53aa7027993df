//! Drives a paging coordinator through scripted views.

use std::time::Instant;

use wavestrip_core::{EngineConfig, Lod, SampleBuffer, ViewportState};
use wavestrip_lod::{decimate, DecimationParams, Decimator, LodSelector};
use wavestrip_paging::{PagingCoordinator, TickOutcome};

use crate::backend::{ManualBackend, ManualHandle};
use crate::{HarnessConfig, Result, TestError};

/// A coordinator plus the zoom-to-LOD selector an input layer would own.
pub struct PagingHarness {
    coordinator: PagingCoordinator,
    selector: LodSelector,
    config: HarnessConfig,
}

impl PagingHarness {
    /// Harness around a coordinator that decimates inline.
    pub fn sync(samples: SampleBuffer, engine: EngineConfig) -> Result<Self> {
        let selector = LodSelector::from_config(&engine);
        Ok(Self {
            coordinator: PagingCoordinator::new(samples, engine)?,
            selector,
            config: HarnessConfig::default(),
        })
    }

    /// Harness around a coordinator backed by worker threads.
    pub fn threaded(samples: SampleBuffer, engine: EngineConfig) -> Result<Self> {
        let selector = LodSelector::from_config(&engine);
        Ok(Self {
            coordinator: PagingCoordinator::new_async(samples, engine)?,
            selector,
            config: HarnessConfig::default(),
        })
    }

    /// Harness around a [`ManualBackend`] holding up to `capacity` jobs.
    pub fn manual(
        samples: SampleBuffer,
        engine: EngineConfig,
        capacity: usize,
    ) -> Result<(Self, ManualHandle)> {
        let selector = LodSelector::from_config(&engine);
        let decimator = Decimator::new(samples.clone(), DecimationParams::from_config(&engine));
        let (backend, handle) = ManualBackend::new(decimator, capacity);
        let coordinator = PagingCoordinator::with_backend(samples, engine, Box::new(backend))?;
        Ok((
            Self {
                coordinator,
                selector,
                config: HarnessConfig::default(),
            },
            handle,
        ))
    }

    #[must_use]
    pub fn with_config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    pub fn coordinator(&self) -> &PagingCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut PagingCoordinator {
        &mut self.coordinator
    }

    /// Viewport for `offset` and `window`, with the LOD picked by the selector.
    pub fn viewport(&mut self, offset: i64, window: u64) -> ViewportState {
        self.selector.viewport(offset, window)
    }

    /// One tick at `offset`/`window`.
    pub fn tick(&mut self, offset: i64, window: u64) -> TickOutcome {
        let viewport = self.viewport(offset, window);
        self.coordinator.tick(&viewport)
    }

    /// Tick until the view is resident. Returns the number of ticks it took.
    pub fn run_until_resident(&mut self, offset: i64, window: u64) -> Result<usize> {
        let started = Instant::now();
        for ticks in 1..=self.config.max_ticks {
            if self.tick(offset, window) == TickOutcome::Resident {
                return Ok(ticks);
            }
            if started.elapsed() > self.config.timeout {
                break;
            }
            if self.coordinator.is_async() {
                self.coordinator.wait_idle(self.config.settle_interval);
            }
        }
        Err(TestError::Timeout(format!(
            "view at {offset} (window {window}) not resident after {} ticks",
            self.config.max_ticks
        )))
    }

    /// Check a slot against a fresh decimation of its resident window.
    pub fn verify_slot(&self, lod: Lod) -> Result<()> {
        let window = self.coordinator.resident_windows()[lod.index()];
        let layout = self.coordinator.layout();
        let decimator = self.coordinator.decimator();
        let expected = decimate(
            decimator.samples(),
            window,
            lod.factor(),
            layout.block_size(),
            decimator.params(),
        );
        let actual = self.coordinator.atlas().slot(lod);
        if let Some(index) = expected.iter().zip(actual).position(|(e, a)| e != a) {
            return Err(TestError::Mismatch(format!(
                "{lod} texel {index}: expected {:?}, found {:?} (window {window})",
                expected[index], actual[index]
            )));
        }
        tracing::debug!(%lod, %window, "slot verified");
        Ok(())
    }
}
