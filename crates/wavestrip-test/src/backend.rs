//! Decimation backend whose completions are released by the test.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use wavestrip_lod::Decimator;
use wavestrip_paging::{DecimationBackend, DecimationJob, DecimationResult, FetchKey, SubmitError};

struct ManualState {
    decimator: Decimator,
    capacity: usize,
    disconnected: bool,
    queued: VecDeque<DecimationJob>,
    finished: VecDeque<DecimationResult>,
}

/// Backend that queues jobs until a [`ManualHandle`] finishes or drops them.
///
/// Nothing runs on its own, so tests control exactly when each request
/// completes.
pub struct ManualBackend {
    state: Arc<Mutex<ManualState>>,
}

/// Test-side control of a [`ManualBackend`].
#[derive(Clone)]
pub struct ManualHandle {
    state: Arc<Mutex<ManualState>>,
}

impl ManualBackend {
    /// Create a backend accepting up to `capacity` queued jobs.
    pub fn new(decimator: Decimator, capacity: usize) -> (Self, ManualHandle) {
        let state = Arc::new(Mutex::new(ManualState {
            decimator,
            capacity,
            disconnected: false,
            queued: VecDeque::new(),
            finished: VecDeque::new(),
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            ManualHandle { state },
        )
    }
}

impl DecimationBackend for ManualBackend {
    fn submit(&mut self, job: DecimationJob) -> Result<(), SubmitError> {
        let mut state = self.state.lock();
        if state.disconnected {
            return Err(SubmitError::Disconnected(job));
        }
        if state.queued.len() >= state.capacity {
            return Err(SubmitError::Full(job));
        }
        state.queued.push_back(job);
        Ok(())
    }

    fn poll(&mut self) -> Option<DecimationResult> {
        self.state.lock().finished.pop_front()
    }

    fn wait(&mut self, _timeout: Duration) -> Option<DecimationResult> {
        self.poll()
    }
}

impl ManualHandle {
    /// Keys of jobs submitted but not yet finished or dropped.
    pub fn pending(&self) -> Vec<FetchKey> {
        self.state.lock().queued.iter().map(|job| job.key).collect()
    }

    pub fn queued_len(&self) -> usize {
        self.state.lock().queued.len()
    }

    /// Decimate the oldest queued job and make its result available to `poll`.
    pub fn complete_next(&self) -> Option<FetchKey> {
        let mut state = self.state.lock();
        let mut job = state.queued.pop_front()?;
        state.decimator.run(job.key.range, job.factor, &mut job.output);
        let key = job.key;
        state.finished.push_back(DecimationResult {
            key,
            texels: job.output,
            elapsed: Duration::ZERO,
        });
        Some(key)
    }

    /// Finish every queued job. Returns how many finished.
    pub fn complete_all(&self) -> usize {
        let mut finished = 0;
        while self.complete_next().is_some() {
            finished += 1;
        }
        finished
    }

    /// Lose the oldest queued job; its completion never arrives.
    pub fn drop_next(&self) -> Option<FetchKey> {
        let job = self.state.lock().queued.pop_front()?;
        tracing::debug!(key = %job.key, "dropping queued job");
        Some(job.key)
    }

    pub fn set_capacity(&self, capacity: usize) {
        self.state.lock().capacity = capacity;
    }

    /// Make every later submit fail as if the workers had exited.
    pub fn disconnect(&self) {
        self.state.lock().disconnected = true;
    }
}
