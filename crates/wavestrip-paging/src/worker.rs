//! Background decimation.
//!
//! Jobs travel to a pool of named threads over a bounded crossbeam channel and
//! come back as results tagged with the [`FetchKey`] that requested them. The
//! coordinator matches results against its in-flight set, so nothing on the
//! worker side touches paging state.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use wavestrip_core::{Error, Result, Texel};
use wavestrip_lod::Decimator;

use crate::inflight::FetchKey;

/// Result queue capacity; bounded by the number of LODs in practice.
const RESULT_CAPACITY: usize = 64;

/// One block to decimate.
#[derive(Debug)]
pub struct DecimationJob {
    pub key: FetchKey,
    /// Samples per output texel.
    pub factor: u64,
    /// Output buffer, sized to the atlas block. Reused across jobs.
    pub output: Vec<Texel>,
}

/// A finished job.
pub struct DecimationResult {
    pub key: FetchKey,
    pub texels: Vec<Texel>,
    /// Time spent decimating.
    pub elapsed: Duration,
}

impl std::fmt::Debug for DecimationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecimationResult")
            .field("key", &self.key)
            .field("texels", &self.texels.len())
            .field("elapsed", &self.elapsed)
            .finish()
    }
}

/// Why a job was handed back by [`DecimationBackend::submit`].
#[derive(Debug)]
pub enum SubmitError {
    /// Queue is full; try again on a later tick.
    Full(DecimationJob),
    /// The backend can no longer run jobs.
    Disconnected(DecimationJob),
}

impl SubmitError {
    pub fn into_job(self) -> DecimationJob {
        match self {
            Self::Full(job) | Self::Disconnected(job) => job,
        }
    }
}

/// Executes decimation jobs off the render thread.
pub trait DecimationBackend: Send {
    /// Queue a job without blocking.
    fn submit(&mut self, job: DecimationJob) -> std::result::Result<(), SubmitError>;

    /// Take one finished job without blocking.
    fn poll(&mut self) -> Option<DecimationResult>;

    /// Block up to `timeout` for one finished job.
    fn wait(&mut self, timeout: Duration) -> Option<DecimationResult>;
}

/// Work request sent to the decimation threads.
#[derive(Debug)]
enum WorkerRequest {
    Decimate(DecimationJob),
    /// Stop one worker thread.
    Shutdown,
}

/// Pool of decimation threads sharing one request queue.
pub struct DecimationWorkers {
    request_tx: Sender<WorkerRequest>,
    result_rx: Receiver<DecimationResult>,
    threads: Vec<JoinHandle<()>>,
}

impl DecimationWorkers {
    /// Spawn `threads` workers, each holding a clone of `decimator`.
    pub fn spawn(decimator: &Decimator, threads: usize, queue_depth: usize) -> Result<Self> {
        if threads == 0 || queue_depth == 0 {
            return Err(Error::InvalidConfig(
                "decimation workers need at least one thread and one queue slot".into(),
            ));
        }
        let (request_tx, request_rx) = channel::bounded::<WorkerRequest>(queue_depth);
        let (result_tx, result_rx) = channel::bounded::<DecimationResult>(RESULT_CAPACITY);

        let mut workers = Self {
            request_tx,
            result_rx,
            threads: Vec::with_capacity(threads),
        };
        for index in 0..threads {
            let decimator = decimator.clone();
            let request_rx = request_rx.clone();
            let result_tx = result_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("decimate-{index}"))
                .spawn(move || Self::worker_loop(&decimator, &request_rx, &result_tx))
                .map_err(|e| Error::Worker(format!("failed to spawn decimation thread: {e}")))?;
            workers.threads.push(handle);
        }
        tracing::debug!(threads, queue_depth, "decimation workers started");
        Ok(workers)
    }

    fn worker_loop(
        decimator: &Decimator,
        request_rx: &Receiver<WorkerRequest>,
        result_tx: &Sender<DecimationResult>,
    ) {
        loop {
            match request_rx.recv() {
                Ok(WorkerRequest::Decimate(mut job)) => {
                    let started = Instant::now();
                    decimator.run(job.key.range, job.factor, &mut job.output);
                    let result = DecimationResult {
                        key: job.key,
                        texels: job.output,
                        elapsed: started.elapsed(),
                    };
                    if result_tx.send(result).is_err() {
                        // Coordinator is gone.
                        return;
                    }
                }
                Ok(WorkerRequest::Shutdown) | Err(_) => return,
            }
        }
    }

    /// Number of worker threads.
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Stop every worker and wait for it to exit.
    ///
    /// Undelivered results are dropped. Closing the result channel first
    /// releases workers blocked on a full result queue, so the shutdown
    /// requests below can always be delivered.
    pub fn shutdown(&mut self) {
        drop(std::mem::replace(&mut self.result_rx, channel::never()));
        for _ in 0..self.threads.len() {
            // Errors mean every worker already exited.
            let _ = self.request_tx.send(WorkerRequest::Shutdown);
        }
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("decimation worker panicked");
            }
        }
    }
}

impl DecimationBackend for DecimationWorkers {
    fn submit(&mut self, job: DecimationJob) -> std::result::Result<(), SubmitError> {
        match self.request_tx.try_send(WorkerRequest::Decimate(job)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(WorkerRequest::Decimate(job))) => Err(SubmitError::Full(job)),
            Err(TrySendError::Disconnected(WorkerRequest::Decimate(job))) => {
                Err(SubmitError::Disconnected(job))
            }
            Err(_) => unreachable!("only decimation requests are submitted"),
        }
    }

    fn poll(&mut self) -> Option<DecimationResult> {
        self.result_rx.try_recv().ok()
    }

    fn wait(&mut self, timeout: Duration) -> Option<DecimationResult> {
        match self.result_rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for DecimationWorkers {
    fn drop(&mut self) {
        self.shutdown();
    }
}
