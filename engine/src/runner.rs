//! Asynchronous runs.
//!
//! `start_run` executes a batch on a dedicated worker thread and returns a
//! handle immediately. The caller reads ordered events from the handle's
//! channel (progress and status lines, then exactly one `Finished`) and may
//! cancel at any time. The worker owns all run counters; the only shared
//! state is the cancellation flag and the event channel.

use crate::model::{CancelToken, CopyOutcome, JobSpec, RunEvent};
use crate::orchestrator::run_jobs;
use crate::progress::ChannelProgress;
use crossbeam_channel::{unbounded, Receiver};
use log::debug;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use uuid::Uuid;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Handle to one in-flight or finished run.
pub struct RunHandle {
    id: Uuid,
    cancel: CancelToken,
    events: Receiver<RunEvent>,
    worker: Option<JoinHandle<CopyOutcome>>,
}

impl RunHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Request a cooperative stop. Safe to call repeatedly or after the run
    /// has finished.
    pub fn cancel(&self) {
        debug!("Cancellation requested for run {}", self.id);
        self.cancel.cancel();
    }

    /// Ordered event stream; ends with exactly one `RunEvent::Finished`.
    pub fn events(&self) -> &Receiver<RunEvent> {
        &self.events
    }

    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Block until the worker exits and return its outcome.
    ///
    /// Events stay queued on the channel for the caller to drain.
    pub fn wait(mut self) -> CopyOutcome {
        self.join()
    }

    /// Wait at most `timeout` for the worker to exit.
    ///
    /// Returns `None` on timeout; bytes of the current file may still be in
    /// flight. The handle remains usable afterwards.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<CopyOutcome> {
        let deadline = Instant::now() + timeout;
        while !self.is_finished() {
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(POLL_INTERVAL);
        }
        Some(self.join())
    }

    fn join(&mut self) -> CopyOutcome {
        match self.worker.take() {
            Some(worker) => worker.join().unwrap_or_else(|_| CopyOutcome::Failure {
                reason: "Backup worker panicked".to_string(),
            }),
            None => CopyOutcome::Failure {
                reason: "Run outcome was already collected".to_string(),
            },
        }
    }
}

/// Start a run over `specs` on a background worker and return immediately.
pub fn start_run(specs: Vec<JobSpec>) -> RunHandle {
    let id = Uuid::new_v4();
    let cancel = CancelToken::new();
    let (tx, rx) = unbounded::<RunEvent>();

    let worker_cancel = cancel.clone();
    let worker = thread::spawn(move || {
        debug!("Run {} started with {} job(s)", id, specs.len());
        let callback = ChannelProgress::new(tx);
        run_jobs(&specs, &worker_cancel, &callback)
    });

    RunHandle {
        id,
        cancel,
        events: rx,
        worker: Some(worker),
    }
}
