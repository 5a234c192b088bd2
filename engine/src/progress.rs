//! Progress reporting.
//!
//! This module defines the ProgressCallback trait, which decouples the
//! engine from whoever observes a run (CLI, scheduler, tests). The engine
//! calls it synchronously from the worker, so implementations must return
//! quickly. `ChannelProgress` forwards everything onto an unbounded channel
//! so a slow consumer never stalls the copy loop.

use crate::model::{CopyOutcome, Progress, RunEvent};
use crossbeam_channel::Sender;

/// Trait for receiving events from a backup run, in emission order.
pub trait ProgressCallback: Send + Sync {
    /// Called after every copied artifact.
    fn on_progress(&self, progress: Progress);

    /// Called for non-fatal status lines (job started, artifact failed, ...).
    fn on_status(&self, message: &str);

    /// Called exactly once, last.
    fn on_finished(&self, outcome: &CopyOutcome);
}

/// A ProgressCallback that sends every event over a channel.
pub struct ChannelProgress {
    sender: Sender<RunEvent>,
}

impl ChannelProgress {
    pub fn new(sender: Sender<RunEvent>) -> Self {
        ChannelProgress { sender }
    }
}

impl ProgressCallback for ChannelProgress {
    fn on_progress(&self, progress: Progress) {
        // A dropped receiver just means nobody is watching any more
        let _ = self.sender.send(RunEvent::Progress(progress));
    }

    fn on_status(&self, message: &str) {
        let _ = self.sender.send(RunEvent::Status(message.to_string()));
    }

    fn on_finished(&self, outcome: &CopyOutcome) {
        let _ = self.sender.send(RunEvent::Finished(outcome.clone()));
    }
}
