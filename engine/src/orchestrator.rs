//! Batch orchestration.
//!
//! Drives one or many jobs (one per configured destination) as a single
//! run. Every job is validated and sized up front without writing anything,
//! and the sizes add up to one progress denominator. The jobs are then
//! copied one after another; each destination is created and checked for
//! free space only when its job is about to start. A job that fails
//! validation, lacks free space or hits a run-level error is skipped with a
//! warning while its siblings still run. Cancellation stops the whole batch.

use crate::copy::{preflight, prepare_destination, CopyEngine, JobResult};
use crate::fs_ops::{self, SpaceProbe};
use crate::model::{CancelToken, CopyOutcome, JobSpec, RunState};
use crate::progress::ProgressCallback;
use log::{info, warn};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Run a batch of jobs and report exactly one terminal outcome.
///
/// The outcome is delivered through `progress.on_finished` and returned.
pub fn run_jobs(
    specs: &[JobSpec],
    cancel: &CancelToken,
    progress: &dyn ProgressCallback,
) -> CopyOutcome {
    run_jobs_with(specs, cancel, progress, &fs_ops::available_space)
}

/// `run_jobs` with the free-space query supplied by the caller.
pub(crate) fn run_jobs_with(
    specs: &[JobSpec],
    cancel: &CancelToken,
    progress: &dyn ProgressCallback,
    free_space: &SpaceProbe,
) -> CopyOutcome {
    let outcome = execute_batch(specs, cancel, progress, free_space);
    match &outcome {
        CopyOutcome::Success { files_copied } => {
            info!("Backup finished: {} files copied", files_copied)
        }
        CopyOutcome::Cancelled => info!("Backup cancelled"),
        CopyOutcome::Failure { reason } => warn!("Backup failed: {}", reason),
    }
    progress.on_finished(&outcome);
    outcome
}

fn execute_batch(
    specs: &[JobSpec],
    cancel: &CancelToken,
    progress: &dyn ProgressCallback,
    free_space: &SpaceProbe,
) -> CopyOutcome {
    let mut planned: Vec<(&JobSpec, u64)> = Vec::new();
    let mut skip_reasons: Vec<String> = Vec::new();

    for spec in specs {
        if cancel.is_cancelled() {
            return CopyOutcome::Cancelled;
        }

        match preflight(spec, cancel) {
            Ok(total_bytes) => planned.push((spec, total_bytes)),
            Err(e) => {
                warn!("Skipping job '{}': {}", spec.label(), e.detailed());
                progress.on_status(&format!("Skipping '{}': {}", spec.label(), e));
                skip_reasons.push(e.to_string());
            }
        }
    }

    // A cancelled estimate is only a partial sum
    if cancel.is_cancelled() {
        return CopyOutcome::Cancelled;
    }

    if planned.is_empty() {
        let reason = match skip_reasons.as_slice() {
            [only] => only.clone(),
            _ => "No jobs with data to copy".to_string(),
        };
        return CopyOutcome::Failure { reason };
    }

    let total_bytes: u64 = planned.iter().map(|(_, bytes)| bytes).sum();
    let banner = format!(
        "Starting backup of {} job(s) ({:.1} MB)",
        planned.len(),
        total_bytes as f64 / BYTES_PER_MB
    );
    info!("{}", banner);
    progress.on_status(&banner);

    let mut state = RunState::new(total_bytes, cancel.clone());
    let mut completed_jobs = 0usize;
    let mut failures: Vec<String> = Vec::new();

    for (spec, job_bytes) in planned {
        if state.is_cancelled() {
            return CopyOutcome::Cancelled;
        }

        match prepare_destination(spec, job_bytes, free_space) {
            Ok(true) => {}
            Ok(false) => {
                let message = format!("Not enough free space for '{}'", spec.label());
                warn!("{}", message);
                progress.on_status(&message);
                failures.push(message);
                continue;
            }
            Err(e) => {
                let message = format!("Job '{}' aborted: {}", spec.label(), e.detailed());
                warn!("{}", message);
                progress.on_status(&message);
                failures.push(e.to_string());
                continue;
            }
        }

        progress.on_status(&format!("Copying '{}'...", spec.label()));
        match CopyEngine::new(spec, &mut state, progress).execute() {
            Ok(JobResult::Completed { files_copied }) => {
                info!("Job '{}' copied {} files", spec.label(), files_copied);
                completed_jobs += 1;
            }
            Ok(JobResult::Cancelled) => return CopyOutcome::Cancelled,
            Err(e) => {
                let message = format!("Job '{}' aborted: {}", spec.label(), e.detailed());
                warn!("{}", message);
                progress.on_status(&message);
                failures.push(e.to_string());
            }
        }
    }

    if completed_jobs == 0 {
        return CopyOutcome::Failure {
            reason: failures.join("; "),
        };
    }

    CopyOutcome::Success {
        files_copied: state.copied_count(),
    }
}
