//! Core data model for backup runs.
//!
//! This module defines the main data structures for representing a backup:
//! - JobSpec / CopyOptions: what to copy and how, fixed for the whole run
//! - RunState: counters owned by the worker while a run executes
//! - Progress / RunEvent / CopyOutcome: what the run reports to its caller
//! - CancelToken: the one piece of state shared between caller and worker

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One backup unit: a source set copied into one destination root.
///
/// Built fresh by the caller for every run and never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Display name used in status messages (e.g. a tab title)
    #[serde(default)]
    pub name: Option<String>,

    /// Folders to back up, walked recursively
    #[serde(default)]
    pub source_folders: Vec<PathBuf>,

    /// Individual files to back up
    #[serde(default)]
    pub source_files: Vec<PathBuf>,

    /// Root directory the backup is written into
    pub destination_root: PathBuf,

    /// Copy behavior
    #[serde(default)]
    pub options: CopyOptions,
}

impl JobSpec {
    pub fn new<P: Into<PathBuf>>(destination_root: P) -> Self {
        JobSpec {
            name: None,
            source_folders: Vec::new(),
            source_files: Vec::new(),
            destination_root: destination_root.into(),
            options: CopyOptions::default(),
        }
    }

    pub fn with_folder<P: Into<PathBuf>>(mut self, folder: P) -> Self {
        self.source_folders.push(folder.into());
        self
    }

    pub fn with_file<P: Into<PathBuf>>(mut self, file: P) -> Self {
        self.source_files.push(file.into());
        self
    }

    pub fn with_options(mut self, options: CopyOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// True if neither folders nor files were selected.
    pub fn has_no_sources(&self) -> bool {
        self.source_folders.is_empty() && self.source_files.is_empty()
    }

    /// Name for log and status lines; falls back to the destination path.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.destination_root.display().to_string(),
        }
    }
}

/// Options controlling how a job lays out its copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyOptions {
    /// Copy a folder's contents straight into the destination instead of
    /// the folder itself as one named entry
    pub expand_folder_contents: bool,

    /// Collision policy: timestamp suffix if true, numeric `_(N)` otherwise
    pub timestamp_naming: bool,

    /// Create `Backup <dd-mm-yyyy>` under the destination root first
    pub wrap_in_dated_subfolder: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        CopyOptions {
            expand_folder_contents: false,
            timestamp_naming: true,
            wrap_in_dated_subfolder: true,
        }
    }
}

/// Cooperative cancellation flag shared between a caller and one run.
///
/// Cloning shares the flag. Setting it is idempotent.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Mutable counters for one run, owned by the worker executing it.
#[derive(Debug)]
pub struct RunState {
    /// Denominator fixed before copying starts
    total_bytes: u64,
    copied_bytes: u64,
    copied_count: u32,
    cancel: CancelToken,
}

impl RunState {
    pub fn new(total_bytes: u64, cancel: CancelToken) -> Self {
        RunState {
            total_bytes,
            copied_bytes: 0,
            copied_count: 0,
            cancel,
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn copied_bytes(&self) -> u64 {
        self.copied_bytes
    }

    pub fn copied_count(&self) -> u32 {
        self.copied_count
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Account for one copied artifact and return the progress snapshot to
    /// emit for it.
    pub fn record_copy(&mut self, bytes: u64) -> Progress {
        self.copied_bytes = self.copied_bytes.saturating_add(bytes);
        self.copied_count = self.copied_count.saturating_add(1);
        self.progress()
    }

    pub fn progress(&self) -> Progress {
        Progress {
            percent: percent_of(self.copied_bytes, self.total_bytes),
            copied_bytes: self.copied_bytes,
            total_bytes: self.total_bytes,
            copied_count: self.copied_count,
        }
    }
}

/// `floor(copied * 100 / total)` clamped to `[0, 100]`.
fn percent_of(copied: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = (copied as u128 * 100) / total as u128;
    percent.min(100) as u8
}

/// Snapshot emitted after every copied artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub percent: u8,
    pub copied_bytes: u64,
    pub total_bytes: u64,
    pub copied_count: u32,
}

/// Terminal result of a run. Exactly one is produced per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The loop ran to the end; some artifacts may have failed individually
    Success { files_copied: u32 },
    /// Cancellation was observed; already-copied artifacts stay in place
    Cancelled,
    /// The run could not start (or no job could complete)
    Failure { reason: String },
}

impl CopyOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CopyOutcome::Success { .. })
    }
}

impl fmt::Display for CopyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyOutcome::Success { files_copied } => {
                write!(f, "Successfully copied {} files", files_copied)
            }
            CopyOutcome::Cancelled => write!(f, "Operation cancelled"),
            CopyOutcome::Failure { reason } => write!(f, "Backup failed: {}", reason),
        }
    }
}

/// Events delivered on a run's stream, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    Progress(Progress),
    /// Human-readable, non-fatal status line
    Status(String),
    /// Always the last event of a run
    Finished(CopyOutcome),
}
