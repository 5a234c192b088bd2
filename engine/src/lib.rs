//! # BackUP Engine - Non-destructive Backup Library
//!
//! A headless backup engine in Rust, designed as the foundation for
//! multiple front ends (CLI, scheduler, GUI).
//!
//! ## Overview
//!
//! The engine copies user-selected folders and files into one or more
//! destination roots. It:
//! - Never deletes or modifies a source path
//! - Never overwrites anything at the destination (timestamp or numeric
//!   suffixes resolve every collision)
//! - Isolates per-file errors; one unreadable file never aborts a backup
//! - Streams ordered progress events and honors cooperative cancellation
//! - Computes the next run of daily, weekly and monthly schedules
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{start_run, CopyOptions, JobSpec, RunEvent};
//!
//! let spec = JobSpec::new("/mnt/backup")
//!     .with_folder("/home/me/Documents")
//!     .with_file("/home/me/.bashrc")
//!     .with_options(CopyOptions::default());
//!
//! let handle = start_run(vec![spec]);
//! for event in handle.events().iter() {
//!     match event {
//!         RunEvent::Progress(p) => println!("{}%", p.percent),
//!         RunEvent::Status(line) => println!("{}", line),
//!         RunEvent::Finished(outcome) => println!("{}", outcome),
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (JobSpec, CopyOptions, RunState, events)
//! - **error**: Error types and handling
//! - **collect**: Resolving selected folders/files into concrete files
//! - **size**: Estimating the bytes a job will copy
//! - **naming**: Collision-free destination names
//! - **fs_ops**: Low-level filesystem operations
//! - **copy**: Pre-flight validation and single-job copy execution
//! - **orchestrator**: Multi-job batches with one combined outcome
//! - **progress**: Progress callback trait and channel adapter
//! - **runner**: Background runs with handles and cancellation
//! - **schedule**: Next-run computation for recurring backups

pub mod model;
pub mod error;
pub mod collect;
pub mod size;
pub mod naming;
pub mod fs_ops;
pub mod copy;
pub mod orchestrator;
pub mod progress;
pub mod runner;
pub mod schedule;

// Re-export main types and functions
pub use model::{
    CancelToken, CopyOptions, CopyOutcome, JobSpec, Progress, RunEvent, RunState,
};
pub use error::EngineError;
pub use collect::{collect_sources, SourceEntry};
pub use size::{estimate_job_bytes, estimate_total_bytes};
pub use copy::{preflight, prepare_destination, CopyEngine, JobResult};
pub use orchestrator::run_jobs;
pub use progress::{ChannelProgress, ProgressCallback};
pub use runner::{start_run, RunHandle};
pub use schedule::{format_next_run, next_run, Recurrence, RecurrencePolicy};
