//! Job file loading.
//!
//! A job file is JSON describing one or more named jobs, the copy options
//! they share and, optionally, when they should repeat:
//!
//! ```json
//! {
//!   "options": { "expand_folder_contents": false, "timestamp_naming": true },
//!   "jobs": [
//!     { "name": "Documents", "folders": ["/home/me/Documents"], "destination": "/mnt/usb" },
//!     { "name": "Dotfiles", "files": ["/home/me/.bashrc"], "destination": "/mnt/nas/dotfiles" }
//!   ],
//!   "schedule": { "every": "weekly", "weekday": "Mon", "at": "09:00:00" }
//! }
//! ```

use engine::{CopyOptions, JobSpec, RecurrencePolicy};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    /// Options applied to every job that does not set its own
    #[serde(default)]
    pub options: CopyOptions,

    pub jobs: Vec<JobEntry>,

    #[serde(default)]
    pub schedule: Option<RecurrencePolicy>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobEntry {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub folders: Vec<PathBuf>,

    #[serde(default)]
    pub files: Vec<PathBuf>,

    pub destination: PathBuf,

    #[serde(default)]
    pub options: Option<CopyOptions>,
}

impl BackupConfig {
    /// Read and validate a job file.
    pub fn load(path: &Path) -> Result<Self, String> {
        let raw = fs::read_to_string(path)
            .map_err(|e| format!("Cannot read job file {}: {}", path.display(), e))?;
        Self::parse(&raw).map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        let config: BackupConfig =
            serde_json::from_str(raw).map_err(|e| format!("Invalid job file: {}", e))?;

        if config.jobs.is_empty() {
            return Err("Job file defines no jobs".to_string());
        }
        if let Some(schedule) = &config.schedule {
            schedule.validate().map_err(|e| e.to_string())?;
        }
        Ok(config)
    }

    /// Build fresh job specs for one run.
    pub fn job_specs(&self) -> Vec<JobSpec> {
        self.jobs
            .iter()
            .map(|entry| JobSpec {
                name: entry.name.clone(),
                source_folders: entry.folders.clone(),
                source_files: entry.files.clone(),
                destination_root: entry.destination.clone(),
                options: entry.options.unwrap_or(self.options),
            })
            .collect()
    }
}
