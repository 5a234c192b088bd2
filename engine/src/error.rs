//! Error types for the backup engine.
//!
//! `EngineError` covers pre-flight validation, run-level failures and the
//! per-artifact errors the copy loop records. Per-artifact errors never stop
//! a run: the copy loop logs them and moves to the next artifact.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the engine.
///
/// Pre-flight and run-level variants end a job before (or instead of)
/// copying. Per-artifact variants are reported as status events and the
/// run continues.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Job has neither source folders nor source files
    #[error("No source folders or files selected")]
    EmptySourceSet,

    /// Job has no destination root configured
    #[error("No destination folder selected")]
    MissingDestination,

    /// The resolved source set sums to zero bytes
    #[error("Nothing to copy: source set is empty or zero bytes")]
    NothingToCopy,

    /// Destination root (or dated subfolder) could not be created
    #[error("Failed to create destination: {}", path.display())]
    DestinationCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Numeric-suffix search did not find a free name
    #[error("No free name for {} after {attempts} attempts", path.display())]
    NamingExhausted { path: PathBuf, attempts: u32 },

    /// Source file disappeared between enumeration and copy
    #[error("Source no longer exists: {}", path.display())]
    SourceVanished { path: PathBuf },

    /// Copying a single file failed
    #[error("Failed to copy {} to {}", src.display(), dst.display())]
    CopyFailed {
        src: PathBuf,
        dst: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Creating an intermediate directory failed
    #[error("Failed to create directory: {}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Monthly recurrence day outside 1..=31
    #[error("Day of month must be between 1 and 31, got {0}")]
    InvalidDayOfMonth(u32),
}

impl EngineError {
    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::DestinationCreationFailed { source, .. }
            | Self::CopyFailed { source, .. }
            | Self::DirectoryCreationFailed { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }

    /// True for errors that should abort the current job rather than a
    /// single artifact.
    pub fn is_run_level(&self) -> bool {
        matches!(
            self,
            Self::DestinationCreationFailed { .. } | Self::NamingExhausted { .. }
        )
    }

    /// Message with the underlying OS error appended, for status lines.
    pub fn detailed(&self) -> String {
        match std::error::Error::source(self) {
            Some(cause) => format!("{}: {}", self, cause),
            None => self.to_string(),
        }
    }
}
