//! Collision-free destination naming.
//!
//! Nothing already present at a destination is ever overwritten. When a
//! candidate path is taken, the resolver derives a new name with either a
//! timestamp suffix (`report_16.10.2026_14-03-59.txt`) or the first free
//! numeric suffix (`report_(1).txt`, `report_(2).txt`, ...).
//!
//! Resolution happens once per artifact right before it is copied, so
//! artifacts from the same run that aim at the same name see each other.

use crate::error::EngineError;
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Upper bound on the numeric-suffix search.
pub const MAX_NUMERIC_SUFFIX_ATTEMPTS: u32 = 10_000;

/// `dd.mm.yyyy_HH-MM-SS`
const TIMESTAMP_SUFFIX_FORMAT: &str = "%d.%m.%Y_%H-%M-%S";

/// `dd-mm-yyyy`
const DATED_FOLDER_FORMAT: &str = "%d-%m-%Y";

/// Resolve `candidate` to a free destination path using the local clock.
pub fn resolve(
    candidate: &Path,
    is_dir: bool,
    timestamp_naming: bool,
) -> Result<PathBuf, EngineError> {
    resolve_at(candidate, is_dir, timestamp_naming, Local::now().naive_local())
}

/// Resolve `candidate` to a free destination path, stamping with `now`.
///
/// The timestamp branch does not re-check for a second collision; two
/// copies of the same stem within one second produce the same name.
pub fn resolve_at(
    candidate: &Path,
    is_dir: bool,
    timestamp_naming: bool,
    now: NaiveDateTime,
) -> Result<PathBuf, EngineError> {
    if !occupied(candidate) {
        return Ok(candidate.to_path_buf());
    }

    if timestamp_naming {
        let stamp = now.format(TIMESTAMP_SUFFIX_FORMAT).to_string();
        return Ok(with_suffix(candidate, is_dir, &stamp));
    }

    for counter in 1..=MAX_NUMERIC_SUFFIX_ATTEMPTS {
        let next = with_suffix(candidate, is_dir, &format!("({})", counter));
        if !occupied(&next) {
            return Ok(next);
        }
    }

    Err(EngineError::NamingExhausted {
        path: candidate.to_path_buf(),
        attempts: MAX_NUMERIC_SUFFIX_ATTEMPTS,
    })
}

/// Name of the per-day wrapper folder, e.g. `Backup 16-10-2026`.
pub fn dated_folder_name(date: NaiveDate) -> String {
    format!("Backup {}", date.format(DATED_FOLDER_FORMAT))
}

// Anything at the path counts, including dangling symlinks.
fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Append `_<suffix>` to the stem, keeping the extension of files.
fn with_suffix(candidate: &Path, is_dir: bool, suffix: &str) -> PathBuf {
    let (stem, extension) = match (is_dir, candidate.file_stem(), candidate.extension()) {
        (false, Some(stem), Some(ext)) => (stem.to_os_string(), Some(ext)),
        _ => (
            candidate
                .file_name()
                .map(|name| name.to_os_string())
                .unwrap_or_default(),
            None,
        ),
    };

    let mut name = OsString::with_capacity(stem.len() + suffix.len() + 8);
    name.push(&stem);
    name.push("_");
    name.push(suffix);
    if let Some(ext) = extension {
        name.push(".");
        name.push(ext);
    }
    candidate.with_file_name(name)
}
