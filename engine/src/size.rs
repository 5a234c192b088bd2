//! Size estimation for a resolved source set.
//!
//! The result is the progress denominator for a run and the figure checked
//! against destination free space. It is computed once per run, before any
//! copying, and never revised.

use crate::collect::{collect_sources, SourceEntry};
use crate::model::{CancelToken, JobSpec};
use std::fs;

/// Sum the on-disk size of every entry.
///
/// Entries that vanished or cannot be stat'ed contribute 0. If `cancel` is
/// observed mid-walk the partial sum is returned; callers must not treat it
/// as authoritative.
pub fn estimate_total_bytes<I>(entries: I, cancel: &CancelToken) -> u64
where
    I: IntoIterator<Item = SourceEntry>,
{
    let mut total: u64 = 0;
    for entry in entries {
        if cancel.is_cancelled() {
            return total;
        }
        if let Ok(metadata) = fs::metadata(&entry.path) {
            total = total.saturating_add(metadata.len());
        }
    }
    total
}

/// Estimate the bytes one job would copy.
pub fn estimate_job_bytes(spec: &JobSpec, cancel: &CancelToken) -> u64 {
    let entries = collect_sources(
        &spec.source_folders,
        &spec.source_files,
        spec.options.expand_folder_contents,
    );
    estimate_total_bytes(entries, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_estimate_sums_folders_and_files() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        fs::create_dir_all(src.join("sub")).expect("Failed to create src dir");
        fs::write(src.join("a.txt"), b"12345").expect("Failed to write file");
        fs::write(src.join("sub").join("b.txt"), b"123").expect("Failed to write file");
        let loose = temp_dir.path().join("loose.bin");
        fs::write(&loose, vec![0u8; 100]).expect("Failed to write file");

        let spec = JobSpec::new(temp_dir.path().join("dst"))
            .with_folder(&src)
            .with_file(&loose);

        assert_eq!(estimate_job_bytes(&spec, &CancelToken::new()), 108);
    }

    #[test]
    fn test_missing_sources_contribute_zero() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let spec = JobSpec::new(temp_dir.path().join("dst"))
            .with_folder(temp_dir.path().join("no-such-folder"))
            .with_file(PathBuf::from("/definitely/not/here.txt"));

        assert_eq!(estimate_job_bytes(&spec, &CancelToken::new()), 0);
    }

    #[test]
    fn test_cancelled_estimate_returns_partial_sum() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, b"abc").expect("Failed to write file");

        let spec = JobSpec::new(temp_dir.path().join("dst")).with_file(&file);
        let cancel = CancelToken::new();
        cancel.cancel();

        assert_eq!(estimate_job_bytes(&spec, &cancel), 0);
    }
}
