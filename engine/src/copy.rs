//! Copy execution for a single job.
//!
//! `preflight` validates and sizes a job before anything is written, and
//! `prepare_destination` readies its destination just before it runs.
//! `CopyEngine` then copies the job's folders and files into the effective
//! destination root. Every artifact's name is resolved right before it is
//! copied, so nothing at the destination is overwritten.
//!
//! Per-artifact failures are logged, reported as status events and skipped.
//! Only run-level failures (destination cannot be created, naming search
//! exhausted) end the job early.

use crate::collect::{base_name, walk_folder};
use crate::error::EngineError;
use crate::fs_ops::{self, SpaceProbe};
use crate::model::{CancelToken, JobSpec, RunState};
use crate::naming;
use crate::progress::ProgressCallback;
use crate::size::estimate_job_bytes;
use chrono::{Local, NaiveDate};
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// Result of a job that was allowed to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobResult {
    /// Every source was visited (some artifacts may have failed)
    Completed { files_copied: u32 },
    /// Cancellation was observed between artifacts
    Cancelled,
}

/// Validate a job and compute its size.
///
/// Rejects jobs with no sources, no destination, or zero bytes to copy.
/// Nothing is written; a zero-byte job is always an error, never an
/// empty success.
pub fn preflight(spec: &JobSpec, cancel: &CancelToken) -> Result<u64, EngineError> {
    if spec.has_no_sources() {
        return Err(EngineError::EmptySourceSet);
    }
    if spec.destination_root.as_os_str().is_empty() {
        return Err(EngineError::MissingDestination);
    }

    let total_bytes = estimate_job_bytes(spec, cancel);
    if total_bytes == 0 {
        return Err(EngineError::NothingToCopy);
    }
    Ok(total_bytes)
}

/// Create the job's destination root and check it can hold `required` bytes.
///
/// Called right before the job copies, so the free-space answer reflects
/// whatever earlier jobs already wrote. Returns false only if `free_space`
/// answered and reported too little.
pub fn prepare_destination(
    spec: &JobSpec,
    required: u64,
    free_space: &SpaceProbe,
) -> Result<bool, EngineError> {
    create_destination(&spec.destination_root)?;
    Ok(fs_ops::has_room_for(&spec.destination_root, required, free_space))
}

fn create_destination(path: &Path) -> Result<(), EngineError> {
    fs_ops::ensure_dir(path).map_err(|e| match e {
        EngineError::DirectoryCreationFailed { path, source } => {
            EngineError::DestinationCreationFailed { path, source }
        }
        other => other,
    })
}

// Whether a copy loop ran to its end or stopped on cancellation
enum Flow {
    Continue,
    Cancelled,
}

/// Executes one job against a run's shared counters.
pub struct CopyEngine<'a> {
    spec: &'a JobSpec,
    state: &'a mut RunState,
    progress: &'a dyn ProgressCallback,
    today: NaiveDate,
}

impl<'a> CopyEngine<'a> {
    pub fn new(
        spec: &'a JobSpec,
        state: &'a mut RunState,
        progress: &'a dyn ProgressCallback,
    ) -> Self {
        CopyEngine {
            spec,
            state,
            progress,
            today: Local::now().date_naive(),
        }
    }

    /// Override the date used for the dated wrapper folder.
    pub fn with_date(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Root all artifacts of this job are written beneath.
    pub fn effective_root(&self) -> PathBuf {
        if self.spec.options.wrap_in_dated_subfolder {
            self.spec
                .destination_root
                .join(naming::dated_folder_name(self.today))
        } else {
            self.spec.destination_root.clone()
        }
    }

    /// Copy every source of the job.
    ///
    /// # Errors
    /// Only run-level failures are returned; everything else is reported
    /// through the progress callback and skipped.
    pub fn execute(&mut self) -> Result<JobResult, EngineError> {
        let root = self.effective_root();
        create_destination(&root)?;

        let copied_before = self.state.copied_count();
        let expand = self.spec.options.expand_folder_contents;

        for folder in &self.spec.source_folders {
            if self.state.is_cancelled() {
                return Ok(JobResult::Cancelled);
            }

            if !folder.is_dir() {
                warn!("Source folder not found, skipping: {}", folder.display());
                continue;
            }

            let flow = if expand {
                self.copy_folder_contents(folder, &root)?
            } else {
                self.copy_folder_tree(folder, &root)?
            };
            if let Flow::Cancelled = flow {
                return Ok(JobResult::Cancelled);
            }
        }

        for file in &self.spec.source_files {
            if self.state.is_cancelled() {
                return Ok(JobResult::Cancelled);
            }

            if !file.exists() {
                warn!("Source file not found, skipping: {}", file.display());
                continue;
            }

            self.copy_artifact(file, &root.join(base_name(file)))?;
        }

        Ok(JobResult::Completed {
            files_copied: self.state.copied_count() - copied_before,
        })
    }

    /// Copy the files beneath `folder` straight into `root`.
    fn copy_folder_contents(&mut self, folder: &Path, root: &Path) -> Result<Flow, EngineError> {
        for entry in walk_folder(folder, true) {
            if self.state.is_cancelled() {
                return Ok(Flow::Cancelled);
            }
            let candidate = root.join(entry.relative_to_origin());
            self.copy_artifact(&entry.path, &candidate)?;
        }
        Ok(Flow::Continue)
    }

    /// Copy `folder` as one named entry under `root`.
    ///
    /// The folder name is resolved once; each file inside is still resolved
    /// individually.
    fn copy_folder_tree(&mut self, folder: &Path, root: &Path) -> Result<Flow, EngineError> {
        let candidate = root.join(base_name(folder));
        let tree_root = naming::resolve(&candidate, true, self.spec.options.timestamp_naming)?;

        if let Err(e) = fs_ops::ensure_dir(&tree_root) {
            self.report_failure(folder, &e);
            return Ok(Flow::Continue);
        }
        debug!("Copying folder {} into {}", folder.display(), tree_root.display());

        for entry in walk_folder(folder, false) {
            if self.state.is_cancelled() {
                return Ok(Flow::Cancelled);
            }
            let candidate = tree_root.join(entry.relative_to_origin());
            self.copy_artifact(&entry.path, &candidate)?;
        }
        Ok(Flow::Continue)
    }

    /// Resolve a free name for one file, copy it and report progress.
    fn copy_artifact(&mut self, src: &Path, candidate: &Path) -> Result<(), EngineError> {
        if let Err(e) = fs_ops::ensure_parent_dir_exists(candidate) {
            self.report_failure(src, &e);
            return Ok(());
        }

        let dst = match naming::resolve(candidate, false, self.spec.options.timestamp_naming) {
            Ok(dst) => dst,
            Err(e) if e.is_run_level() => return Err(e),
            Err(e) => {
                self.report_failure(src, &e);
                return Ok(());
            }
        };

        match fs_ops::copy_file_with_metadata(src, &dst) {
            Ok(bytes) => {
                debug!("Copied {} -> {} ({} bytes)", src.display(), dst.display(), bytes);
                let progress = self.state.record_copy(bytes);
                self.progress.on_progress(progress);
            }
            Err(e) => self.report_failure(src, &e),
        }
        Ok(())
    }

    fn report_failure(&self, src: &Path, error: &EngineError) {
        let message = format!("Error copying {}: {}", src.display(), error.detailed());
        warn!("{}", message);
        if let Some(code) = error.raw_os_error() {
            debug!("OS error code {} for {}", code, src.display());
        }
        self.progress.on_status(&message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CopyOptions, RunEvent};
    use crate::progress::testing::RecordingProgress;
    use std::fs;

    fn options(expand: bool, timestamp: bool, wrap: bool) -> CopyOptions {
        CopyOptions {
            expand_folder_contents: expand,
            timestamp_naming: timestamp,
            wrap_in_dated_subfolder: wrap,
        }
    }

    fn run(spec: &JobSpec, progress: &RecordingProgress, cancel: CancelToken) -> JobResult {
        let total = preflight(spec, &cancel).expect("preflight");
        let mut state = RunState::new(total, cancel);
        CopyEngine::new(spec, &mut state, progress)
            .execute()
            .expect("execute")
    }

    fn source_tree(root: &Path) -> PathBuf {
        let src = root.join("docs");
        fs::create_dir_all(src.join("nested")).expect("Failed to create src dir");
        fs::write(src.join("a.txt"), b"aaaa").expect("Failed to write file");
        fs::write(src.join("nested").join("b.txt"), b"bb").expect("Failed to write file");
        src
    }

    fn count_files(dir: &Path) -> usize {
        walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .count()
    }

    #[test]
    fn test_preflight_rejects_zero_byte_job() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let empty = temp_dir.path().join("empty.txt");
        fs::write(&empty, b"").expect("Failed to write file");

        let spec = JobSpec::new(temp_dir.path().join("dst")).with_file(&empty);
        let result = preflight(&spec, &CancelToken::new());
        assert!(matches!(result, Err(EngineError::NothingToCopy)));
        assert!(!temp_dir.path().join("dst").exists());
    }

    #[test]
    fn test_preflight_rejects_empty_source_set() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let spec = JobSpec::new(temp_dir.path().join("dst"));
        let result = preflight(&spec, &CancelToken::new());
        assert!(matches!(result, Err(EngineError::EmptySourceSet)));
    }

    #[test]
    fn test_preflight_rejects_missing_destination() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = source_tree(temp_dir.path());
        let spec = JobSpec::new("").with_folder(&src);
        let result = preflight(&spec, &CancelToken::new());
        assert!(matches!(result, Err(EngineError::MissingDestination)));
    }

    #[test]
    fn test_preflight_sizes_without_writing() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = source_tree(temp_dir.path());
        let dst = temp_dir.path().join("backups").join("daily");

        let spec = JobSpec::new(&dst).with_folder(&src);
        let total = preflight(&spec, &CancelToken::new()).expect("preflight");
        assert_eq!(total, 6);
        assert!(!dst.exists());
    }

    #[test]
    fn test_prepare_destination_creates_root() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = source_tree(temp_dir.path());
        let dst = temp_dir.path().join("backups").join("daily");
        let spec = JobSpec::new(&dst).with_folder(&src);

        let has_room = prepare_destination(&spec, 6, &|_: &Path| Some(6)).expect("prepare");
        assert!(has_room);
        assert!(dst.is_dir());
    }

    #[test]
    fn test_prepare_destination_reports_shortfall() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let spec = JobSpec::new(temp_dir.path().join("dst"));

        assert!(!prepare_destination(&spec, 6, &|_: &Path| Some(5)).expect("prepare"));
        // Unknown free space never blocks
        assert!(prepare_destination(&spec, 6, &|_: &Path| None).expect("prepare"));
    }

    #[test]
    fn test_prepare_destination_fails_on_file_in_the_way() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let dst = temp_dir.path().join("dst");
        fs::write(&dst, b"not a folder").expect("Failed to write file");
        let spec = JobSpec::new(&dst);

        let result = prepare_destination(&spec, 1, &|_: &Path| None);
        assert!(matches!(
            result,
            Err(EngineError::DestinationCreationFailed { .. })
        ));
    }

    #[test]
    fn test_expanded_folder_lands_directly_in_root() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = source_tree(temp_dir.path());
        let dst = temp_dir.path().join("dst");

        let spec = JobSpec::new(&dst)
            .with_folder(&src)
            .with_options(options(true, true, false));
        let progress = RecordingProgress::new();

        let result = run(&spec, &progress, CancelToken::new());

        assert_eq!(result, JobResult::Completed { files_copied: 2 });
        assert_eq!(fs::read(dst.join("a.txt")).unwrap(), b"aaaa");
        assert_eq!(fs::read(dst.join("nested").join("b.txt")).unwrap(), b"bb");
        assert!(!dst.join("docs").exists());
    }

    #[test]
    fn test_folder_tree_is_copied_as_named_entry() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = source_tree(temp_dir.path());
        let dst = temp_dir.path().join("dst");

        let spec = JobSpec::new(&dst)
            .with_folder(&src)
            .with_options(options(false, false, false));

        run(&spec, &RecordingProgress::new(), CancelToken::new());
        run(&spec, &RecordingProgress::new(), CancelToken::new());

        assert!(dst.join("docs").join("nested").join("b.txt").is_file());
        assert!(dst.join("docs_(1)").join("nested").join("b.txt").is_file());
        assert_eq!(count_files(&dst), 4);
        // Sources untouched
        assert_eq!(count_files(&src), 2);
    }

    #[test]
    fn test_repeated_runs_never_overwrite() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let file = temp_dir.path().join("notes.txt");
        fs::write(&file, b"notes").expect("Failed to write file");
        let dst = temp_dir.path().join("dst");

        let spec = JobSpec::new(&dst)
            .with_file(&file)
            .with_options(options(false, false, false));

        for _ in 0..5 {
            let result = run(&spec, &RecordingProgress::new(), CancelToken::new());
            assert_eq!(result, JobResult::Completed { files_copied: 1 });
        }

        assert_eq!(count_files(&dst), 5);
        assert!(dst.join("notes.txt").is_file());
        for n in 1..=4 {
            assert!(dst.join(format!("notes_({}).txt", n)).is_file());
        }
    }

    #[test]
    fn test_timestamp_naming_keeps_prior_copy() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let file = temp_dir.path().join("notes.txt");
        fs::write(&file, b"v1").expect("Failed to write file");
        let dst = temp_dir.path().join("dst");

        let spec = JobSpec::new(&dst)
            .with_file(&file)
            .with_options(options(false, true, false));

        run(&spec, &RecordingProgress::new(), CancelToken::new());
        fs::write(&file, b"v2").expect("Failed to write file");
        run(&spec, &RecordingProgress::new(), CancelToken::new());

        assert_eq!(fs::read(dst.join("notes.txt")).unwrap(), b"v1");
        assert_eq!(count_files(&dst), 2);
    }

    #[test]
    fn test_dated_subfolder_wraps_output() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let file = temp_dir.path().join("notes.txt");
        fs::write(&file, b"notes").expect("Failed to write file");
        let dst = temp_dir.path().join("dst");

        let spec = JobSpec::new(&dst)
            .with_file(&file)
            .with_options(options(false, true, true));
        let cancel = CancelToken::new();
        let total = preflight(&spec, &cancel).expect("preflight");
        let mut state = RunState::new(total, cancel);
        let progress = RecordingProgress::new();
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).expect("valid date");

        CopyEngine::new(&spec, &mut state, &progress)
            .with_date(date)
            .execute()
            .expect("execute");

        assert!(dst.join("Backup 29-02-2024").join("notes.txt").is_file());
    }

    #[test]
    fn test_same_run_collisions_resolve_against_each_other() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let first = temp_dir.path().join("one");
        let second = temp_dir.path().join("two");
        fs::create_dir_all(&first).expect("Failed to create dir");
        fs::create_dir_all(&second).expect("Failed to create dir");
        fs::write(first.join("same.txt"), b"first").expect("Failed to write file");
        fs::write(second.join("same.txt"), b"second").expect("Failed to write file");
        let dst = temp_dir.path().join("dst");

        let spec = JobSpec::new(&dst)
            .with_folder(&first)
            .with_folder(&second)
            .with_options(options(true, false, false));

        let result = run(&spec, &RecordingProgress::new(), CancelToken::new());
        assert_eq!(result, JobResult::Completed { files_copied: 2 });
        assert_eq!(fs::read(dst.join("same.txt")).unwrap(), b"first");
        assert_eq!(fs::read(dst.join("same_(1).txt")).unwrap(), b"second");
    }

    #[test]
    fn test_artifact_failure_does_not_stop_job() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = source_tree(temp_dir.path());
        let dst = temp_dir.path().join("dst");
        fs::create_dir_all(&dst).expect("Failed to create dst");
        // A file where a directory is needed blocks only the nested artifact
        fs::write(dst.join("nested"), b"in the way").expect("Failed to write file");

        let spec = JobSpec::new(&dst)
            .with_folder(&src)
            .with_options(options(true, false, false));
        let progress = RecordingProgress::new();

        let result = run(&spec, &progress, CancelToken::new());

        assert_eq!(result, JobResult::Completed { files_copied: 1 });
        assert!(dst.join("a.txt").is_file());
        assert_eq!(progress.progress().len(), 1);
        assert!(progress
            .statuses()
            .iter()
            .any(|s| s.starts_with("Error copying")));
    }

    #[test]
    fn test_cancellation_leaves_partial_output() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let dst = temp_dir.path().join("dst");
        let mut spec = JobSpec::new(&dst).with_options(options(false, false, false));
        for n in 0..5 {
            let file = temp_dir.path().join(format!("file{}.txt", n));
            fs::write(&file, b"data").expect("Failed to write file");
            spec = spec.with_file(file);
        }

        let cancel = CancelToken::new();
        let progress = RecordingProgress::cancelling_after(2, cancel.clone());
        let result = run(&spec, &progress, cancel);

        assert_eq!(result, JobResult::Cancelled);
        let emitted = progress
            .events()
            .iter()
            .filter(|e| matches!(e, RunEvent::Progress(_)))
            .count();
        assert_eq!(emitted, 2);
        assert_eq!(count_files(&dst), emitted);
    }

    #[test]
    fn test_progress_is_monotonic_and_bounded() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = source_tree(temp_dir.path());
        fs::write(src.join("c.bin"), vec![7u8; 300]).expect("Failed to write file");
        let dst = temp_dir.path().join("dst");

        let spec = JobSpec::new(&dst)
            .with_folder(&src)
            .with_options(options(false, true, false));
        let progress = RecordingProgress::new();
        run(&spec, &progress, CancelToken::new());

        let snapshots = progress.progress();
        assert_eq!(snapshots.len(), 3);
        for pair in snapshots.windows(2) {
            assert!(pair[1].copied_bytes >= pair[0].copied_bytes);
            assert!(pair[1].percent >= pair[0].percent);
        }
        let last = snapshots.last().unwrap();
        assert_eq!(last.percent, 100);
        assert_eq!(last.copied_bytes, 306);
        assert!(snapshots.iter().all(|p| p.percent <= 100));
    }
}
