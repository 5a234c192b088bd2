//! Source path collection.
//!
//! Resolves a job's selected folders and files into the concrete files to
//! size or copy. Folder walks are lazy and depth-first in the order the
//! filesystem returns entries; callers must not rely on any ordering.

use log::debug;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A file reached while resolving a job's sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Path of the file on disk
    pub path: PathBuf,

    /// Source folder the file was reached from; `None` for standalone files
    pub origin: Option<PathBuf>,

    /// Whether the origin folder's contents land directly in the destination
    expanded: bool,
}

impl SourceEntry {
    fn standalone(path: PathBuf) -> Self {
        SourceEntry {
            path,
            origin: None,
            expanded: false,
        }
    }

    /// Path of this file relative to the folder it was reached from.
    ///
    /// Standalone files yield their own file name.
    pub fn relative_to_origin(&self) -> PathBuf {
        match &self.origin {
            Some(folder) => self
                .path
                .strip_prefix(folder)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| base_name(&self.path)),
            None => base_name(&self.path),
        }
    }

    /// Where this file lands under the effective destination root, before
    /// any collision renaming.
    ///
    /// Expanded folders contribute their relative path directly; otherwise
    /// the folder's own name is kept as the first component.
    pub fn destination_relative(&self) -> PathBuf {
        match &self.origin {
            Some(folder) if !self.expanded => base_name(folder).join(self.relative_to_origin()),
            _ => self.relative_to_origin(),
        }
    }
}

/// Final component of a path, or the path itself if it has none (e.g. `/`).
pub fn base_name(path: &Path) -> PathBuf {
    path.file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| path.to_path_buf())
}

/// Lazy recursive walk over the files beneath one source folder.
///
/// A folder that does not exist yields nothing.
pub struct FolderWalk {
    folder: PathBuf,
    expanded: bool,
    inner: Option<walkdir::IntoIter>,
}

impl Iterator for FolderWalk {
    type Item = SourceEntry;

    fn next(&mut self) -> Option<SourceEntry> {
        let inner = self.inner.as_mut()?;
        for result in inner.by_ref() {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(
                        "Skipping unreadable entry under {}: {}",
                        self.folder.display(),
                        e
                    );
                    continue;
                }
            };

            let file_type = entry.file_type();
            let is_file =
                file_type.is_file() || (file_type.is_symlink() && entry.path().is_file());
            if !is_file {
                continue;
            }

            return Some(SourceEntry {
                path: entry.into_path(),
                origin: Some(self.folder.clone()),
                expanded: self.expanded,
            });
        }
        None
    }
}

/// Walk one source folder recursively.
pub fn walk_folder(folder: &Path, expand_folder_contents: bool) -> FolderWalk {
    let inner = if folder.is_dir() {
        Some(WalkDir::new(folder).follow_links(false).into_iter())
    } else {
        None
    };

    FolderWalk {
        folder: folder.to_path_buf(),
        expanded: expand_folder_contents,
        inner,
    }
}

/// Resolve folders and standalone files into one lazy sequence of entries.
///
/// Folder entries come first, then standalone files that currently exist.
pub fn collect_sources<'a>(
    source_folders: &'a [PathBuf],
    source_files: &'a [PathBuf],
    expand_folder_contents: bool,
) -> impl Iterator<Item = SourceEntry> + 'a {
    let walked = source_folders
        .iter()
        .flat_map(move |folder| walk_folder(folder, expand_folder_contents));

    let standalone = source_files
        .iter()
        .filter(|file| file.is_file())
        .map(|file| SourceEntry::standalone(file.clone()));

    walked.chain(standalone)
}
