//! Filesystem operations module.
//!
//! This module provides low-level operations for:
//! - Copying files with metadata preservation, never over an existing path
//! - Creating directories recursively
//! - Probing free space on the destination volume

use crate::error::EngineError;
use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use sysinfo::Disks;

/// Copy a file from source to destination with metadata preservation.
///
/// The destination is opened create-new, so an existing file is never
/// truncated. Permissions and access/modification times are carried over
/// on a best-effort basis. A partially written destination is removed.
///
/// # Returns
/// Number of bytes copied
///
/// # Errors
/// `SourceVanished` if the source is gone, `CopyFailed` for any other I/O
/// failure, `DirectoryCreationFailed` if the parent cannot be created.
pub fn copy_file_with_metadata(src: &Path, dst: &Path) -> Result<u64, EngineError> {
    ensure_parent_dir_exists(dst)?;

    let copy_failed = |e: io::Error| EngineError::CopyFailed {
        src: src.to_path_buf(),
        dst: dst.to_path_buf(),
        source: e,
    };

    let mut src_file = fs::File::open(src).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            EngineError::SourceVanished {
                path: src.to_path_buf(),
            }
        } else {
            copy_failed(e)
        }
    })?;

    let src_metadata = src_file.metadata().map_err(copy_failed)?;

    let mut dst_file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dst)
        .map_err(copy_failed)?;

    let bytes_copied = match io::copy(&mut src_file, &mut dst_file) {
        Ok(bytes) => bytes,
        Err(e) => {
            drop(dst_file);
            let _ = fs::remove_file(dst);
            return Err(copy_failed(e));
        }
    };
    drop(dst_file);

    let mtime = filetime::FileTime::from_last_modification_time(&src_metadata);
    let atime = filetime::FileTime::from_last_access_time(&src_metadata);
    if let Err(e) = filetime::set_file_times(dst, atime, mtime) {
        debug!("Could not preserve times on {}: {}", dst.display(), e);
    }

    // Read-only sources must get their times set before this
    if let Err(e) = fs::set_permissions(dst, src_metadata.permissions()) {
        debug!("Could not preserve permissions on {}: {}", dst.display(), e);
    }

    Ok(bytes_copied)
}

/// Ensure the parent directory of a path exists, creating it if necessary.
///
/// # Errors
/// Returns `DirectoryCreationFailed` if the parent is a file or cannot be
/// created.
pub fn ensure_parent_dir_exists(path: &Path) -> Result<(), EngineError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

/// `mkdir -p` with a check that an existing path really is a directory.
pub fn ensure_dir(dir: &Path) -> Result<(), EngineError> {
    match fs::metadata(dir) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(EngineError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "Path exists but is not a directory",
            ),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| EngineError::DirectoryCreationFailed {
                path: dir.to_path_buf(),
                source: e,
            })
        }
        Err(e) => Err(EngineError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source: e,
        }),
    }
}

/// Answers how many bytes are free on the volume holding a path, if known.
pub type SpaceProbe = dyn Fn(&Path) -> Option<u64>;

/// Free bytes on the volume holding `path`, if it can be determined.
///
/// `path` may not exist yet; its closest existing ancestor is used.
pub fn available_space(path: &Path) -> Option<u64> {
    let existing = closest_existing_ancestor(path)?;
    let resolved = existing.canonicalize().ok()?;

    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|disk| resolved.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
}

/// Whether the destination volume can hold `required` bytes.
///
/// Optimistic: if the probe has no answer this returns true.
pub fn has_room_for(path: &Path, required: u64, free_space: &SpaceProbe) -> bool {
    match free_space(path) {
        Some(free) => free >= required,
        None => {
            debug!("Free-space probe unavailable for {}", path.display());
            true
        }
    }
}

fn closest_existing_ancestor(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .find(|candidate| !candidate.as_os_str().is_empty() && candidate.exists())
        .map(Path::to_path_buf)
}
