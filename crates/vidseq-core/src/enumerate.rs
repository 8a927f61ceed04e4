use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{DatasetError, Result};

/// Lists the sequences under a root and the frames of one sequence.
///
/// Both listings must be deterministic: flat indices are only reproducible if
/// the same corpus always enumerates in the same order.
pub trait SequenceEnumerator {
    /// Sub-directories of `root`, one per sequence.
    fn list_subsequences(&self, root: &Path) -> Result<Vec<PathBuf>>;

    /// Frame files of one sequence, in temporal order.
    fn list_frames(&self, sequence: &Path) -> Result<Vec<PathBuf>>;
}

/// Reads directories from the local file system, sorted by path.
/// Entries whose name starts with `.` are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsEnumerator;

impl FsEnumerator {
    pub fn new() -> Self {
        Self
    }

    fn sorted_entries(dir: &Path, want_dirs: bool) -> Result<Vec<PathBuf>> {
        let read = fs::read_dir(dir).map_err(|e| DatasetError::io(dir, e))?;
        let mut paths = Vec::new();

        for entry in read {
            let entry = entry.map_err(|e| DatasetError::io(dir, e))?;
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| DatasetError::io(&path, e))?;
            let (is_dir, is_file) = if file_type.is_symlink() {
                // Linked sequence folders and frames count; dangling links don't.
                match fs::metadata(&path) {
                    Ok(meta) => (meta.is_dir(), meta.is_file()),
                    Err(e) => {
                        warn!(?path, error = %e, "skipping unresolvable symlink");
                        continue;
                    }
                }
            } else {
                (file_type.is_dir(), file_type.is_file())
            };
            if (want_dirs && is_dir) || (!want_dirs && is_file) {
                paths.push(path);
            }
        }

        paths.sort();
        debug!(?dir, count = paths.len(), want_dirs, "listed directory");
        Ok(paths)
    }
}

impl SequenceEnumerator for FsEnumerator {
    fn list_subsequences(&self, root: &Path) -> Result<Vec<PathBuf>> {
        Self::sorted_entries(root, true)
    }

    fn list_frames(&self, sequence: &Path) -> Result<Vec<PathBuf>> {
        Self::sorted_entries(sequence, false)
    }
}
