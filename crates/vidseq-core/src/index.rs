use std::ops::Range;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::enumerate::SequenceEnumerator;
use crate::error::{DatasetError, Result};
use crate::window::is_boundary;

/// One frame of the corpus, addressable by its flat index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatIndexEntry {
    pub lq_path: PathBuf,
    /// Present iff the index was built with a GT root.
    pub gt_path: Option<PathBuf>,
    /// Ordinal of the owning sequence in [`FlatIndex::spans`].
    pub sequence: usize,
    /// 0-based rank within the sequence.
    pub position: usize,
    pub sequence_length: usize,
    pub is_boundary: bool,
}

impl FlatIndexEntry {
    /// `"position/sequence_length"`, e.g. `"4/30"`.
    pub fn label(&self) -> String {
        format!("{}/{}", self.position, self.sequence_length)
    }
}

/// Contiguous block of entries belonging to one sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceSpan {
    pub name: String,
    pub lq_dir: PathBuf,
    pub gt_dir: Option<PathBuf>,
    /// Flat index of the first frame.
    pub start: usize,
    pub len: usize,
}

impl SequenceSpan {
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

/// Flat, two-level index over every frame of every sequence.
///
/// Entries of one sequence are stored contiguously in frame order, and
/// sequences follow enumeration order.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    entries: Vec<FlatIndexEntry>,
    spans: Vec<SequenceSpan>,
}

impl FlatIndex {
    /// Walk `lq_root` (and `gt_root` in lock-step, if given) and index every
    /// frame. LQ and GT must agree on the number of sequences and on the
    /// number of frames of each pair.
    pub fn build(
        enumerator: &impl SequenceEnumerator,
        lq_root: &Path,
        gt_root: Option<&Path>,
        half_window: usize,
    ) -> Result<Self> {
        let lq_dirs = enumerator.list_subsequences(lq_root)?;
        let gt_dirs: Vec<Option<PathBuf>> = match gt_root {
            Some(gt_root) => {
                let gt_dirs = enumerator.list_subsequences(gt_root)?;
                if gt_dirs.len() != lq_dirs.len() {
                    return Err(DatasetError::SequenceCountMismatch {
                        lq_root: lq_root.to_path_buf(),
                        gt_root: gt_root.to_path_buf(),
                        lq_count: lq_dirs.len(),
                        gt_count: gt_dirs.len(),
                    });
                }
                gt_dirs.into_iter().map(Some).collect()
            }
            None => vec![None; lq_dirs.len()],
        };

        let mut index = FlatIndex::default();
        for (lq_dir, gt_dir) in lq_dirs.into_iter().zip(gt_dirs) {
            index.push_sequence(enumerator, lq_dir, gt_dir, half_window)?;
        }

        info!(
            ?lq_root,
            ?gt_root,
            sequences = index.spans.len(),
            frames = index.entries.len(),
            "flat index built"
        );
        Ok(index)
    }

    fn push_sequence(
        &mut self,
        enumerator: &impl SequenceEnumerator,
        lq_dir: PathBuf,
        gt_dir: Option<PathBuf>,
        half_window: usize,
    ) -> Result<()> {
        let lq_paths = enumerator.list_frames(&lq_dir)?;
        let gt_paths: Vec<Option<PathBuf>> = match &gt_dir {
            Some(gt_dir) => {
                let gt_paths = enumerator.list_frames(gt_dir)?;
                if gt_paths.len() != lq_paths.len() {
                    return Err(DatasetError::FrameCountMismatch {
                        lq_dir,
                        gt_dir: gt_dir.clone(),
                        lq_count: lq_paths.len(),
                        gt_count: gt_paths.len(),
                    });
                }
                gt_paths.into_iter().map(Some).collect()
            }
            None => vec![None; lq_paths.len()],
        };

        let lq_name = dir_name(&lq_dir);
        let name = match &gt_dir {
            Some(gt_dir) => {
                let gt_name = dir_name(gt_dir);
                if gt_name != lq_name {
                    warn!(%lq_name, %gt_name, "paired LQ/GT sequences have different names");
                }
                gt_name
            }
            None => lq_name,
        };

        let sequence = self.spans.len();
        let start = self.entries.len();
        let len = lq_paths.len();

        self.entries.extend(
            lq_paths
                .into_iter()
                .zip(gt_paths)
                .enumerate()
                .map(|(position, (lq_path, gt_path))| FlatIndexEntry {
                    lq_path,
                    gt_path,
                    sequence,
                    position,
                    sequence_length: len,
                    is_boundary: is_boundary(position, len, half_window),
                }),
        );

        debug!(%name, start, len, "indexed sequence");
        self.spans.push(SequenceSpan {
            name,
            lq_dir,
            gt_dir,
            start,
            len,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: usize) -> Option<&FlatIndexEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[FlatIndexEntry] {
        &self.entries
    }

    pub fn spans(&self) -> &[SequenceSpan] {
        &self.spans
    }

    pub fn span(&self, sequence: usize) -> &SequenceSpan {
        &self.spans[sequence]
    }

    /// Resolve a flat index to `(sequence, position)` from the span
    /// boundaries alone, in `O(log sequences)`.
    pub fn locate(&self, index: usize) -> Option<(usize, usize)> {
        if index >= self.entries.len() {
            return None;
        }
        let sequence = self.spans.partition_point(|s| s.start + s.len <= index);
        Some((sequence, index - self.spans[sequence].start))
    }

    /// Every LQ frame path of a sequence, in frame order.
    pub fn lq_paths(&self, sequence: usize) -> Vec<PathBuf> {
        self.entries[self.span(sequence).range()]
            .iter()
            .map(|e| e.lq_path.clone())
            .collect()
    }

    /// Every GT frame path of a sequence, or `None` without a GT root.
    pub fn gt_paths(&self, sequence: usize) -> Option<Vec<PathBuf>> {
        let span = self.span(sequence);
        span.gt_dir.as_ref()?;
        self.entries[span.range()]
            .iter()
            .map(|e| e.gt_path.clone())
            .collect()
    }
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.to_string_lossy().into_owned())
}
