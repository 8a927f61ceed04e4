use std::path::PathBuf;

use thiserror::Error;

use crate::video::frame::FrameShape;

pub type Result<T> = std::result::Result<T, DatasetError>;

/// Failures raised while building or reading an indexed sequence provider.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("data_type `{0}` is not supported by this provider; use plain image folders")]
    UnsupportedDataType(String),

    #[error("N_frames must be an odd number between 1 and 65535, got {0}")]
    InvalidWindow(usize),

    #[error(
        "LQ root {lq_root} has {lq_count} sequences but GT root {gt_root} has {gt_count}"
    )]
    SequenceCountMismatch {
        lq_root: PathBuf,
        gt_root: PathBuf,
        lq_count: usize,
        gt_count: usize,
    },

    #[error("different number of frames in {lq_dir} ({lq_count}) and {gt_dir} ({gt_count})")]
    FrameCountMismatch {
        lq_dir: PathBuf,
        gt_dir: PathBuf,
        lq_count: usize,
        gt_count: usize,
    },

    #[error("index {index} out of range for provider of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("loader returned {actual} frames for sequence `{sequence}` of {expected} frames")]
    StackLengthMismatch {
        sequence: String,
        expected: usize,
        actual: usize,
    },

    #[error("frame {path} is {actual} but the sequence started with {expected}")]
    FrameShapeMismatch {
        path: PathBuf,
        expected: FrameShape,
        actual: FrameShape,
    },

    #[error("I/O error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid options file {path}: {message}")]
    ConfigFile { path: PathBuf, message: String },
}

impl DatasetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
