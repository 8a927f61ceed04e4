use std::path::{Path, PathBuf};

use image::ImageError;
use tracing::{debug, info};

use crate::error::{DatasetError, Result};

use super::frame::{Frame, FrameStack};

/// Alignment hint used when a provider loads a whole sequence.
pub const DEFAULT_ALIGNMENT: usize = 16;

/// Decodes an ordered list of frame files into one stack.
///
/// `alignment` only affects how frames are laid out in memory; the decoded
/// values must be the same for any hint.
pub trait FrameStackLoader {
    fn load(&self, paths: &[PathBuf], alignment: usize) -> Result<FrameStack>;
}

/// Loads still images from disk with the `image` crate as RGB frames.
///
/// Every frame is converted to 8-bit RGB before it is stacked: grayscale
/// files become three identical channels and 16-bit files are reduced to
/// 8 bits per channel. A sequence therefore always stacks as 3 channels,
/// whatever mix of encodings its files use.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageStackLoader;

impl ImageStackLoader {
    pub fn new() -> Self {
        Self
    }

    fn decode(path: &Path) -> Result<Frame> {
        let image = image::open(path).map_err(|e| match e {
            ImageError::IoError(source) => DatasetError::io(path, source),
            source => DatasetError::Decode {
                path: path.to_path_buf(),
                source,
            },
        })?;
        Ok(Frame::from_rgb(&image.to_rgb8()))
    }
}

impl FrameStackLoader for ImageStackLoader {
    fn load(&self, paths: &[PathBuf], alignment: usize) -> Result<FrameStack> {
        let Some((first_path, rest)) = paths.split_first() else {
            debug!("no frame paths given, returning empty stack");
            return Ok(FrameStack::empty());
        };

        let first = Self::decode(first_path)?;
        let mut stack = FrameStack::with_capacity(first.shape, paths.len(), alignment);
        stack.push(&first.data);

        for path in rest {
            let frame = Self::decode(path)?;
            if frame.shape != stack.shape() {
                return Err(DatasetError::FrameShapeMismatch {
                    path: path.clone(),
                    expected: stack.shape(),
                    actual: frame.shape,
                });
            }
            stack.push(&frame.data);
        }

        info!(
            frames = stack.len(),
            shape = %stack.shape(),
            alignment,
            first = ?first_path,
            "decoded frame stack"
        );
        Ok(stack)
    }
}
