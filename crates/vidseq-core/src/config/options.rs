use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use tracing::info;

use crate::error::{DatasetError, Result};

const DEFAULT_N_FRAMES: usize = 5;
/// Largest accepted window. Keeps window offsets well inside `i64`.
pub const MAX_N_FRAMES: usize = u16::MAX as usize;

/// How window positions that fall outside a sequence are brought back in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Padding {
    /// Repeat the first/last frame.
    #[default]
    Replicate,
    /// Mirror across the boundary frame.
    #[serde(alias = "reflection")]
    Reflect,
    /// Pull in the real frames on the far side of the window.
    NewInfo,
    /// Wrap around the sequence.
    #[serde(alias = "circle")]
    Circular,
}

impl fmt::Display for Padding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Padding::Replicate => "replicate",
            Padding::Reflect => "reflect",
            Padding::NewInfo => "new_info",
            Padding::Circular => "circular",
        };
        f.write_str(name)
    }
}

impl FromStr for Padding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "replicate" => Ok(Padding::Replicate),
            "reflect" | "reflection" => Ok(Padding::Reflect),
            "new_info" => Ok(Padding::NewInfo),
            "circular" | "circle" => Ok(Padding::Circular),
            other => Err(format!(
                "unknown padding `{other}`, expected replicate, reflect, new_info or circular"
            )),
        }
    }
}

/// Storage format of the corpus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// One image file per frame.
    #[default]
    Img,
    /// Pre-indexed key/value store. Not readable by this provider.
    Lmdb,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Img => f.write_str("img"),
            DataType::Lmdb => f.write_str("lmdb"),
        }
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "img" => Ok(DataType::Img),
            "lmdb" => Ok(DataType::Lmdb),
            other => Err(format!("unknown data_type `{other}`, expected img or lmdb")),
        }
    }
}

/// Options for an indexed sequence provider.
///
/// Key names follow the option files these providers are usually configured
/// with, so an existing `[datasets.test]` block can be pasted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatasetOptions {
    /// Root holding one sub-directory of low-quality frames per sequence.
    #[serde(rename = "dataroot_LQ")]
    pub dataroot_lq: PathBuf,
    /// Root holding the matching ground-truth sequences. `None` disables GT.
    #[serde(rename = "dataroot_GT", default)]
    pub dataroot_gt: Option<PathBuf>,
    /// Window size. Must be odd.
    #[serde(rename = "N_frames", default = "default_n_frames")]
    pub n_frames: usize,
    #[serde(default)]
    pub padding: Padding,
    /// Decode every sequence up front (`true`) or one sequence at a time.
    #[serde(default = "default_cache_data")]
    pub cache_data: bool,
    #[serde(default)]
    pub data_type: DataType,
}

fn default_n_frames() -> usize {
    DEFAULT_N_FRAMES
}

fn default_cache_data() -> bool {
    true
}

impl DatasetOptions {
    pub fn new(dataroot_lq: impl Into<PathBuf>) -> Self {
        Self {
            dataroot_lq: dataroot_lq.into(),
            dataroot_gt: None,
            n_frames: DEFAULT_N_FRAMES,
            padding: Padding::default(),
            cache_data: default_cache_data(),
            data_type: DataType::default(),
        }
    }

    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|e| DatasetError::ConfigFile {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;
        let options = Self::from_toml_str(&text, path)?;
        info!(?path, ?options, "loaded dataset options");
        Ok(options)
    }

    pub fn need_gt(&self) -> bool {
        self.dataroot_gt.is_some()
    }

    pub fn half_window(&self) -> usize {
        self.n_frames / 2
    }

    /// Reject options this provider cannot serve.
    pub fn validate(&self) -> Result<()> {
        if self.data_type == DataType::Lmdb {
            return Err(DatasetError::UnsupportedDataType(self.data_type.to_string()));
        }
        if self.n_frames == 0 || self.n_frames % 2 == 0 || self.n_frames > MAX_N_FRAMES {
            return Err(DatasetError::InvalidWindow(self.n_frames));
        }
        Ok(())
    }
}
