pub mod config;
pub mod debug;
pub mod enumerate;
pub mod error;
pub mod index;
pub mod provider;
pub mod video;
pub mod window;

pub use config::{DataType, DatasetOptions, Padding};
pub use error::{DatasetError, Result};
pub use provider::{ClipSample, GroundTruth, IndexedSequenceProvider};
