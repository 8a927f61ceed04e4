pub mod options;

pub use options::{DataType, DatasetOptions, Padding};
