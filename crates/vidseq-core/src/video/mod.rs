pub mod frame;
pub mod loader;
