//! Background archive compression for rotated log files.

pub mod pool;
pub mod stats;
pub mod task;

pub use pool::{CompressionConfig, CompressionPool};
pub use stats::{CompressionResult, CompressionStats};
pub use task::Priority;
