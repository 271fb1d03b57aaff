//! Multi-sink output fan-out: the `Sink` capability, concrete console and
//! file sinks, and the `OutputManager` that dispatches to all of them.

pub mod console;
pub mod file;
pub mod manager;
pub mod sink;

pub use console::ConsoleSink;
pub use file::FileSink;
pub use manager::{ManagerStats, OutputError, OutputManager, WriteMode};
pub use sink::{Sink, SinkCore, SinkStats, WriteOutcome};
