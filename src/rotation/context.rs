//! Everything a `RotationStrategy` needs to decide whether to rotate,
//! without reaching back into the writer or the logger.

use std::path::PathBuf;
use std::time::Instant;

pub struct RotationContext {
    pub active_path: PathBuf,
    pub current_size: u64,
    pub last_rotation: Instant,
    pub now: Instant,
    pub file_created: Instant,
    pub manual: bool,
}

impl RotationContext {
    pub fn new(active_path: PathBuf, current_size: u64, last_rotation: Instant, file_created: Instant) -> Self {
        RotationContext { active_path, current_size, last_rotation, now: Instant::now(), file_created, manual: false }
    }

    pub fn manual_request(mut self) -> Self {
        self.manual = true;
        self
    }
}
