//! `CompressionTask`: one unit of work for the compression worker pool,
//! ordered by (priority desc, creation time asc) so a max-priority queue
//! drains urgent rotations first.

use std::path::PathBuf;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
}

pub struct CompressionTask {
    pub source: PathBuf,
    pub target: PathBuf,
    pub priority: Priority,
    pub created: Instant,
    pub delete_source_on_success: bool,
}

impl CompressionTask {
    pub fn new(source: PathBuf, target: PathBuf, priority: Priority) -> Self {
        CompressionTask { source, target, priority, created: Instant::now(), delete_source_on_success: false }
    }
}

impl PartialEq for CompressionTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.created == other.created
    }
}
impl Eq for CompressionTask {}

impl PartialOrd for CompressionTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CompressionTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority.cmp(&other.priority).then_with(|| other.created.cmp(&self.created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_priority_sorts_greater() {
        let low = CompressionTask::new(PathBuf::new(), PathBuf::new(), Priority::Low);
        let high = CompressionTask::new(PathBuf::new(), PathBuf::new(), Priority::High);
        assert!(high > low);
    }
}
