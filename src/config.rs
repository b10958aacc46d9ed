//! Queue configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Capacity used when none is configured.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 100;

/// Configuration for a `TaskQueueManager`.
///
/// All fields have defaults, so the struct can be embedded in a host
/// application's own configuration file and partially specified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Most tasks the queue will admit through `enqueue`
    pub max_queue_size: usize,

    /// Snapshot file location; `None` keeps the queue in memory only
    pub persist_path: Option<PathBuf>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            persist_path: None,
        }
    }
}

impl QueueConfig {
    /// Create a configuration with the given capacity and no
    /// persistence.
    pub fn new(max_queue_size: usize) -> Self {
        Self {
            max_queue_size,
            persist_path: None,
        }
    }

    /// Persist queue snapshots to the given file.
    pub fn with_persist_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.persist_path = Some(path.into());
        self
    }
}
