//! Snapshot storage for the task queue, with pluggable backends.
//!
//! Supports:
//! - `memory`: In-memory storage (non-persistent, for testing)
//! - `file`: JSON file-based storage with atomic full rewrite
//!
//! A snapshot is the serialized task array, nothing else. The queue
//! rewrites it wholesale after every persisting mutation, so a store
//! never needs to diff or merge.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};

use crate::task::AgentTask;

/// Errors raised by snapshot storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read or write snapshot file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode or decode snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Queue snapshot store - implemented by all storage backends.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Whether this store persists data across restarts.
    fn is_persistent(&self) -> bool;

    /// Load the last saved snapshot.
    ///
    /// A snapshot that was never written is an empty queue, not an
    /// error. A snapshot that exists but cannot be decoded is an error;
    /// the queue decides how to recover.
    async fn load(&self) -> Result<Vec<AgentTask>, StoreError>;

    /// Replace the stored snapshot with the given tasks.
    async fn save(&self, tasks: &[AgentTask]) -> Result<(), StoreError>;

    /// Remove the stored snapshot entirely. Idempotent.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// JSON file-backed snapshot store.
///
/// Every save rewrites the whole file through a temp file and rename,
/// so a reader (or a reload after a crash) never observes a partial
/// snapshot.
pub struct FileTaskStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTaskStore {
    /// Create a store writing to `path`.
    ///
    /// Parent directories are created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The snapshot file location.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TaskStore for FileTaskStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn load(&self) -> Result<Vec<AgentTask>, StoreError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, tasks: &[AgentTask]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let data = serde_json::to_vec_pretty(tasks)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, data).await?;
        fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory snapshot store (non-persistent).
///
/// Useful for tests and for queues that want the store seam without
/// touching disk.
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<Vec<AgentTask>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn load(&self) -> Result<Vec<AgentTask>, StoreError> {
        Ok(self.tasks.read().await.clone())
    }

    async fn save(&self, tasks: &[AgentTask]) -> Result<(), StoreError> {
        *self.tasks.write().await = tasks.to_vec();
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.tasks.write().await.clear();
        Ok(())
    }
}
