//! Priority task queue with bounded capacity and snapshot persistence.
//!
//! # Invariants
//! - The collection is sorted by priority descending, then `created_at`
//!   ascending, after every order-affecting mutation
//! - `enqueue` never grows the collection past `max_queue_size`; the
//!   distributor's re-admission path is exempt so a task in flight is
//!   never dropped
//! - When a store is configured, every successful mutation leaves the
//!   store holding the current collection

use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::QueueConfig;
use crate::distributor::AgentId;
use crate::queue::store::{FileTaskStore, StoreError, TaskStore};
use crate::task::{AgentTask, TaskId, TaskPriority, TaskResult, TaskStatus};

/// Errors raised by queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue is full: capacity of {capacity} reached")]
    QueueFull { capacity: usize },

    #[error("Task {0} not found")]
    TaskNotFound(TaskId),

    #[error("Task {id} cannot move from {from} to {to}")]
    InvalidTaskState {
        id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Failed to persist queue snapshot: {0}")]
    Persistence(#[from] StoreError),
}

/// Per-status task counts for inspection and logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub assigned: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

struct QueueState {
    tasks: Vec<AgentTask>,
}

/// Priority-ordered task queue.
///
/// One instance owns the task collection for a coordination domain.
/// All access is serialized through an internal mutex, so operations
/// are atomic with respect to each other no matter how many callers
/// share the instance (typically via `Arc<TaskQueueManager>`).
///
/// Terminal tasks stay in the collection for inspection; only `clear`
/// removes them in bulk. The schedulable subset is whatever is
/// `Pending`, and `dequeue`/`peek` look at that subset only.
///
/// Snapshot writes happen inside the critical section: a slow disk
/// delays queue operations rather than letting the snapshot drift from
/// the in-memory state.
pub struct TaskQueueManager {
    state: Mutex<QueueState>,
    max_queue_size: usize,
    store: Option<Box<dyn TaskStore>>,
}

impl TaskQueueManager {
    /// Create a queue from configuration.
    ///
    /// With a persistence path configured, the prior snapshot is loaded
    /// before the queue accepts work: a missing snapshot file is an
    /// empty queue, and an unreadable one is logged and treated as
    /// empty rather than refusing to start.
    pub async fn new(config: QueueConfig) -> Self {
        let store = config
            .persist_path
            .as_ref()
            .map(|path| Box::new(FileTaskStore::new(path.clone())) as Box<dyn TaskStore>);
        Self::from_parts(config.max_queue_size, store).await
    }

    /// Create a queue over an explicit storage backend.
    ///
    /// The configuration's persistence path is ignored; the given store
    /// wins.
    pub async fn with_store(config: QueueConfig, store: Box<dyn TaskStore>) -> Self {
        Self::from_parts(config.max_queue_size, Some(store)).await
    }

    async fn from_parts(max_queue_size: usize, store: Option<Box<dyn TaskStore>>) -> Self {
        let mut tasks = match &store {
            Some(store) => match store.load().await {
                Ok(tasks) => tasks,
                Err(err) => {
                    tracing::warn!("Failed to load queue snapshot, starting empty: {}", err);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        sort_tasks(&mut tasks);
        if !tasks.is_empty() {
            tracing::info!("Restored {} task(s) from queue snapshot", tasks.len());
        }
        Self {
            state: Mutex::new(QueueState { tasks }),
            max_queue_size,
            store,
        }
    }

    /// Capacity limit enforced by `enqueue`.
    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    /// Add a task to the queue.
    ///
    /// The collection is re-sorted and persisted before returning. On a
    /// persistence failure the in-memory insert stands and the error
    /// reports the failed snapshot write.
    ///
    /// # Errors
    /// - `QueueFull` if the collection already holds `max_queue_size`
    ///   entries; the queue is unchanged and nothing is persisted
    /// - `Persistence` if the snapshot write fails
    pub async fn enqueue(&self, task: AgentTask) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        if state.tasks.len() >= self.max_queue_size {
            return Err(QueueError::QueueFull {
                capacity: self.max_queue_size,
            });
        }
        tracing::debug!(
            "Enqueueing task {} ({}, {})",
            task.id(),
            task.task_type(),
            task.priority()
        );
        state.tasks.push(task);
        sort_tasks(&mut state.tasks);
        self.persist(&state.tasks).await
    }

    /// Remove and return the highest-priority, oldest pending task.
    ///
    /// Returns `Ok(None)` when nothing is pending; tasks in other
    /// states are never dequeued.
    pub async fn dequeue(&self) -> Result<Option<AgentTask>, QueueError> {
        let mut state = self.state.lock().await;
        let idx = match state
            .tasks
            .iter()
            .position(|t| t.status() == TaskStatus::Pending)
        {
            Some(idx) => idx,
            None => return Ok(None),
        };
        let task = state.tasks.remove(idx);
        match self.persist(&state.tasks).await {
            Ok(()) => {
                tracing::debug!("Dequeued task {} ({})", task.id(), task.task_type());
                Ok(Some(task))
            }
            Err(err) => {
                // Put the entry back so a failed snapshot write cannot
                // lose the task.
                state.tasks.push(task);
                sort_tasks(&mut state.tasks);
                Err(err)
            }
        }
    }

    /// Clone of the task `dequeue` would return, without removing it.
    pub async fn peek(&self) -> Option<AgentTask> {
        let state = self.state.lock().await;
        state
            .tasks
            .iter()
            .find(|t| t.status() == TaskStatus::Pending)
            .cloned()
    }

    /// Number of tasks currently held, across all statuses.
    pub async fn count(&self) -> usize {
        self.state.lock().await.tasks.len()
    }

    /// Remove every task and delete the persisted snapshot. Idempotent.
    pub async fn clear(&self) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        state.tasks.clear();
        if let Some(store) = &self.store {
            store.clear().await?;
        }
        tracing::debug!("Queue cleared");
        Ok(())
    }

    /// Change a task's priority and re-sort the collection.
    ///
    /// # Errors
    /// - `TaskNotFound` if no task has the given id; contents and order
    ///   are unchanged
    pub async fn prioritize(
        &self,
        id: TaskId,
        priority: TaskPriority,
    ) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let task = find_mut(&mut state.tasks, id)?;
        tracing::debug!(
            "Reprioritizing task {}: {} -> {}",
            id,
            task.priority(),
            priority
        );
        task.set_priority(priority);
        sort_tasks(&mut state.tasks);
        self.persist(&state.tasks).await
    }

    /// Set a task's lifecycle status.
    ///
    /// The forward-only lifecycle is not enforced here: callers are
    /// expected to request valid transitions, and a request that moves
    /// backward is applied but logged at warn level so operators can
    /// spot misbehaving callers.
    ///
    /// # Errors
    /// - `TaskNotFound` if no task has the given id
    pub async fn update_task_status(
        &self,
        id: TaskId,
        status: TaskStatus,
    ) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let task = find_mut(&mut state.tasks, id)?;
        let current = task.status();
        if current != status && !current.can_transition_to(status) {
            tracing::warn!(
                "Task {} status moving backward: {} -> {}",
                id,
                current,
                status
            );
        }
        task.set_status(status);
        self.persist(&state.tasks).await
    }

    /// Attribute a task to an agent and mark it `Assigned`.
    ///
    /// # Errors
    /// - `TaskNotFound` if no task has the given id
    pub async fn assign_task(&self, id: TaskId, agent_id: AgentId) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let task = find_mut(&mut state.tasks, id)?;
        tracing::debug!("Assigning task {} to agent {}", id, agent_id);
        task.assign_to(agent_id);
        self.persist(&state.tasks).await
    }

    /// Attach an execution outcome to a task.
    ///
    /// # Errors
    /// - `TaskNotFound` if no task has the given id
    pub async fn record_result(&self, id: TaskId, result: TaskResult) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let task = find_mut(&mut state.tasks, id)?;
        task.set_result(result);
        self.persist(&state.tasks).await
    }

    /// Full ordered snapshot of the collection.
    pub async fn tasks(&self) -> Vec<AgentTask> {
        self.state.lock().await.tasks.clone()
    }

    /// Tasks currently in the given status, in queue order.
    pub async fn tasks_by_status(&self, status: TaskStatus) -> Vec<AgentTask> {
        let state = self.state.lock().await;
        state
            .tasks
            .iter()
            .filter(|t| t.status() == status)
            .cloned()
            .collect()
    }

    /// Tasks attributed to the given agent, in queue order.
    pub async fn tasks_by_agent(&self, agent_id: &AgentId) -> Vec<AgentTask> {
        let state = self.state.lock().await;
        state
            .tasks
            .iter()
            .filter(|t| t.assigned_agent() == Some(agent_id))
            .cloned()
            .collect()
    }

    /// Per-status counts.
    pub async fn stats(&self) -> QueueStats {
        let state = self.state.lock().await;
        let mut stats = QueueStats {
            total: state.tasks.len(),
            ..QueueStats::default()
        };
        for task in &state.tasks {
            match task.status() {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Assigned => stats.assigned += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    /// Re-admit a task the distributor pulled out, skipping the
    /// capacity check.
    ///
    /// A task bounced between `dequeue` and re-admission must never be
    /// dropped by an admission race, so capacity gates only new work
    /// through `enqueue`.
    pub(crate) async fn reinstate(&self, task: AgentTask) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        state.tasks.push(task);
        sort_tasks(&mut state.tasks);
        self.persist(&state.tasks).await
    }

    async fn persist(&self, tasks: &[AgentTask]) -> Result<(), QueueError> {
        if let Some(store) = &self.store {
            store.save(tasks).await?;
        }
        Ok(())
    }
}

/// Priority descending, then age ascending. The sort is stable, so
/// equal keys keep their relative order.
fn sort_tasks(tasks: &mut [AgentTask]) {
    tasks.sort_by(|a, b| {
        b.priority()
            .cmp(&a.priority())
            .then_with(|| a.created_at().cmp(&b.created_at()))
    });
}

fn find_mut(tasks: &mut [AgentTask], id: TaskId) -> Result<&mut AgentTask, QueueError> {
    tasks
        .iter_mut()
        .find(|t| t.id() == id)
        .ok_or(QueueError::TaskNotFound(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::store::InMemoryTaskStore;
    use crate::task::{TaskInput, TaskType};
    use chrono::{DateTime, Duration, Utc};
    use std::path::PathBuf;

    fn task(priority: TaskPriority) -> AgentTask {
        AgentTask::new(
            TaskType::CodeVerification,
            TaskInput::new(vec![PathBuf::from("src/main.rs")]),
        )
        .with_priority(priority)
    }

    fn task_at(priority: TaskPriority, created_at: DateTime<Utc>) -> AgentTask {
        task(priority).with_created_at(created_at)
    }

    async fn queue(max: usize) -> TaskQueueManager {
        TaskQueueManager::new(QueueConfig::new(max)).await
    }

    #[tokio::test]
    async fn test_dequeue_follows_priority_then_age() {
        let q = queue(10).await;
        let base = Utc::now();

        let a = task_at(TaskPriority::Low, base + Duration::seconds(1));
        let b = task_at(TaskPriority::Critical, base + Duration::seconds(2));
        let c = task_at(TaskPriority::Low, base);

        q.enqueue(a.clone()).await.expect("enqueue a");
        q.enqueue(b.clone()).await.expect("enqueue b");
        q.enqueue(c.clone()).await.expect("enqueue c");

        let first = q.dequeue().await.expect("dequeue").expect("task");
        let second = q.dequeue().await.expect("dequeue").expect("task");
        let third = q.dequeue().await.expect("dequeue").expect("task");

        assert_eq!(first.id(), b.id(), "critical beats low regardless of age");
        assert_eq!(second.id(), c.id(), "older low task comes first");
        assert_eq!(third.id(), a.id());
        assert!(q.dequeue().await.expect("dequeue").is_none());
    }

    #[tokio::test]
    async fn test_enqueue_rejected_at_capacity() {
        let q = queue(2).await;
        q.enqueue(task(TaskPriority::Medium)).await.expect("first");
        q.enqueue(task(TaskPriority::Medium)).await.expect("second");

        let err = q
            .enqueue(task(TaskPriority::Critical))
            .await
            .expect_err("third enqueue must fail");
        assert!(matches!(err, QueueError::QueueFull { capacity: 2 }));
        assert_eq!(q.count().await, 2, "rejected task must not be admitted");
    }

    #[tokio::test]
    async fn test_dequeue_and_peek_skip_non_pending() {
        let q = queue(10).await;
        let t = task(TaskPriority::High);
        let id = t.id();
        q.enqueue(t).await.expect("enqueue");
        q.assign_task(id, AgentId::from("worker-1"))
            .await
            .expect("assign");

        assert!(q.peek().await.is_none(), "assigned task is not schedulable");
        assert!(q.dequeue().await.expect("dequeue").is_none());
        assert_eq!(q.count().await, 1, "task stays in the collection");
    }

    #[tokio::test]
    async fn test_peek_does_not_remove() {
        let q = queue(10).await;
        let t = task(TaskPriority::Medium);
        q.enqueue(t.clone()).await.expect("enqueue");

        let peeked = q.peek().await.expect("peek");
        assert_eq!(peeked.id(), t.id());
        assert_eq!(q.count().await, 1);
    }

    #[tokio::test]
    async fn test_prioritize_resorts_queue() {
        let q = queue(10).await;
        let base = Utc::now();
        let first = task_at(TaskPriority::Low, base);
        let second = task_at(TaskPriority::Low, base + Duration::seconds(1));
        q.enqueue(first.clone()).await.expect("enqueue");
        q.enqueue(second.clone()).await.expect("enqueue");

        q.prioritize(second.id(), TaskPriority::Critical)
            .await
            .expect("prioritize");

        let winner = q.dequeue().await.expect("dequeue").expect("task");
        assert_eq!(winner.id(), second.id());
        assert_eq!(winner.priority(), TaskPriority::Critical);
    }

    #[tokio::test]
    async fn test_unknown_id_is_task_not_found() {
        let q = queue(10).await;
        q.enqueue(task(TaskPriority::Medium)).await.expect("enqueue");
        let ghost = TaskId::new();

        let err = q
            .prioritize(ghost, TaskPriority::High)
            .await
            .expect_err("unknown id");
        assert!(matches!(err, QueueError::TaskNotFound(id) if id == ghost));

        let err = q
            .update_task_status(ghost, TaskStatus::Cancelled)
            .await
            .expect_err("unknown id");
        assert!(matches!(err, QueueError::TaskNotFound(_)));

        let err = q
            .record_result(ghost, TaskResult::success())
            .await
            .expect_err("unknown id");
        assert!(matches!(err, QueueError::TaskNotFound(_)));

        assert_eq!(q.count().await, 1, "failed lookups leave the queue alone");
    }

    #[tokio::test]
    async fn test_status_updates_and_views() {
        let q = queue(10).await;
        let t = task(TaskPriority::High);
        let id = t.id();
        q.enqueue(t).await.expect("enqueue");

        q.update_task_status(id, TaskStatus::InProgress)
            .await
            .expect("update");
        let in_progress = q.tasks_by_status(TaskStatus::InProgress).await;
        assert_eq!(in_progress.len(), 1);
        assert_eq!(in_progress[0].id(), id);

        q.update_task_status(id, TaskStatus::Completed)
            .await
            .expect("update");
        assert_eq!(q.count().await, 1, "terminal tasks are kept for inspection");
        assert!(q.tasks_by_status(TaskStatus::InProgress).await.is_empty());
    }

    #[tokio::test]
    async fn test_backward_status_request_still_applies() {
        let q = queue(10).await;
        let t = task(TaskPriority::Low);
        let id = t.id();
        q.enqueue(t).await.expect("enqueue");

        q.update_task_status(id, TaskStatus::Completed)
            .await
            .expect("forward");
        q.update_task_status(id, TaskStatus::Pending)
            .await
            .expect("backward request is applied, not rejected");

        assert_eq!(q.tasks_by_status(TaskStatus::Pending).await.len(), 1);
    }

    #[tokio::test]
    async fn test_assign_task_sets_agent_and_status() {
        let q = queue(10).await;
        let t = task(TaskPriority::Medium);
        let id = t.id();
        q.enqueue(t).await.expect("enqueue");

        let agent = AgentId::from("verifier-2");
        q.assign_task(id, agent.clone()).await.expect("assign");

        let mine = q.tasks_by_agent(&agent).await;
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].status(), TaskStatus::Assigned);
        assert_eq!(mine[0].assigned_agent(), Some(&agent));
    }

    #[tokio::test]
    async fn test_record_result_attaches_outcome() {
        let q = queue(10).await;
        let t = task(TaskPriority::Medium);
        let id = t.id();
        q.enqueue(t).await.expect("enqueue");

        q.record_result(id, TaskResult::failure(vec!["timeout".into()]))
            .await
            .expect("record");

        let all = q.tasks().await;
        let result = all[0].result().expect("result attached");
        assert!(!result.success);
        assert_eq!(result.errors, vec!["timeout".to_string()]);
    }

    #[tokio::test]
    async fn test_stats_counts_by_status() {
        let q = queue(10).await;
        let a = task(TaskPriority::Low);
        let b = task(TaskPriority::Medium);
        let c = task(TaskPriority::High);
        q.enqueue(a.clone()).await.expect("enqueue");
        q.enqueue(b.clone()).await.expect("enqueue");
        q.enqueue(c.clone()).await.expect("enqueue");
        q.update_task_status(b.id(), TaskStatus::Completed)
            .await
            .expect("update");
        q.update_task_status(c.id(), TaskStatus::Failed)
            .await
            .expect("update");

        let stats = q.stats().await;
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.assigned + stats.in_progress + stats.cancelled, 0);
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip_reproduces_queue() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("queue.json");
        let config = QueueConfig::new(10).with_persist_path(path.clone());

        let base = Utc::now();
        let a = task_at(TaskPriority::High, base);
        let b = task_at(TaskPriority::Low, base + Duration::seconds(1));
        let c = task_at(TaskPriority::Critical, base + Duration::seconds(2));

        {
            let q = TaskQueueManager::new(config.clone()).await;
            q.enqueue(a.clone()).await.expect("enqueue");
            q.enqueue(b.clone()).await.expect("enqueue");
            q.enqueue(c.clone()).await.expect("enqueue");
            q.assign_task(a.id(), AgentId::from("worker-9"))
                .await
                .expect("assign");
        }

        let reloaded = TaskQueueManager::new(config).await;
        assert_eq!(reloaded.count().await, 3);

        let tasks = reloaded.tasks().await;
        assert_eq!(
            tasks.iter().map(|t| t.id()).collect::<Vec<_>>(),
            vec![c.id(), a.id(), b.id()],
            "reload must reproduce the persisted order"
        );
        assert_eq!(tasks[1].status(), TaskStatus::Assigned);
        assert_eq!(
            tasks[1].assigned_agent(),
            Some(&AgentId::from("worker-9")),
            "assignment survives the roundtrip"
        );
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("queue.json");
        tokio::fs::write(&path, b"not even close to json")
            .await
            .expect("write");

        let q = TaskQueueManager::new(QueueConfig::new(10).with_persist_path(path)).await;
        assert_eq!(q.count().await, 0);
        q.enqueue(task(TaskPriority::Medium))
            .await
            .expect("queue is usable after recovery");
    }

    #[tokio::test]
    async fn test_missing_snapshot_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("no-such-file.json");

        let q = TaskQueueManager::new(QueueConfig::new(10).with_persist_path(path)).await;
        assert_eq!(q.count().await, 0);
    }

    #[tokio::test]
    async fn test_clear_removes_tasks_and_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("queue.json");
        let q =
            TaskQueueManager::new(QueueConfig::new(10).with_persist_path(path.clone())).await;

        q.enqueue(task(TaskPriority::Medium)).await.expect("enqueue");
        assert!(path.exists(), "enqueue persists a snapshot");

        q.clear().await.expect("first clear");
        assert_eq!(q.count().await, 0);
        assert!(!path.exists(), "clear deletes the snapshot file");

        q.clear().await.expect("second clear is a no-op");
        assert_eq!(q.count().await, 0);
    }

    #[tokio::test]
    async fn test_works_over_injected_memory_store() {
        let q = TaskQueueManager::with_store(
            QueueConfig::new(5),
            Box::new(InMemoryTaskStore::new()),
        )
        .await;

        let t = task(TaskPriority::High);
        q.enqueue(t.clone()).await.expect("enqueue");
        let out = q.dequeue().await.expect("dequeue").expect("task");
        assert_eq!(out.id(), t.id());
    }
}
