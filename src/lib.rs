//! # taskyard
//!
//! Priority task queue and capability-based task distribution for agent
//! coordination.
//!
//! This library provides:
//! - A bounded, priority-ordered task queue with JSON snapshot
//!   persistence and crash-tolerant reload
//! - A distributor that matches tasks to registered agents by declared
//!   capability and current workload
//! - A task model with lifecycle tracking from `Pending` through to a
//!   terminal status
//!
//! ## Architecture
//!
//! ```text
//!  producer ──► TaskQueueManager ◄──────► TaskDistributor ──► agent
//!                     │            pull /        │
//!                     ▼            reinstate     ▼
//!               snapshot file              agent registry
//!               (JSON, atomic)             + workload counts
//! ```
//!
//! ## Task Flow
//! 1. A producer builds an `AgentTask` and enqueues it
//! 2. The distributor pulls the highest-priority pending task, keeps
//!    agents that support its type and have concurrency headroom, and
//!    picks the least-loaded one
//! 3. The task re-enters the queue marked `Assigned`; the caller runs
//!    it out of process
//! 4. Progress and the outcome flow back through
//!    `update_task_status`/`record_result`, and `complete_task` frees
//!    the agent's slot
//!
//! ## Modules
//! - `task`: the `AgentTask` model, priorities, lifecycle statuses
//! - `queue`: `TaskQueueManager` and the snapshot store backends
//! - `distributor`: agent registry, workload tracking, selection
//! - `config`: `QueueConfig`

pub mod config;
pub mod distributor;
pub mod queue;
pub mod task;

pub use config::QueueConfig;
pub use distributor::{AgentCapabilities, AgentId, Assignment, TaskDistributor};
pub use queue::{QueueError, QueueStats, TaskQueueManager};
pub use task::{AgentTask, TaskId, TaskInput, TaskPriority, TaskResult, TaskStatus, TaskType};
