//! Task module - the work unit model shared by the queue and distributor.
//!
//! Types here are plain data: construction fixes identity and ordering
//! keys, lifecycle mutation is reserved to the queue.

pub mod task;

pub use task::{AgentTask, TaskId, TaskInput, TaskPriority, TaskResult, TaskStatus, TaskType};
