//! Task queue module - the ordered, bounded, persistent task collection.
//!
//! `TaskQueueManager` owns the collection; `TaskStore` is the pluggable
//! persistence seam behind it.

pub mod manager;
pub mod store;

pub use manager::{QueueError, QueueStats, TaskQueueManager};
pub use store::{FileTaskStore, InMemoryTaskStore, StoreError, TaskStore};
