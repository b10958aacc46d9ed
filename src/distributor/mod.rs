//! Distributor module - agent registry, workload tracking, and
//! capability-matched assignment.

pub mod capabilities;
pub mod distributor;

pub use capabilities::{AgentCapabilities, AgentId};
pub use distributor::{Assignment, TaskDistributor};
