//! Capability-based task distribution with workload balancing.
//!
//! The distributor pulls from the queue and hands tasks to registered
//! agents. Selection is a filter then a minimum: keep agents that
//! support the task's type and still have concurrency headroom, then
//! take the least-loaded one, breaking ties by agent id so repeated
//! runs place tasks identically.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::distributor::capabilities::{AgentCapabilities, AgentId};
use crate::queue::{QueueError, TaskQueueManager};
use crate::task::{AgentTask, TaskId, TaskType};

/// A task handed to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// The task, already marked `Assigned` in the queue
    pub task: AgentTask,
    /// The agent now responsible for it
    pub agent_id: AgentId,
}

struct DistributorState {
    agents: HashMap<AgentId, AgentCapabilities>,
    workload: HashMap<AgentId, usize>,
}

/// Registry of agents plus per-agent workload counters, feeding off a
/// shared queue.
///
/// Workload counts tasks handed out and not yet reported back through
/// `complete_task`. It is the distributor's own bookkeeping: the queue
/// remains the source of truth for task state.
pub struct TaskDistributor {
    queue: Arc<TaskQueueManager>,
    state: Mutex<DistributorState>,
}

impl TaskDistributor {
    /// Create a distributor over a shared queue.
    pub fn new(queue: Arc<TaskQueueManager>) -> Self {
        Self {
            queue,
            state: Mutex::new(DistributorState {
                agents: HashMap::new(),
                workload: HashMap::new(),
            }),
        }
    }

    /// Add an agent to the registry, or replace its declaration.
    ///
    /// Re-registering resets the agent's workload to zero; an agent
    /// that restarts starts from a clean count.
    pub async fn register_agent(&self, id: AgentId, capabilities: AgentCapabilities) {
        let mut state = self.state.lock().await;
        tracing::info!(
            "Registering agent {} ({} task type(s), max {} concurrent)",
            id,
            capabilities.supported_task_types.len(),
            capabilities.max_concurrent_tasks
        );
        state.workload.insert(id.clone(), 0);
        state.agents.insert(id, capabilities);
    }

    /// Remove an agent from the registry.
    ///
    /// Tasks already attributed to the agent are not reassigned; they
    /// stay in the queue under its name and a warning reports how many
    /// are still in flight. Reconciliation belongs to whoever supervises
    /// the agents.
    pub async fn unregister_agent(&self, id: &AgentId) {
        let mut state = self.state.lock().await;
        let known = state.agents.remove(id).is_some();
        state.workload.remove(id);
        drop(state);

        if !known {
            tracing::warn!("Unregistering unknown agent {}", id);
            return;
        }
        let in_flight = self
            .queue
            .tasks_by_agent(id)
            .await
            .iter()
            .filter(|t| t.status().is_active())
            .count();
        if in_flight > 0 {
            tracing::warn!(
                "Agent {} unregistered with {} task(s) still attributed to it",
                id,
                in_flight
            );
        }
    }

    /// Pull the next pending task and hand it to the best-fit agent.
    ///
    /// Returns `Ok(None)` in two non-error cases: the queue has no
    /// pending task, or no registered agent both supports the task's
    /// type and has concurrency headroom. In the second case the task
    /// goes back to the queue unchanged (same priority, same age) and
    /// waits for an agent to free up - backpressure, not failure.
    ///
    /// On success the task re-enters the queue marked `Assigned` to the
    /// chosen agent, whose workload is incremented, and the assignment
    /// is returned for the caller to act on.
    pub async fn distribute_task(&self) -> Result<Option<Assignment>, QueueError> {
        let mut task = match self.queue.dequeue().await? {
            Some(task) => task,
            None => return Ok(None),
        };

        let mut state = self.state.lock().await;
        match select_agent(&state, task.task_type()) {
            Some(agent_id) => {
                *state.workload.entry(agent_id.clone()).or_insert(0) += 1;
                drop(state);

                task.assign_to(agent_id.clone());
                self.queue.reinstate(task.clone()).await?;
                tracing::info!(
                    "Assigned task {} ({}) to agent {}",
                    task.id(),
                    task.task_type(),
                    agent_id
                );
                Ok(Some(Assignment { task, agent_id }))
            }
            None => {
                drop(state);
                tracing::debug!(
                    "No capable agent for task {} ({}); returning it to the queue",
                    task.id(),
                    task.task_type()
                );
                self.queue.reinstate(task).await?;
                Ok(None)
            }
        }
    }

    /// Distribute until the queue yields nothing.
    ///
    /// One round of the distribution loop: assignments accumulate until
    /// `distribute_task` returns `None`, which is either an empty queue
    /// or a bounced task. A bounced task ends the round even when
    /// lower-priority work behind it could have been placed; strict
    /// priority order is preserved over throughput.
    pub async fn distribute_pending(&self) -> Result<Vec<Assignment>, QueueError> {
        let mut assignments = Vec::new();
        while let Some(assignment) = self.distribute_task().await? {
            assignments.push(assignment);
        }
        Ok(assignments)
    }

    /// Report that an agent finished a task, freeing one slot of its
    /// workload.
    ///
    /// The count saturates at zero, and a completion naming an agent
    /// with no workload entry is ignored with a warning rather than
    /// inventing one.
    pub async fn complete_task(&self, task_id: TaskId, agent_id: &AgentId) {
        let mut state = self.state.lock().await;
        match state.workload.get_mut(agent_id) {
            Some(load) => {
                *load = load.saturating_sub(1);
                tracing::debug!(
                    "Task {} finished on agent {}; workload now {}",
                    task_id,
                    agent_id,
                    *load
                );
            }
            None => {
                tracing::warn!(
                    "Completion of task {} names unknown agent {}",
                    task_id,
                    agent_id
                );
            }
        }
    }

    /// Registered agent ids, sorted by name.
    pub async fn registered_agents(&self) -> Vec<AgentId> {
        let state = self.state.lock().await;
        let mut ids: Vec<AgentId> = state.agents.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Current workload counter for an agent, if registered.
    pub async fn workload_of(&self, id: &AgentId) -> Option<usize> {
        self.state.lock().await.workload.get(id).copied()
    }

    /// Declared capabilities for an agent, if registered.
    pub async fn capabilities_of(&self, id: &AgentId) -> Option<AgentCapabilities> {
        self.state.lock().await.agents.get(id).cloned()
    }
}

/// Least-loaded agent among those supporting `task_type` with headroom;
/// ties go to the lexicographically smallest id.
fn select_agent(state: &DistributorState, task_type: TaskType) -> Option<AgentId> {
    let mut best: Option<(&AgentId, usize)> = None;
    for (id, caps) in &state.agents {
        if !caps.supports(task_type) {
            continue;
        }
        let load = state.workload.get(id).copied().unwrap_or(0);
        if !caps.has_capacity(load) {
            continue;
        }
        let better = match best {
            None => true,
            Some((best_id, best_load)) => load < best_load || (load == best_load && id < best_id),
        };
        if better {
            best = Some((id, load));
        }
    }
    best.map(|(id, _)| id.clone())
}
