//! Agent identity and capability declarations.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::task::TaskType;

/// Unique identifier for an agent.
///
/// Agent ids are caller-supplied names ("doc-agent-1"), not generated:
/// the registry is keyed by whatever name the operator registers. The
/// lexicographic `Ord` doubles as the deterministic tie-break when two
/// candidate agents carry equal workload.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(String);

impl AgentId {
    /// Create an agent ID from a name.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What an agent declares it can do.
///
/// `supported_task_types` and `max_concurrent_tasks` drive selection;
/// `specializations` is informational only and never consulted by the
/// distributor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    /// Task types the agent accepts
    pub supported_task_types: HashSet<TaskType>,

    /// Most tasks the agent will hold at once; an agent declaring zero
    /// is never selected
    pub max_concurrent_tasks: usize,

    /// Free-form tags describing strengths ("swift-ui", "wcag")
    #[serde(default)]
    pub specializations: Vec<String>,
}

impl AgentCapabilities {
    /// Declare support for the given task types with a concurrency cap.
    pub fn new(
        supported_task_types: impl IntoIterator<Item = TaskType>,
        max_concurrent_tasks: usize,
    ) -> Self {
        Self {
            supported_task_types: supported_task_types.into_iter().collect(),
            max_concurrent_tasks,
            specializations: Vec::new(),
        }
    }

    /// Attach informational specialization tags.
    pub fn with_specializations(
        mut self,
        specializations: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.specializations = specializations.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the agent accepts tasks of this type.
    pub fn supports(&self, task_type: TaskType) -> bool {
        self.supported_task_types.contains(&task_type)
    }

    /// Whether the agent can take on one more task given its current
    /// load.
    pub fn has_capacity(&self, current_load: usize) -> bool {
        current_load < self.max_concurrent_tasks
    }
}
