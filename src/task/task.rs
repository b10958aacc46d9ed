//! Core AgentTask type with priority ordering and lifecycle status.
//!
//! # Invariants
//! - `id` is unique within a process lifetime (UUID v4 at construction)
//! - `created_at` is fixed at construction and breaks ties between tasks
//!   of equal priority (older first)
//! - `status` only moves forward along the lifecycle; the queue's
//!   re-admission path is the one place a task re-enters as `Pending`

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::distributor::AgentId;

/// Unique identifier for a task.
///
/// # Properties
/// - Globally unique within an execution context
/// - Immutable once created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Create a new unique task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of work kinds agents can declare support for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    /// Restructure or rewrite documentation for a set of sources
    DocumentationRefactor,
    /// Check code against its documented contracts
    CodeVerification,
    /// Generate test suites for target files
    TestGeneration,
    /// Profile and report on runtime hot spots
    PerformanceAnalysis,
    /// Audit UI sources for accessibility issues
    AccessibilityCheck,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::DocumentationRefactor => "documentation-refactor",
            Self::CodeVerification => "code-verification",
            Self::TestGeneration => "test-generation",
            Self::PerformanceAnalysis => "performance-analysis",
            Self::AccessibilityCheck => "accessibility-check",
        };
        write!(f, "{}", s)
    }
}

/// Scheduling priority, totally ordered: `Low < Medium < High < Critical`.
///
/// The queue orders by priority descending, so `Critical` tasks are
/// dequeued before `Low` ones regardless of arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Status of a task in its lifecycle.
///
/// # State Machine
/// ```text
/// Pending -> Assigned -> InProgress -> Completed
///                                  \-> Failed
///                                  \-> Cancelled
/// ```
///
/// `Pending` is also the re-entry point when the distributor cannot
/// place a task and returns it to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    /// Waiting in the queue for distribution
    Pending,
    /// Handed to an agent, execution not yet started
    Assigned,
    /// Agent is actively working on the task
    InProgress,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
    /// Abandoned before completion
    Cancelled,
}

impl TaskStatus {
    /// Check if the task is in a terminal state.
    ///
    /// # Property
    /// `is_terminal() => !is_active()`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Check if the task can still make progress.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether moving to `next` is a forward step along the lifecycle.
    ///
    /// Advisory only: the queue applies whatever status a caller
    /// requests and uses this to flag suspicious requests in the logs.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        next.rank() > self.rank()
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Assigned => 1,
            Self::InProgress => 2,
            Self::Completed | Self::Failed | Self::Cancelled => 3,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::InProgress => "inProgress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// What a task operates on: target files plus free-form settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    /// Files the agent should read or rewrite
    pub target_files: Vec<PathBuf>,
    /// String-keyed configuration handed through to the agent untouched
    #[serde(default)]
    pub configuration: HashMap<String, String>,
}

impl TaskInput {
    /// Create an input over the given target files with no configuration.
    pub fn new(target_files: Vec<PathBuf>) -> Self {
        Self {
            target_files,
            configuration: HashMap::new(),
        }
    }

    /// Add a configuration entry.
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.configuration.insert(key.into(), value.into());
        self
    }
}

/// Outcome record reported by an agent after executing a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    /// Whether the task was successful
    pub success: bool,
    /// Where the agent wrote its output, if anywhere
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Errors encountered during execution
    #[serde(default)]
    pub errors: Vec<String>,
    /// Numeric telemetry (durations, counts, scores)
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
}

impl TaskResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            output_path: None,
            errors: Vec::new(),
            metrics: HashMap::new(),
        }
    }

    /// Create a failure result carrying the given errors.
    pub fn failure(errors: Vec<String>) -> Self {
        Self {
            success: false,
            output_path: None,
            errors,
            metrics: HashMap::new(),
        }
    }

    /// Record where the output landed.
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Attach a named metric.
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }
}

/// A unit of work to be distributed to an agent.
///
/// # Invariants
/// - `id` and `created_at` never change after construction
/// - Only the queue (and the distributor's hand-off path) mutate
///   `status`, `assigned_agent`, and `result`; callers go through the
///   queue's operations
///
/// Wire format: camelCase field names, kebab-case task types, lowercase
/// priorities (`{"type": "test-generation", "priority": "high", ...}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTask {
    /// Unique identifier for this task
    id: TaskId,

    /// Kind of work; drives capability matching
    #[serde(rename = "type")]
    task_type: TaskType,

    /// Scheduling priority
    priority: TaskPriority,

    /// Target files and configuration
    input: TaskInput,

    /// Construction timestamp; tie-break for equal priority
    created_at: DateTime<Utc>,

    /// Current lifecycle status
    status: TaskStatus,

    /// Agent currently responsible for the task, once assigned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    assigned_agent: Option<AgentId>,

    /// Outcome record, once reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<TaskResult>,
}

impl AgentTask {
    /// Create a new pending task with `Medium` priority.
    ///
    /// # Postconditions
    /// - `status == Pending`, no agent, no result
    /// - `id` is a fresh unique identifier
    /// - `created_at` is the construction instant
    pub fn new(task_type: TaskType, input: TaskInput) -> Self {
        Self {
            id: TaskId::new(),
            task_type,
            priority: TaskPriority::Medium,
            input,
            created_at: Utc::now(),
            status: TaskStatus::Pending,
            assigned_agent: None,
            result: None,
        }
    }

    /// Set the scheduling priority.
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Override the creation timestamp.
    ///
    /// Meant for replay and import tooling: relative order among tasks
    /// of equal priority follows this value.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    // Getters - callers never get mutable access to queue-owned fields

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    pub fn input(&self) -> &TaskInput {
        &self.input
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn assigned_agent(&self) -> Option<&AgentId> {
        self.assigned_agent.as_ref()
    }

    pub fn result(&self) -> Option<&TaskResult> {
        self.result.as_ref()
    }

    // Crate-internal mutators; all external mutation goes through the
    // queue so that every change is serialized and persisted.

    pub(crate) fn set_priority(&mut self, priority: TaskPriority) {
        self.priority = priority;
    }

    pub(crate) fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
    }

    pub(crate) fn assign_to(&mut self, agent_id: AgentId) {
        self.assigned_agent = Some(agent_id);
        self.status = TaskStatus::Assigned;
    }

    pub(crate) fn set_result(&mut self, result: TaskResult) {
        self.result = Some(result);
    }
}
