#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **conclave-types** - Shared data model for the Conclave multi-agent execution engine.
//!
//! The crate is dependency-light and sits at the bottom of the crate graph so that
//! every other crate can depend on it without causing cycles. It defines the entities
//! persisted by `conclave-store-core`, the events published by `conclave-bus`, and the
//! error taxonomy shared across the whole engine. It makes no assumptions about I/O,
//! transport, or storage backend.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod duration;
pub mod error;

pub use error::{ConclaveError, ErrorKind};

//─────────────────────────────
//  Identifiers
//─────────────────────────────

/// Unique identifier for an [`Agent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub Uuid);

/// Unique identifier for a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

/// Unique identifier for an [`Execution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(pub Uuid);

/// Unique identifier for a [`WorkflowPattern`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternId(pub Uuid);

/// Unique identifier for a [`WorkflowExecution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowExecutionId(pub Uuid);

/// Unique identifier for an [`InterAgentMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

/// Unique identifier for a [`TaskAgentAssignment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssignmentId(pub Uuid);

macro_rules! new_id {
    ($ty:ident) => {
        impl $ty {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

new_id!(AgentId);
new_id!(TaskId);
new_id!(ExecutionId);
new_id!(PatternId);
new_id!(WorkflowExecutionId);
new_id!(MessageId);
new_id!(AssignmentId);

//─────────────────────────────
//  Agent
//─────────────────────────────

/// Minimum length, in characters, required for an agent's system prompt.
pub const MIN_SYSTEM_PROMPT_LEN: usize = 10;

/// Lifecycle status of an [`Agent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Not currently bound to any in-flight execution.
    Idle,
    /// Bound to exactly one in-flight execution via the [`ExecutionEngine`](https://docs.rs/conclave-execution).
    Executing,
    /// Placed into an error state by an administrator or a failed transition.
    Error,
    /// Administratively stopped; excluded from admission.
    Stopped,
}

/// A named autonomous worker capable of carrying out one [`Execution`] at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Stable identifier.
    pub id: AgentId,
    /// Unique display name.
    pub name: String,
    /// Role label (e.g. "backend", "frontend", "test") used by routing and fallback.
    pub role: String,
    /// Free-text description.
    pub description: String,
    /// System prompt handed to the subprocess runner; required, >= [`MIN_SYSTEM_PROMPT_LEN`] chars.
    pub system_prompt: String,
    /// Capability tags.
    pub capabilities: Vec<String>,
    /// Tool tags.
    pub tools: Vec<String>,
    /// Ordered list of objectives.
    pub objectives: Vec<String>,
    /// Ordered list of constraints.
    pub constraints: Vec<String>,
    /// Free-form memory settings.
    pub memory_settings: HashMap<String, serde_json::Value>,
    /// Free-form execution settings.
    pub execution_settings: HashMap<String, serde_json::Value>,
    /// Current status.
    pub status: AgentStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
    /// Timestamp of the agent's last status transition, if any.
    pub last_active: Option<DateTime<Utc>>,
}

/// Caller-supplied fields for [`CreateAgent`](https://docs.rs/conclave-store-core).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Unique display name.
    pub name: String,
    /// Role label.
    pub role: String,
    /// Free-text description.
    pub description: String,
    /// System prompt; must be >= [`MIN_SYSTEM_PROMPT_LEN`] characters.
    pub system_prompt: String,
    /// Capability tags.
    pub capabilities: Vec<String>,
    /// Tool tags.
    pub tools: Vec<String>,
    /// Ordered list of objectives.
    pub objectives: Vec<String>,
    /// Ordered list of constraints.
    pub constraints: Vec<String>,
    /// Free-form memory settings.
    pub memory_settings: HashMap<String, serde_json::Value>,
    /// Free-form execution settings.
    pub execution_settings: HashMap<String, serde_json::Value>,
}

impl AgentSpec {
    /// Validate this specification against the invariants in section 3.
    pub fn validate(&self) -> Result<(), ConclaveError> {
        if self.name.trim().is_empty() {
            return Err(ConclaveError::invariant("name", "must not be empty"));
        }
        if self.system_prompt.chars().count() < MIN_SYSTEM_PROMPT_LEN {
            return Err(ConclaveError::invariant(
                "system_prompt",
                format!("must be at least {MIN_SYSTEM_PROMPT_LEN} characters"),
            ));
        }
        Ok(())
    }
}

/// Partial update applied to an existing [`Agent`]; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentUpdate {
    /// New role, if changing.
    pub role: Option<String>,
    /// New description, if changing.
    pub description: Option<String>,
    /// New system prompt, if changing.
    pub system_prompt: Option<String>,
    /// New capability tags, if changing.
    pub capabilities: Option<Vec<String>>,
    /// New tool tags, if changing.
    pub tools: Option<Vec<String>>,
    /// New objectives, if changing.
    pub objectives: Option<Vec<String>>,
    /// New constraints, if changing.
    pub constraints: Option<Vec<String>>,
    /// New memory settings, if changing.
    pub memory_settings: Option<HashMap<String, serde_json::Value>>,
    /// New execution settings, if changing.
    pub execution_settings: Option<HashMap<String, serde_json::Value>>,
}

//─────────────────────────────
//  Task
//─────────────────────────────

/// Priority of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Lowest priority.
    Low,
    /// Default priority.
    Medium,
    /// Elevated priority.
    High,
    /// Highest priority.
    Urgent,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

/// Lifecycle status of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet bound to a running execution.
    Pending,
    /// At least one execution for this task is non-terminal.
    InProgress,
    /// All executions for this task finished successfully.
    Completed,
    /// At least one execution for this task finished in failure and no retry is pending.
    Failed,
    /// Administratively cancelled before completion.
    Cancelled,
}

impl TaskStatus {
    /// Whether this status is terminal (no further transitions expected).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// A unit of work to be carried out by one or more agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Stable identifier.
    pub id: TaskId,
    /// Short title, 1..=255 characters.
    pub title: String,
    /// Description, non-empty.
    pub description: String,
    /// Description of the expected output, if specified.
    pub expected_output: Option<String>,
    /// Supporting resources (links, paths, free text).
    pub resources: Vec<String>,
    /// Advisory dependency list; task ids that should precede this one.
    pub dependencies: Vec<TaskId>,
    /// Priority.
    pub priority: TaskPriority,
    /// Absolute deadline, if any.
    pub deadline: Option<DateTime<Utc>>,
    /// Estimated duration in minutes, if any. Persisted via [`duration`] codec.
    pub estimated_duration: Option<u32>,
    /// Current status.
    pub status: TaskStatus,
    /// Free-form results, populated on completion.
    pub results: Option<serde_json::Value>,
    /// Error message, populated on failure.
    pub error_message: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
    /// Timestamp of the first execution start, if any.
    pub started_at: Option<DateTime<Utc>>,
    /// Timestamp of the last terminal execution, if any.
    pub completed_at: Option<DateTime<Utc>>,
    /// Agents assigned to this task, ordered by assignment time.
    pub assigned_agents: Vec<AgentId>,
}

/// Caller-supplied fields for `CreateTask`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Short title, 1..=255 characters.
    pub title: String,
    /// Description, non-empty.
    pub description: String,
    /// Description of the expected output, if specified.
    pub expected_output: Option<String>,
    /// Supporting resources.
    pub resources: Vec<String>,
    /// Advisory dependencies.
    pub dependencies: Vec<TaskId>,
    /// Priority.
    pub priority: TaskPriority,
    /// Absolute deadline.
    pub deadline: Option<DateTime<Utc>>,
    /// Estimated duration in minutes.
    pub estimated_duration: Option<u32>,
    /// Agents to assign at creation time.
    pub assigned_agents: Vec<AgentId>,
}

impl TaskSpec {
    /// Validate this specification against the invariants in section 3.
    pub fn validate(&self) -> Result<(), ConclaveError> {
        if self.title.is_empty() || self.title.chars().count() > 255 {
            return Err(ConclaveError::invariant(
                "title",
                "must be 1..=255 characters",
            ));
        }
        if self.description.trim().is_empty() {
            return Err(ConclaveError::invariant("description", "must not be empty"));
        }
        Ok(())
    }
}

/// Partial update applied to an existing [`Task`]; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdate {
    /// New title, if changing.
    pub title: Option<String>,
    /// New description, if changing.
    pub description: Option<String>,
    /// New expected output, if changing.
    pub expected_output: Option<Option<String>>,
    /// New resources, if changing.
    pub resources: Option<Vec<String>>,
    /// New dependencies, if changing.
    pub dependencies: Option<Vec<TaskId>>,
    /// New priority, if changing.
    pub priority: Option<TaskPriority>,
    /// New deadline, if changing.
    pub deadline: Option<Option<DateTime<Utc>>>,
    /// New estimated duration, if changing.
    pub estimated_duration: Option<Option<u32>>,
}

//─────────────────────────────
//  Execution
//─────────────────────────────

/// Lifecycle status of an [`Execution`], per the state machine in section 4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Row created, run not yet scheduled onto the runtime.
    Starting,
    /// Supervised run is active.
    Running,
    /// Run is suspended; resumable.
    Paused,
    /// Terminal: the subprocess or fallback path produced output.
    Completed,
    /// Terminal: an unrecoverable error occurred.
    Failed,
    /// Terminal: administratively cancelled (includes abort).
    Cancelled,
    /// Terminal: cancelled specifically via `AbortExecution`.
    Aborted,
    /// Terminal: the outer deadline elapsed.
    Timeout,
}

impl ExecutionStatus {
    /// Whether this status admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Aborted | Self::Timeout
        )
    }
}

/// Severity level of a [`LogEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Routine progress note.
    Info,
    /// Recoverable anomaly (e.g. subprocess failure before fallback).
    Warn,
    /// Unrecoverable condition.
    Error,
}

/// A single append-only log line recorded against an [`Execution`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: LogLevel,
    /// Human-readable message.
    pub message: String,
}

impl LogEntry {
    /// Construct a new log entry stamped with the current time.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }
}

/// Structured detail attached to a failed or timed-out [`Execution`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionErrorDetails {
    /// The outer deadline elapsed.
    Timeout {
        /// The effective timeout that elapsed, in seconds.
        timeout_seconds: u64,
    },
    /// Any other uncaught condition.
    Internal {
        /// Human-readable message.
        message: String,
    },
}

/// The strategy that produced an [`Execution`]'s terminal output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMethod {
    /// The external code-assistant subprocess produced the output.
    Subprocess,
    /// The deterministic fallback responder produced the output.
    Fallback,
}

/// The aggregated output of a terminal [`Execution`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Aggregated text, truncated to <= 1000 characters.
    pub aggregated_text: String,
    /// Which strategy produced this response.
    pub execution_method: ExecutionMethod,
    /// Number of structured chunks received (subprocess path only; 0 for fallback).
    pub messages_count: u32,
    /// Optional free-text analysis (fallback path).
    pub analysis: Option<String>,
}

/// A single agent-task attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    /// Stable identifier.
    pub id: ExecutionId,
    /// The task this execution attempts.
    pub task_id: TaskId,
    /// The primary agent carrying out this execution.
    pub agent_id: AgentId,
    /// Current status.
    pub status: ExecutionStatus,
    /// When the run was scheduled.
    pub start_time: DateTime<Utc>,
    /// When the run reached a terminal state, if it has.
    pub end_time: Option<DateTime<Utc>>,
    /// Append-only log.
    pub logs: Vec<LogEntry>,
    /// Free-form result payload on success.
    pub output: Option<serde_json::Value>,
    /// Structured error detail on failure or timeout.
    pub error_details: Option<ExecutionErrorDetails>,
    /// Structured assistant response, once produced.
    pub agent_response: Option<AgentResponse>,
    /// Absolute working directory passed to the subprocess.
    pub work_directory: String,
    /// Whether the subprocess requested interactive input (always false in this design).
    pub needs_interaction: bool,
    /// Wall-clock duration once terminal.
    pub duration_seconds: Option<f64>,
    /// Opaque memory usage metadata, if collected.
    pub memory_usage: Option<serde_json::Value>,
    /// Count of subprocess round-trips made.
    pub api_calls_made: u32,
}

//─────────────────────────────
//  Workflow pattern
//─────────────────────────────

/// One of the seven named coordination strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    /// Tasks run one after another; a failure halts the remainder.
    Sequential,
    /// All tasks start concurrently.
    Parallel,
    /// Each task is routed to its best-scoring agent.
    Router,
    /// Iterative quality-gated refinement.
    EvaluatorOptimizer,
    /// Rounds of overlapping agent/task collaboration slices.
    Swarm,
    /// Centrally coordinated round-robin or explicit assignment.
    Orchestrator,
    /// Chooses a sub-strategy based on the shape of the input.
    Adaptive,
}

impl Default for WorkflowType {
    fn default() -> Self {
        Self::Parallel
    }
}

/// Lifecycle status of a [`WorkflowPattern`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternStatus {
    /// Executable.
    Active,
    /// Not executable, but not archived.
    Inactive,
    /// Retired; retained for history.
    Archived,
}

/// Recognized, typed configuration keys shared across every coordination pattern (section 4.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Cap on iterations for iterative patterns (Evaluator-Optimizer).
    pub max_iterations: u32,
    /// Mean per-iteration quality required to stop early.
    pub success_threshold: f64,
    /// Number of rounds for Swarm.
    pub coordination_rounds: u32,
    /// Agents assigned per task slice in Swarm.
    pub agents_per_task: usize,
    /// Soft ceiling for the whole workflow run.
    pub timeout_minutes: u64,
    /// Whether child-execution coordination messages are recorded.
    pub enable_agent_communication: bool,
    /// Named quality gates (opaque to the core; echoed in results).
    pub quality_gates: Vec<String>,
    /// Whether per-pattern performance metrics are computed.
    pub performance_monitoring: bool,
    /// Whether Adaptive may re-evaluate its sub-strategy mid-run (reserved; unused in this design).
    pub adaptive_optimization: bool,
    /// Forward-compatible side channel for unrecognized keys; never branched on internally.
    pub extras: HashMap<String, serde_json::Value>,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            success_threshold: 0.85,
            coordination_rounds: 2,
            agents_per_task: 2,
            timeout_minutes: 60,
            enable_agent_communication: true,
            quality_gates: Vec::new(),
            performance_monitoring: true,
            adaptive_optimization: true,
            extras: HashMap::new(),
        }
    }
}

/// A named, reusable composition plan over a fixed set of agents and tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowPattern {
    /// Stable identifier.
    pub id: PatternId,
    /// Unique name, <= 100 characters.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// The coordination strategy.
    pub workflow_type: WorkflowType,
    /// Agents participating in this pattern; non-empty.
    pub agent_ids: Vec<AgentId>,
    /// Tasks composed by this pattern; non-empty.
    pub task_ids: Vec<TaskId>,
    /// Advisory task dependency graph.
    pub dependencies: HashMap<TaskId, Vec<TaskId>>,
    /// Pattern configuration.
    pub config: PatternConfig,
    /// Free-text objective supplied by the operator, if any.
    pub user_objective: Option<String>,
    /// Working directory passed to every child execution.
    pub project_directory: String,
    /// Current status.
    pub status: PatternStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied fields for `CreatePattern`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowPatternSpec {
    /// Unique name, <= 100 characters.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// The coordination strategy.
    pub workflow_type: WorkflowType,
    /// Agents participating in this pattern; non-empty.
    pub agent_ids: Vec<AgentId>,
    /// Tasks composed by this pattern; non-empty.
    pub task_ids: Vec<TaskId>,
    /// Advisory task dependency graph.
    pub dependencies: HashMap<TaskId, Vec<TaskId>>,
    /// Pattern configuration.
    pub config: PatternConfig,
    /// Free-text objective.
    pub user_objective: Option<String>,
    /// Working directory passed to every child execution.
    pub project_directory: String,
}

impl WorkflowPatternSpec {
    /// Validate this specification against the invariants in section 3.
    pub fn validate(&self) -> Result<(), ConclaveError> {
        if self.name.is_empty() || self.name.chars().count() > 100 {
            return Err(ConclaveError::invariant("name", "must be 1..=100 characters"));
        }
        if self.agent_ids.is_empty() {
            return Err(ConclaveError::invariant("agent_ids", "must not be empty"));
        }
        if self.task_ids.is_empty() {
            return Err(ConclaveError::invariant("task_ids", "must not be empty"));
        }
        Ok(())
    }
}

//─────────────────────────────
//  Workflow execution
//─────────────────────────────

/// Lifecycle status of a [`WorkflowExecution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowExecutionStatus {
    /// Row created, not yet started.
    Pending,
    /// Admission passed, scheduling in progress.
    Starting,
    /// Actively driving child executions.
    Running,
    /// Suspended (reserved; current patterns do not pause workflow runs themselves).
    Paused,
    /// Terminal: every planned child step was attempted and the run's own bookkeeping succeeded.
    Completed,
    /// Terminal: the run's own bookkeeping failed.
    Failed,
    /// Terminal: cancelled by caller request (not pattern deletion).
    Cancelled,
    /// Terminal: cancelled as a side effect of pattern deletion, or by the startup reconciler.
    Aborted,
}

impl WorkflowExecutionStatus {
    /// Whether this status admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled | Self::Aborted)
    }
}

/// One run of a [`WorkflowPattern`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// Stable identifier.
    pub id: WorkflowExecutionId,
    /// The pattern this is a run of.
    pub pattern_id: PatternId,
    /// Current status.
    pub status: WorkflowExecutionStatus,
    /// When the run was created.
    pub start_time: DateTime<Utc>,
    /// When the run reached a terminal state, if it has.
    pub end_time: Option<DateTime<Utc>>,
    /// Free-text description of current progress (e.g. "running task 2/5").
    pub current_step: String,
    /// Monotonically non-decreasing progress in 0.0..=1.0; only terminal transitions set 1.0.
    pub progress: f64,
    /// Pattern-specific result payload, populated on completion.
    pub results: Option<serde_json::Value>,
    /// Structured error detail on failure.
    pub error_details: Option<String>,
    /// Execution-level log lines (distinct from per-child [`Execution::logs`]).
    pub execution_logs: Vec<LogEntry>,
    /// Inter-agent coordination messages recorded during this run.
    pub agent_communications: Vec<InterAgentMessage>,
}

//─────────────────────────────
//  Inter-agent message
//─────────────────────────────

/// An observability-only record of coordination between two agents during a workflow run.
/// Immutable once stored; never consulted for control decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterAgentMessage {
    /// Stable identifier.
    pub id: MessageId,
    /// The workflow execution this message was recorded against.
    pub execution_id: WorkflowExecutionId,
    /// Sending agent, if applicable (some messages are orchestrator-authored).
    pub from_agent: Option<AgentId>,
    /// Receiving agent, if applicable.
    pub to_agent: Option<AgentId>,
    /// Coarse message category (e.g. "child_started", "child_completed", "child_failed").
    pub message_type: String,
    /// Human-readable message.
    pub message: String,
    /// Opaque structured payload.
    pub payload: Option<serde_json::Value>,
    /// When the message was recorded.
    pub timestamp: DateTime<Utc>,
    /// Whether a recipient has acknowledged the message (observability only).
    pub acknowledged: bool,
}

//─────────────────────────────
//  Task-agent assignment
//─────────────────────────────

/// The role an agent plays with respect to an assigned task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleInTask {
    /// The agent driving the execution.
    Primary,
    /// An agent participating without being the driving agent.
    Collaborator,
    /// An agent reviewing output produced by others.
    Reviewer,
}

/// Join row between an [`Agent`] and a [`Task`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAgentAssignment {
    /// Stable identifier.
    pub id: AssignmentId,
    /// The assigned task.
    pub task_id: TaskId,
    /// The assigned agent.
    pub agent_id: AgentId,
    /// The agent's role with respect to this task.
    pub role_in_task: RoleInTask,
    /// When the assignment was made.
    pub assigned_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_spec_requires_minimum_system_prompt_length() {
        let mut spec = AgentSpec {
            name: "Alice".into(),
            role: "backend".into(),
            description: String::new(),
            system_prompt: "short".into(),
            capabilities: vec![],
            tools: vec![],
            objectives: vec![],
            constraints: vec![],
            memory_settings: HashMap::new(),
            execution_settings: HashMap::new(),
        };
        assert!(spec.validate().is_err());
        spec.system_prompt = "You are Alice, a backend engineer.".into();
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn task_spec_rejects_empty_title_and_description() {
        let base = TaskSpec {
            title: String::new(),
            description: "do something".into(),
            expected_output: None,
            resources: vec![],
            dependencies: vec![],
            priority: TaskPriority::default(),
            deadline: None,
            estimated_duration: None,
            assigned_agents: vec![],
        };
        assert!(base.validate().is_err());

        let mut ok = base.clone();
        ok.title = "Build endpoint".into();
        assert!(ok.validate().is_ok());

        let mut empty_desc = ok.clone();
        empty_desc.description = "   ".into();
        assert!(empty_desc.validate().is_err());
    }

    #[test]
    fn execution_status_terminality_matches_spec() {
        for terminal in [
            ExecutionStatus::Completed,
            ExecutionStatus::Failed,
            ExecutionStatus::Cancelled,
            ExecutionStatus::Aborted,
            ExecutionStatus::Timeout,
        ] {
            assert!(terminal.is_terminal());
        }
        for non_terminal in [ExecutionStatus::Starting, ExecutionStatus::Running, ExecutionStatus::Paused] {
            assert!(!non_terminal.is_terminal());
        }
    }

    #[test]
    fn pattern_config_defaults_match_spec_section_4_6() {
        let cfg = PatternConfig::default();
        assert_eq!(cfg.max_iterations, 10);
        assert_eq!(cfg.success_threshold, 0.85);
        assert_eq!(cfg.coordination_rounds, 2);
        assert_eq!(cfg.agents_per_task, 2);
        assert_eq!(cfg.timeout_minutes, 60);
        assert!(cfg.enable_agent_communication);
        assert!(cfg.performance_monitoring);
        assert!(cfg.adaptive_optimization);
    }

    #[test]
    fn workflow_pattern_spec_requires_nonempty_agents_and_tasks() {
        let spec = WorkflowPatternSpec {
            name: "demo".into(),
            description: String::new(),
            workflow_type: WorkflowType::Router,
            agent_ids: vec![],
            task_ids: vec![TaskId::new()],
            dependencies: HashMap::new(),
            config: PatternConfig::default(),
            user_objective: None,
            project_directory: "/tmp".into(),
        };
        assert!(spec.validate().is_err());
    }
}
