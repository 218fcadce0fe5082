#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **conclave-store-core** - the [`StoreGateway`] trait: typed read/write access to
//! persisted agents, tasks, executions, workflow patterns, and workflow executions.
//!
//! This crate defines the contract only; `conclave-store-memory` and
//! `conclave-store-sqlite` provide concrete backends. Every mutating method runs
//! within a transactional unit (section 4.2): on any failure the unit is
//! rolled back in full and a [`ConclaveError`] surfaces to the caller. Read methods
//! that are not part of a write may use a fresh session and need not be serialized
//! against concurrent writers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conclave_types::{
    Agent, AgentId, AgentSpec, AgentStatus, AgentUpdate, ConclaveError, Execution,
    ExecutionErrorDetails, ExecutionId, ExecutionStatus, PatternId, PatternStatus, Task, TaskId,
    TaskSpec, TaskStatus, TaskUpdate, WorkflowExecution, WorkflowExecutionId,
    WorkflowExecutionStatus, WorkflowPattern, WorkflowPatternSpec,
};

//─────────────────────────────
//  Pagination
//─────────────────────────────

/// Offset/limit pagination window applied to list operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Zero-based row offset.
    pub offset: u64,
    /// Maximum rows to return.
    pub limit: u64,
}

impl Page {
    /// A page starting at the beginning with the given limit.
    pub fn first(limit: u64) -> Self {
        Self { offset: 0, limit }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { offset: 0, limit: 100 }
    }
}

//─────────────────────────────
//  StoreGateway
//─────────────────────────────

/// Typed read/write access to every entity in the data model (section 3 and section
/// 4.2). Implementations own their own connection pooling and migration.
#[async_trait]
pub trait StoreGateway: Send + Sync {
    // --- agents -------------------------------------------------------

    /// Create a new agent. Fails with `Conflict` if `spec.name` is already taken.
    async fn create_agent(&self, spec: AgentSpec) -> Result<Agent, ConclaveError>;

    /// Fetch a single agent by id.
    async fn get_agent(&self, id: AgentId) -> Result<Agent, ConclaveError>;

    /// Fetch a set of agents by id, silently skipping ids that do not resolve.
    async fn list_agents_by_ids(&self, ids: &[AgentId]) -> Result<Vec<Agent>, ConclaveError>;

    /// List agents, most recently created first.
    async fn list_agents(&self, page: Page) -> Result<Vec<Agent>, ConclaveError>;

    /// Apply a partial update to an existing agent.
    async fn update_agent(&self, id: AgentId, update: AgentUpdate) -> Result<Agent, ConclaveError>;

    /// Delete an agent. Fails with `Conflict` naming any task still assigning this
    /// agent or any non-terminal execution bound to it, unless `force` is set.
    async fn delete_agent(&self, id: AgentId, force: bool) -> Result<(), ConclaveError>;

    /// Transition an agent's status and, when leaving `Executing`, stamp `last_active`.
    async fn set_agent_status(&self, id: AgentId, status: AgentStatus) -> Result<Agent, ConclaveError>;

    // --- tasks ----------------------------------------------------------

    /// Create a new task. `spec.estimated_duration` is persisted via the
    /// `conclave_types::duration` codec.
    async fn create_task(&self, spec: TaskSpec) -> Result<Task, ConclaveError>;

    /// Fetch a single task by id.
    async fn get_task(&self, id: TaskId) -> Result<Task, ConclaveError>;

    /// List tasks, most recently created first.
    async fn list_tasks(&self, page: Page) -> Result<Vec<Task>, ConclaveError>;

    /// Apply a partial update to an existing task.
    async fn update_task(&self, id: TaskId, update: TaskUpdate) -> Result<Task, ConclaveError>;

    /// Delete a task. Fails with `Conflict` if any non-terminal execution references it.
    async fn delete_task(&self, id: TaskId) -> Result<(), ConclaveError>;

    /// Replace a task's assigned-agent set wholesale.
    async fn reassign_agents(&self, id: TaskId, agent_ids: Vec<AgentId>) -> Result<Task, ConclaveError>;

    /// Transition a task's status directly (used by the execution engine as child
    /// executions resolve; does not itself inspect execution state).
    async fn set_task_status(&self, id: TaskId, status: TaskStatus) -> Result<Task, ConclaveError>;

    // --- executions -------------------------------------------------------

    /// Create a new execution row in `Starting` status with a single opening log entry.
    /// `id` is generated by the caller (the execution engine) so that a caller-computed
    /// default `work_directory` of the form `execution_<id>` stays consistent with the
    /// row it is stored against.
    async fn create_execution(
        &self,
        id: ExecutionId,
        task_id: TaskId,
        agent_id: AgentId,
        work_directory: String,
    ) -> Result<Execution, ConclaveError>;

    /// Fetch a single execution by id.
    async fn get_execution(&self, id: ExecutionId) -> Result<Execution, ConclaveError>;

    /// List executions, most recently started first.
    async fn list_executions(&self, page: Page) -> Result<Vec<Execution>, ConclaveError>;

    /// List every non-terminal execution bound to the given agent.
    async fn list_non_terminal_for_agent(&self, agent_id: AgentId) -> Result<Vec<Execution>, ConclaveError>;

    /// Append a single log entry to an execution's append-only log.
    async fn append_log(
        &self,
        id: ExecutionId,
        level: conclave_types::LogLevel,
        message: String,
    ) -> Result<(), ConclaveError>;

    /// Transition an execution to a terminal status, recording output and/or error
    /// details and stamping `end_time` and `duration_seconds`.
    async fn set_status_terminal(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        output: Option<serde_json::Value>,
        error: Option<ExecutionErrorDetails>,
    ) -> Result<Execution, ConclaveError>;

    /// Transition an execution to a non-terminal status (e.g. `Running`, `Paused`).
    async fn set_status(&self, id: ExecutionId, status: ExecutionStatus) -> Result<Execution, ConclaveError>;

    /// Capture a paused-run snapshot timestamp for later resume bookkeeping.
    async fn save_paused_snapshot(&self, id: ExecutionId, at: DateTime<Utc>) -> Result<(), ConclaveError>;

    // --- workflow patterns ------------------------------------------------

    /// Create a new workflow pattern. Fails with `Conflict` if `spec.name` is taken.
    async fn create_pattern(&self, spec: WorkflowPatternSpec) -> Result<WorkflowPattern, ConclaveError>;

    /// Fetch a single pattern by id.
    async fn get_pattern(&self, id: PatternId) -> Result<WorkflowPattern, ConclaveError>;

    /// List patterns, optionally filtered by status, most recently created first.
    async fn list_patterns(
        &self,
        status: Option<PatternStatus>,
        page: Page,
    ) -> Result<Vec<WorkflowPattern>, ConclaveError>;

    /// Apply a partial update; callers pass the full desired [`WorkflowPatternSpec`]
    /// fields they wish to change via helper setters on the backend.
    async fn update_pattern(&self, id: PatternId, spec: WorkflowPatternSpec) -> Result<WorkflowPattern, ConclaveError>;

    /// Delete a pattern. Fails with `Conflict` naming any non-terminal workflow
    /// execution of this pattern, unless `force` is set (which first aborts them).
    async fn delete_pattern(&self, id: PatternId, force: bool) -> Result<(), ConclaveError>;

    // --- workflow executions ------------------------------------------------

    /// Create a new workflow execution row in `Pending` status.
    async fn create_workflow_execution(&self, pattern_id: PatternId) -> Result<WorkflowExecution, ConclaveError>;

    /// Fetch a single workflow execution by id.
    async fn get_workflow_execution(&self, id: WorkflowExecutionId) -> Result<WorkflowExecution, ConclaveError>;

    /// List workflow executions, most recently started first.
    async fn list_workflow_executions(&self, page: Page) -> Result<Vec<WorkflowExecution>, ConclaveError>;

    /// Transition a workflow execution to `Running`.
    async fn set_workflow_running(&self, id: WorkflowExecutionId) -> Result<WorkflowExecution, ConclaveError>;

    /// Transition a workflow execution to a terminal status, recording results
    /// and/or an error and stamping `end_time`.
    async fn set_workflow_terminal(
        &self,
        id: WorkflowExecutionId,
        status: WorkflowExecutionStatus,
        results: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<WorkflowExecution, ConclaveError>;

    /// Update a workflow execution's progress projection in place (`current_step`,
    /// monotonically non-decreasing `progress`) without changing its status.
    async fn update_workflow_progress(
        &self,
        id: WorkflowExecutionId,
        current_step: String,
        progress: f64,
    ) -> Result<WorkflowExecution, ConclaveError>;

    /// Append an inter-agent coordination message to a workflow execution's record.
    async fn record_agent_communication(
        &self,
        id: WorkflowExecutionId,
        message: conclave_types::InterAgentMessage,
    ) -> Result<(), ConclaveError>;

    /// Sweep workflow executions in any of `statuses` whose `start_time` is older
    /// than `older_than`, returning the ids that were matched (not yet transitioned;
    /// callers decide the terminal disposition, matching the startup reconciler's
    /// split handling of stale-but-resumable vs stale-and-expired rows).
    async fn sweep_stale(
        &self,
        older_than: DateTime<Utc>,
        statuses: &[WorkflowExecutionStatus],
    ) -> Result<Vec<WorkflowExecutionId>, ConclaveError>;

    /// Permanently remove a terminal workflow execution row. Used by the startup
    /// reconciler to age out old history; callers are responsible for confirming
    /// the row is terminal before calling this.
    async fn delete_workflow_execution(&self, id: WorkflowExecutionId) -> Result<(), ConclaveError>;

    // --- task-agent assignments ------------------------------------------------

    /// Record an explicit role assignment between an agent and a task.
    async fn assign_agent_to_task(
        &self,
        task_id: TaskId,
        agent_id: AgentId,
        role: conclave_types::RoleInTask,
    ) -> Result<(), ConclaveError>;

    /// List every assignment recorded against a task.
    async fn list_assignments_for_task(
        &self,
        task_id: TaskId,
    ) -> Result<Vec<conclave_types::TaskAgentAssignment>, ConclaveError>;

    // --- startup reconciliation ------------------------------------------------

    /// Delete every execution row whose `task_id` or `agent_id` no longer resolves
    /// (historical corruption, section 4.8).
    async fn delete_orphaned_executions(&self) -> Result<u64, ConclaveError>;

    /// Cancel every execution currently in `Starting` or `Running`, releasing its
    /// agents, with the given cancellation reason recorded as a log entry.
    async fn cancel_active_executions(&self, reason: &str) -> Result<u64, ConclaveError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_first_starts_at_zero_offset() {
        let page = Page::first(25);
        assert_eq!(page.offset, 0);
        assert_eq!(page.limit, 25);
    }

    #[test]
    fn page_default_matches_conventional_list_size() {
        assert_eq!(Page::default(), Page { offset: 0, limit: 100 });
    }
}
