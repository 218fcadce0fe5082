#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **conclave-store-memory** - in-memory [`StoreGateway`] backend.
//!
//! Suitable for tests and single-process development. All data lives in one
//! `RwLock`-guarded state struct; every trait method takes the lock for its whole
//! body, which is this backend's transactional unit (section 4.2). There
//! is no persistence across restarts.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use conclave_store_core::{Page, StoreGateway};
use conclave_types::{
    Agent, AgentId, AgentSpec, AgentStatus, AgentUpdate, AssignmentId, ConclaveError, Execution,
    ExecutionErrorDetails, ExecutionId, ExecutionStatus, InterAgentMessage, LogEntry, LogLevel,
    PatternId, PatternStatus, RoleInTask, Task, TaskAgentAssignment, TaskId, TaskPriority,
    TaskSpec, TaskStatus, TaskUpdate, WorkflowExecution, WorkflowExecutionId,
    WorkflowExecutionStatus, WorkflowPattern, WorkflowPatternSpec,
};
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    agents: HashMap<AgentId, Agent>,
    tasks: HashMap<TaskId, Task>,
    executions: HashMap<ExecutionId, Execution>,
    patterns: HashMap<PatternId, WorkflowPattern>,
    workflow_executions: HashMap<WorkflowExecutionId, WorkflowExecution>,
    assignments: HashMap<TaskId, Vec<TaskAgentAssignment>>,
}

/// In-memory, non-persistent [`StoreGateway`] implementation.
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<RwLock<State>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self { state: Arc::new(RwLock::new(State::default())) }
    }

    /// Drop every stored entity. Useful between test cases.
    pub async fn clear(&self) {
        *self.state.write().await = State::default();
    }
}

fn paginate<T: Clone>(mut items: Vec<(chrono::DateTime<Utc>, T)>, page: Page) -> Vec<T> {
    items.sort_by(|a, b| b.0.cmp(&a.0));
    items
        .into_iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .map(|(_, v)| v)
        .collect()
}

#[async_trait::async_trait]
impl StoreGateway for MemoryBackend {
    // --- agents -------------------------------------------------------

    async fn create_agent(&self, spec: AgentSpec) -> Result<Agent, ConclaveError> {
        spec.validate()?;
        let mut state = self.state.write().await;
        if state.agents.values().any(|a| a.name == spec.name) {
            return Err(ConclaveError::conflict(
                format!("agent name '{}' already in use", spec.name),
                "choose a different name",
            ));
        }
        let now = Utc::now();
        let agent = Agent {
            id: AgentId::new(),
            name: spec.name,
            role: spec.role,
            description: spec.description,
            system_prompt: spec.system_prompt,
            capabilities: spec.capabilities,
            tools: spec.tools,
            objectives: spec.objectives,
            constraints: spec.constraints,
            memory_settings: spec.memory_settings,
            execution_settings: spec.execution_settings,
            status: AgentStatus::Idle,
            created_at: now,
            updated_at: now,
            last_active: None,
        };
        state.agents.insert(agent.id, agent.clone());
        Ok(agent)
    }

    async fn get_agent(&self, id: AgentId) -> Result<Agent, ConclaveError> {
        self.state
            .read()
            .await
            .agents
            .get(&id)
            .cloned()
            .ok_or_else(|| ConclaveError::not_found("agent", id))
    }

    async fn list_agents_by_ids(&self, ids: &[AgentId]) -> Result<Vec<Agent>, ConclaveError> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.agents.get(id).cloned()).collect())
    }

    async fn list_agents(&self, page: Page) -> Result<Vec<Agent>, ConclaveError> {
        let state = self.state.read().await;
        let items = state.agents.values().map(|a| (a.created_at, a.clone())).collect();
        Ok(paginate(items, page))
    }

    async fn update_agent(&self, id: AgentId, update: AgentUpdate) -> Result<Agent, ConclaveError> {
        let mut state = self.state.write().await;
        let agent = state.agents.get_mut(&id).ok_or_else(|| ConclaveError::not_found("agent", id))?;
        if let Some(role) = update.role {
            agent.role = role;
        }
        if let Some(description) = update.description {
            agent.description = description;
        }
        if let Some(system_prompt) = update.system_prompt {
            agent.system_prompt = system_prompt;
        }
        if let Some(capabilities) = update.capabilities {
            agent.capabilities = capabilities;
        }
        if let Some(tools) = update.tools {
            agent.tools = tools;
        }
        if let Some(objectives) = update.objectives {
            agent.objectives = objectives;
        }
        if let Some(constraints) = update.constraints {
            agent.constraints = constraints;
        }
        if let Some(memory_settings) = update.memory_settings {
            agent.memory_settings = memory_settings;
        }
        if let Some(execution_settings) = update.execution_settings {
            agent.execution_settings = execution_settings;
        }
        agent.updated_at = Utc::now();
        Ok(agent.clone())
    }

    async fn delete_agent(&self, id: AgentId, force: bool) -> Result<(), ConclaveError> {
        let mut state = self.state.write().await;
        let agent_name = match state.agents.get(&id) {
            Some(agent) => agent.name.clone(),
            None => return Err(ConclaveError::not_found("agent", id)),
        };
        let blocking: Vec<ExecutionId> = state
            .executions
            .values()
            .filter(|e| e.agent_id == id && !e.status.is_terminal())
            .map(|e| e.id)
            .collect();
        if !blocking.is_empty() && !force {
            return Err(ConclaveError::conflict_with(
                "agent has non-terminal executions",
                "abort the executions or pass force=true",
                blocking.iter().map(|id| id.to_string()).collect(),
            ));
        }

        let now = Utc::now();
        let note = format!("Agent {agent_name} was deleted");
        for exec_id in &blocking {
            if let Some(execution) = state.executions.get_mut(exec_id) {
                execution.status = ExecutionStatus::Cancelled;
                execution.end_time = Some(now);
                execution.logs.push(LogEntry::new(LogLevel::Warn, note.clone()));
            }
        }

        for assignments in state.assignments.values_mut() {
            assignments.retain(|a| a.agent_id != id);
        }

        let affected: Vec<TaskId> = state
            .tasks
            .values()
            .filter(|t| t.assigned_agents.contains(&id))
            .map(|t| t.id)
            .collect();
        for task_id in affected {
            if let Some(task) = state.tasks.get_mut(&task_id) {
                task.assigned_agents.retain(|a| *a != id);
                if task.assigned_agents.is_empty() {
                    task.status = TaskStatus::Pending;
                    task.error_message = Some(note.clone());
                    task.updated_at = now;
                }
            }
        }

        state.agents.remove(&id);
        Ok(())
    }

    async fn set_agent_status(&self, id: AgentId, status: AgentStatus) -> Result<Agent, ConclaveError> {
        let mut state = self.state.write().await;
        let agent = state.agents.get_mut(&id).ok_or_else(|| ConclaveError::not_found("agent", id))?;
        agent.status = status;
        if status != AgentStatus::Executing {
            agent.last_active = Some(Utc::now());
        }
        agent.updated_at = Utc::now();
        Ok(agent.clone())
    }

    // --- tasks ----------------------------------------------------------

    async fn create_task(&self, spec: TaskSpec) -> Result<Task, ConclaveError> {
        spec.validate()?;
        let mut state = self.state.write().await;
        let now = Utc::now();
        let task = Task {
            id: TaskId::new(),
            title: spec.title,
            description: spec.description,
            expected_output: spec.expected_output,
            resources: spec.resources,
            dependencies: spec.dependencies,
            priority: spec.priority,
            deadline: spec.deadline,
            estimated_duration: spec.estimated_duration,
            status: TaskStatus::Pending,
            results: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            assigned_agents: spec.assigned_agents,
        };
        state.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn get_task(&self, id: TaskId) -> Result<Task, ConclaveError> {
        self.state.read().await.tasks.get(&id).cloned().ok_or_else(|| ConclaveError::not_found("task", id))
    }

    async fn list_tasks(&self, page: Page) -> Result<Vec<Task>, ConclaveError> {
        let state = self.state.read().await;
        let items = state.tasks.values().map(|t| (t.created_at, t.clone())).collect();
        Ok(paginate(items, page))
    }

    async fn update_task(&self, id: TaskId, update: TaskUpdate) -> Result<Task, ConclaveError> {
        let mut state = self.state.write().await;
        let task = state.tasks.get_mut(&id).ok_or_else(|| ConclaveError::not_found("task", id))?;
        if let Some(title) = update.title {
            task.title = title;
        }
        if let Some(description) = update.description {
            task.description = description;
        }
        if let Some(expected_output) = update.expected_output {
            task.expected_output = expected_output;
        }
        if let Some(resources) = update.resources {
            task.resources = resources;
        }
        if let Some(dependencies) = update.dependencies {
            task.dependencies = dependencies;
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        if let Some(deadline) = update.deadline {
            task.deadline = deadline;
        }
        if let Some(estimated_duration) = update.estimated_duration {
            task.estimated_duration = estimated_duration;
        }
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), ConclaveError> {
        let mut state = self.state.write().await;
        if !state.tasks.contains_key(&id) {
            return Err(ConclaveError::not_found("task", id));
        }
        let blocking: Vec<String> = state
            .executions
            .values()
            .filter(|e| e.task_id == id && !e.status.is_terminal())
            .map(|e| e.id.to_string())
            .collect();
        if !blocking.is_empty() {
            return Err(ConclaveError::conflict_with(
                "task has non-terminal executions",
                "abort the executions before deleting the task",
                blocking,
            ));
        }
        state.tasks.remove(&id);
        Ok(())
    }

    async fn reassign_agents(&self, id: TaskId, agent_ids: Vec<AgentId>) -> Result<Task, ConclaveError> {
        let mut state = self.state.write().await;
        let task = state.tasks.get_mut(&id).ok_or_else(|| ConclaveError::not_found("task", id))?;
        task.assigned_agents = agent_ids;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn set_task_status(&self, id: TaskId, status: TaskStatus) -> Result<Task, ConclaveError> {
        let mut state = self.state.write().await;
        let task = state.tasks.get_mut(&id).ok_or_else(|| ConclaveError::not_found("task", id))?;
        task.status = status;
        let now = Utc::now();
        if task.started_at.is_none() && matches!(status, TaskStatus::InProgress) {
            task.started_at = Some(now);
        }
        if status.is_terminal() {
            task.completed_at = Some(now);
        }
        task.updated_at = now;
        Ok(task.clone())
    }

    // --- executions -------------------------------------------------------

    async fn create_execution(
        &self,
        id: ExecutionId,
        task_id: TaskId,
        agent_id: AgentId,
        work_directory: String,
    ) -> Result<Execution, ConclaveError> {
        let mut state = self.state.write().await;
        if !state.tasks.contains_key(&task_id) {
            return Err(ConclaveError::not_found("task", task_id));
        }
        if !state.agents.contains_key(&agent_id) {
            return Err(ConclaveError::not_found("agent", agent_id));
        }
        let execution = Execution {
            id,
            task_id,
            agent_id,
            status: ExecutionStatus::Starting,
            start_time: Utc::now(),
            end_time: None,
            logs: vec![LogEntry::new(LogLevel::Info, "execution created")],
            output: None,
            error_details: None,
            agent_response: None,
            work_directory,
            needs_interaction: false,
            duration_seconds: None,
            memory_usage: None,
            api_calls_made: 0,
        };
        state.executions.insert(execution.id, execution.clone());
        Ok(execution)
    }

    async fn get_execution(&self, id: ExecutionId) -> Result<Execution, ConclaveError> {
        self.state
            .read()
            .await
            .executions
            .get(&id)
            .cloned()
            .ok_or_else(|| ConclaveError::not_found("execution", id))
    }

    async fn list_executions(&self, page: Page) -> Result<Vec<Execution>, ConclaveError> {
        let state = self.state.read().await;
        let items = state.executions.values().map(|e| (e.start_time, e.clone())).collect();
        Ok(paginate(items, page))
    }

    async fn list_non_terminal_for_agent(&self, agent_id: AgentId) -> Result<Vec<Execution>, ConclaveError> {
        let state = self.state.read().await;
        Ok(state
            .executions
            .values()
            .filter(|e| e.agent_id == agent_id && !e.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn append_log(&self, id: ExecutionId, level: LogLevel, message: String) -> Result<(), ConclaveError> {
        let mut state = self.state.write().await;
        let execution = state.executions.get_mut(&id).ok_or_else(|| ConclaveError::not_found("execution", id))?;
        execution.logs.push(LogEntry::new(level, message));
        Ok(())
    }

    async fn set_status_terminal(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        output: Option<serde_json::Value>,
        error: Option<ExecutionErrorDetails>,
    ) -> Result<Execution, ConclaveError> {
        let mut state = self.state.write().await;
        let execution = state.executions.get_mut(&id).ok_or_else(|| ConclaveError::not_found("execution", id))?;
        let now = Utc::now();
        execution.status = status;
        execution.output = output;
        execution.error_details = error;
        execution.end_time = Some(now);
        execution.duration_seconds =
            Some((now - execution.start_time).num_milliseconds() as f64 / 1000.0);
        Ok(execution.clone())
    }

    async fn set_status(&self, id: ExecutionId, status: ExecutionStatus) -> Result<Execution, ConclaveError> {
        let mut state = self.state.write().await;
        let execution = state.executions.get_mut(&id).ok_or_else(|| ConclaveError::not_found("execution", id))?;
        execution.status = status;
        Ok(execution.clone())
    }

    async fn save_paused_snapshot(&self, id: ExecutionId, at: chrono::DateTime<Utc>) -> Result<(), ConclaveError> {
        let mut state = self.state.write().await;
        let execution = state.executions.get_mut(&id).ok_or_else(|| ConclaveError::not_found("execution", id))?;
        execution.logs.push(LogEntry::new(LogLevel::Info, format!("paused snapshot at {at}")));
        Ok(())
    }

    // --- workflow patterns ------------------------------------------------

    async fn create_pattern(&self, spec: WorkflowPatternSpec) -> Result<WorkflowPattern, ConclaveError> {
        spec.validate()?;
        let mut state = self.state.write().await;
        if state.patterns.values().any(|p| p.name == spec.name) {
            return Err(ConclaveError::conflict(
                format!("pattern name '{}' already in use", spec.name),
                "choose a different name",
            ));
        }
        let now = Utc::now();
        let pattern = WorkflowPattern {
            id: PatternId::new(),
            name: spec.name,
            description: spec.description,
            workflow_type: spec.workflow_type,
            agent_ids: spec.agent_ids,
            task_ids: spec.task_ids,
            dependencies: spec.dependencies,
            config: spec.config,
            user_objective: spec.user_objective,
            project_directory: spec.project_directory,
            status: PatternStatus::Active,
            created_at: now,
            updated_at: now,
        };
        state.patterns.insert(pattern.id, pattern.clone());
        Ok(pattern)
    }

    async fn get_pattern(&self, id: PatternId) -> Result<WorkflowPattern, ConclaveError> {
        self.state.read().await.patterns.get(&id).cloned().ok_or_else(|| ConclaveError::not_found("pattern", id))
    }

    async fn list_patterns(
        &self,
        status: Option<PatternStatus>,
        page: Page,
    ) -> Result<Vec<WorkflowPattern>, ConclaveError> {
        let state = self.state.read().await;
        let items = state
            .patterns
            .values()
            .filter(|p| status.map_or(true, |s| p.status == s))
            .map(|p| (p.created_at, p.clone()))
            .collect();
        Ok(paginate(items, page))
    }

    async fn update_pattern(&self, id: PatternId, spec: WorkflowPatternSpec) -> Result<WorkflowPattern, ConclaveError> {
        spec.validate()?;
        let mut state = self.state.write().await;
        let pattern = state.patterns.get_mut(&id).ok_or_else(|| ConclaveError::not_found("pattern", id))?;
        pattern.name = spec.name;
        pattern.description = spec.description;
        pattern.workflow_type = spec.workflow_type;
        pattern.agent_ids = spec.agent_ids;
        pattern.task_ids = spec.task_ids;
        pattern.dependencies = spec.dependencies;
        pattern.config = spec.config;
        pattern.user_objective = spec.user_objective;
        pattern.project_directory = spec.project_directory;
        pattern.updated_at = Utc::now();
        Ok(pattern.clone())
    }

    async fn delete_pattern(&self, id: PatternId, force: bool) -> Result<(), ConclaveError> {
        let mut state = self.state.write().await;
        if !state.patterns.contains_key(&id) {
            return Err(ConclaveError::not_found("pattern", id));
        }
        let active: Vec<WorkflowExecutionId> = state
            .workflow_executions
            .values()
            .filter(|w| w.pattern_id == id && !w.status.is_terminal())
            .map(|w| w.id)
            .collect();
        if !active.is_empty() && !force {
            return Err(ConclaveError::conflict_with(
                "pattern has non-terminal workflow executions",
                "abort the runs or pass force=true",
                active.iter().map(|id| id.to_string()).collect(),
            ));
        }
        for id in active {
            if let Some(run) = state.workflow_executions.get_mut(&id) {
                run.status = WorkflowExecutionStatus::Aborted;
                run.end_time = Some(Utc::now());
            }
        }
        state.patterns.remove(&id);
        Ok(())
    }

    // --- workflow executions ------------------------------------------------

    async fn create_workflow_execution(&self, pattern_id: PatternId) -> Result<WorkflowExecution, ConclaveError> {
        let mut state = self.state.write().await;
        if !state.patterns.contains_key(&pattern_id) {
            return Err(ConclaveError::not_found("pattern", pattern_id));
        }
        let run = WorkflowExecution {
            id: WorkflowExecutionId::new(),
            pattern_id,
            status: WorkflowExecutionStatus::Pending,
            start_time: Utc::now(),
            end_time: None,
            current_step: "pending".to_string(),
            progress: 0.0,
            results: None,
            error_details: None,
            execution_logs: Vec::new(),
            agent_communications: Vec::new(),
        };
        state.workflow_executions.insert(run.id, run.clone());
        Ok(run)
    }

    async fn get_workflow_execution(&self, id: WorkflowExecutionId) -> Result<WorkflowExecution, ConclaveError> {
        self.state
            .read()
            .await
            .workflow_executions
            .get(&id)
            .cloned()
            .ok_or_else(|| ConclaveError::not_found("workflow_execution", id))
    }

    async fn list_workflow_executions(&self, page: Page) -> Result<Vec<WorkflowExecution>, ConclaveError> {
        let state = self.state.read().await;
        let items = state.workflow_executions.values().map(|w| (w.start_time, w.clone())).collect();
        Ok(paginate(items, page))
    }

    async fn set_workflow_running(&self, id: WorkflowExecutionId) -> Result<WorkflowExecution, ConclaveError> {
        let mut state = self.state.write().await;
        let run = state
            .workflow_executions
            .get_mut(&id)
            .ok_or_else(|| ConclaveError::not_found("workflow_execution", id))?;
        run.status = WorkflowExecutionStatus::Running;
        Ok(run.clone())
    }

    async fn set_workflow_terminal(
        &self,
        id: WorkflowExecutionId,
        status: WorkflowExecutionStatus,
        results: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<WorkflowExecution, ConclaveError> {
        let mut state = self.state.write().await;
        let run = state
            .workflow_executions
            .get_mut(&id)
            .ok_or_else(|| ConclaveError::not_found("workflow_execution", id))?;
        run.status = status;
        run.results = results;
        run.error_details = error;
        run.end_time = Some(Utc::now());
        if status == WorkflowExecutionStatus::Completed {
            run.progress = 1.0;
        }
        Ok(run.clone())
    }

    async fn update_workflow_progress(
        &self,
        id: WorkflowExecutionId,
        current_step: String,
        progress: f64,
    ) -> Result<WorkflowExecution, ConclaveError> {
        let mut state = self.state.write().await;
        let run = state
            .workflow_executions
            .get_mut(&id)
            .ok_or_else(|| ConclaveError::not_found("workflow_execution", id))?;
        run.current_step = current_step;
        run.progress = progress.max(run.progress);
        Ok(run.clone())
    }

    async fn record_agent_communication(
        &self,
        id: WorkflowExecutionId,
        message: InterAgentMessage,
    ) -> Result<(), ConclaveError> {
        let mut state = self.state.write().await;
        let run = state
            .workflow_executions
            .get_mut(&id)
            .ok_or_else(|| ConclaveError::not_found("workflow_execution", id))?;
        run.agent_communications.push(message);
        Ok(())
    }

    async fn sweep_stale(
        &self,
        older_than: chrono::DateTime<Utc>,
        statuses: &[WorkflowExecutionStatus],
    ) -> Result<Vec<WorkflowExecutionId>, ConclaveError> {
        let state = self.state.read().await;
        Ok(state
            .workflow_executions
            .values()
            .filter(|w| statuses.contains(&w.status) && w.start_time < older_than)
            .map(|w| w.id)
            .collect())
    }

    async fn delete_workflow_execution(&self, id: WorkflowExecutionId) -> Result<(), ConclaveError> {
        let mut state = self.state.write().await;
        state
            .workflow_executions
            .remove(&id)
            .ok_or_else(|| ConclaveError::not_found("workflow_execution", id))?;
        Ok(())
    }

    // --- task-agent assignments ------------------------------------------------

    async fn assign_agent_to_task(&self, task_id: TaskId, agent_id: AgentId, role: RoleInTask) -> Result<(), ConclaveError> {
        let mut state = self.state.write().await;
        if !state.tasks.contains_key(&task_id) {
            return Err(ConclaveError::not_found("task", task_id));
        }
        if !state.agents.contains_key(&agent_id) {
            return Err(ConclaveError::not_found("agent", agent_id));
        }
        let assignment = TaskAgentAssignment {
            id: AssignmentId::new(),
            task_id,
            agent_id,
            role_in_task: role,
            assigned_at: Utc::now(),
        };
        state.assignments.entry(task_id).or_default().push(assignment);
        Ok(())
    }

    async fn list_assignments_for_task(&self, task_id: TaskId) -> Result<Vec<TaskAgentAssignment>, ConclaveError> {
        Ok(self.state.read().await.assignments.get(&task_id).cloned().unwrap_or_default())
    }

    // --- startup reconciliation ------------------------------------------------

    async fn delete_orphaned_executions(&self) -> Result<u64, ConclaveError> {
        let mut state = self.state.write().await;
        let orphaned: Vec<ExecutionId> = state
            .executions
            .values()
            .filter(|e| !state.tasks.contains_key(&e.task_id) || !state.agents.contains_key(&e.agent_id))
            .map(|e| e.id)
            .collect();
        for id in &orphaned {
            state.executions.remove(id);
        }
        Ok(orphaned.len() as u64)
    }

    async fn cancel_active_executions(&self, reason: &str) -> Result<u64, ConclaveError> {
        let mut state = self.state.write().await;
        let active: Vec<ExecutionId> = state
            .executions
            .values()
            .filter(|e| matches!(e.status, ExecutionStatus::Starting | ExecutionStatus::Running))
            .map(|e| e.id)
            .collect();
        let now = Utc::now();
        for id in &active {
            if let Some(execution) = state.executions.get_mut(id) {
                execution.status = ExecutionStatus::Cancelled;
                execution.end_time = Some(now);
                execution.logs.push(LogEntry::new(LogLevel::Warn, reason.to_string()));
                let agent_id = execution.agent_id;
                if let Some(agent) = state.agents.get_mut(&agent_id) {
                    agent.status = AgentStatus::Idle;
                    agent.last_active = Some(now);
                }
            }
        }
        Ok(active.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn agent_spec(name: &str) -> AgentSpec {
        AgentSpec {
            name: name.to_string(),
            role: "backend".to_string(),
            description: "does things".to_string(),
            system_prompt: "You are a careful backend engineer.".to_string(),
            capabilities: vec![],
            tools: vec![],
            objectives: vec![],
            constraints: vec![],
            memory_settings: Map::new(),
            execution_settings: Map::new(),
        }
    }

    fn task_spec(title: &str) -> TaskSpec {
        TaskSpec {
            title: title.to_string(),
            description: "do the thing".to_string(),
            expected_output: None,
            resources: vec![],
            dependencies: vec![],
            priority: TaskPriority::Medium,
            deadline: None,
            estimated_duration: Some(5),
            assigned_agents: vec![],
        }
    }

    #[tokio::test]
    async fn create_agent_rejects_duplicate_name() {
        let store = MemoryBackend::new();
        store.create_agent(agent_spec("alice")).await.unwrap();
        let err = store.create_agent(agent_spec("alice")).await.unwrap_err();
        assert_eq!(err.kind(), conclave_types::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn execution_lifecycle_releases_agent_on_cancel() {
        let store = MemoryBackend::new();
        let agent = store.create_agent(agent_spec("bob")).await.unwrap();
        let task = store.create_task(task_spec("ship it")).await.unwrap();
        store.set_agent_status(agent.id, AgentStatus::Executing).await.unwrap();
        let execution = store.create_execution(conclave_types::ExecutionId::new(), task.id, agent.id, "/tmp/work".into()).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Starting);

        let cancelled = store.cancel_active_executions("system restart cleanup").await.unwrap();
        assert_eq!(cancelled, 1);
        let reloaded = store.get_execution(execution.id).await.unwrap();
        assert_eq!(reloaded.status, ExecutionStatus::Cancelled);
    }

    #[tokio::test]
    async fn delete_task_blocked_by_non_terminal_execution() {
        let store = MemoryBackend::new();
        let agent = store.create_agent(agent_spec("carol")).await.unwrap();
        let task = store.create_task(task_spec("migrate db")).await.unwrap();
        store.create_execution(conclave_types::ExecutionId::new(), task.id, agent.id, "/tmp/work".into()).await.unwrap();

        let err = store.delete_task(task.id).await.unwrap_err();
        assert_eq!(err.kind(), conclave_types::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn sweep_stale_matches_status_and_age() {
        let store = MemoryBackend::new();
        let pattern = store
            .create_pattern(WorkflowPatternSpec {
                name: "demo".into(),
                description: String::new(),
                workflow_type: conclave_types::WorkflowType::Parallel,
                agent_ids: vec![AgentId::new()],
                task_ids: vec![TaskId::new()],
                dependencies: Map::new(),
                config: Default::default(),
                user_objective: None,
                project_directory: "/tmp".into(),
            })
            .await
            .unwrap();
        let run = store.create_workflow_execution(pattern.id).await.unwrap();

        let none_yet = store
            .sweep_stale(Utc::now() - chrono::Duration::hours(1), &[WorkflowExecutionStatus::Pending])
            .await
            .unwrap();
        assert!(none_yet.is_empty());

        let matched = store
            .sweep_stale(Utc::now() + chrono::Duration::hours(1), &[WorkflowExecutionStatus::Pending])
            .await
            .unwrap();
        assert_eq!(matched, vec![run.id]);
    }
}
