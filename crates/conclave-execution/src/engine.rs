//! [`ExecutionEngine`]: the public API over one (task, primary agent) execution's
//! lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use conclave_bus::{EventBus, Topic};
use conclave_store_core::{Page, StoreGateway};
use conclave_subprocess::SubprocessRunner;
use conclave_types::{
    Agent, AgentId, AgentStatus, ConclaveError, Execution, ExecutionId, ExecutionStatus, LogLevel,
    Task, TaskId,
};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::config::EngineConfig;
use crate::status::{Counters, SystemStatus};
use crate::supervisor;

/// Caller-supplied fields for [`ExecutionEngine::start_task_execution`].
#[derive(Debug, Clone, Default)]
pub struct StartExecutionRequest {
    /// The task to execute.
    pub task_id: TaskId,
    /// Agents to bind this execution to. Falls back to `task.assigned_agents` when
    /// omitted or empty.
    pub agent_ids: Option<Vec<AgentId>>,
    /// Working directory for the subprocess. Defaults to
    /// `./claude_executions/execution_<id>` under the process cwd.
    pub work_directory: Option<String>,
    /// When `true`, aborts any conflicting in-flight executions for the referenced
    /// agents before starting, instead of rejecting with a conflict.
    pub force_restart: bool,
}

/// Drives one (task, primary agent) execution from start to a terminal state under a
/// deadline, with pause/resume/abort controls and per-step event emission.
pub struct ExecutionEngine {
    store: Arc<dyn StoreGateway>,
    bus: Arc<dyn EventBus>,
    runner: Arc<SubprocessRunner>,
    config: EngineConfig,
    in_flight: RwLock<HashMap<ExecutionId, JoinHandle<()>>>,
    agent_sets: Arc<RwLock<HashMap<ExecutionId, Vec<AgentId>>>>,
    counters: Arc<Mutex<Counters>>,
    started_at: Instant,
}

impl ExecutionEngine {
    /// Build a new engine over the given store, event bus, and subprocess runner.
    pub fn new(
        store: Arc<dyn StoreGateway>,
        bus: Arc<dyn EventBus>,
        runner: Arc<SubprocessRunner>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            bus,
            runner,
            config,
            in_flight: RwLock::new(HashMap::new()),
            agent_sets: Arc::new(RwLock::new(HashMap::new())),
            counters: Arc::new(Mutex::new(Counters::default())),
            started_at: Instant::now(),
        }
    }

    /// Start a new execution for `request.task_id`. Returns the freshly created row,
    /// in `Starting` status; the supervised run is scheduled in the background.
    #[instrument(skip(self, request), fields(task_id = %request.task_id))]
    pub async fn start_task_execution(
        &self,
        request: StartExecutionRequest,
    ) -> Result<Execution, ConclaveError> {
        let task = self.store.get_task(request.task_id).await?;

        let effective_agent_ids = match request.agent_ids {
            Some(ids) if !ids.is_empty() => ids,
            _ => task.assigned_agents.clone(),
        };
        if effective_agent_ids.is_empty() {
            return Err(ConclaveError::invariant(
                "agent_ids",
                "must be non-empty, directly or via the task's assigned agents",
            ));
        }

        let mut agents = Vec::with_capacity(effective_agent_ids.len());
        for id in &effective_agent_ids {
            agents.push(self.store.get_agent(*id).await?);
        }

        let executing_names: Vec<String> = agents
            .iter()
            .filter(|a| a.status == AgentStatus::Executing)
            .map(|a| a.name.clone())
            .collect();
        if !executing_names.is_empty() {
            if !request.force_restart {
                return Err(ConclaveError::conflict_with(
                    "one or more agents are already executing",
                    "pass force_restart=true to abort the conflicting executions first",
                    executing_names,
                ));
            }
            for agent in agents.iter().filter(|a| a.status == AgentStatus::Executing) {
                let conflicting = self.store.list_non_terminal_for_agent(agent.id).await?;
                for execution in conflicting {
                    self.abort_execution(execution.id).await?;
                }
            }
        }

        let execution_id = ExecutionId::new();
        let work_directory = request.work_directory.unwrap_or_else(|| {
            format!("{}/execution_{execution_id}", self.config.work_directory_root)
        });
        let primary_agent_id = agents[0].id;

        let execution = self
            .store
            .create_execution(execution_id, request.task_id, primary_agent_id, work_directory.clone())
            .await?;

        for agent in &agents {
            self.store.set_agent_status(agent.id, AgentStatus::Executing).await?;
        }
        self.agent_sets.write().await.insert(execution_id, effective_agent_ids.clone());

        let prompt = build_prompt(&agents[0], &task);
        let deadline = self.config.outer_timeout(task.estimated_duration);

        let handle = tokio::spawn(run_supervised_owned(
            Arc::clone(&self.store),
            Arc::clone(&self.bus),
            Arc::clone(&self.runner),
            self.config.clone(),
            execution_id,
            request.task_id,
            effective_agent_ids,
            agents[0].role.clone(),
            agents[0].name.clone(),
            task.title.clone(),
            prompt,
            work_directory,
            deadline,
            Arc::clone(&self.counters),
            Arc::clone(&self.agent_sets),
        ));
        self.in_flight.write().await.insert(execution_id, handle);
        self.counters.lock().await.total_started += 1;

        Ok(execution)
    }

    /// Pause a running execution. Cancels the in-flight run task; the agents it holds
    /// remain `Executing` until [`ExecutionEngine::resume_execution`] or
    /// [`ExecutionEngine::abort_execution`].
    pub async fn pause_execution(&self, execution_id: ExecutionId) -> Result<Execution, ConclaveError> {
        let execution = self.store.get_execution(execution_id).await?;
        if execution.status != ExecutionStatus::Running {
            return Err(ConclaveError::conflict(
                format!("execution is {:?}, not running", execution.status),
                "only a running execution can be paused",
            ));
        }
        if let Some(handle) = self.in_flight.write().await.remove(&execution_id) {
            handle.abort();
        }
        self.store.save_paused_snapshot(execution_id, Utc::now()).await?;
        self.store
            .append_log(execution_id, LogLevel::Info, "paused by user".to_string())
            .await?;
        let updated = self.store.set_status(execution_id, ExecutionStatus::Paused).await?;
        supervisor::publish(
            &*self.bus,
            Topic::ExecutionEvent,
            "paused",
            execution_id,
            updated.task_id,
            updated.agent_id,
            ExecutionStatus::Paused,
        );
        Ok(updated)
    }

    /// Resume a paused execution. Reloads the task and primary agent, transitions the
    /// execution back to `Running`, and re-schedules the supervised run.
    pub async fn resume_execution(&self, execution_id: ExecutionId) -> Result<Execution, ConclaveError> {
        let execution = self.store.get_execution(execution_id).await?;
        if execution.status != ExecutionStatus::Paused {
            return Err(ConclaveError::conflict(
                "execution is not paused",
                "only a paused execution can be resumed",
            ));
        }
        let task = self.store.get_task(execution.task_id).await?;
        let primary_agent = self.store.get_agent(execution.agent_id).await?;
        let agent_ids = self
            .agent_sets
            .read()
            .await
            .get(&execution_id)
            .cloned()
            .unwrap_or_else(|| vec![execution.agent_id]);

        let deadline = self.config.outer_timeout(task.estimated_duration);
        supervisor::begin_running(
            &*self.store,
            &*self.bus,
            execution_id,
            execution.task_id,
            execution.agent_id,
            deadline,
            "resumed",
        )
        .await?;

        let prompt = build_prompt(&primary_agent, &task);
        let handle = tokio::spawn(supervisor::run_attempt_and_finish(
            Arc::clone(&self.store),
            Arc::clone(&self.bus),
            Arc::clone(&self.runner),
            self.config.clone(),
            execution_id,
            execution.task_id,
            agent_ids,
            primary_agent.role.clone(),
            primary_agent.name.clone(),
            task.title.clone(),
            prompt,
            execution.work_directory.clone(),
            deadline,
            Arc::clone(&self.counters),
            Arc::clone(&self.agent_sets),
        ));
        self.in_flight.write().await.insert(execution_id, handle);

        self.store.get_execution(execution_id).await
    }

    /// Abort an execution from any non-terminal state. Cancels the in-flight task if
    /// any, releases every agent this execution holds back to `Idle`, and transitions
    /// the row to `Cancelled`.
    #[instrument(skip(self))]
    pub async fn abort_execution(&self, execution_id: ExecutionId) -> Result<Execution, ConclaveError> {
        let execution = self.store.get_execution(execution_id).await?;
        if execution.status.is_terminal() {
            return Err(ConclaveError::conflict(
                "execution is already terminal",
                "nothing to abort",
            ));
        }
        if let Some(handle) = self.in_flight.write().await.remove(&execution_id) {
            handle.abort();
        }
        let agent_ids = self
            .agent_sets
            .write()
            .await
            .remove(&execution_id)
            .unwrap_or_else(|| vec![execution.agent_id]);
        for agent_id in &agent_ids {
            self.store.set_agent_status(*agent_id, AgentStatus::Idle).await?;
        }
        self.store
            .append_log(execution_id, LogLevel::Info, "aborted by user".to_string())
            .await?;
        let updated = self
            .store
            .set_status_terminal(execution_id, ExecutionStatus::Cancelled, None, None)
            .await?;
        supervisor::publish(
            &*self.bus,
            Topic::ExecutionEvent,
            "aborted",
            execution_id,
            updated.task_id,
            updated.agent_id,
            ExecutionStatus::Cancelled,
        );
        self.counters.lock().await.total_cancelled += 1;
        Ok(updated)
    }

    /// Fetch a single execution by id.
    pub async fn get_execution(&self, execution_id: ExecutionId) -> Result<Execution, ConclaveError> {
        self.store.get_execution(execution_id).await
    }

    /// List executions, most recently started first.
    pub async fn list_executions(&self, page: Page) -> Result<Vec<Execution>, ConclaveError> {
        self.store.list_executions(page).await
    }

    /// A read-only snapshot of this engine's running totals.
    pub async fn get_system_status(&self) -> SystemStatus {
        let active_executions = self.in_flight.read().await.len() as u64;
        let counters = self.counters.lock().await;
        SystemStatus {
            active_executions,
            total_started: counters.total_started,
            total_completed: counters.total_completed,
            total_failed: counters.total_failed,
            total_cancelled: counters.total_cancelled,
            uptime: self.started_at.elapsed(),
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_supervised_owned(
    store: Arc<dyn StoreGateway>,
    bus: Arc<dyn EventBus>,
    runner: Arc<SubprocessRunner>,
    config: EngineConfig,
    execution_id: ExecutionId,
    task_id: TaskId,
    agent_ids: Vec<AgentId>,
    primary_agent_role: String,
    primary_agent_name: String,
    task_title: String,
    prompt: String,
    work_directory: String,
    deadline: std::time::Duration,
    counters: Arc<Mutex<Counters>>,
    agent_sets: Arc<RwLock<HashMap<ExecutionId, Vec<AgentId>>>>,
) {
    supervisor::run_supervised(
        store,
        bus,
        runner,
        config,
        execution_id,
        task_id,
        agent_ids,
        primary_agent_role,
        primary_agent_name,
        task_title,
        prompt,
        work_directory,
        deadline,
        counters,
        agent_sets,
    )
    .await;
}

fn build_prompt(agent: &Agent, task: &Task) -> String {
    let mut prompt = format!("{}\n\nTask: {}\n{}", agent.system_prompt, task.title, task.description);
    if let Some(expected) = &task.expected_output {
        prompt.push_str(&format!("\n\nExpected output: {expected}"));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_bus::InMemoryBus;
    use conclave_store_memory::MemoryBackend;
    use conclave_subprocess::SubprocessConfig;
    use conclave_types::{AgentSpec, AgentStatus, TaskPriority, TaskSpec};
    use std::collections::HashMap;
    use std::time::Duration;

    fn test_engine() -> ExecutionEngine {
        let store: Arc<dyn StoreGateway> = Arc::new(MemoryBackend::new());
        let bus: Arc<dyn EventBus> = Arc::new(InMemoryBus::new());
        let runner = Arc::new(SubprocessRunner::new(SubprocessConfig {
            command: "conclave-test-nonexistent-binary".to_string(),
            extra_args: Vec::new(),
        }));
        let config = EngineConfig { subprocess_inner_timeout: Duration::from_millis(200), ..EngineConfig::default() };
        ExecutionEngine::new(store, bus, runner, config)
    }

    async fn seed_agent_and_task(engine: &ExecutionEngine) -> (AgentId, TaskId) {
        let agent = engine
            .store
            .create_agent(AgentSpec {
                name: "reviewer".to_string(),
                role: "code-reviewer".to_string(),
                description: "reviews patches".to_string(),
                system_prompt: "You review code for correctness.".to_string(),
                capabilities: Vec::new(),
                tools: Vec::new(),
                objectives: Vec::new(),
                constraints: Vec::new(),
                memory_settings: HashMap::new(),
                execution_settings: HashMap::new(),
            })
            .await
            .unwrap();
        let task = engine
            .store
            .create_task(TaskSpec {
                title: "review PR 42".to_string(),
                description: "check the diff for regressions".to_string(),
                expected_output: Some("a pass/fail verdict".to_string()),
                resources: Vec::new(),
                dependencies: Vec::new(),
                priority: TaskPriority::Medium,
                deadline: None,
                estimated_duration: None,
                assigned_agents: vec![agent.id],
            })
            .await
            .unwrap();
        (agent.id, task.id)
    }

    #[tokio::test]
    async fn start_runs_to_completion_via_fallback_when_subprocess_is_unavailable() {
        let engine = test_engine();
        let (agent_id, task_id) = seed_agent_and_task(&engine).await;

        let execution = engine
            .start_task_execution(StartExecutionRequest { task_id, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(execution.status, ExecutionStatus::Starting);

        let agent = engine.store.get_agent(agent_id).await.unwrap();
        assert_eq!(agent.status, AgentStatus::Executing);

        let mut finished = None;
        for _ in 0..50 {
            let current = engine.store.get_execution(execution.id).await.unwrap();
            if current.status.is_terminal() {
                finished = Some(current);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let finished = finished.expect("execution did not reach a terminal state in time");
        assert_eq!(finished.status, ExecutionStatus::Completed);

        let agent = engine.store.get_agent(agent_id).await.unwrap();
        assert_eq!(agent.status, AgentStatus::Idle);
    }

    #[tokio::test]
    async fn start_rejects_an_agent_already_executing_without_force_restart() {
        let engine = test_engine();
        let (agent_id, task_id) = seed_agent_and_task(&engine).await;
        engine.store.set_agent_status(agent_id, AgentStatus::Executing).await.unwrap();

        let err = engine
            .start_task_execution(StartExecutionRequest { task_id, ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, ConclaveError::Conflict { .. }));
    }

    #[tokio::test]
    async fn pause_then_resume_returns_to_running_then_completes() {
        let engine = test_engine();
        let (_, task_id) = seed_agent_and_task(&engine).await;
        let execution = engine
            .start_task_execution(StartExecutionRequest { task_id, ..Default::default() })
            .await
            .unwrap();

        while engine.store.get_execution(execution.id).await.unwrap().status == ExecutionStatus::Starting {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let paused = engine.pause_execution(execution.id).await.unwrap();
        assert_eq!(paused.status, ExecutionStatus::Paused);

        let resumed = engine.resume_execution(execution.id).await.unwrap();
        assert_eq!(resumed.status, ExecutionStatus::Running);

        let mut finished = None;
        for _ in 0..50 {
            let current = engine.store.get_execution(execution.id).await.unwrap();
            if current.status.is_terminal() {
                finished = Some(current);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(finished.unwrap().status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn abort_releases_the_agent_and_marks_the_execution_cancelled() {
        let engine = test_engine();
        let (agent_id, task_id) = seed_agent_and_task(&engine).await;
        let execution = engine
            .start_task_execution(StartExecutionRequest { task_id, ..Default::default() })
            .await
            .unwrap();

        let aborted = engine.abort_execution(execution.id).await.unwrap();
        assert_eq!(aborted.status, ExecutionStatus::Cancelled);

        let agent = engine.store.get_agent(agent_id).await.unwrap();
        assert_eq!(agent.status, AgentStatus::Idle);

        let err = engine.abort_execution(execution.id).await.unwrap_err();
        assert!(matches!(err, ConclaveError::Conflict { .. }));
    }

    #[tokio::test]
    async fn system_status_reflects_started_and_completed_counts() {
        let engine = test_engine();
        let (_, task_id) = seed_agent_and_task(&engine).await;
        engine
            .start_task_execution(StartExecutionRequest { task_id, ..Default::default() })
            .await
            .unwrap();

        let status = engine.get_system_status().await;
        assert_eq!(status.total_started, 1);
    }
}
