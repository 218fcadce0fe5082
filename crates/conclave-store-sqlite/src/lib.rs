#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **conclave-store-sqlite** - SQLite-backed [`StoreGateway`] implementation.
//!
//! Every table keeps a handful of indexed scalar columns for filtering and a `data`
//! column holding the full entity as JSON; mutations read, modify, and rewrite that
//! column inside a single `sqlx` transaction, which is this backend's transactional
//! unit (section 4.2). Reads outside a mutation use a plain pool
//! connection and are not serialized against concurrent writers.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conclave_store_core::{Page, StoreGateway};
use conclave_types::{
    Agent, AgentId, AgentSpec, AgentStatus, AgentUpdate, AssignmentId, ConclaveError, Execution,
    ExecutionErrorDetails, ExecutionId, ExecutionStatus, InterAgentMessage, LogEntry, LogLevel,
    PatternId, PatternStatus, RoleInTask, Task, TaskAgentAssignment, TaskId, TaskStatus, TaskSpec,
    TaskUpdate, WorkflowExecution, WorkflowExecutionId, WorkflowExecutionStatus, WorkflowPattern,
    WorkflowPatternSpec,
};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

fn internal<E: std::fmt::Display>(context: &str, err: E) -> ConclaveError {
    ConclaveError::internal(format!("{context}: {err}"))
}

fn status_str<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

//─────────────────────────────
//  Backend
//─────────────────────────────

/// A persistent [`StoreGateway`] implementation backed by SQLite.
#[derive(Debug)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Open or create a database file at `path`, running migrations.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let database_url = format!("sqlite://{}", path.as_ref().display());
        let pool = SqlitePool::connect(&database_url).await?;
        Self::from_pool(pool).await
    }

    /// Open an in-memory database, for tests and ephemeral development use.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePool::connect("sqlite::memory:").await?;
        Self::from_pool(pool).await
    }

    /// Adopt an existing pool, running migrations.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let backend = Self { pool };
        backend.migrate().await?;
        Ok(backend)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                data TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                data TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS executions (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                status TEXT NOT NULL,
                start_time TEXT NOT NULL,
                data TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflow_patterns (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                data TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflow_executions (
                id TEXT PRIMARY KEY,
                pattern_id TEXT NOT NULL,
                status TEXT NOT NULL,
                start_time TEXT NOT NULL,
                data TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS task_agent_assignments (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                data TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for (index, column, table) in [
            ("idx_executions_task", "task_id", "executions"),
            ("idx_executions_agent", "agent_id", "executions"),
            ("idx_executions_status", "status", "executions"),
            ("idx_workflow_executions_pattern", "pattern_id", "workflow_executions"),
            ("idx_workflow_executions_status", "status", "workflow_executions"),
            ("idx_assignments_task", "task_id", "task_agent_assignments"),
        ] {
            sqlx::query(&format!("CREATE INDEX IF NOT EXISTS {index} ON {table}({column})"))
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    /// Close the underlying connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

//─────────────────────────────
//  Row <-> entity helpers
//─────────────────────────────

async fn fetch_json(pool: &SqlitePool, table: &str, id: &Uuid) -> Result<Option<String>, ConclaveError> {
    let row = sqlx::query(&format!("SELECT data FROM {table} WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await
        .map_err(|e| internal("query failed", e))?;
    Ok(row.map(|r| r.get::<String, _>("data")))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, ConclaveError> {
    serde_json::to_string(value).map_err(|e| internal("serialize failed", e))
}

fn decode<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, ConclaveError> {
    serde_json::from_str(raw).map_err(|e| internal("deserialize failed", e))
}

#[async_trait]
impl StoreGateway for SqliteBackend {
    // --- agents -------------------------------------------------------

    async fn create_agent(&self, spec: AgentSpec) -> Result<Agent, ConclaveError> {
        spec.validate()?;
        let existing = sqlx::query("SELECT 1 FROM agents WHERE name = ?")
            .bind(&spec.name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| internal("query failed", e))?;
        if existing.is_some() {
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
        sqlx::query("INSERT INTO agents (id, name, status, created_at, data) VALUES (?, ?, ?, ?, ?)")
            .bind(agent.id.0.to_string())
            .bind(&agent.name)
            .bind(status_str(&agent.status))
            .bind(agent.created_at.to_rfc3339())
            .bind(encode(&agent)?)
            .execute(&self.pool)
            .await
            .map_err(|e| internal("insert failed", e))?;
        Ok(agent)
    }

    async fn get_agent(&self, id: AgentId) -> Result<Agent, ConclaveError> {
        let raw = fetch_json(&self.pool, "agents", &id.0).await?.ok_or_else(|| ConclaveError::not_found("agent", id))?;
        decode(&raw)
    }

    async fn list_agents_by_ids(&self, ids: &[AgentId]) -> Result<Vec<Agent>, ConclaveError> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(raw) = fetch_json(&self.pool, "agents", &id.0).await? {
                out.push(decode(&raw)?);
            }
        }
        Ok(out)
    }

    async fn list_agents(&self, page: Page) -> Result<Vec<Agent>, ConclaveError> {
        let rows = sqlx::query("SELECT data FROM agents ORDER BY created_at DESC LIMIT ? OFFSET ?")
            .bind(page.limit as i64)
            .bind(page.offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| internal("query failed", e))?;
        rows.into_iter().map(|r| decode(&r.get::<String, _>("data"))).collect()
    }

    async fn update_agent(&self, id: AgentId, update: AgentUpdate) -> Result<Agent, ConclaveError> {
        let raw = fetch_json(&self.pool, "agents", &id.0).await?.ok_or_else(|| ConclaveError::not_found("agent", id))?;
        let mut agent: Agent = decode(&raw)?;
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
        sqlx::query("UPDATE agents SET status = ?, data = ? WHERE id = ?")
            .bind(status_str(&agent.status))
            .bind(encode(&agent)?)
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| internal("update failed", e))?;
        Ok(agent)
    }

    async fn delete_agent(&self, id: AgentId, force: bool) -> Result<(), ConclaveError> {
        let raw = fetch_json(&self.pool, "agents", &id.0).await?.ok_or_else(|| ConclaveError::not_found("agent", id))?;
        let agent: Agent = decode(&raw)?;
        let blocking = non_terminal_executions_for_agent(&self.pool, id).await?;
        if !blocking.is_empty() && !force {
            return Err(ConclaveError::conflict_with(
                "agent has non-terminal executions",
                "abort the executions or pass force=true",
                blocking.iter().map(|id| id.to_string()).collect(),
            ));
        }

        let now = Utc::now();
        let note = format!("Agent {} was deleted", agent.name);
        let mut tx: Transaction<'_, Sqlite> = self.pool.begin().await.map_err(|e| internal("begin tx", e))?;

        for exec_id in &blocking {
            if let Some(raw) = fetch_json(&self.pool, "executions", &exec_id.0).await? {
                let mut execution: Execution = decode(&raw)?;
                execution.status = ExecutionStatus::Cancelled;
                execution.end_time = Some(now);
                execution.logs.push(LogEntry::new(LogLevel::Warn, note.clone()));
                sqlx::query("UPDATE executions SET status = ?, data = ? WHERE id = ?")
                    .bind(status_str(&execution.status))
                    .bind(encode(&execution)?)
                    .bind(exec_id.0.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| internal("update failed", e))?;
            }
        }

        sqlx::query("DELETE FROM task_agent_assignments WHERE agent_id = ?")
            .bind(id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| internal("delete failed", e))?;

        let task_rows = sqlx::query("SELECT id, data FROM tasks")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| internal("query failed", e))?;
        for row in task_rows {
            let mut task: Task = decode(&row.get::<String, _>("data"))?;
            if !task.assigned_agents.contains(&id) {
                continue;
            }
            task.assigned_agents.retain(|a| *a != id);
            if task.assigned_agents.is_empty() {
                task.status = TaskStatus::Pending;
                task.error_message = Some(note.clone());
            }
            task.updated_at = now;
            sqlx::query("UPDATE tasks SET status = ?, data = ? WHERE id = ?")
                .bind(status_str(&task.status))
                .bind(encode(&task)?)
                .bind(task.id.0.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| internal("update failed", e))?;
        }

        sqlx::query("DELETE FROM agents WHERE id = ?")
            .bind(id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| internal("delete failed", e))?;

        tx.commit().await.map_err(|e| internal("commit tx", e))?;
        Ok(())
    }

    async fn set_agent_status(&self, id: AgentId, status: AgentStatus) -> Result<Agent, ConclaveError> {
        let raw = fetch_json(&self.pool, "agents", &id.0).await?.ok_or_else(|| ConclaveError::not_found("agent", id))?;
        let mut agent: Agent = decode(&raw)?;
        agent.status = status;
        if status != AgentStatus::Executing {
            agent.last_active = Some(Utc::now());
        }
        agent.updated_at = Utc::now();
        sqlx::query("UPDATE agents SET status = ?, data = ? WHERE id = ?")
            .bind(status_str(&agent.status))
            .bind(encode(&agent)?)
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| internal("update failed", e))?;
        Ok(agent)
    }

    // --- tasks ----------------------------------------------------------

    async fn create_task(&self, spec: TaskSpec) -> Result<Task, ConclaveError> {
        spec.validate()?;
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
        sqlx::query("INSERT INTO tasks (id, status, created_at, data) VALUES (?, ?, ?, ?)")
            .bind(task.id.0.to_string())
            .bind(status_str(&task.status))
            .bind(task.created_at.to_rfc3339())
            .bind(encode(&task)?)
            .execute(&self.pool)
            .await
            .map_err(|e| internal("insert failed", e))?;
        Ok(task)
    }

    async fn get_task(&self, id: TaskId) -> Result<Task, ConclaveError> {
        let raw = fetch_json(&self.pool, "tasks", &id.0).await?.ok_or_else(|| ConclaveError::not_found("task", id))?;
        decode(&raw)
    }

    async fn list_tasks(&self, page: Page) -> Result<Vec<Task>, ConclaveError> {
        let rows = sqlx::query("SELECT data FROM tasks ORDER BY created_at DESC LIMIT ? OFFSET ?")
            .bind(page.limit as i64)
            .bind(page.offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| internal("query failed", e))?;
        rows.into_iter().map(|r| decode(&r.get::<String, _>("data"))).collect()
    }

    async fn update_task(&self, id: TaskId, update: TaskUpdate) -> Result<Task, ConclaveError> {
        let raw = fetch_json(&self.pool, "tasks", &id.0).await?.ok_or_else(|| ConclaveError::not_found("task", id))?;
        let mut task: Task = decode(&raw)?;
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
        sqlx::query("UPDATE tasks SET data = ? WHERE id = ?")
            .bind(encode(&task)?)
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| internal("update failed", e))?;
        Ok(task)
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), ConclaveError> {
        if fetch_json(&self.pool, "tasks", &id.0).await?.is_none() {
            return Err(ConclaveError::not_found("task", id));
        }
        let blocking = non_terminal_executions_for_task(&self.pool, id).await?;
        if !blocking.is_empty() {
            return Err(ConclaveError::conflict_with(
                "task has non-terminal executions",
                "abort the executions before deleting the task",
                blocking.into_iter().map(|id| id.to_string()).collect(),
            ));
        }
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| internal("delete failed", e))?;
        Ok(())
    }

    async fn reassign_agents(&self, id: TaskId, agent_ids: Vec<AgentId>) -> Result<Task, ConclaveError> {
        let raw = fetch_json(&self.pool, "tasks", &id.0).await?.ok_or_else(|| ConclaveError::not_found("task", id))?;
        let mut task: Task = decode(&raw)?;
        task.assigned_agents = agent_ids;
        task.updated_at = Utc::now();
        sqlx::query("UPDATE tasks SET data = ? WHERE id = ?")
            .bind(encode(&task)?)
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| internal("update failed", e))?;
        Ok(task)
    }

    async fn set_task_status(&self, id: TaskId, status: TaskStatus) -> Result<Task, ConclaveError> {
        let raw = fetch_json(&self.pool, "tasks", &id.0).await?.ok_or_else(|| ConclaveError::not_found("task", id))?;
        let mut task: Task = decode(&raw)?;
        task.status = status;
        let now = Utc::now();
        if task.started_at.is_none() && matches!(status, TaskStatus::InProgress) {
            task.started_at = Some(now);
        }
        if status.is_terminal() {
            task.completed_at = Some(now);
        }
        task.updated_at = now;
        sqlx::query("UPDATE tasks SET status = ?, data = ? WHERE id = ?")
            .bind(status_str(&task.status))
            .bind(encode(&task)?)
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| internal("update failed", e))?;
        Ok(task)
    }

    // --- executions -------------------------------------------------------

    async fn create_execution(
        &self,
        id: ExecutionId,
        task_id: TaskId,
        agent_id: AgentId,
        work_directory: String,
    ) -> Result<Execution, ConclaveError> {
        if fetch_json(&self.pool, "tasks", &task_id.0).await?.is_none() {
            return Err(ConclaveError::not_found("task", task_id));
        }
        if fetch_json(&self.pool, "agents", &agent_id.0).await?.is_none() {
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
        sqlx::query(
            "INSERT INTO executions (id, task_id, agent_id, status, start_time, data) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(execution.id.0.to_string())
        .bind(task_id.0.to_string())
        .bind(agent_id.0.to_string())
        .bind(status_str(&execution.status))
        .bind(execution.start_time.to_rfc3339())
        .bind(encode(&execution)?)
        .execute(&self.pool)
        .await
        .map_err(|e| internal("insert failed", e))?;
        Ok(execution)
    }

    async fn get_execution(&self, id: ExecutionId) -> Result<Execution, ConclaveError> {
        let raw = fetch_json(&self.pool, "executions", &id.0).await?.ok_or_else(|| ConclaveError::not_found("execution", id))?;
        decode(&raw)
    }

    async fn list_executions(&self, page: Page) -> Result<Vec<Execution>, ConclaveError> {
        let rows = sqlx::query("SELECT data FROM executions ORDER BY start_time DESC LIMIT ? OFFSET ?")
            .bind(page.limit as i64)
            .bind(page.offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| internal("query failed", e))?;
        rows.into_iter().map(|r| decode(&r.get::<String, _>("data"))).collect()
    }

    async fn list_non_terminal_for_agent(&self, agent_id: AgentId) -> Result<Vec<Execution>, ConclaveError> {
        let rows = sqlx::query("SELECT data FROM executions WHERE agent_id = ?")
            .bind(agent_id.0.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| internal("query failed", e))?;
        let mut out = Vec::new();
        for row in rows {
            let execution: Execution = decode(&row.get::<String, _>("data"))?;
            if !execution.status.is_terminal() {
                out.push(execution);
            }
        }
        Ok(out)
    }

    async fn append_log(&self, id: ExecutionId, level: LogLevel, message: String) -> Result<(), ConclaveError> {
        let raw = fetch_json(&self.pool, "executions", &id.0).await?.ok_or_else(|| ConclaveError::not_found("execution", id))?;
        let mut execution: Execution = decode(&raw)?;
        execution.logs.push(LogEntry::new(level, message));
        sqlx::query("UPDATE executions SET data = ? WHERE id = ?")
            .bind(encode(&execution)?)
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| internal("update failed", e))?;
        Ok(())
    }

    async fn set_status_terminal(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        output: Option<serde_json::Value>,
        error: Option<ExecutionErrorDetails>,
    ) -> Result<Execution, ConclaveError> {
        let raw = fetch_json(&self.pool, "executions", &id.0).await?.ok_or_else(|| ConclaveError::not_found("execution", id))?;
        let mut execution: Execution = decode(&raw)?;
        let now = Utc::now();
        execution.status = status;
        execution.output = output;
        execution.error_details = error;
        execution.end_time = Some(now);
        execution.duration_seconds = Some((now - execution.start_time).num_milliseconds() as f64 / 1000.0);
        sqlx::query("UPDATE executions SET status = ?, data = ? WHERE id = ?")
            .bind(status_str(&execution.status))
            .bind(encode(&execution)?)
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| internal("update failed", e))?;
        Ok(execution)
    }

    async fn set_status(&self, id: ExecutionId, status: ExecutionStatus) -> Result<Execution, ConclaveError> {
        let raw = fetch_json(&self.pool, "executions", &id.0).await?.ok_or_else(|| ConclaveError::not_found("execution", id))?;
        let mut execution: Execution = decode(&raw)?;
        execution.status = status;
        sqlx::query("UPDATE executions SET status = ?, data = ? WHERE id = ?")
            .bind(status_str(&execution.status))
            .bind(encode(&execution)?)
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| internal("update failed", e))?;
        Ok(execution)
    }

    async fn save_paused_snapshot(&self, id: ExecutionId, at: DateTime<Utc>) -> Result<(), ConclaveError> {
        self.append_log(id, LogLevel::Info, format!("paused snapshot at {at}")).await
    }

    // --- workflow patterns ------------------------------------------------

    async fn create_pattern(&self, spec: WorkflowPatternSpec) -> Result<WorkflowPattern, ConclaveError> {
        spec.validate()?;
        let existing = sqlx::query("SELECT 1 FROM workflow_patterns WHERE name = ?")
            .bind(&spec.name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| internal("query failed", e))?;
        if existing.is_some() {
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
        sqlx::query("INSERT INTO workflow_patterns (id, name, status, created_at, data) VALUES (?, ?, ?, ?, ?)")
            .bind(pattern.id.0.to_string())
            .bind(&pattern.name)
            .bind(status_str(&pattern.status))
            .bind(pattern.created_at.to_rfc3339())
            .bind(encode(&pattern)?)
            .execute(&self.pool)
            .await
            .map_err(|e| internal("insert failed", e))?;
        Ok(pattern)
    }

    async fn get_pattern(&self, id: PatternId) -> Result<WorkflowPattern, ConclaveError> {
        let raw = fetch_json(&self.pool, "workflow_patterns", &id.0).await?.ok_or_else(|| ConclaveError::not_found("pattern", id))?;
        decode(&raw)
    }

    async fn list_patterns(&self, status: Option<PatternStatus>, page: Page) -> Result<Vec<WorkflowPattern>, ConclaveError> {
        let rows = if let Some(status) = status {
            sqlx::query("SELECT data FROM workflow_patterns WHERE status = ? ORDER BY created_at DESC LIMIT ? OFFSET ?")
                .bind(status_str(&status))
                .bind(page.limit as i64)
                .bind(page.offset as i64)
                .fetch_all(&self.pool)
                .await
        } else {
            sqlx::query("SELECT data FROM workflow_patterns ORDER BY created_at DESC LIMIT ? OFFSET ?")
                .bind(page.limit as i64)
                .bind(page.offset as i64)
                .fetch_all(&self.pool)
                .await
        }
        .map_err(|e| internal("query failed", e))?;
        rows.into_iter().map(|r| decode(&r.get::<String, _>("data"))).collect()
    }

    async fn update_pattern(&self, id: PatternId, spec: WorkflowPatternSpec) -> Result<WorkflowPattern, ConclaveError> {
        spec.validate()?;
        let raw = fetch_json(&self.pool, "workflow_patterns", &id.0).await?.ok_or_else(|| ConclaveError::not_found("pattern", id))?;
        let mut pattern: WorkflowPattern = decode(&raw)?;
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
        sqlx::query("UPDATE workflow_patterns SET name = ?, data = ? WHERE id = ?")
            .bind(&pattern.name)
            .bind(encode(&pattern)?)
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| internal("update failed", e))?;
        Ok(pattern)
    }

    async fn delete_pattern(&self, id: PatternId, force: bool) -> Result<(), ConclaveError> {
        if fetch_json(&self.pool, "workflow_patterns", &id.0).await?.is_none() {
            return Err(ConclaveError::not_found("pattern", id));
        }
        let active = non_terminal_workflow_executions_for_pattern(&self.pool, id).await?;
        if !active.is_empty() && !force {
            return Err(ConclaveError::conflict_with(
                "pattern has non-terminal workflow executions",
                "abort the runs or pass force=true",
                active.iter().map(|id| id.to_string()).collect(),
            ));
        }
        let mut tx: Transaction<'_, Sqlite> = self.pool.begin().await.map_err(|e| internal("begin tx", e))?;
        for run_id in &active {
            if let Some(raw) = fetch_json(&self.pool, "workflow_executions", &run_id.0).await? {
                let mut run: WorkflowExecution = decode(&raw)?;
                run.status = WorkflowExecutionStatus::Aborted;
                run.end_time = Some(Utc::now());
                sqlx::query("UPDATE workflow_executions SET status = ?, data = ? WHERE id = ?")
                    .bind(status_str(&run.status))
                    .bind(encode(&run)?)
                    .bind(run_id.0.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| internal("update failed", e))?;
            }
        }
        sqlx::query("DELETE FROM workflow_patterns WHERE id = ?")
            .bind(id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| internal("delete failed", e))?;
        tx.commit().await.map_err(|e| internal("commit tx", e))?;
        Ok(())
    }

    // --- workflow executions ------------------------------------------------

    async fn create_workflow_execution(&self, pattern_id: PatternId) -> Result<WorkflowExecution, ConclaveError> {
        if fetch_json(&self.pool, "workflow_patterns", &pattern_id.0).await?.is_none() {
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
        sqlx::query(
            "INSERT INTO workflow_executions (id, pattern_id, status, start_time, data) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(run.id.0.to_string())
        .bind(pattern_id.0.to_string())
        .bind(status_str(&run.status))
        .bind(run.start_time.to_rfc3339())
        .bind(encode(&run)?)
        .execute(&self.pool)
        .await
        .map_err(|e| internal("insert failed", e))?;
        Ok(run)
    }

    async fn get_workflow_execution(&self, id: WorkflowExecutionId) -> Result<WorkflowExecution, ConclaveError> {
        let raw = fetch_json(&self.pool, "workflow_executions", &id.0).await?.ok_or_else(|| ConclaveError::not_found("workflow_execution", id))?;
        decode(&raw)
    }

    async fn list_workflow_executions(&self, page: Page) -> Result<Vec<WorkflowExecution>, ConclaveError> {
        let rows = sqlx::query("SELECT data FROM workflow_executions ORDER BY start_time DESC LIMIT ? OFFSET ?")
            .bind(page.limit as i64)
            .bind(page.offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| internal("query failed", e))?;
        rows.into_iter().map(|r| decode(&r.get::<String, _>("data"))).collect()
    }

    async fn set_workflow_running(&self, id: WorkflowExecutionId) -> Result<WorkflowExecution, ConclaveError> {
        let raw = fetch_json(&self.pool, "workflow_executions", &id.0).await?.ok_or_else(|| ConclaveError::not_found("workflow_execution", id))?;
        let mut run: WorkflowExecution = decode(&raw)?;
        run.status = WorkflowExecutionStatus::Running;
        sqlx::query("UPDATE workflow_executions SET status = ?, data = ? WHERE id = ?")
            .bind(status_str(&run.status))
            .bind(encode(&run)?)
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| internal("update failed", e))?;
        Ok(run)
    }

    async fn set_workflow_terminal(
        &self,
        id: WorkflowExecutionId,
        status: WorkflowExecutionStatus,
        results: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<WorkflowExecution, ConclaveError> {
        let raw = fetch_json(&self.pool, "workflow_executions", &id.0).await?.ok_or_else(|| ConclaveError::not_found("workflow_execution", id))?;
        let mut run: WorkflowExecution = decode(&raw)?;
        run.status = status;
        run.results = results;
        run.error_details = error;
        run.end_time = Some(Utc::now());
        if status == WorkflowExecutionStatus::Completed {
            run.progress = 1.0;
        }
        sqlx::query("UPDATE workflow_executions SET status = ?, data = ? WHERE id = ?")
            .bind(status_str(&run.status))
            .bind(encode(&run)?)
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| internal("update failed", e))?;
        Ok(run)
    }

    async fn update_workflow_progress(
        &self,
        id: WorkflowExecutionId,
        current_step: String,
        progress: f64,
    ) -> Result<WorkflowExecution, ConclaveError> {
        let raw = fetch_json(&self.pool, "workflow_executions", &id.0).await?.ok_or_else(|| ConclaveError::not_found("workflow_execution", id))?;
        let mut run: WorkflowExecution = decode(&raw)?;
        run.current_step = current_step;
        run.progress = progress.max(run.progress);
        sqlx::query("UPDATE workflow_executions SET data = ? WHERE id = ?")
            .bind(encode(&run)?)
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| internal("update failed", e))?;
        Ok(run)
    }

    async fn record_agent_communication(&self, id: WorkflowExecutionId, message: InterAgentMessage) -> Result<(), ConclaveError> {
        let raw = fetch_json(&self.pool, "workflow_executions", &id.0).await?.ok_or_else(|| ConclaveError::not_found("workflow_execution", id))?;
        let mut run: WorkflowExecution = decode(&raw)?;
        run.agent_communications.push(message);
        sqlx::query("UPDATE workflow_executions SET data = ? WHERE id = ?")
            .bind(encode(&run)?)
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| internal("update failed", e))?;
        Ok(())
    }

    async fn sweep_stale(
        &self,
        older_than: DateTime<Utc>,
        statuses: &[WorkflowExecutionStatus],
    ) -> Result<Vec<WorkflowExecutionId>, ConclaveError> {
        let rows = sqlx::query("SELECT id, data FROM workflow_executions WHERE start_time < ?")
            .bind(older_than.to_rfc3339())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| internal("query failed", e))?;
        let mut out = Vec::new();
        for row in rows {
            let run: WorkflowExecution = decode(&row.get::<String, _>("data"))?;
            if statuses.contains(&run.status) {
                out.push(run.id);
            }
        }
        Ok(out)
    }

    async fn delete_workflow_execution(&self, id: WorkflowExecutionId) -> Result<(), ConclaveError> {
        if fetch_json(&self.pool, "workflow_executions", &id.0).await?.is_none() {
            return Err(ConclaveError::not_found("workflow_execution", id));
        }
        sqlx::query("DELETE FROM workflow_executions WHERE id = ?")
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| internal("delete failed", e))?;
        Ok(())
    }

    // --- task-agent assignments ------------------------------------------------

    async fn assign_agent_to_task(&self, task_id: TaskId, agent_id: AgentId, role: RoleInTask) -> Result<(), ConclaveError> {
        if fetch_json(&self.pool, "tasks", &task_id.0).await?.is_none() {
            return Err(ConclaveError::not_found("task", task_id));
        }
        if fetch_json(&self.pool, "agents", &agent_id.0).await?.is_none() {
            return Err(ConclaveError::not_found("agent", agent_id));
        }
        let assignment = TaskAgentAssignment {
            id: AssignmentId::new(),
            task_id,
            agent_id,
            role_in_task: role,
            assigned_at: Utc::now(),
        };
        sqlx::query("INSERT INTO task_agent_assignments (id, task_id, agent_id, data) VALUES (?, ?, ?, ?)")
            .bind(assignment.id.0.to_string())
            .bind(task_id.0.to_string())
            .bind(agent_id.0.to_string())
            .bind(encode(&assignment)?)
            .execute(&self.pool)
            .await
            .map_err(|e| internal("insert failed", e))?;
        Ok(())
    }

    async fn list_assignments_for_task(&self, task_id: TaskId) -> Result<Vec<TaskAgentAssignment>, ConclaveError> {
        let rows = sqlx::query("SELECT data FROM task_agent_assignments WHERE task_id = ?")
            .bind(task_id.0.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| internal("query failed", e))?;
        rows.into_iter().map(|r| decode(&r.get::<String, _>("data"))).collect()
    }

    // --- startup reconciliation ------------------------------------------------

    async fn delete_orphaned_executions(&self) -> Result<u64, ConclaveError> {
        let rows = sqlx::query("SELECT id, task_id, agent_id FROM executions")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| internal("query failed", e))?;
        let mut orphaned = Vec::new();
        for row in rows {
            let task_id: String = row.get("task_id");
            let agent_id: String = row.get("agent_id");
            let task_exists = sqlx::query("SELECT 1 FROM tasks WHERE id = ?")
                .bind(&task_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| internal("query failed", e))?
                .is_some();
            let agent_exists = sqlx::query("SELECT 1 FROM agents WHERE id = ?")
                .bind(&agent_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| internal("query failed", e))?
                .is_some();
            if !task_exists || !agent_exists {
                orphaned.push(row.get::<String, _>("id"));
            }
        }
        for id in &orphaned {
            sqlx::query("DELETE FROM executions WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| internal("delete failed", e))?;
        }
        Ok(orphaned.len() as u64)
    }

    async fn cancel_active_executions(&self, reason: &str) -> Result<u64, ConclaveError> {
        let rows = sqlx::query(
            "SELECT id FROM executions WHERE status IN ('starting', 'running')",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| internal("query failed", e))?;
        let mut count = 0u64;
        for row in rows {
            let id_str: String = row.get("id");
            let id = ExecutionId(Uuid::parse_str(&id_str).map_err(|e| internal("invalid id", e))?);
            let raw = fetch_json(&self.pool, "executions", &id.0).await?.ok_or_else(|| ConclaveError::not_found("execution", id))?;
            let mut execution: Execution = decode(&raw)?;
            execution.status = ExecutionStatus::Cancelled;
            execution.end_time = Some(Utc::now());
            execution.logs.push(LogEntry::new(LogLevel::Warn, reason.to_string()));
            sqlx::query("UPDATE executions SET status = ?, data = ? WHERE id = ?")
                .bind(status_str(&execution.status))
                .bind(encode(&execution)?)
                .bind(id_str)
                .execute(&self.pool)
                .await
                .map_err(|e| internal("update failed", e))?;
            self.set_agent_status(execution.agent_id, AgentStatus::Idle).await?;
            count += 1;
        }
        Ok(count)
    }
}

async fn non_terminal_executions_for_agent(pool: &SqlitePool, agent_id: AgentId) -> Result<Vec<ExecutionId>, ConclaveError> {
    let rows = sqlx::query("SELECT id, data FROM executions WHERE agent_id = ?")
        .bind(agent_id.0.to_string())
        .fetch_all(pool)
        .await
        .map_err(|e| internal("query failed", e))?;
    let mut out = Vec::new();
    for row in rows {
        let execution: Execution = decode(&row.get::<String, _>("data"))?;
        if !execution.status.is_terminal() {
            out.push(execution.id);
        }
    }
    Ok(out)
}

async fn non_terminal_executions_for_task(pool: &SqlitePool, task_id: TaskId) -> Result<Vec<ExecutionId>, ConclaveError> {
    let rows = sqlx::query("SELECT id, data FROM executions WHERE task_id = ?")
        .bind(task_id.0.to_string())
        .fetch_all(pool)
        .await
        .map_err(|e| internal("query failed", e))?;
    let mut out = Vec::new();
    for row in rows {
        let execution: Execution = decode(&row.get::<String, _>("data"))?;
        if !execution.status.is_terminal() {
            out.push(execution.id);
        }
    }
    Ok(out)
}

async fn non_terminal_workflow_executions_for_pattern(
    pool: &SqlitePool,
    pattern_id: PatternId,
) -> Result<Vec<WorkflowExecutionId>, ConclaveError> {
    let rows = sqlx::query("SELECT data FROM workflow_executions WHERE pattern_id = ?")
        .bind(pattern_id.0.to_string())
        .fetch_all(pool)
        .await
        .map_err(|e| internal("query failed", e))?;
    let mut out = Vec::new();
    for row in rows {
        let run: WorkflowExecution = decode(&row.get::<String, _>("data"))?;
        if !run.status.is_terminal() {
            out.push(run.id);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

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
            memory_settings: HashMap::new(),
            execution_settings: HashMap::new(),
        }
    }

    fn task_spec(title: &str) -> TaskSpec {
        TaskSpec {
            title: title.to_string(),
            description: "do the thing".to_string(),
            expected_output: None,
            resources: vec![],
            dependencies: vec![],
            priority: conclave_types::TaskPriority::Medium,
            deadline: None,
            estimated_duration: Some(5),
            assigned_agents: vec![],
        }
    }

    #[tokio::test]
    async fn create_and_fetch_agent_round_trips() {
        let store = SqliteBackend::in_memory().await.unwrap();
        let agent = store.create_agent(agent_spec("alice")).await.unwrap();
        let fetched = store.get_agent(agent.id).await.unwrap();
        assert_eq!(fetched.name, "alice");
    }

    #[tokio::test]
    async fn duplicate_agent_name_conflicts() {
        let store = SqliteBackend::in_memory().await.unwrap();
        store.create_agent(agent_spec("bob")).await.unwrap();
        let err = store.create_agent(agent_spec("bob")).await.unwrap_err();
        assert_eq!(err.kind(), conclave_types::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let agent_id;
        {
            let store = SqliteBackend::open(&db_path).await.unwrap();
            let agent = store.create_agent(agent_spec("carol")).await.unwrap();
            agent_id = agent.id;
            store.close().await;
        }
        {
            let store = SqliteBackend::open(&db_path).await.unwrap();
            let fetched = store.get_agent(agent_id).await.unwrap();
            assert_eq!(fetched.name, "carol");
        }
    }

    #[tokio::test]
    async fn delete_task_blocked_by_non_terminal_execution() {
        let store = SqliteBackend::in_memory().await.unwrap();
        let agent = store.create_agent(agent_spec("dana")).await.unwrap();
        let task = store.create_task(task_spec("migrate db")).await.unwrap();
        store.create_execution(conclave_types::ExecutionId::new(), task.id, agent.id, "/tmp/work".into()).await.unwrap();
        let err = store.delete_task(task.id).await.unwrap_err();
        assert_eq!(err.kind(), conclave_types::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn cancel_active_executions_releases_agent() {
        let store = SqliteBackend::in_memory().await.unwrap();
        let agent = store.create_agent(agent_spec("erin")).await.unwrap();
        let task = store.create_task(task_spec("ship it")).await.unwrap();
        store.set_agent_status(agent.id, AgentStatus::Executing).await.unwrap();
        let execution = store.create_execution(conclave_types::ExecutionId::new(), task.id, agent.id, "/tmp/work".into()).await.unwrap();

        let cancelled = store.cancel_active_executions("system restart cleanup").await.unwrap();
        assert_eq!(cancelled, 1);
        let reloaded = store.get_execution(execution.id).await.unwrap();
        assert_eq!(reloaded.status, ExecutionStatus::Cancelled);
        let agent_reloaded = store.get_agent(agent.id).await.unwrap();
        assert_eq!(agent_reloaded.status, AgentStatus::Idle);
    }
}
