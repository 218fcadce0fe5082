#![forbid(unsafe_code)]

//! **conclave-cli** – Command-line interface for Conclave.
//!
//! Manage agents, tasks, and workflow patterns against a chosen store backend, drive
//! executions and workflow runs directly, or run in daemon mode to host the execution
//! engine and orchestrator while listening for bus events.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use conclave_bus::{EventBus, InMemoryBus};
use conclave_execution::{EngineConfig, ExecutionEngine, StartExecutionRequest, StartupReconciler};
use conclave_orchestration::{OrchestratorCore, WorkflowAnalyzer, WorkflowReconciler};
use conclave_store_core::{Page, StoreGateway};
use conclave_store_memory::MemoryBackend;
use conclave_store_sqlite::SqliteBackend;
use conclave_subprocess::{SubprocessConfig, SubprocessRunner};
use conclave_types::{
    AgentId, AgentSpec, PatternConfig, PatternId, TaskId, TaskPriority, TaskSpec, WorkflowPatternSpec,
    WorkflowType,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

//─────────────────────────────
//  CLI structure
//─────────────────────────────

#[derive(Parser)]
#[command(name = "conclave")]
#[command(about = "Conclave - multi-agent execution and orchestration platform")]
#[command(version)]
struct Cli {
    /// Storage backend to use (memory, sqlite)
    #[arg(long, default_value = "memory")]
    storage: String,

    /// Database path for the sqlite backend
    #[arg(long, default_value = "conclave.db")]
    db_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Command or path used to invoke the external code-assistant
    #[arg(long, default_value = "claude")]
    assistant_command: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new agent
    AgentCreate {
        #[arg(long)]
        name: String,
        #[arg(long)]
        role: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        system_prompt: String,
        /// Comma-separated capability tags
        #[arg(long, default_value = "")]
        capabilities: String,
    },
    /// List agents
    AgentList,
    /// Fetch a single agent
    AgentGet {
        #[arg(long)]
        id: uuid::Uuid,
    },
    /// Delete an agent
    AgentDelete {
        #[arg(long)]
        id: uuid::Uuid,
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Create a new task
    TaskCreate {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        /// low, medium, high, urgent
        #[arg(long, default_value = "medium")]
        priority: String,
        /// Comma-separated agent ids to assign at creation
        #[arg(long, default_value = "")]
        assigned_agents: String,
    },
    /// List tasks
    TaskList,
    /// Fetch a single task
    TaskGet {
        #[arg(long)]
        id: uuid::Uuid,
    },
    /// Delete a task
    TaskDelete {
        #[arg(long)]
        id: uuid::Uuid,
    },
    /// Start an execution for a task
    ExecutionStart {
        #[arg(long)]
        task: uuid::Uuid,
        /// Comma-separated agent ids; falls back to the task's assigned agents
        #[arg(long, default_value = "")]
        agents: String,
        #[arg(long)]
        work_directory: Option<String>,
        #[arg(long, default_value_t = false)]
        force_restart: bool,
    },
    /// Pause a running execution
    ExecutionPause {
        #[arg(long)]
        id: uuid::Uuid,
    },
    /// Resume a paused execution
    ExecutionResume {
        #[arg(long)]
        id: uuid::Uuid,
    },
    /// Abort an execution
    ExecutionAbort {
        #[arg(long)]
        id: uuid::Uuid,
    },
    /// Fetch a single execution
    ExecutionGet {
        #[arg(long)]
        id: uuid::Uuid,
    },
    /// List executions
    ExecutionList,
    /// Create a new workflow pattern
    PatternCreate {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// sequential, parallel, router, evaluator_optimizer, swarm, orchestrator, adaptive
        #[arg(long)]
        workflow_type: String,
        /// Comma-separated agent ids
        #[arg(long)]
        agents: String,
        /// Comma-separated task ids
        #[arg(long)]
        tasks: String,
        #[arg(long)]
        project_directory: String,
        #[arg(long)]
        objective: Option<String>,
    },
    /// List workflow patterns
    PatternList,
    /// Fetch a single workflow pattern
    PatternGet {
        #[arg(long)]
        id: uuid::Uuid,
    },
    /// Delete a workflow pattern
    PatternDelete {
        #[arg(long)]
        id: uuid::Uuid,
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Execute a workflow pattern
    WorkflowExecute {
        #[arg(long)]
        pattern: uuid::Uuid,
    },
    /// Abort a running workflow execution
    WorkflowAbort {
        #[arg(long)]
        id: uuid::Uuid,
    },
    /// Fetch a single workflow execution
    WorkflowGet {
        #[arg(long)]
        id: uuid::Uuid,
    },
    /// List workflow executions
    WorkflowList,
    /// Recommend a coordination pattern for a set of agents and tasks
    Recommend {
        /// Comma-separated agent ids
        #[arg(long)]
        agents: String,
        /// Comma-separated task ids
        #[arg(long)]
        tasks: String,
        #[arg(long)]
        objective: Option<String>,
    },
    /// Print execution engine status
    Status,
    /// Run startup reconciliation, then host the engine and listen for bus events
    Daemon,
}

//─────────────────────────────
//  Main application
//─────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level)?;
    info!("Starting Conclave CLI v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn StoreGateway> = match cli.storage.to_lowercase().as_str() {
        "memory" => Arc::new(MemoryBackend::new()),
        "sqlite" => Arc::new(SqliteBackend::open(&cli.db_path).await?),
        other => return Err(anyhow!("unsupported storage backend: {other} (use memory or sqlite)")),
    };

    let bus: Arc<dyn EventBus> = Arc::new(InMemoryBus::new());
    let runner = Arc::new(SubprocessRunner::new(SubprocessConfig {
        command: cli.assistant_command.clone(),
        extra_args: Vec::new(),
    }));
    let engine_config = EngineConfig::default();
    let engine = Arc::new(ExecutionEngine::new(
        store.clone(),
        bus.clone(),
        runner,
        engine_config.clone(),
    ));
    let orchestrator = OrchestratorCore::new(store.clone(), bus.clone(), engine.clone());

    match cli.command {
        Commands::AgentCreate { name, role, description, system_prompt, capabilities } => {
            let spec = AgentSpec {
                name,
                role,
                description,
                system_prompt,
                capabilities: split_csv(&capabilities),
                tools: Vec::new(),
                objectives: Vec::new(),
                constraints: Vec::new(),
                memory_settings: HashMap::new(),
                execution_settings: HashMap::new(),
            };
            let agent = store.create_agent(spec).await?;
            print_json(&agent)?;
        }
        Commands::AgentList => {
            let agents = store.list_agents(Page::default()).await?;
            print_json(&agents)?;
        }
        Commands::AgentGet { id } => {
            let agent = store.get_agent(AgentId(id)).await?;
            print_json(&agent)?;
        }
        Commands::AgentDelete { id, force } => {
            store.delete_agent(AgentId(id), force).await?;
            println!("agent {id} deleted");
        }
        Commands::TaskCreate { title, description, priority, assigned_agents } => {
            let spec = TaskSpec {
                title,
                description,
                expected_output: None,
                resources: Vec::new(),
                dependencies: Vec::new(),
                priority: parse_priority(&priority)?,
                deadline: None,
                estimated_duration: None,
                assigned_agents: split_csv(&assigned_agents)
                    .into_iter()
                    .map(|s| parse_agent_id(&s))
                    .collect::<Result<Vec<_>>>()?,
            };
            let task = store.create_task(spec).await?;
            print_json(&task)?;
        }
        Commands::TaskList => {
            let tasks = store.list_tasks(Page::default()).await?;
            print_json(&tasks)?;
        }
        Commands::TaskGet { id } => {
            let task = store.get_task(TaskId(id)).await?;
            print_json(&task)?;
        }
        Commands::TaskDelete { id } => {
            store.delete_task(TaskId(id)).await?;
            println!("task {id} deleted");
        }
        Commands::ExecutionStart { task, agents, work_directory, force_restart } => {
            let agent_ids = split_csv(&agents);
            let request = StartExecutionRequest {
                task_id: TaskId(task),
                agent_ids: if agent_ids.is_empty() {
                    None
                } else {
                    Some(agent_ids.into_iter().map(|s| parse_agent_id(&s)).collect::<Result<Vec<_>>>()?)
                },
                work_directory,
                force_restart,
            };
            let execution = engine.start_task_execution(request).await?;
            print_json(&execution)?;
        }
        Commands::ExecutionPause { id } => {
            let execution = engine.pause_execution(conclave_types::ExecutionId(id)).await?;
            print_json(&execution)?;
        }
        Commands::ExecutionResume { id } => {
            let execution = engine.resume_execution(conclave_types::ExecutionId(id)).await?;
            print_json(&execution)?;
        }
        Commands::ExecutionAbort { id } => {
            let execution = engine.abort_execution(conclave_types::ExecutionId(id)).await?;
            print_json(&execution)?;
        }
        Commands::ExecutionGet { id } => {
            let execution = engine.get_execution(conclave_types::ExecutionId(id)).await?;
            print_json(&execution)?;
        }
        Commands::ExecutionList => {
            let executions = engine.list_executions(Page::default()).await?;
            print_json(&executions)?;
        }
        Commands::PatternCreate {
            name,
            description,
            workflow_type,
            agents,
            tasks,
            project_directory,
            objective,
        } => {
            let spec = WorkflowPatternSpec {
                name,
                description,
                workflow_type: parse_workflow_type(&workflow_type)?,
                agent_ids: split_csv(&agents).into_iter().map(|s| parse_agent_id(&s)).collect::<Result<Vec<_>>>()?,
                task_ids: split_csv(&tasks).into_iter().map(|s| parse_task_id(&s)).collect::<Result<Vec<_>>>()?,
                dependencies: HashMap::new(),
                config: PatternConfig::default(),
                user_objective: objective,
                project_directory,
            };
            let pattern = store.create_pattern(spec).await?;
            print_json(&pattern)?;
        }
        Commands::PatternList => {
            let patterns = store.list_patterns(None, Page::default()).await?;
            print_json(&patterns)?;
        }
        Commands::PatternGet { id } => {
            let pattern = store.get_pattern(PatternId(id)).await?;
            print_json(&pattern)?;
        }
        Commands::PatternDelete { id, force } => {
            store.delete_pattern(PatternId(id), force).await?;
            println!("pattern {id} deleted");
        }
        Commands::WorkflowExecute { pattern } => {
            let run = orchestrator.execute_workflow(PatternId(pattern)).await?;
            print_json(&run)?;
        }
        Commands::WorkflowAbort { id } => {
            let run = orchestrator
                .abort_workflow_execution(conclave_types::WorkflowExecutionId(id))
                .await?;
            print_json(&run)?;
        }
        Commands::WorkflowGet { id } => {
            let run = store.get_workflow_execution(conclave_types::WorkflowExecutionId(id)).await?;
            print_json(&run)?;
        }
        Commands::WorkflowList => {
            let runs = store.list_workflow_executions(Page::default()).await?;
            print_json(&runs)?;
        }
        Commands::Recommend { agents, tasks, objective } => {
            let agent_ids = split_csv(&agents).into_iter().map(|s| parse_agent_id(&s)).collect::<Result<Vec<_>>>()?;
            let task_ids = split_csv(&tasks).into_iter().map(|s| parse_task_id(&s)).collect::<Result<Vec<_>>>()?;
            let resolved_agents = store.list_agents_by_ids(&agent_ids).await?;
            let mut resolved_tasks = Vec::with_capacity(task_ids.len());
            for id in task_ids {
                resolved_tasks.push(store.get_task(id).await?);
            }
            let recommendation = WorkflowAnalyzer::recommend(&resolved_agents, &resolved_tasks, objective.as_deref());
            print_json(&recommendation)?;
        }
        Commands::Status => {
            let status = engine.get_system_status().await;
            print_json(&status)?;
        }
        Commands::Daemon => {
            run_daemon(store, bus, engine_config).await?;
        }
    }

    Ok(())
}

//─────────────────────────────
//  Daemon mode
//─────────────────────────────

async fn run_daemon(store: Arc<dyn StoreGateway>, bus: Arc<dyn EventBus>, config: EngineConfig) -> Result<()> {
    println!("starting conclave daemon");

    let startup = StartupReconciler::new(store.clone());
    let (deleted, cancelled) = startup.reconcile().await?;
    info!(deleted, cancelled, "execution-scoped startup reconciliation complete");

    let workflow_reconciler = WorkflowReconciler::new(store.clone(), config.stale_after);
    let (aborted, aged_deleted) = workflow_reconciler.reconcile().await?;
    info!(aborted, aged_deleted, "workflow-scoped startup reconciliation complete");

    println!("listening for bus events (press Ctrl+C to stop)");
    let mut subscription = bus.subscribe(std::collections::HashSet::from([conclave_bus::WILDCARD_TAG.to_string()]));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = subscription.recv() => {
                match event {
                    Some(event) => info!(topic = event.topic.as_str(), event_type = %event.event_type, "event received"),
                    None => {
                        error!("bus subscription closed");
                        break;
                    }
                }
            }
            _ = &mut ctrl_c => {
                println!("shutdown signal received");
                break;
            }
        }
    }

    println!("daemon stopped");
    Ok(())
}

//─────────────────────────────
//  Utility functions
//─────────────────────────────

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

fn parse_agent_id(raw: &str) -> Result<AgentId> {
    Ok(AgentId(raw.parse().map_err(|_| anyhow!("invalid agent id: {raw}"))?))
}

fn parse_task_id(raw: &str) -> Result<TaskId> {
    Ok(TaskId(raw.parse().map_err(|_| anyhow!("invalid task id: {raw}"))?))
}

fn parse_priority(raw: &str) -> Result<TaskPriority> {
    match raw.to_lowercase().as_str() {
        "low" => Ok(TaskPriority::Low),
        "medium" => Ok(TaskPriority::Medium),
        "high" => Ok(TaskPriority::High),
        "urgent" => Ok(TaskPriority::Urgent),
        other => Err(anyhow!("unsupported priority: {other} (use low, medium, high, urgent)")),
    }
}

fn parse_workflow_type(raw: &str) -> Result<WorkflowType> {
    match raw.to_lowercase().as_str() {
        "sequential" => Ok(WorkflowType::Sequential),
        "parallel" => Ok(WorkflowType::Parallel),
        "router" => Ok(WorkflowType::Router),
        "evaluator_optimizer" => Ok(WorkflowType::EvaluatorOptimizer),
        "swarm" => Ok(WorkflowType::Swarm),
        "orchestrator" => Ok(WorkflowType::Orchestrator),
        "adaptive" => Ok(WorkflowType::Adaptive),
        other => Err(anyhow!(
            "unsupported workflow type: {other} (use sequential, parallel, router, evaluator_optimizer, swarm, orchestrator, adaptive)"
        )),
    }
}
