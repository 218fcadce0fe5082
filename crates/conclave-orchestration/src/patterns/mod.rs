//! The seven coordination patterns, dispatched by [`conclave_types::WorkflowType`].

mod adaptive;
mod evaluator_optimizer;
mod orchestrator;
mod parallel;
mod router;
mod sequential;
mod swarm;

use conclave_types::{Agent, ConclaveError, PatternConfig, Task, WorkflowType};

use crate::support::PatternContext;

/// Run the pattern named by `workflow_type` over `agents` and `tasks`, returning the
/// pattern-specific metrics payload described in each submodule.
pub(crate) async fn execute(
    workflow_type: WorkflowType,
    ctx: &PatternContext,
    agents: &[Agent],
    tasks: &[Task],
    config: &PatternConfig,
) -> Result<serde_json::Value, ConclaveError> {
    match workflow_type {
        WorkflowType::Sequential => sequential::run(ctx, agents, tasks, config).await,
        WorkflowType::Parallel => parallel::run(ctx, agents, tasks, config).await,
        WorkflowType::Router => router::run(ctx, agents, tasks, config).await,
        WorkflowType::EvaluatorOptimizer => evaluator_optimizer::run(ctx, agents, tasks, config).await,
        WorkflowType::Swarm => swarm::run(ctx, agents, tasks, config).await,
        WorkflowType::Orchestrator => orchestrator::run(ctx, agents, tasks, config).await,
        WorkflowType::Adaptive => adaptive::run(ctx, agents, tasks, config).await,
    }
}
