//! Adaptive: picks a sub-strategy from the shape of the input, then executes it.

use std::time::Duration;

use conclave_types::{Agent, ConclaveError, ExecutionStatus, PatternConfig, Task};
use futures::future::join_all;

use super::router;
use crate::support::{advance, record_message, start_child, wait_terminal, PatternContext};

/// Wait bound shared with Evaluator-Optimizer's sequential-like wait.
pub const PER_CHILD_WAIT: Duration = Duration::from_secs(180);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubStrategy {
    ParallelAdaptive,
    SequentialAdaptive,
    RouterAdaptive,
}

impl SubStrategy {
    fn as_str(self) -> &'static str {
        match self {
            Self::ParallelAdaptive => "parallel_adaptive",
            Self::SequentialAdaptive => "sequential_adaptive",
            Self::RouterAdaptive => "router_adaptive",
        }
    }
}

fn choose(agents: &[Agent], tasks: &[Task]) -> SubStrategy {
    let mean_desc_len = if tasks.is_empty() {
        0.0
    } else {
        tasks.iter().map(|t| t.description.chars().count()).sum::<usize>() as f64 / tasks.len() as f64
    };
    if agents.len() > tasks.len() && mean_desc_len < 100.0 {
        SubStrategy::ParallelAdaptive
    } else if tasks.len() > 2 * agents.len() {
        SubStrategy::SequentialAdaptive
    } else {
        SubStrategy::RouterAdaptive
    }
}

async fn run_parallel_adaptive(
    ctx: &PatternContext,
    agents: &[Agent],
    tasks: &[Task],
) -> Result<(usize, usize), ConclaveError> {
    let futures = tasks.iter().enumerate().map(|(i, task)| {
        let agent = &agents[i % agents.len()];
        async move {
            let execution = start_child(&ctx.engine, agent.id, task.id, &ctx.project_directory).await?;
            let finished = wait_terminal(&*ctx.store, execution.id, PER_CHILD_WAIT).await;
            Ok::<bool, ConclaveError>(finished.status == ExecutionStatus::Completed)
        }
    });
    let outcomes = join_all(futures).await.into_iter().collect::<Result<Vec<_>, _>>()?;
    let successful = outcomes.iter().filter(|ok| **ok).count();
    Ok((successful, outcomes.len()))
}

async fn run_sequential_adaptive(
    ctx: &PatternContext,
    agents: &[Agent],
    tasks: &[Task],
) -> Result<(usize, usize), ConclaveError> {
    let mut successful = 0;
    for (i, task) in tasks.iter().enumerate() {
        let agent = &agents[i % agents.len()];
        advance(
            &*ctx.store,
            ctx.workflow_execution_id,
            format!("adaptive sequential task {}/{}", i + 1, tasks.len()),
            0.2 + 0.7 * ((i + 1) as f64 / tasks.len().max(1) as f64),
        )
        .await;
        let execution = start_child(&ctx.engine, agent.id, task.id, &ctx.project_directory).await?;
        let finished = wait_terminal(&*ctx.store, execution.id, PER_CHILD_WAIT).await;
        if finished.status != ExecutionStatus::Completed {
            break;
        }
        successful += 1;
    }
    Ok((successful, tasks.len()))
}

async fn run_router_adaptive(
    ctx: &PatternContext,
    agents: &[Agent],
    tasks: &[Task],
) -> Result<(usize, usize), ConclaveError> {
    for task in tasks {
        let (agent, _points, reason) = router::best_agent(agents, task);
        start_child(&ctx.engine, agent.id, task.id, &ctx.project_directory).await?;
        record_message(
            &*ctx.store,
            &*ctx.bus,
            ctx.workflow_execution_id,
            ctx.enable_agent_communication,
            None,
            Some(agent.id),
            "child_started",
            format!("adaptively routed '{}' to {} ({reason})", task.title, agent.name),
            None,
        )
        .await;
    }
    Ok((tasks.len(), tasks.len()))
}

pub(crate) async fn run(
    ctx: &PatternContext,
    agents: &[Agent],
    tasks: &[Task],
    _config: &PatternConfig,
) -> Result<serde_json::Value, ConclaveError> {
    let strategy = choose(agents, tasks);
    let (successful, total) = match strategy {
        SubStrategy::ParallelAdaptive => run_parallel_adaptive(ctx, agents, tasks).await?,
        SubStrategy::SequentialAdaptive => run_sequential_adaptive(ctx, agents, tasks).await?,
        SubStrategy::RouterAdaptive => run_router_adaptive(ctx, agents, tasks).await?,
    };
    let efficiency = successful as f64 / total.max(1) as f64;

    Ok(serde_json::json!({
        "chosen_strategy": strategy.as_str(),
        "adaptation_efficiency": efficiency,
        "adaptive_intelligence_score": efficiency * 0.92,
    }))
}
