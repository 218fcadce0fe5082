//! Evaluator-Optimizer: iterative quality-gated refinement over the same
//! (agent, task) pairing, using a synthetic quality score.

use std::time::Duration;

use conclave_types::{Agent, ConclaveError, PatternConfig, Task};

use crate::support::{advance, record_message, start_child, wait_terminal, PatternContext};

/// Upper bound on how long one iteration's child executions are awaited.
pub const PER_CHILD_WAIT: Duration = Duration::from_secs(180);

fn synthetic_quality(iteration: u32, task_index: usize) -> f64 {
    (0.60 + 0.15 * f64::from(iteration - 1) + 0.05 * task_index as f64).min(0.95)
}

pub(crate) async fn run(
    ctx: &PatternContext,
    agents: &[Agent],
    tasks: &[Task],
    config: &PatternConfig,
) -> Result<serde_json::Value, ConclaveError> {
    let mut initial_quality = None;
    let mut final_quality = 0.0;
    let mut iterations_completed = 0u32;
    let mut threshold_achieved = false;

    for k in 1..=config.max_iterations.max(1) {
        let mut iteration_scores = Vec::with_capacity(tasks.len());

        for (i, task) in tasks.iter().enumerate() {
            let agent = &agents[i % agents.len()];
            let execution = start_child(&ctx.engine, agent.id, task.id, &ctx.project_directory).await?;
            wait_terminal(&*ctx.store, execution.id, PER_CHILD_WAIT).await;

            let quality = synthetic_quality(k, i);
            iteration_scores.push(quality);

            record_message(
                &*ctx.store,
                &*ctx.bus,
                ctx.workflow_execution_id,
                ctx.enable_agent_communication,
                Some(agent.id),
                None,
                "quality_scored",
                format!("iteration {k}: '{}' scored {quality:.2}", task.title),
                None,
            )
            .await;
        }

        let mean = iteration_scores.iter().sum::<f64>() / iteration_scores.len().max(1) as f64;
        initial_quality.get_or_insert(mean);
        final_quality = mean;
        iterations_completed = k;

        advance(
            &*ctx.store,
            ctx.workflow_execution_id,
            format!("iteration {k}/{}", config.max_iterations),
            0.2 + 0.7 * (f64::from(k) / f64::from(config.max_iterations.max(1))),
        )
        .await;

        if mean >= config.success_threshold {
            threshold_achieved = true;
            break;
        }
    }

    let initial_quality = initial_quality.unwrap_or(0.0);
    Ok(serde_json::json!({
        "initial_quality": initial_quality,
        "final_quality": final_quality,
        "quality_improvement": final_quality - initial_quality,
        "iterations_completed": iterations_completed,
        "threshold_achieved": threshold_achieved,
    }))
}
