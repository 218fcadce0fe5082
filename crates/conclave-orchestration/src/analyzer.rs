//! [`WorkflowAnalyzer`]: a pure, side-effect-free recommender for which coordination
//! pattern best fits a given set of agents, tasks, and objective.

use conclave_types::{Agent, Task, WorkflowType};
use serde::{Deserialize, Serialize};

const COMPLEXITY_KEYWORDS: &[&str] = &["complex", "analyze", "optimize", "coordinate", "integrate"];

/// Output of [`WorkflowAnalyzer::recommend`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecommendation {
    /// The suggested coordination pattern.
    pub recommended_pattern: WorkflowType,
    /// Estimated complexity in 0.0..=1.0, one entry per input task, in order.
    pub task_complexity: Vec<f64>,
    /// Confidence in the recommendation, in 0.0..=1.0.
    pub confidence: f64,
    /// Risks worth flagging to the caller before committing to this pattern.
    pub risks: Vec<String>,
    /// Pattern-specific suggestions for getting the most out of the chosen pattern.
    pub suggestions: Vec<String>,
}

fn complexity(task: &Task) -> f64 {
    if task.description.is_empty() {
        return 0.5;
    }
    let len_component = task.description.chars().count() as f64 / 200.0;
    let desc = task.description.to_lowercase();
    let hits = COMPLEXITY_KEYWORDS.iter().filter(|kw| desc.contains(*kw)).count();
    (len_component + hits as f64 / 10.0).clamp(0.0, 1.0)
}

fn pattern_from_objective(objective: &str) -> Option<(WorkflowType, &'static str)> {
    let objective = objective.to_lowercase();
    let hits = [
        (["review", "optimize", "iterate"], WorkflowType::EvaluatorOptimizer),
        (["route", "assign", "distribute"], WorkflowType::Router),
        (["collaborate", "swarm", "emergent"], WorkflowType::Swarm),
        (["parallel", "concurrent", ""], WorkflowType::Parallel),
        (["sequential", "step", "order"], WorkflowType::Sequential),
    ];
    for (keywords, pattern) in hits {
        for kw in keywords {
            if !kw.is_empty() && objective.contains(kw) {
                return Some((pattern, kw));
            }
        }
    }
    None
}

fn pattern_from_counts(agents: &[Agent], tasks: &[Task], complexities: &[f64]) -> WorkflowType {
    let (n_agents, n_tasks) = (agents.len(), tasks.len());
    if n_agents == 1 {
        return WorkflowType::Sequential;
    }
    if n_agents > 5 && n_tasks > 5 {
        return WorkflowType::Orchestrator;
    }
    if n_tasks > 2 * n_agents {
        return WorkflowType::Router;
    }
    if n_agents > 3 && complexities.iter().all(|c| *c > 0.7) {
        return WorkflowType::Swarm;
    }
    if complexities.iter().all(|c| *c <= 0.5) {
        return WorkflowType::Parallel;
    }
    WorkflowType::Orchestrator
}

fn suggestions_for(pattern: WorkflowType, agents: &[Agent], tasks: &[Task]) -> Vec<String> {
    match pattern {
        WorkflowType::Orchestrator => vec![
            "use priority queues to keep high-value tasks from starving behind bulk work".to_string(),
        ],
        WorkflowType::Parallel => {
            let mut s = Vec::new();
            if agents.len() < tasks.len() {
                s.push("grow the agent pool so each task gets its own worker".to_string());
            }
            s
        }
        WorkflowType::Swarm => {
            vec!["introduce a consensus mechanism so overlapping slices converge on one answer".to_string()]
        }
        WorkflowType::Router => vec!["keep agent role labels specific so routing keywords stay discriminating".to_string()],
        WorkflowType::EvaluatorOptimizer => {
            vec!["set success_threshold below 1.0 so a good-enough result still terminates the loop".to_string()]
        }
        WorkflowType::Sequential => vec!["order tasks by dependency so an early failure halts the fewest completions".to_string()],
        WorkflowType::Adaptive => vec!["revisit the chosen sub-strategy once the task/agent ratio changes".to_string()],
    }
}

/// Recommends a coordination pattern without ever touching the store or bus; same
/// input always yields the same output.
pub struct WorkflowAnalyzer;

impl WorkflowAnalyzer {
    /// Produce a recommendation for running `tasks` with `agents`, optionally guided
    /// by a free-text `objective`.
    pub fn recommend(agents: &[Agent], tasks: &[Task], objective: Option<&str>) -> WorkflowRecommendation {
        let task_complexity: Vec<f64> = tasks.iter().map(complexity).collect();

        let (pattern, objective_hit) = match objective.and_then(pattern_from_objective) {
            Some((pattern, kw)) => (pattern, Some(kw)),
            None => (pattern_from_counts(agents, tasks, &task_complexity), None),
        };

        let mut confidence = 0.7;
        if objective_hit.is_some() {
            confidence += 0.1;
        }
        if pattern == WorkflowType::Orchestrator && agents.len() > 3 {
            confidence += 0.1;
        }
        if pattern == WorkflowType::Parallel && tasks.len() <= agents.len() {
            confidence += 0.1;
        }
        let confidence = confidence.min(1.0);

        let mut risks = Vec::new();
        if agents.len() > 5 {
            risks.push("large agent pool: coordination overhead may dominate".to_string());
        }
        if tasks.len() > 10 {
            risks.push("large task count: consider batching".to_string());
        }
        if task_complexity.iter().filter(|c| **c > 0.7).count() > 3 {
            risks.push("more than 3 high-complexity tasks: expect slower convergence".to_string());
        }
        if agents.len() == 1 && tasks.len() > 5 {
            risks.push("single agent handling more than 5 tasks: bottleneck risk".to_string());
        }

        WorkflowRecommendation {
            recommended_pattern: pattern,
            task_complexity,
            confidence,
            risks,
            suggestions: suggestions_for(pattern, agents, tasks),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use conclave_types::{AgentId, AgentStatus, TaskId, TaskPriority, TaskStatus};
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn agent() -> Agent {
        Agent {
            id: AgentId::new(),
            name: "Alice".to_string(),
            role: "backend".to_string(),
            description: String::new(),
            system_prompt: "You are Alice.".to_string(),
            capabilities: Vec::new(),
            tools: Vec::new(),
            objectives: Vec::new(),
            constraints: Vec::new(),
            memory_settings: HashMap::new(),
            execution_settings: HashMap::new(),
            status: AgentStatus::Idle,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_active: None,
        }
    }

    fn task(description: &str) -> Task {
        Task {
            id: TaskId::new(),
            title: "t".to_string(),
            description: description.to_string(),
            expected_output: None,
            resources: Vec::new(),
            dependencies: Vec::new(),
            priority: TaskPriority::Medium,
            deadline: None,
            estimated_duration: None,
            status: TaskStatus::Pending,
            results: None,
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            started_at: None,
            completed_at: None,
            assigned_agents: Vec::new(),
        }
    }

    #[test]
    fn single_agent_always_recommends_sequential() {
        let rec = WorkflowAnalyzer::recommend(&[agent()], &[task(""), task("")], None);
        assert_eq!(rec.recommended_pattern, WorkflowType::Sequential);
    }

    #[test]
    fn objective_keyword_overrides_count_based_choice() {
        let agents = vec![agent(), agent()];
        let tasks = vec![task("short")];
        let rec = WorkflowAnalyzer::recommend(&agents, &tasks, Some("please route and assign this"));
        assert_eq!(rec.recommended_pattern, WorkflowType::Router);
        assert!(rec.confidence > 0.7);
    }

    #[test]
    fn is_deterministic_for_identical_input() {
        let agents = vec![agent(), agent(), agent()];
        let tasks = vec![task("a"), task("b"), task("c")];
        let first = WorkflowAnalyzer::recommend(&agents, &tasks, None);
        let second = WorkflowAnalyzer::recommend(&agents, &tasks, None);
        assert_eq!(first, second);
    }

    #[test]
    fn single_agent_with_many_tasks_flags_bottleneck_risk() {
        let tasks: Vec<Task> = (0..6).map(|_| task("x")).collect();
        let rec = WorkflowAnalyzer::recommend(&[agent()], &tasks, None);
        assert!(rec.risks.iter().any(|r| r.contains("bottleneck")));
    }

    proptest! {
        #[test]
        fn recommend_is_deterministic_for_any_shape(
            n_agents in 1usize..8,
            n_tasks in 1usize..8,
            description in "[a-z ]{0,40}",
        ) {
            let agents: Vec<Agent> = (0..n_agents).map(|_| agent()).collect();
            let tasks: Vec<Task> = (0..n_tasks).map(|_| task(&description)).collect();
            let first = WorkflowAnalyzer::recommend(&agents, &tasks, None);
            let second = WorkflowAnalyzer::recommend(&agents, &tasks, None);
            prop_assert_eq!(first, second);
        }
    }
}
