//! [`SubprocessRunner`]: runs the external code-assistant for one prompt.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use conclave_types::ConclaveError;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

/// Soft per-call deadline, in seconds, when the caller does not specify one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
/// Hard ceiling on the per-call deadline, in seconds; callers cannot exceed this.
pub const MAX_TIMEOUT_SECS: u64 = 600;
/// Default cap on the number of conversational turns requested per call.
pub const DEFAULT_MAX_TURNS: u32 = 2;

/// How to invoke the external code-assistant binary.
#[derive(Debug, Clone)]
pub struct SubprocessConfig {
    /// Executable name or path.
    pub command: String,
    /// Extra arguments appended after the built-in non-interactive flags.
    pub extra_args: Vec<String>,
}

impl Default for SubprocessConfig {
    fn default() -> Self {
        Self { command: "claude".to_string(), extra_args: Vec::new() }
    }
}

/// The outcome of a successful [`SubprocessRunner::run`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct SubprocessOutcome {
    /// Concatenated text across every structured chunk received, truncated to 1000 chars.
    pub aggregated_text: String,
    /// Number of structured chunks received.
    pub messages_count: u32,
    /// The working directory the subprocess ran in.
    pub work_directory: String,
}

/// Runs the external code-assistant process for one prompt and streams its output.
pub struct SubprocessRunner {
    config: SubprocessConfig,
}

impl SubprocessRunner {
    /// Build a runner with the given invocation config.
    pub fn new(config: SubprocessConfig) -> Self {
        Self { config }
    }

    /// Run `prompt` against the configured binary inside `work_directory`, which is
    /// created if it does not already exist. `max_turns` and `deadline_seconds` bound
    /// the call; `deadline_seconds` is clamped to [`MAX_TIMEOUT_SECS`].
    pub async fn run(
        &self,
        prompt: &str,
        work_directory: &str,
        max_turns: u32,
        deadline_seconds: u64,
    ) -> Result<SubprocessOutcome, ConclaveError> {
        let deadline = Duration::from_secs(deadline_seconds.min(MAX_TIMEOUT_SECS));
        tokio::fs::create_dir_all(work_directory)
            .await
            .map_err(|e| ConclaveError::internal(format!("failed to create work directory: {e}")))?;

        match tokio::time::timeout(deadline, self.execute(prompt, work_directory, max_turns)).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(ConclaveError::timeout(deadline.as_secs())),
        }
    }

    async fn execute(
        &self,
        prompt: &str,
        work_directory: &str,
        max_turns: u32,
    ) -> Result<SubprocessOutcome, ConclaveError> {
        let mut cmd = Command::new(&self.config.command);
        cmd.current_dir(Path::new(work_directory))
            .arg("--print")
            .arg("--output-format")
            .arg("stream-json")
            .arg("--max-turns")
            .arg(max_turns.to_string())
            .arg("--permission-mode")
            .arg("acceptEdits")
            .args(&self.config.extra_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| ConclaveError::subprocess_failure(format!("failed to spawn: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| ConclaveError::subprocess_failure(format!("failed to write prompt: {e}")))?;
            stdin
                .shutdown()
                .await
                .map_err(|e| ConclaveError::subprocess_failure(format!("failed to close stdin: {e}")))?;
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ConclaveError::subprocess_failure("no stdout handle"))?;
        let mut lines = BufReader::new(stdout).lines();

        let mut aggregated_text = String::new();
        let mut messages_count = 0u32;
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| ConclaveError::subprocess_failure(format!("failed to read stdout: {e}")))?
        {
            if line.trim().is_empty() {
                continue;
            }
            messages_count += 1;
            if let Ok(chunk) = serde_json::from_str::<serde_json::Value>(&line) {
                if let Some(text) = chunk.get("text").and_then(|v| v.as_str()) {
                    aggregated_text.push_str(text);
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| ConclaveError::subprocess_failure(format!("failed to wait: {e}")))?;
        if !status.success() {
            return Err(ConclaveError::subprocess_failure(format!(
                "process exited with {status}"
            )));
        }

        aggregated_text.truncate(1000);
        Ok(SubprocessOutcome {
            aggregated_text,
            messages_count,
            work_directory: work_directory.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_missing_work_directory_before_spawn_attempt() {
        let dir = tempfile_dir();
        let runner = SubprocessRunner::new(SubprocessConfig {
            command: "definitely-not-a-real-binary-xyz".to_string(),
            extra_args: vec![],
        });
        let result = runner.run("hello", dir.to_str().unwrap(), DEFAULT_MAX_TURNS, 5).await;
        assert!(result.is_err());
        assert!(dir.exists());
    }

    fn tempfile_dir() -> std::path::PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("conclave-subprocess-test-{}", uuid::Uuid::new_v4()));
        dir
    }
}
