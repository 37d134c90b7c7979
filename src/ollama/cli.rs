use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::catalog::parse_list_output;
use crate::constants::{CLI_LIST_TIMEOUT_SECS, CLI_PULL_TIMEOUT_SECS, OLLAMA_BINARY, OLLAMA_PLATFORM_PATH};
use crate::utils::{or_else_try, ProviderError};

/// The local `ollama` command-line tool, used when the HTTP API fails
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OllamaCli: Send + Sync {
    /// Names of locally installed models
    async fn list_models(&self) -> Result<Vec<String>, ProviderError>;

    /// Download a model, blocking until it is installed
    async fn pull_model(&self, model: &str) -> Result<(), ProviderError>;
}

/// Check if Ollama is installed on the system
pub fn is_installed() -> bool {
    which::which(OLLAMA_BINARY).is_ok() || std::path::Path::new(OLLAMA_PLATFORM_PATH).exists()
}

/// Runs the real `ollama` binary as an async subprocess.
///
/// Every invocation tries `ollama` on the PATH first and then the
/// platform's default install location.
#[derive(Debug, Clone)]
pub struct SystemOllamaCli {
    program: String,
    fallback_program: String,
    list_timeout: Duration,
    pull_timeout: Duration,
}

impl Default for SystemOllamaCli {
    fn default() -> Self {
        Self {
            program: OLLAMA_BINARY.to_string(),
            fallback_program: OLLAMA_PLATFORM_PATH.to_string(),
            list_timeout: Duration::from_secs(CLI_LIST_TIMEOUT_SECS),
            pull_timeout: Duration::from_secs(CLI_PULL_TIMEOUT_SECS),
        }
    }
}

impl SystemOllamaCli {
    pub fn new(pull_timeout: Duration) -> Self {
        Self {
            pull_timeout,
            ..Default::default()
        }
    }

    /// Use other executables in place of `ollama` and its install path
    pub fn with_programs(mut self, program: impl Into<String>, fallback_program: impl Into<String>) -> Self {
        self.program = program.into();
        self.fallback_program = fallback_program.into();
        self
    }

    async fn run_with_fallback(&self, args: &[&str], timeout: Duration) -> Result<String, ProviderError> {
        or_else_try(
            &format!("`{} {}`", self.program, args.join(" ")),
            run(&self.program, args, timeout),
            run(&self.fallback_program, args, timeout),
        )
        .await
    }
}

#[async_trait]
impl OllamaCli for SystemOllamaCli {
    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let stdout = self.run_with_fallback(&["list"], self.list_timeout).await?;
        Ok(parse_list_output(&stdout))
    }

    async fn pull_model(&self, model: &str) -> Result<(), ProviderError> {
        self.run_with_fallback(&["pull", model], self.pull_timeout)
            .await
            .map(|_| ())
    }
}

/// Run a program to completion and return its stdout
async fn run(program: &str, args: &[&str], timeout: Duration) -> Result<String, ProviderError> {
    debug!("Running {} {}", program, args.join(" "));

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ProviderError::Cli(format!("failed to start {}: {}", program, e)))?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| ProviderError::Cli(format!("{} timed out after {}s", program, timeout.as_secs())))?
        .map_err(|e| ProviderError::Cli(format!("{} failed: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProviderError::Cli(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
