//! Shell command operator.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::context::OperatorContext;
use crate::error::OperatorError;
use crate::operator::{Execute, Schema};
use crate::template::TemplateEngine;

/// Command operator configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CommandOp {
    /// Command to execute.
    pub cmd: String,

    /// Working directory.
    pub dir: Option<String>,

    /// Extra environment variables.
    pub env: HashMap<String, String>,

    /// Shell to use (default: "sh").
    pub shell: Option<String>,
}

impl Schema for CommandOp {
    fn is_selected(&self) -> bool {
        !self.cmd.is_empty()
    }
}

#[async_trait]
impl Execute for CommandOp {
    async fn execute(&self, ctx: &OperatorContext) -> Result<(), OperatorError> {
        let engine = TemplateEngine::new();
        let command = engine.render(&self.cmd, &ctx.variables)?;
        let shell = self.shell.as_deref().unwrap_or("sh");
        let dir = match &self.dir {
            Some(dir) => Some(engine.render(dir, &ctx.variables)?),
            None => None,
        };

        tracing::debug!(command = %command, shell = %shell, cwd = ?dir, "Executing command");

        let args = ["-c".to_string(), command.clone()];
        run_process(shell, &args, dir.as_deref(), &self.env, &command).await
    }
}

/// Spawn `program` and wait for it, streaming its output into the log.
///
/// A non-zero exit is reported as [`OperatorError::CommandFailed`] naming
/// `display`.
pub async fn run_process(
    program: &str,
    args: &[String],
    cwd: Option<&str>,
    env: &HashMap<String, String>,
    display: &str,
) -> Result<(), OperatorError> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    for (k, v) in env {
        cmd.env(k, v);
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| OperatorError::Process(format!("Failed to spawn {}: {}", program, e)))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Read stdout and stderr concurrently
    let stdout_handle = tokio::spawn(async move {
        if let Some(stdout) = stdout {
            let mut reader = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                tracing::info!(stream = "stdout", "{}", line);
            }
        }
    });
    let stderr_handle = tokio::spawn(async move {
        if let Some(stderr) = stderr {
            let mut reader = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                tracing::info!(stream = "stderr", "{}", line);
            }
        }
    });

    let status = child
        .wait()
        .await
        .map_err(|e| OperatorError::Process(format!("Failed to wait for {}: {}", program, e)))?;

    let _ = stdout_handle.await;
    let _ = stderr_handle.await;

    if !status.success() {
        return Err(OperatorError::CommandFailed {
            command: display.to_string(),
            code: status.code(),
        });
    }
    Ok(())
}
