//! Trigger-driven execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{ExecutionSpec, ServerConfig};
use crate::error::AuthorizationError;
use crate::runner::ManifestExecutor;

/// Inbound request to run an event execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    /// Name of the execution to run.
    pub execution: String,

    /// Token presented by the sender.
    #[serde(default)]
    pub authorization: String,

    /// When the trigger was sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

impl Trigger {
    /// Create a trigger stamped with the current time.
    pub fn new(execution: impl Into<String>, authorization: impl Into<String>) -> Self {
        Self {
            execution: execution.into(),
            authorization: authorization.into(),
            sent_at: Some(Utc::now()),
        }
    }
}

/// Outcome of handling one trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Pipeline ran to completion.
    Completed,
    /// Pipeline was started but failed.
    Failed,
    /// Token did not match.
    Unauthorized,
    /// No event execution with that name.
    Unmatched,
}

/// Serves every event execution of a server from one trigger channel.
pub struct EventRunner {
    config: Arc<ServerConfig>,
    executor: ManifestExecutor,
}

impl EventRunner {
    /// Create an event runner.
    pub fn new(config: Arc<ServerConfig>, executor: ManifestExecutor) -> Self {
        Self { config, executor }
    }

    /// Handle triggers until the channel closes or `cancel` fires.
    ///
    /// Failures are logged and never stop the runner. A pipeline in progress
    /// is finished before cancellation is observed.
    pub async fn run(self, mut triggers: mpsc::Receiver<Trigger>, cancel: CancellationToken) {
        let names: Vec<_> = self.config.event_executions().map(|e| e.name.as_str()).collect();
        tracing::info!(executions = ?names, "Event runner started");

        loop {
            let trigger = tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::info!("Event runner stopping");
                    return;
                }
                trigger = triggers.recv() => match trigger {
                    Some(trigger) => trigger,
                    None => {
                        tracing::info!("Trigger channel closed, event runner stopping");
                        return;
                    }
                },
            };

            self.handle(&trigger).await;
        }
    }

    /// Authorize and run a single trigger.
    pub async fn handle(&self, trigger: &Trigger) -> Dispatch {
        tracing::debug!(execution = %trigger.execution, sent_at = ?trigger.sent_at, "Trigger received");

        let spec = match self.authorize(trigger) {
            Ok(spec) => spec,
            Err(e @ AuthorizationError::UnknownExecution(_)) => {
                tracing::warn!(error = %e, "Ignoring trigger");
                return Dispatch::Unmatched;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rejecting trigger");
                return Dispatch::Unauthorized;
            }
        };

        match self.executor.run(spec).await {
            Ok(()) => {
                tracing::info!(execution = %spec.name, "Event run complete");
                Dispatch::Completed
            }
            Err(e) => {
                tracing::error!(execution = %spec.name, error = %e, "Event run failed");
                Dispatch::Failed
            }
        }
    }

    /// Find the event execution a trigger names and check its token.
    pub fn authorize(&self, trigger: &Trigger) -> Result<&ExecutionSpec, AuthorizationError> {
        let spec = self
            .config
            .event_executions()
            .find(|e| e.name == trigger.execution)
            .ok_or_else(|| AuthorizationError::UnknownExecution(trigger.execution.clone()))?;

        if !tokens_match(&spec.authorization, &trigger.authorization) {
            return Err(AuthorizationError::InvalidToken(spec.name.clone()));
        }
        Ok(spec)
    }
}

/// Compare tokens without short-circuiting on the first differing byte.
fn tokens_match(expected: &str, presented: &str) -> bool {
    let (a, b) = (expected.as_bytes(), presented.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
