//! Runner lifecycle: startup checks, spawning and coordinated shutdown.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use steward_ops::Fetcher;

use crate::config::{ExecutionKind, ServerConfig};
use crate::error::ConfigError;
use crate::runner::{CadenceRunner, EventRunner, ManifestExecutor, Trigger};

/// Length of one cadence unit.
pub const CADENCE_UNIT: Duration = Duration::from_secs(60);

/// What the supervisor started before shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorReport {
    /// Number of cadence runners spawned.
    pub cadence_runners: usize,

    /// Whether the shared event runner was spawned.
    pub event_runner: bool,

    /// Cadence runners that stopped on a failure before shutdown.
    pub failed_runners: usize,
}

/// Owns every runner task of a server.
pub struct Supervisor {
    config: Arc<ServerConfig>,
    executor: ManifestExecutor,
    triggers: Option<mpsc::Receiver<Trigger>>,
    cadence_unit: Duration,
}

impl Supervisor {
    /// Create a supervisor for a loaded server configuration.
    pub fn new(config: Arc<ServerConfig>, backup_dir: impl Into<PathBuf>, fetcher: Fetcher) -> Self {
        let executor = ManifestExecutor::new(fetcher, config.key.clone(), backup_dir);
        Self {
            config,
            executor,
            triggers: None,
            cadence_unit: CADENCE_UNIT,
        }
    }

    /// Channel feeding the event runner.
    ///
    /// Without one the event runner is not started.
    pub fn with_triggers(mut self, triggers: mpsc::Receiver<Trigger>) -> Self {
        self.triggers = Some(triggers);
        self
    }

    /// Override the cadence unit.
    pub fn with_cadence_unit(mut self, unit: Duration) -> Self {
        self.cadence_unit = unit;
        self
    }

    /// Start all runners, wait for `shutdown`, then stop and join them.
    ///
    /// Returns a [`ConfigError`] without starting anything when the
    /// configuration or any runner's manifest is unusable.
    pub async fn run<F>(self, shutdown: F) -> Result<SupervisorReport, ConfigError>
    where
        F: Future<Output = ()>,
    {
        self.config.validate()?;
        self.preflight().await?;

        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        let mut report = SupervisorReport {
            cadence_runners: 0,
            event_runner: false,
            failed_runners: 0,
        };

        for spec in &self.config.execution {
            if let ExecutionKind::Unknown(kind) = &spec.kind {
                tracing::warn!(execution = %spec.name, kind = %kind, "Skipping execution of unknown type");
            }
        }

        for spec in self.config.cadence_executions() {
            let runner = CadenceRunner::new(
                spec.clone(),
                spec.interval(self.cadence_unit),
                self.executor.clone(),
            );
            let token = cancel.clone();
            tasks.spawn(runner.run(token));
            report.cadence_runners += 1;
        }

        match self.triggers {
            Some(rx) if self.config.event_executions().next().is_some() => {
                let runner = EventRunner::new(self.config.clone(), self.executor.clone());
                let token = cancel.clone();
                tasks.spawn(async move {
                    runner.run(rx, token).await;
                    Ok(())
                });
                report.event_runner = true;
            }
            Some(_) => tracing::debug!("No event executions configured"),
            None if self.config.event_executions().next().is_some() => {
                tracing::warn!("Event executions configured but no trigger source available");
            }
            None => {}
        }

        tracing::info!(
            cadence_runners = report.cadence_runners,
            event_runner = report.event_runner,
            "Supervisor started"
        );

        shutdown.await;
        tracing::info!("Shutdown requested, stopping runners");
        cancel.cancel();

        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Runner had stopped on failure");
                    report.failed_runners += 1;
                }
                Err(e) => tracing::error!(error = %e, "Runner task panicked"),
            }
        }

        tracing::info!(failed_runners = report.failed_runners, "All runners stopped");
        Ok(report)
    }

    async fn preflight(&self) -> Result<(), ConfigError> {
        let specs = self
            .config
            .execution
            .iter()
            .filter(|e| matches!(e.kind, ExecutionKind::Cadence | ExecutionKind::Event));

        for spec in specs {
            let manifest = self.executor.load(spec).await?;
            tracing::debug!(execution = %spec.name, steps = manifest.steps.len(), "Manifest preflight ok");
        }
        Ok(())
    }
}
