//! Timer-driven execution.

use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::ExecutionSpec;
use crate::error::RunnerError;
use crate::runner::ManifestExecutor;

/// Runs one execution's pipeline every `interval`.
pub struct CadenceRunner {
    spec: ExecutionSpec,
    interval: Duration,
    executor: ManifestExecutor,
}

impl CadenceRunner {
    /// Create a runner for a cadence execution.
    pub fn new(spec: ExecutionSpec, interval: Duration, executor: ManifestExecutor) -> Self {
        Self {
            spec,
            interval,
            executor,
        }
    }

    /// Execution name.
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Tick until cancelled.
    ///
    /// The first run happens one full interval after start. A load or step
    /// failure stops the runner for good. Cancellation is only observed
    /// between runs.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), RunnerError> {
        tracing::info!(
            execution = %self.spec.name,
            interval_secs = self.interval.as_secs_f64(),
            "Cadence runner started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // Skip first immediate tick

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::info!(execution = %self.spec.name, "Cadence runner stopping");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.executor.run(&self.spec).await {
                tracing::error!(execution = %self.spec.name, error = %e, "Cadence runner stopped");
                return Err(e);
            }

            tracing::info!(execution = %self.spec.name, "Cadence run complete");
            ticker.reset();
        }
    }
}
