//! Manifest loading and pipeline execution shared by all runners.

use std::path::PathBuf;
use tracing::Instrument;

use steward_ops::Fetcher;

use crate::config::ExecutionSpec;
use crate::error::{ConfigError, RunnerError};
use crate::manifest::Manifest;
use crate::pipeline::execute_steps;

/// Loads an execution's manifest and runs its pipeline.
#[derive(Debug, Clone)]
pub struct ManifestExecutor {
    fetcher: Fetcher,
    key: String,
    backup_dir: PathBuf,
}

impl ManifestExecutor {
    /// Create an executor.
    pub fn new(fetcher: Fetcher, key: impl Into<String>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            key: key.into(),
            backup_dir: backup_dir.into(),
        }
    }

    /// Fetch and parse the manifest an execution points at.
    pub async fn load(&self, spec: &ExecutionSpec) -> Result<Manifest, ConfigError> {
        Manifest::load(&self.fetcher, &spec.target, &self.key, &self.backup_dir).await
    }

    /// Load a fresh manifest and run its steps once.
    pub async fn run(&self, spec: &ExecutionSpec) -> Result<(), RunnerError> {
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("run", execution = %spec.name, run_id = %run_id);

        async {
            let manifest = self.load(spec).await.map_err(|source| RunnerError::Load {
                execution: spec.name.clone(),
                source,
            })?;

            tracing::info!(steps = manifest.steps.len(), target = %spec.target, "Starting pipeline");

            let ctx = manifest.context(&self.fetcher, &self.key);
            execute_steps(&manifest.steps, &ctx)
                .await
                .map_err(|source| RunnerError::Step {
                    execution: spec.name.clone(),
                    source,
                })
        }
        .instrument(span)
        .await
    }
}
