//! Server configuration and process settings.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Name of the execution every server configuration must declare.
pub const DEFAULT_EXECUTION: &str = "default";

/// Prefix of the NATS subject carrying triggers.
pub const TRIGGER_SUBJECT_PREFIX: &str = "steward.trigger";

/// How an execution is started.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ExecutionKind {
    /// Timer driven.
    Cadence,
    /// Trigger driven.
    Event,
    /// Anything else; skipped at startup.
    Unknown(String),
}

impl From<String> for ExecutionKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "cadence" => ExecutionKind::Cadence,
            "event" => ExecutionKind::Event,
            _ => ExecutionKind::Unknown(s),
        }
    }
}

impl std::fmt::Display for ExecutionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionKind::Cadence => write!(f, "cadence"),
            ExecutionKind::Event => write!(f, "event"),
            ExecutionKind::Unknown(s) => write!(f, "{}", s),
        }
    }
}

/// A named execution of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecutionSpec {
    /// Execution name.
    pub name: String,

    /// Token inbound triggers must present.
    #[serde(default)]
    pub authorization: String,

    /// Execution type.
    #[serde(rename = "type")]
    pub kind: ExecutionKind,

    /// Interval between cadence runs, in cadence units (minutes by default).
    #[serde(default)]
    pub cadence: u64,

    /// Manifest locator.
    pub target: String,
}

impl ExecutionSpec {
    /// Interval between runs for the given unit length.
    pub fn interval(&self, unit: Duration) -> Duration {
        let units = u32::try_from(self.cadence).unwrap_or(u32::MAX);
        unit.saturating_mul(units)
    }
}

/// Server configuration, loaded once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// NATS URL for inbound triggers.
    #[serde(default)]
    pub endpoint: String,

    /// Identity of this server; selects the trigger subject.
    #[serde(default)]
    pub origin: String,

    /// Key handed to the fetcher when loading manifests.
    #[serde(default)]
    pub key: String,

    /// Configured executions, in declaration order.
    #[serde(default)]
    pub execution: Vec<ExecutionSpec>,
}

impl ServerConfig {
    /// Read and validate a server configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a server configuration document.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the supervisor relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let defaults = self
            .execution
            .iter()
            .filter(|e| e.name == DEFAULT_EXECUTION)
            .count();
        match defaults {
            0 => return Err(ConfigError::MissingDefault),
            1 => {}
            n => return Err(ConfigError::DuplicateDefault(n)),
        }

        if let Some(spec) = self.cadence_executions().find(|e| e.cadence == 0) {
            return Err(ConfigError::InvalidCadence(spec.name.clone()));
        }

        Ok(())
    }

    /// Executions of type cadence.
    pub fn cadence_executions(&self) -> impl Iterator<Item = &ExecutionSpec> {
        self.execution
            .iter()
            .filter(|e| e.kind == ExecutionKind::Cadence)
    }

    /// Executions of type event.
    pub fn event_executions(&self) -> impl Iterator<Item = &ExecutionSpec> {
        self.execution
            .iter()
            .filter(|e| e.kind == ExecutionKind::Event)
    }

    /// NATS subject this server listens on for triggers.
    pub fn trigger_subject(&self) -> String {
        let origin = if self.origin.is_empty() {
            hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string())
        } else {
            self.origin.clone()
        };
        format!("{}.{}", TRIGGER_SUBJECT_PREFIX, origin)
    }
}

/// Process settings loaded from the environment.
///
/// Environment variables are prefixed with `STEWARD_`:
/// - `STEWARD_DEBUG`: Raise logging verbosity (default: false)
/// - `STEWARD_JSON_LOGS`: Emit JSON log lines (default: false)
/// - `STEWARD_BACKUP_DIR`: Where overwritten files are backed up
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// Enable debug logging.
    #[serde(default)]
    pub debug: bool,

    /// Emit JSON formatted logs.
    #[serde(default)]
    pub json_logs: bool,

    /// Backup directory override.
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
}

impl Settings {
    /// Load settings from `STEWARD_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        envy::prefixed("STEWARD_")
            .from_env::<Settings>()
            .map_err(|e| ConfigError::Settings(e.to_string()))
    }

    /// Directory receiving backups of overwritten files.
    pub fn backup_dir(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("steward-backups"))
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}
