//! Error types for the Steward runner.
//!
//! - [`ConfigError`] is fatal at startup.
//! - [`StepError`] aborts a single pipeline run.
//! - [`RunnerError`] fail-stops one cadence runner.
//! - [`AuthorizationError`] rejects one inbound trigger.

use std::path::PathBuf;
use thiserror::Error;

use steward_ops::{FetchError, OperatorError};

/// Configuration errors. These terminate the process at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Server configuration file could not be read.
    #[error("Cannot read server config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Server configuration is not valid YAML for the expected shape.
    #[error("Cannot parse server config: {0}")]
    Parse(String),

    /// No execution named `default`.
    #[error("Default execution not found in configuration")]
    MissingDefault,

    /// More than one execution named `default`.
    #[error("Configuration declares {0} executions named 'default', expected exactly one")]
    DuplicateDefault(usize),

    /// A cadence execution without a usable interval.
    #[error("Execution '{0}' has type cadence but no positive cadence interval")]
    InvalidCadence(String),

    /// Manifest source could not be fetched.
    #[error("Cannot load manifest: {0}")]
    Fetch(#[from] FetchError),

    /// Manifest top-level structure is malformed.
    #[error("Cannot parse manifest: {0}")]
    Manifest(String),

    /// Process settings from the environment are invalid.
    #[error("Invalid settings: {0}")]
    Settings(String),
}

/// A pipeline step failed; later steps were not run.
#[derive(Error, Debug)]
#[error("Step {index} ({name}) failed: {source}")]
pub struct StepError {
    /// 1-based index of the failing step.
    pub index: usize,

    /// Name of the failing step.
    pub name: String,

    /// Operator failure.
    #[source]
    pub source: OperatorError,
}

/// A cadence runner stopped permanently.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The manifest could not be reloaded.
    #[error("Execution '{execution}' could not load its manifest: {source}")]
    Load {
        execution: String,
        #[source]
        source: ConfigError,
    },

    /// A step of the pipeline failed.
    #[error("Execution '{execution}' failed: {source}")]
    Step {
        execution: String,
        #[source]
        source: StepError,
    },
}

/// An inbound trigger was rejected.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthorizationError {
    /// No event execution carries the requested name.
    #[error("No event execution named '{0}'")]
    UnknownExecution(String),

    /// The trigger token does not match the execution's token.
    #[error("Invalid authorization for execution '{0}'")]
    InvalidToken(String),
}
