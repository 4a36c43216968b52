//! Steward
//!
//! Runs step manifests once, on a cadence, or when an authorized trigger
//! arrives.
//!
//! This crate provides:
//! - Server configuration and process settings
//! - Manifest parsing with operator resolution
//! - The sequential step pipeline
//! - Cadence and event runners under a supervisor
//! - A NATS trigger source

pub mod config;
pub mod error;
pub mod manifest;
pub mod nats;
pub mod pipeline;
pub mod runner;

pub use config::{ExecutionKind, ExecutionSpec, ServerConfig, Settings};
pub use error::{AuthorizationError, ConfigError, RunnerError, StepError};
pub use manifest::{Manifest, Step};
pub use pipeline::execute_steps;
pub use runner::{CadenceRunner, EventRunner, Supervisor, SupervisorReport, Trigger};
