//! Execution context for operators.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::fetch::Fetcher;

/// Context passed to every operator of a pipeline run.
///
/// Contains:
/// - Manifest variables for template rendering
/// - The backup directory for files an operator overwrites
/// - The fetcher and key used to resolve remote sources
#[derive(Debug, Clone)]
pub struct OperatorContext {
    /// Variables available for template rendering.
    pub variables: HashMap<String, String>,

    /// Directory receiving copies of files before they are overwritten.
    pub backup_dir: PathBuf,

    /// Fetcher for operator sources.
    pub fetcher: Fetcher,

    /// Key handed to the fetcher.
    pub key: String,
}

impl OperatorContext {
    /// Create a new context.
    pub fn new(backup_dir: impl Into<PathBuf>, fetcher: Fetcher) -> Self {
        Self {
            variables: HashMap::new(),
            backup_dir: backup_dir.into(),
            fetcher,
            key: String::new(),
        }
    }

    /// Set the variables.
    pub fn with_variables(mut self, variables: HashMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    /// Set the fetch key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Set a single variable.
    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }
}

impl Default for OperatorContext {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("steward-backups"), Fetcher::new())
    }
}
