//! Operator error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while executing an operator.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// Command exited unsuccessfully.
    #[error("Command failed with exit code {code:?}: {command}")]
    CommandFailed { command: String, code: Option<i32> },

    /// Process could not be spawned or awaited.
    #[error("Process error: {0}")]
    Process(String),

    /// Operator configuration is unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(String),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Source could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Archive extraction failed.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// I/O error.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OperatorError {
    /// Attach a path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        OperatorError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<minijinja::Error> for OperatorError {
    fn from(e: minijinja::Error) -> Self {
        OperatorError::Template(e.to_string())
    }
}

impl From<reqwest::Error> for OperatorError {
    fn from(e: reqwest::Error) -> Self {
        OperatorError::Http(e.to_string())
    }
}

/// Errors raised by the byte fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Local file could not be read.
    #[error("Cannot read {locator}: {source}")]
    Io {
        locator: String,
        #[source]
        source: std::io::Error,
    },

    /// Remote answered with a non-success status.
    #[error("Fetching {locator} returned HTTP {status}")]
    Status { locator: String, status: u16 },

    /// Transport failure.
    #[error("Fetching {locator} failed: {message}")]
    Transport { locator: String, message: String },
}

/// Errors that abort an archive extraction.
///
/// Rejected entry paths are not errors; they are skipped and counted.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Destination directory could not be created.
    #[error("Cannot create destination {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading the archive stream failed (corrupt or truncated data).
    #[error("Archive stream error: {0}")]
    Stream(#[source] std::io::Error),

    /// Writing an entry failed.
    #[error("Cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OperatorError::CommandFailed {
            command: "false".to_string(),
            code: Some(1),
        };
        assert_eq!(err.to_string(), "Command failed with exit code Some(1): false");

        let err = FetchError::Status {
            locator: "https://example.com/m.yml".to_string(),
            status: 404,
        };
        assert_eq!(
            err.to_string(),
            "Fetching https://example.com/m.yml returned HTTP 404"
        );
    }

    #[test]
    fn test_error_from_extract() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated");
        let op_err: OperatorError = ExtractError::Stream(io_err).into();
        assert!(matches!(op_err, OperatorError::Extract(ExtractError::Stream(_))));
    }
}
