//! Built-in operator implementations.
//!
//! This module provides one operator per step shape:
//! - `cmd` - Run a shell command
//! - `schedule` - Install a cron entry
//! - `tarball` - Fetch and extract an archive
//! - `copy` - Fetch a file to a destination
//! - `template` - Render a template to a destination
//! - `git` - Clone a repository
//! - `copyRecursive` - Copy a local directory tree
//! - `loop` - Run a script repeatedly
//! - `remoteCmd` - Run a command over ssh
//! - `api` - Make an HTTP request
//! - `sleep` - Pause

mod api;
mod command;
mod copy;
mod cron;
mod git;
mod looping;
mod recursive_copy;
mod remote;
mod sleep;
mod tarball;
mod template;

pub use self::api::ApiOp;
pub use self::command::{run_process, CommandOp};
pub use self::copy::CopyOp;
pub use self::cron::CronOp;
pub use self::git::GitOp;
pub use self::looping::LoopOp;
pub use self::recursive_copy::RecursiveCopyOp;
pub use self::remote::RemoteExecOp;
pub use self::sleep::SleepOp;
pub use self::tarball::TarballOp;
pub use self::template::TemplateOp;

use std::path::{Path, PathBuf};

use crate::error::OperatorError;

/// Interpret a permission value written either as `0644`, `644` or `"0o644"`.
///
/// YAML reads an unquoted `0644` as the integer 644, so integers are read
/// back through their decimal digits.
pub(crate) fn parse_mode(value: Option<&serde_yaml::Value>) -> Result<Option<u32>, OperatorError> {
    let digits = match value {
        None | Some(serde_yaml::Value::Null) => return Ok(None),
        Some(serde_yaml::Value::Number(n)) => n.to_string(),
        Some(serde_yaml::Value::String(s)) => s.trim_start_matches("0o").to_string(),
        Some(other) => {
            return Err(OperatorError::Configuration(format!(
                "Invalid permission value: {:?}",
                other
            )))
        }
    };
    u32::from_str_radix(&digits, 8)
        .map(Some)
        .map_err(|_| OperatorError::Configuration(format!("Invalid permission value: {}", digits)))
}

/// Copy an existing file at `path` into `backup_dir` before it is replaced.
pub(crate) async fn backup_existing(
    path: &Path,
    backup_dir: &Path,
) -> Result<Option<PathBuf>, OperatorError> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(None);
    }

    tokio::fs::create_dir_all(backup_dir)
        .await
        .map_err(|e| OperatorError::io(backup_dir, e))?;

    let flattened = path
        .to_string_lossy()
        .trim_start_matches('/')
        .replace('/', "_");
    let backup = backup_dir.join(format!("{}.bak", flattened));

    tokio::fs::copy(path, &backup)
        .await
        .map_err(|e| OperatorError::io(path, e))?;

    tracing::debug!(
        path = %path.display(),
        backup = %backup.display(),
        "Backed up existing file"
    );
    Ok(Some(backup))
}

/// Write `contents` to `dest`, creating parent directories and applying `mode`.
pub(crate) async fn write_file(
    dest: &Path,
    contents: &[u8],
    mode: Option<u32>,
) -> Result<(), OperatorError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| OperatorError::io(parent, e))?;
    }

    tokio::fs::write(dest, contents)
        .await
        .map_err(|e| OperatorError::io(dest, e))?;

    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(dest, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(|e| OperatorError::io(dest, e))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}

/// Fail with a configuration error when a required field is empty.
pub(crate) fn require(field: &str, value: &str) -> Result<(), OperatorError> {
    if value.trim().is_empty() {
        return Err(OperatorError::Configuration(format!(
            "Missing required field: {}",
            field
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        let yaml = |s: &str| serde_yaml::from_str::<serde_yaml::Value>(s).unwrap();

        assert_eq!(parse_mode(None).unwrap(), None);
        assert_eq!(parse_mode(Some(&yaml("0644"))).unwrap(), Some(0o644));
        assert_eq!(parse_mode(Some(&yaml("755"))).unwrap(), Some(0o755));
        assert_eq!(parse_mode(Some(&yaml("'0o600'"))).unwrap(), Some(0o600));
        assert!(parse_mode(Some(&yaml("'rwx'"))).is_err());
        assert!(parse_mode(Some(&yaml("[1]"))).is_err());
    }

    #[tokio::test]
    async fn test_backup_existing() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("app.conf");
        let backups = tmp.path().join("backups");

        assert!(backup_existing(&target, &backups).await.unwrap().is_none());

        std::fs::write(&target, "old").unwrap();
        let backup = backup_existing(&target, &backups).await.unwrap().unwrap();
        assert!(backup.starts_with(&backups));
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "old");
    }

    #[test]
    fn test_require() {
        assert!(require("dest", "/opt").is_ok());
        assert!(matches!(
            require("dest", "  "),
            Err(OperatorError::Configuration(_))
        ));
    }
}
