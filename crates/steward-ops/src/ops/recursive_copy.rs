//! Recursive directory copy operator.

use async_trait::async_trait;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::context::OperatorContext;
use crate::error::OperatorError;
use crate::operator::{Execute, Schema};
use crate::ops::require;
use crate::template::TemplateEngine;

/// Copy a local directory tree.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecursiveCopyOp {
    /// Source directory.
    #[serde(rename = "copyRecursive")]
    pub copy_recursive: String,

    /// Destination directory.
    pub dest: String,

    /// File or directory names to leave out.
    pub ignores: Vec<String>,
}

impl Schema for RecursiveCopyOp {
    fn is_selected(&self) -> bool {
        !self.copy_recursive.is_empty()
    }
}

#[async_trait]
impl Execute for RecursiveCopyOp {
    async fn execute(&self, ctx: &OperatorContext) -> Result<(), OperatorError> {
        require("dest", &self.dest)?;
        let engine = TemplateEngine::new();
        let src = PathBuf::from(engine.render(&self.copy_recursive, &ctx.variables)?);
        let dest = PathBuf::from(engine.render(&self.dest, &ctx.variables)?);
        let ignores = self.ignores.clone();

        let copied = tokio::task::spawn_blocking(move || copy_tree(&src, &dest, &ignores))
            .await
            .map_err(|e| OperatorError::Process(format!("Copy task failed: {}", e)))??;

        tracing::info!(files = copied, "Directory tree copied");
        Ok(())
    }
}

fn copy_tree(src: &Path, dest: &Path, ignores: &[String]) -> Result<usize, OperatorError> {
    fs::create_dir_all(dest).map_err(|e| OperatorError::io(dest, e))?;

    let mut copied = 0;
    for entry in fs::read_dir(src).map_err(|e| OperatorError::io(src, e))? {
        let entry = entry.map_err(|e| OperatorError::io(src, e))?;
        let name = entry.file_name();
        if ignores.iter().any(|i| name.to_string_lossy() == i.as_str()) {
            tracing::debug!(path = %entry.path().display(), "Ignoring entry");
            continue;
        }

        let from = entry.path();
        let to = dest.join(&name);
        let file_type = entry.file_type().map_err(|e| OperatorError::io(&from, e))?;
        if file_type.is_dir() {
            copied += copy_tree(&from, &to, ignores)?;
        } else {
            fs::copy(&from, &to).map_err(|e| OperatorError::io(&from, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}
