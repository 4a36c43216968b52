//! File copy operator.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;

use crate::context::OperatorContext;
use crate::error::OperatorError;
use crate::operator::{Execute, Schema};
use crate::ops::{backup_existing, parse_mode, require, write_file};
use crate::template::TemplateEngine;

/// Fetch a file from a locator and write it to a destination.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CopyOp {
    /// Source locator.
    pub copy: String,

    /// Destination path.
    pub dest: String,

    /// Permission bits for the destination.
    pub perm: Option<serde_yaml::Value>,
}

impl Schema for CopyOp {
    fn is_selected(&self) -> bool {
        !self.copy.is_empty()
    }
}

#[async_trait]
impl Execute for CopyOp {
    async fn execute(&self, ctx: &OperatorContext) -> Result<(), OperatorError> {
        require("dest", &self.dest)?;
        let mode = parse_mode(self.perm.as_ref())?;
        let engine = TemplateEngine::new();
        let source = engine.render(&self.copy, &ctx.variables)?;
        let dest = PathBuf::from(engine.render(&self.dest, &ctx.variables)?);

        let (bytes, _) = ctx.fetcher.fetch(&source, &ctx.key).await?;

        backup_existing(&dest, &ctx.backup_dir).await?;
        write_file(&dest, &bytes, mode).await?;

        tracing::info!(source = %source, dest = %dest.display(), "File copied");
        Ok(())
    }
}
