//! Tarball operator.

use async_trait::async_trait;
use serde::Deserialize;
use std::io::Cursor;
use std::path::PathBuf;

use crate::archive::{extract_archive, ExtractOptions};
use crate::context::OperatorContext;
use crate::error::OperatorError;
use crate::operator::{Execute, Schema};
use crate::ops::require;
use crate::template::TemplateEngine;

/// Fetch a tar or tar.gz archive and extract it into a directory.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TarballOp {
    /// Archive locator.
    pub tarball: String,

    /// Destination directory.
    pub dest: String,

    /// Extract even when the destination exists.
    pub force: bool,

    /// Drop the archive's top-level directory.
    #[serde(rename = "stripRoot")]
    pub strip_root: bool,
}

impl Schema for TarballOp {
    fn is_selected(&self) -> bool {
        !self.tarball.is_empty()
    }
}

#[async_trait]
impl Execute for TarballOp {
    async fn execute(&self, ctx: &OperatorContext) -> Result<(), OperatorError> {
        require("dest", &self.dest)?;
        let engine = TemplateEngine::new();
        let source = engine.render(&self.tarball, &ctx.variables)?;
        let dest = PathBuf::from(engine.render(&self.dest, &ctx.variables)?);

        // Skip the fetch as well as the extraction.
        if dest.exists() && !self.force {
            tracing::info!(
                dest = %dest.display(),
                "Destination already exists, skipping tarball"
            );
            return Ok(());
        }

        let (bytes, meta) = ctx.fetcher.fetch(&source, &ctx.key).await?;
        tracing::debug!(source = %meta.locator, bytes = meta.len, "Tarball fetched");

        let options = ExtractOptions {
            force: self.force,
            strip_root: self.strip_root,
        };
        tokio::task::spawn_blocking(move || {
            extract_archive(&source, Cursor::new(bytes), &dest, options)
        })
        .await
        .map_err(|e| OperatorError::Process(format!("Extraction task failed: {}", e)))??;

        Ok(())
    }
}
