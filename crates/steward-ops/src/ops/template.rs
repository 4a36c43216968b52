//! Template operator.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::context::OperatorContext;
use crate::error::OperatorError;
use crate::operator::{Execute, Schema};
use crate::ops::{backup_existing, parse_mode, require, write_file};
use crate::template::TemplateEngine;

/// Render a fetched template into a destination file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TemplateOp {
    /// Destination path.
    pub template: String,

    /// Template source locator.
    pub source: String,

    /// Permission bits for the destination.
    pub perm: Option<serde_yaml::Value>,

    /// Variables layered over the manifest variables.
    pub vars: HashMap<String, String>,
}

impl Schema for TemplateOp {
    fn is_selected(&self) -> bool {
        !self.template.is_empty()
    }
}

#[async_trait]
impl Execute for TemplateOp {
    async fn execute(&self, ctx: &OperatorContext) -> Result<(), OperatorError> {
        require("source", &self.source)?;
        let mode = parse_mode(self.perm.as_ref())?;
        let engine = TemplateEngine::new();
        let dest = PathBuf::from(engine.render(&self.template, &ctx.variables)?);
        let source = engine.render(&self.source, &ctx.variables)?;

        let (bytes, _) = ctx.fetcher.fetch(&source, &ctx.key).await?;
        let body = String::from_utf8(bytes).map_err(|e| {
            OperatorError::Template(format!("Template {} is not UTF-8: {}", source, e))
        })?;

        let mut variables = ctx.variables.clone();
        variables.extend(self.vars.clone());
        let rendered = engine.render(&body, &variables)?;

        backup_existing(&dest, &ctx.backup_dir).await?;
        write_file(&dest, rendered.as_bytes(), mode).await?;

        tracing::info!(source = %source, dest = %dest.display(), "Template rendered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_template_renders_manifest_and_step_vars() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("nginx.conf.tmpl");
        let dest = tmp.path().join("nginx.conf");
        std::fs::write(&src, "listen {{ port }};\nserver_name {{ host }};\n").unwrap();

        let mut ctx = OperatorContext::default();
        ctx.set_variable("port", "80");
        ctx.set_variable("host", "default.local");

        let mut vars = HashMap::new();
        vars.insert("host".to_string(), "example.com".to_string());
        let op = TemplateOp {
            template: dest.display().to_string(),
            source: src.display().to_string(),
            perm: None,
            vars,
        };
        op.execute(&ctx).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&dest).unwrap(),
            "listen 80;\nserver_name example.com;\n"
        );
    }

    #[tokio::test]
    async fn test_template_requires_source() {
        let op = TemplateOp {
            template: "/tmp/out".to_string(),
            ..Default::default()
        };
        let result = op.execute(&OperatorContext::default()).await;
        assert!(matches!(result, Err(OperatorError::Configuration(_))));
    }
}
