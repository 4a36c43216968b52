//! Git clone operator.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::context::OperatorContext;
use crate::error::OperatorError;
use crate::operator::{Execute, Schema};
use crate::ops::{require, run_process};
use crate::template::TemplateEngine;

/// Clone a repository unless the destination already holds one.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GitOp {
    /// Repository URL.
    pub git: String,

    /// Checkout directory.
    pub dest: String,

    /// Branch or tag to check out.
    pub branch: Option<String>,
}

impl GitOp {
    fn clone_args(&self, repo: &str, dest: &str) -> Vec<String> {
        let mut args = vec!["clone".to_string()];
        if let Some(branch) = self.branch.as_deref().filter(|b| !b.is_empty()) {
            args.push("--branch".to_string());
            args.push(branch.to_string());
        }
        args.push(repo.to_string());
        args.push(dest.to_string());
        args
    }
}

impl Schema for GitOp {
    fn is_selected(&self) -> bool {
        !self.git.is_empty()
    }
}

#[async_trait]
impl Execute for GitOp {
    async fn execute(&self, ctx: &OperatorContext) -> Result<(), OperatorError> {
        require("dest", &self.dest)?;
        let engine = TemplateEngine::new();
        let repo = engine.render(&self.git, &ctx.variables)?;
        let dest = engine.render(&self.dest, &ctx.variables)?;

        if Path::new(&dest).join(".git").exists() {
            tracing::info!(repo = %repo, dest = %dest, "Repository already cloned, skipping");
            return Ok(());
        }

        tracing::debug!(repo = %repo, dest = %dest, branch = ?self.branch, "Cloning repository");
        let args = self.clone_args(&repo, &dest);
        run_process("git", &args, None, &HashMap::new(), &format!("git clone {}", repo)).await
    }
}
