//! Loop operator.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use crate::context::OperatorContext;
use crate::error::OperatorError;
use crate::operator::{Execute, Schema};
use crate::ops::run_process;
use crate::template::TemplateEngine;

const DEFAULT_INDEX_VAR: &str = "LOOP_INDEX";

/// Run a shell script a fixed number of times.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoopOp {
    /// Script body.
    #[serde(rename = "loop")]
    pub script: String,

    /// Number of iterations.
    pub count: u32,

    /// Environment variable receiving the zero-based iteration index.
    pub var: Option<String>,
}

impl Schema for LoopOp {
    fn is_selected(&self) -> bool {
        !self.script.is_empty()
    }
}

#[async_trait]
impl Execute for LoopOp {
    async fn execute(&self, ctx: &OperatorContext) -> Result<(), OperatorError> {
        let script = TemplateEngine::new().render(&self.script, &ctx.variables)?;
        let var = self.var.as_deref().unwrap_or(DEFAULT_INDEX_VAR);

        if self.count == 0 {
            tracing::info!("Loop count is zero, nothing to run");
        }

        let args = ["-c".to_string(), script.clone()];
        for index in 0..self.count {
            tracing::debug!(iteration = index, count = self.count, "Running loop iteration");
            let mut env = HashMap::new();
            env.insert(var.to_string(), index.to_string());
            run_process("sh", &args, None, &env, &script).await?;
        }
        Ok(())
    }
}
