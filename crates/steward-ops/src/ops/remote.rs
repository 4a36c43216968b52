//! Remote command operator.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use crate::context::OperatorContext;
use crate::error::OperatorError;
use crate::operator::{Execute, Schema};
use crate::ops::{require, run_process};
use crate::template::TemplateEngine;

/// Run a command on a remote host over ssh.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RemoteExecOp {
    /// Command to run remotely.
    #[serde(rename = "remoteCmd")]
    pub remote_cmd: String,

    /// Target host.
    pub host: String,

    /// Login user.
    pub user: Option<String>,

    /// ssh port.
    pub port: Option<u16>,
}

impl RemoteExecOp {
    fn ssh_args(&self, host: &str, command: &str) -> Vec<String> {
        let mut args = vec!["-o".to_string(), "BatchMode=yes".to_string()];
        if let Some(port) = self.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        match self.user.as_deref().filter(|u| !u.is_empty()) {
            Some(user) => args.push(format!("{}@{}", user, host)),
            None => args.push(host.to_string()),
        }
        args.push(command.to_string());
        args
    }
}

impl Schema for RemoteExecOp {
    fn is_selected(&self) -> bool {
        !self.remote_cmd.is_empty()
    }
}

#[async_trait]
impl Execute for RemoteExecOp {
    async fn execute(&self, ctx: &OperatorContext) -> Result<(), OperatorError> {
        require("host", &self.host)?;
        let engine = TemplateEngine::new();
        let command = engine.render(&self.remote_cmd, &ctx.variables)?;
        let host = engine.render(&self.host, &ctx.variables)?;

        tracing::debug!(host = %host, command = %command, "Executing remote command");
        let args = self.ssh_args(&host, &command);
        run_process("ssh", &args, None, &HashMap::new(), &command).await
    }
}
