//! Cron entry operator.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::context::OperatorContext;
use crate::error::OperatorError;
use crate::operator::{Execute, Schema};
use crate::ops::{require, write_file};
use crate::template::TemplateEngine;

const DEFAULT_CRON_DIR: &str = "/etc/cron.d";

/// Install a cron entry as a file under the cron directory.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CronOp {
    /// Job name, used as the file name.
    pub cron: String,

    /// Five-field cron schedule.
    pub schedule: String,

    /// Command run by the job.
    pub cmd: String,

    /// User the job runs as (default: "root").
    pub username: Option<String>,

    /// Directory holding cron files (default: "/etc/cron.d").
    pub dir: Option<String>,
}

fn schedule_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(@(reboot|yearly|annually|monthly|weekly|daily|hourly)|(\S+\s+){4}\S+)$")
            .expect("static regex")
    })
}

impl CronOp {
    fn entry(&self, command: &str) -> String {
        let user = self.username.as_deref().unwrap_or("root");
        format!(
            "# managed by steward\n{} {} {}\n",
            self.schedule.trim(),
            user,
            command
        )
    }
}

impl Schema for CronOp {
    fn is_selected(&self) -> bool {
        !self.schedule.is_empty()
    }
}

#[async_trait]
impl Execute for CronOp {
    async fn execute(&self, ctx: &OperatorContext) -> Result<(), OperatorError> {
        require("cron", &self.cron)?;
        require("cmd", &self.cmd)?;
        if !schedule_pattern().is_match(self.schedule.trim()) {
            return Err(OperatorError::Configuration(format!(
                "Invalid cron schedule: {}",
                self.schedule
            )));
        }

        let command = TemplateEngine::new().render(&self.cmd, &ctx.variables)?;
        let dir = PathBuf::from(self.dir.as_deref().unwrap_or(DEFAULT_CRON_DIR));
        let path = dir.join(&self.cron);

        write_file(&path, self.entry(&command).as_bytes(), Some(0o644)).await?;

        tracing::info!(job = %self.cron, path = %path.display(), "Cron entry installed");
        Ok(())
    }
}
