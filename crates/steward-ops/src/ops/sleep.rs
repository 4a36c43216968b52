//! Sleep operator.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::context::OperatorContext;
use crate::error::OperatorError;
use crate::operator::{Execute, Schema};

/// Pause the pipeline for a number of seconds.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SleepOp {
    /// Seconds to sleep.
    pub sleep: u64,
}

impl Schema for SleepOp {
    fn is_selected(&self) -> bool {
        self.sleep > 0
    }
}

#[async_trait]
impl Execute for SleepOp {
    async fn execute(&self, _ctx: &OperatorContext) -> Result<(), OperatorError> {
        tracing::debug!(seconds = self.sleep, "Sleeping");
        tokio::time::sleep(Duration::from_secs(self.sleep)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_waits() {
        let start = tokio::time::Instant::now();
        SleepOp { sleep: 30 }
            .execute(&OperatorContext::default())
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(30));
    }
}
