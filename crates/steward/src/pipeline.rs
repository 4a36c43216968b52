//! Sequential step execution.

use steward_ops::{Execute, OperatorContext};

use crate::error::StepError;
use crate::manifest::Step;

/// Run steps in order, stopping at the first failure.
///
/// Later steps are never started once a step fails. The returned error
/// carries the 1-based index of the failing step.
pub async fn execute_steps<O: Execute>(
    steps: &[Step<O>],
    ctx: &OperatorContext,
) -> Result<(), StepError> {
    let total = steps.len();

    for (i, step) in steps.iter().enumerate() {
        let index = i + 1;
        tracing::info!(step = index, total, name = %step.name, "Executing step");

        if let Err(source) = step.operator.execute(ctx).await {
            tracing::error!(step = index, name = %step.name, error = %source, "Step failed");
            return Err(StepError {
                index,
                name: step.name.clone(),
                source,
            });
        }
    }

    tracing::info!(steps = total, "Pipeline complete");
    Ok(())
}
