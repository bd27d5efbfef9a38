//! Output directory removal.

use super::{StepContext, StepError, StepId, StepReport, TransformStep};
use crate::debug;
use crate::utils::fs::remove_dir_all_if_exists;

pub struct CleanStep;

impl TransformStep for CleanStep {
    fn id(&self) -> StepId {
        StepId::Clean
    }

    /// Idempotent: a missing output directory is success.
    fn run(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
        let output = ctx.paths.output_root();
        if output == ctx.root() || ctx.root().starts_with(output) {
            return Err(StepError::Other(anyhow::anyhow!(
                "refusing to remove `{}`: it contains the project root",
                output.display()
            )));
        }

        let removed = remove_dir_all_if_exists(output).map_err(|e| StepError::io(output, e))?;
        debug!("clean"; "{} {}", if removed { "removed" } else { "nothing at" }, ctx.display(output));
        Ok(StepReport::default())
    }
}
