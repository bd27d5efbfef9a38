//! Web font conversion.

use std::path::Path;

use super::tool::{Vars, run_tool};
use super::{StepContext, StepError, StepId, StepReport, TransformStep, stem};
use crate::config::{ToolConfig, ToolsConfig};
use crate::core::AssetKind;
use crate::reload::Refresh;

/// One converter; `woff` and `woff2` are separate steps so a watch rule
/// can run them in parallel.
pub struct FontStep {
    id: StepId,
    extension: &'static str,
    /// Source extensions this format is produced from.
    accepts: &'static [&'static str],
    tool: fn(&ToolsConfig) -> &ToolConfig,
}

impl FontStep {
    pub fn woff() -> Self {
        Self {
            id: StepId::FontsWoff,
            extension: "woff",
            accepts: &["ttf", "otf"],
            tool: |tools| &tools.woff,
        }
    }

    pub fn woff2() -> Self {
        Self {
            id: StepId::FontsWoff2,
            extension: "woff2",
            accepts: &["ttf"],
            tool: |tools| &tools.woff2,
        }
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.accepts.iter().any(|a| a.eq_ignore_ascii_case(ext)))
    }
}

impl TransformStep for FontStep {
    fn id(&self) -> StepId {
        self.id
    }

    fn inputs(&self) -> &'static [AssetKind] {
        &[AssetKind::Font]
    }

    fn refresh(&self) -> Option<Refresh> {
        Some(Refresh::Page)
    }

    fn run(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
        let mut report = StepReport::default();
        let out_dir = ctx.paths.output_dir(AssetKind::Font);
        let tool = (self.tool)(&ctx.config.tools);
        let name = self.id.name();

        for source in ctx.paths.sources(AssetKind::Font) {
            if !self.accepts(&source) {
                continue;
            }
            let target = out_dir.join(format!("{}.{}", stem(&source), self.extension));
            std::fs::create_dir_all(&out_dir).map_err(|e| StepError::io(&out_dir, e))?;

            let vars = Vars::new(ctx)
                .input(&source)
                .output(&target)
                .output_dir(&out_dir);
            run_tool(name, tool, ctx, &vars, None)?;

            if !target.is_file() {
                return Err(StepError::tool(
                    name,
                    format!("{} produced no {}", ctx.display(&source), ctx.display(&target)),
                ));
            }
            report.wrote(target);
        }
        Ok(report)
    }
}
