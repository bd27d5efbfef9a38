//! Pug templates to validated HTML pages.

use std::fs;

use super::hint::{self, Severity};
use super::tool::{Vars, run_tool};
use super::{StepContext, StepError, StepId, StepReport, TransformStep, stem};
use crate::core::AssetKind;
use crate::reload::Refresh;
use crate::utils::fs::write_file;
use crate::{debug, log};

pub struct MarkupStep;

impl TransformStep for MarkupStep {
    fn id(&self) -> StepId {
        StepId::Markup
    }

    fn inputs(&self) -> &'static [AssetKind] {
        &[AssetKind::Markup]
    }

    fn refresh(&self) -> Option<Refresh> {
        Some(Refresh::Page)
    }

    fn run(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
        let mut report = StepReport::default();
        let sources = ctx.paths.sources(AssetKind::Markup);
        if sources.is_empty() {
            debug!("markup"; "no templates matched {}", ctx.paths.get(AssetKind::Markup).source);
            return Ok(report);
        }

        let out_dir = ctx.paths.output_dir(AssetKind::Markup);
        let mut first_error = None;

        for source in &sources {
            let template = fs::read(source).map_err(|e| StepError::io(source, e))?;
            let vars = Vars::new(ctx).input(source);
            let html = run_tool("pug", &ctx.config.tools.pug, ctx, &vars, Some(&template))?;
            let html = String::from_utf8_lossy(&html);

            let problems = hint::check(&html);
            for problem in &problems {
                let line = format!("{}:{}", ctx.display(source), problem);
                match problem.severity {
                    Severity::Error => log!("markup"; "{}", line),
                    Severity::Warning => report.warn(line),
                }
            }

            if let Some(error) = problems.iter().find(|p| p.severity == Severity::Error) {
                first_error.get_or_insert_with(|| StepError::Validation {
                    path: source.clone(),
                    line: error.line,
                    message: error.message.clone(),
                });
                continue;
            }

            let target = out_dir.join(format!("{}.html", stem(source)));
            write_file(&target, html.as_bytes()).map_err(|e| StepError::io(&target, e))?;
            report.wrote(target);
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(report),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::Mode;
    use crate::step::testing::{context, put};
    use tempfile::TempDir;

    const CAT: &str = "[tools.pug]\ncommand = [\"cat\"]\n";

    #[test]
    fn test_renders_valid_pages() {
        let dir = TempDir::new().unwrap();
        put(&dir, "src/pug/index.pug", "<!DOCTYPE html><html><body><p>hi</p></body></html>");
        put(&dir, "src/pug/partials/head.pug", "<head>");
        let ctx = context(&dir, Mode::Development, CAT);

        let report = MarkupStep.run(&ctx).unwrap();
        assert_eq!(report.written, vec![dir.path().join("dist/index.html")]);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_invalid_page_not_written_siblings_are() {
        let dir = TempDir::new().unwrap();
        put(&dir, "src/pug/bad.pug", "<!DOCTYPE html>\n<div>\n<span></div>");
        put(&dir, "src/pug/good.pug", "<!DOCTYPE html><p></p>");
        let ctx = context(&dir, Mode::Development, CAT);

        let err = MarkupStep.run(&ctx).unwrap_err();
        match err {
            StepError::Validation { path, line, .. } => {
                assert!(path.ends_with("bad.pug"));
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.path().join("dist/bad.html").exists());
        assert!(dir.path().join("dist/good.html").exists());
    }

    #[test]
    fn test_missing_doctype_is_warning() {
        let dir = TempDir::new().unwrap();
        put(&dir, "src/pug/frag.pug", "<p>fragment</p>");
        let ctx = context(&dir, Mode::Development, CAT);

        let report = MarkupStep.run(&ctx).unwrap();
        assert_eq!(report.written.len(), 1);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("doctype-first"));
    }
}
