//! Stylesheet steps: raw CSS copy and the two Sass pipelines.

use std::path::Path;

use super::css::{self, Options, Processed};
use super::tool::{Vars, run_tool};
use super::{StepContext, StepError, StepId, StepReport, TransformStep, mirrored, stem};
use crate::core::AssetKind;
use crate::reload::Refresh;
use crate::utils::fs::{copy_file, write_file};
use crate::debug;

/// Copies plain CSS files, keeping their subpaths.
pub struct RawStyleStep;

impl TransformStep for RawStyleStep {
    fn id(&self) -> StepId {
        StepId::StylesRaw
    }

    fn inputs(&self) -> &'static [AssetKind] {
        &[AssetKind::StyleRaw]
    }

    fn refresh(&self) -> Option<Refresh> {
        Some(Refresh::Css)
    }

    fn run(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
        let mut report = StepReport::default();
        let base = ctx.paths.source_base(AssetKind::StyleRaw);
        let out_dir = ctx.paths.output_dir(AssetKind::StyleRaw);

        for source in ctx.paths.sources(AssetKind::StyleRaw) {
            let target = mirrored(&source, &base, &out_dir);
            copy_file(&source, &target).map_err(|e| StepError::io(&source, e))?;
            report.wrote(target);
        }
        Ok(report)
    }
}

/// Development Sass: expanded, prefixed, source map kept.
pub struct DevStyleStep;

impl TransformStep for DevStyleStep {
    fn id(&self) -> StepId {
        StepId::StylesDev
    }

    fn inputs(&self) -> &'static [AssetKind] {
        &[AssetKind::StyleSource]
    }

    fn refresh(&self) -> Option<Refresh> {
        Some(Refresh::Css)
    }

    fn run(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
        compile_styles(ctx, false)
    }
}

/// Production Sass: prefixed, media-grouped, plus a minified twin.
pub struct ProdStyleStep;

impl TransformStep for ProdStyleStep {
    fn id(&self) -> StepId {
        StepId::StylesProd
    }

    fn inputs(&self) -> &'static [AssetKind] {
        &[AssetKind::StyleSource]
    }

    fn refresh(&self) -> Option<Refresh> {
        Some(Refresh::Css)
    }

    fn run(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
        compile_styles(ctx, true)
    }
}

fn compile_styles(ctx: &StepContext, production: bool) -> Result<StepReport, StepError> {
    let mut report = StepReport::default();
    let sources = ctx.paths.sources(AssetKind::StyleSource);
    if sources.is_empty() {
        debug!("styles"; "no entry matched {}", ctx.paths.get(AssetKind::StyleSource).source);
        return Ok(report);
    }

    let targets =
        css::targets(&ctx.config.styles.browsers).map_err(|e| StepError::tool("browserslist", e))?;
    let options = Options {
        targets,
        group_media: production,
        minified: production,
    };
    let out_dir = ctx.paths.output_dir(AssetKind::StyleSource);

    for source in &sources {
        let Processed { code, minified } = compile_one(ctx, source, options)?;
        let name = stem(source);

        let target = out_dir.join(format!("{name}.css"));
        write_file(&target, code).map_err(|e| StepError::io(&target, e))?;
        report.wrote(target);

        if let Some(minified) = minified {
            let target = out_dir.join(format!("{name}.min.css"));
            write_file(&target, minified).map_err(|e| StepError::io(&target, e))?;
            report.wrote(target);
        }
    }
    Ok(report)
}

fn compile_one(ctx: &StepContext, source: &Path, options: Options) -> Result<Processed, StepError> {
    let vars = Vars::new(ctx).input(source);
    let compiled = run_tool("sass", &ctx.config.tools.sass, ctx, &vars, None)?;
    let compiled = String::from_utf8_lossy(&compiled);

    let filename = ctx.display(source).to_string();
    css::process(&compiled, &filename, options).map_err(|e| StepError::tool("lightningcss", e))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::Mode;
    use crate::step::testing::{context, put};
    use tempfile::TempDir;

    /// Stand-in compiler: prints the entry with `@import` lines dropped.
    const FAKE_SASS: &str = r#"
[tools.sass]
command = ["sh", "-c", "grep -v '@import' \"$0\"; true", "$INPUT"]
dev_args = []
build_args = []
"#;

    #[test]
    fn test_raw_css_keeps_subpaths() {
        let dir = TempDir::new().unwrap();
        put(&dir, "src/css/vendor/reset.css", "* { margin: 0 }");
        put(&dir, "src/css/base.css", "body { color: red }");
        let ctx = context(&dir, Mode::Development, "");

        let report = RawStyleStep.run(&ctx).unwrap();
        assert_eq!(report.written.len(), 2);
        let copied = std::fs::read_to_string(dir.path().join("dist/css/vendor/reset.css")).unwrap();
        assert_eq!(copied, "* { margin: 0 }");
    }

    #[test]
    fn test_dev_writes_single_file() {
        let dir = TempDir::new().unwrap();
        put(&dir, "src/scss/style.scss", "@import 'vars';\n.a { color: red }\n");
        let ctx = context(&dir, Mode::Development, FAKE_SASS);

        let report = DevStyleStep.run(&ctx).unwrap();
        assert_eq!(report.written, vec![dir.path().join("dist/css/style.css")]);
        assert!(!dir.path().join("dist/css/style.min.css").exists());
    }

    #[test]
    fn test_prod_writes_plain_and_minified() {
        let dir = TempDir::new().unwrap();
        put(
            &dir,
            "src/scss/style.scss",
            "@media (min-width: 1px) { .a { color: red } }\n.b { color: blue }\n",
        );
        let ctx = context(&dir, Mode::Production, FAKE_SASS);

        ProdStyleStep.run(&ctx).unwrap();
        let plain = std::fs::read_to_string(dir.path().join("dist/css/style.css")).unwrap();
        let min = std::fs::read_to_string(dir.path().join("dist/css/style.min.css")).unwrap();
        assert!(plain.find(".b").unwrap() < plain.find("@media").unwrap());
        assert!(min.len() < plain.len());
        assert!(!min.contains('\n'));
    }

    #[test]
    fn test_compiler_failure_is_tool_error() {
        let dir = TempDir::new().unwrap();
        put(&dir, "src/scss/style.scss", ".a {");
        let ctx = context(
            &dir,
            Mode::Development,
            "[tools.sass]\ncommand = [\"sh\", \"-c\", \"echo 'expected }' >&2; exit 65\"]\n",
        );
        let err = DevStyleStep.run(&ctx).unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_missing_entry_is_noop() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, Mode::Development, FAKE_SASS);
        assert!(DevStyleStep.run(&ctx).unwrap().written.is_empty());
    }
}
