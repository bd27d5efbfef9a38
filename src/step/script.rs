//! Script bundle: external bundler, then oxc minification.

use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

use super::tool::{Vars, run_tool};
use super::{StepContext, StepError, StepId, StepReport, TransformStep};
use crate::core::AssetKind;
use crate::debug;
use crate::reload::Refresh;
use crate::utils::fs::write_file;

pub struct ScriptStep;

impl TransformStep for ScriptStep {
    fn id(&self) -> StepId {
        StepId::Scripts
    }

    fn inputs(&self) -> &'static [AssetKind] {
        &[AssetKind::Script]
    }

    fn refresh(&self) -> Option<Refresh> {
        Some(Refresh::Page)
    }

    fn run(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
        let mut report = StepReport::default();
        let Some(entry) = ctx.paths.sources(AssetKind::Script).into_iter().next() else {
            debug!("scripts"; "no entry matched {}", ctx.paths.get(AssetKind::Script).source);
            return Ok(report);
        };

        let vars = Vars::new(ctx).input(&entry);
        let bundle = run_tool("bundler", &ctx.config.tools.bundler, ctx, &vars, None)?;
        let bundle = String::from_utf8_lossy(&bundle);

        let code = if ctx.config.scripts.minify {
            minify_js(&bundle).ok_or_else(|| {
                StepError::tool("oxc", format!("{}: bundle does not parse", ctx.display(&entry)))
            })?
        } else {
            bundle.into_owned()
        };

        let target = ctx
            .paths
            .output_dir(AssetKind::Script)
            .join(&ctx.config.scripts.output);
        write_file(&target, code).map_err(|e| StepError::io(&target, e))?;
        report.wrote(target);
        Ok(report)
    }
}

/// Minify a bundled script. `None` if it does not parse.
pub fn minify_js(source: &str) -> Option<String> {
    let allocator = Allocator::default();
    let source_type = SourceType::mjs();
    let ret = Parser::new(&allocator, source, source_type).parse();
    if !ret.errors.is_empty() {
        return None;
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Some(code)
}
