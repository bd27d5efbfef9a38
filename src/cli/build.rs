//! One-shot pipeline runs: `build` and `clean`.

use std::sync::Arc;

use anyhow::{Result, bail};

use crate::{
    config::ProjectConfig,
    core::Mode,
    log,
    pipeline::{Executor, Plan, RunSummary, StepOutcome, compose},
    reload::ReloadBus,
    step::{Registry, StepContext, StepId},
    utils::plural_count,
};

/// Clean and run the production pipeline.
///
/// Fails when a mandatory-order step failed, or any step under `strict`.
pub fn build_project(config: &Arc<ProjectConfig>) -> Result<()> {
    let executor = executor(config, Mode::Production)?;
    let summary = run_plan(&executor, &compose(Mode::Production))?;
    finish(&summary)
}

/// Run only the Clean step.
pub fn clean_project(config: &Arc<ProjectConfig>) -> Result<()> {
    let executor = executor(config, Mode::Production)?;
    let plan = Plan::new(Mode::Production).step(StepId::Clean, &[]);
    let summary = run_plan(&executor, &plan)?;
    if summary.succeeded() {
        log!("clean"; "removed {}", config.paths.output.display());
    }
    finish(&summary)
}

fn executor(config: &Arc<ProjectConfig>, mode: Mode) -> Result<Executor> {
    let ctx = StepContext::new(mode, Arc::clone(config))?;
    // Nobody subscribes in one-shot runs
    Ok(Executor::new(Registry::builtin(), ctx, ReloadBus::new())
        .strict(config.build.strict)
        .with_progress(true))
}

fn run_plan(executor: &Executor, plan: &Plan) -> Result<RunSummary> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(executor.run(plan))
}

/// Log a summary line; Err when the run failed.
pub fn finish(summary: &RunSummary) -> Result<()> {
    log_summary(summary);
    if !summary.succeeded() {
        let failed: Vec<_> = summary.failures().map(|(id, _)| id.name()).collect();
        bail!("build failed: {}", failed.join(", "));
    }
    Ok(())
}

/// Counts of written files, warnings and failures.
pub fn log_summary(summary: &RunSummary) {
    let mut warnings = 0;
    let mut failed = 0;
    let mut skipped = 0;
    for (_, outcome) in &summary.outcomes {
        match outcome {
            StepOutcome::Done(report) => warnings += report.warnings.len(),
            StepOutcome::Failed { .. } => failed += 1,
            StepOutcome::Skipped { .. } => skipped += 1,
        }
    }

    let mut parts = vec![plural_count(summary.written(), "file")];
    if warnings > 0 {
        parts.push(plural_count(warnings, "warning"));
    }
    if failed > 0 {
        parts.push(format!("{failed} failed"));
    }
    if skipped > 0 {
        parts.push(format!("{skipped} skipped"));
    }
    log!(
        "build";
        "{} in {:.2}s",
        parts.join(", "),
        summary.elapsed.as_secs_f64()
    );
}
