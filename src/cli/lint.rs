//! `linter` command: the Sass lint pass on its own.

use std::sync::Arc;

use anyhow::Result;
use owo_colors::OwoColorize;

use crate::{
    config::ProjectConfig,
    core::Mode,
    log,
    step::{StepContext, lint::lint_project},
    utils::plural_count,
};

/// Print violations. Exits 0 unless the sources cannot be read.
pub fn lint_styles(config: &Arc<ProjectConfig>) -> Result<()> {
    if !config.styles.lint.enable {
        log!("lint"; "disabled in [styles.lint]");
        return Ok(());
    }

    let ctx = StepContext::new(Mode::Development, Arc::clone(config))?;
    let violations = lint_project(&ctx)?;

    for violation in &violations {
        println!(
            "{}:{}:{}  {} {}",
            violation.path.display(),
            violation.line,
            violation.col,
            violation.message,
            violation.rule.dimmed()
        );
    }

    if violations.is_empty() {
        log!("lint"; "no problems found");
    } else {
        log!("lint"; "{}", plural_count(violations.len(), "problem"));
    }
    Ok(())
}
