//! External tool invocation with placeholder substitution.

use std::path::Path;

use super::{StepContext, StepError};
use crate::config::ToolConfig;
use crate::utils::exec::{Cmd, NPX_FILTER};

/// Placeholder values for one invocation.
#[derive(Debug, Default)]
pub struct Vars {
    pairs: Vec<(&'static str, String)>,
}

impl Vars {
    pub fn new(ctx: &StepContext) -> Self {
        Self::default().set("$ROOT", ctx.root())
    }

    pub fn input(self, path: &Path) -> Self {
        self.set("$INPUT", path)
    }

    pub fn output(self, path: &Path) -> Self {
        self.set("$OUTPUT", path)
    }

    pub fn output_dir(self, path: &Path) -> Self {
        self.set("$OUTPUT_DIR", path)
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.pairs.push(("$QUALITY", quality.to_string()));
        self
    }

    fn set(mut self, key: &'static str, path: &Path) -> Self {
        self.pairs.push((key, path.to_string_lossy().into_owned()));
        self
    }

    /// Substitute every placeholder in one argument.
    ///
    /// `$OUTPUT_DIR` is replaced before `$OUTPUT`, which is its prefix.
    pub fn expand(&self, arg: &str) -> String {
        let mut pairs: Vec<_> = self.pairs.iter().collect();
        pairs.sort_by_key(|(key, _)| std::cmp::Reverse(key.len()));
        pairs
            .into_iter()
            .fold(arg.to_string(), |acc, (key, value)| acc.replace(key, value))
    }
}

/// Run a configured tool and return its stdout.
///
/// Every failure (missing binary, non-zero exit) is a [`StepError::Tool`].
pub fn run_tool(
    name: &str,
    tool: &ToolConfig,
    ctx: &StepContext,
    vars: &Vars,
    stdin: Option<&[u8]>,
) -> Result<Vec<u8>, StepError> {
    let argv: Vec<String> = tool.argv(ctx.mode).map(|arg| vars.expand(arg)).collect();
    let Some(program) = argv.first() else {
        return Err(StepError::tool(name, "no command configured"));
    };

    which::which_in(program, std::env::var_os("PATH"), ctx.root())
        .map_err(|_| StepError::tool(name, format!("`{program}` not found in PATH")))?;

    let mut cmd = Cmd::from_slice(&argv)
        .cwd(ctx.root())
        .envs([("ASSETLINE_MODE", ctx.mode.label())])
        .filter(&NPX_FILTER);
    if let Some(data) = stdin {
        cmd = cmd.stdin(data);
    }

    let output = cmd.run().map_err(|e| StepError::tool(name, format!("{e:#}")))?;
    Ok(output.stdout)
}
