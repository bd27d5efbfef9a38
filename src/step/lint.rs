//! Builtin Sass lint.
//!
//! A brace-level scanner over SCSS sources. It understands comments (both
//! styles), strings, `#{}` interpolation and `$variable` / `@rule`
//! statements, which is enough to check the rules below without a full
//! Sass parser.

use rustc_hash::FxHashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use super::{StepContext, StepError, StepId, StepReport, TransformStep};
use crate::config::LintConfig;
use crate::core::AssetKind;

/// Every rule the linter knows.
pub const RULES: &[&str] = &[
    "block-no-empty",
    "declaration-no-important",
    "color-no-invalid-hex",
    "declaration-block-no-duplicate-properties",
    "max-nesting-depth",
    "no-eol-whitespace",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: PathBuf,
    pub line: usize,
    pub col: usize,
    pub rule: &'static str,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}  {} ({})",
            self.path.display(),
            self.line,
            self.col,
            self.message,
            self.rule
        )
    }
}

/// Lint pass run after every development stylesheet compile.
pub struct LintStep;

impl TransformStep for LintStep {
    fn id(&self) -> StepId {
        StepId::StylesLint
    }

    fn inputs(&self) -> &'static [AssetKind] {
        &[AssetKind::StyleSource]
    }

    /// Violations become warnings; the pass itself never fails.
    fn run(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
        let mut report = StepReport::default();
        match lint_project(ctx) {
            Ok(violations) => {
                for violation in violations {
                    report.warn(violation.to_string());
                }
            }
            Err(e) => report.warn(format!("lint skipped: {e}")),
        }
        Ok(report)
    }
}

/// Lint every file covered by the stylesheet watch glob.
pub fn lint_project(ctx: &StepContext) -> Result<Vec<Violation>, StepError> {
    let config = &ctx.config.styles.lint;
    if !config.enable {
        return Ok(Vec::new());
    }

    let mut violations = Vec::new();
    for path in ctx.paths.watched_files(AssetKind::StyleSource) {
        let source = fs::read_to_string(&path).map_err(|e| StepError::io(&path, e))?;
        let shown = ctx.paths.relative(&path).unwrap_or(&path);
        violations.extend(lint_source(shown, &source, config));
    }
    Ok(violations)
}

/// Lint one source text, returning violations sorted by position.
pub fn lint_source(path: &Path, source: &str, config: &LintConfig) -> Vec<Violation> {
    let mut linter = Linter::new(source, config);
    linter.scan();
    linter.eol_whitespace();

    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(source.match_indices('\n').map(|(i, _)| i + 1))
        .collect();

    let mut violations: Vec<_> = linter
        .found
        .into_iter()
        .map(|(offset, rule, message)| {
            let line = line_starts.partition_point(|&start| start <= offset);
            Violation {
                path: path.to_path_buf(),
                line,
                col: offset - line_starts[line - 1] + 1,
                rule,
                message,
            }
        })
        .collect();
    violations.sort_by_key(|v| (v.line, v.col));
    violations
}

struct Block {
    start: usize,
    has_content: bool,
    props: FxHashSet<String>,
}

struct Linter<'a> {
    src: &'a str,
    config: &'a LintConfig,
    stack: Vec<Block>,
    found: Vec<(usize, &'static str, String)>,
}

impl<'a> Linter<'a> {
    fn new(src: &'a str, config: &'a LintConfig) -> Self {
        Self {
            src,
            config,
            stack: Vec::new(),
            found: Vec::new(),
        }
    }

    fn report(&mut self, offset: usize, rule: &'static str, message: impl Into<String>) {
        if self.config.is_enabled(rule) {
            self.found.push((offset, rule, message.into()));
        }
    }

    fn scan(&mut self) {
        let src = self.src;
        let bytes = src.as_bytes();
        let mut i = 0;
        let mut segment = 0;
        let mut parens = 0usize;
        let mut interpolation = 0usize;

        while i < bytes.len() {
            match bytes[i] {
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    let end = src[i + 2..].find("*/").map_or(bytes.len(), |p| i + 2 + p + 2);
                    if src[segment..i].trim().is_empty() {
                        segment = end;
                    }
                    i = end;
                    continue;
                }
                // `//` inside url(...) is part of the value
                b'/' if bytes.get(i + 1) == Some(&b'/') && parens == 0 => {
                    let end = src[i..].find('\n').map_or(bytes.len(), |p| i + p);
                    if src[segment..i].trim().is_empty() {
                        segment = end;
                    }
                    i = end;
                    continue;
                }
                quote @ (b'"' | b'\'') => {
                    i = skip_string(bytes, i, quote);
                    continue;
                }
                b'(' => parens += 1,
                b')' => parens = parens.saturating_sub(1),
                b'#' if bytes.get(i + 1) == Some(&b'{') => {
                    interpolation += 1;
                    i += 2;
                    continue;
                }
                b'}' if interpolation > 0 => interpolation -= 1,
                b'{' => {
                    self.open_block(segment, i);
                    segment = i + 1;
                }
                b';' => {
                    self.statement(segment, i);
                    segment = i + 1;
                }
                b'}' => {
                    self.statement(segment, i);
                    self.close_block();
                    segment = i + 1;
                }
                _ => {}
            }
            i += 1;
        }
    }

    fn open_block(&mut self, segment: usize, brace: usize) {
        let depth = self.stack.len();
        if let Some(parent) = self.stack.last_mut() {
            parent.has_content = true;
        }

        let start = first_non_space(self.src, segment, brace);
        if depth > self.config.max_nesting_depth {
            let max = self.config.max_nesting_depth;
            self.report(
                start,
                "max-nesting-depth",
                format!("Expected nesting depth to be no more than {max}"),
            );
        }
        self.stack.push(Block {
            start,
            has_content: false,
            props: FxHashSet::default(),
        });
    }

    fn close_block(&mut self) {
        if let Some(block) = self.stack.pop()
            && !block.has_content
        {
            self.report(block.start, "block-no-empty", "Unexpected empty block");
        }
    }

    fn statement(&mut self, segment: usize, end: usize) {
        let src = self.src;
        let start = first_non_space(src, segment, end);
        let text = src[start..end].trim_end();
        if text.is_empty() {
            return;
        }
        if let Some(block) = self.stack.last_mut() {
            block.has_content = true;
        }
        if text.starts_with('$') || text.starts_with('@') {
            return;
        }
        let Some(colon) = text.find(':') else {
            return;
        };

        let property = text[..colon].trim().to_ascii_lowercase();
        let value = &text[colon + 1..];
        let value_start = start + colon + 1;

        let duplicate = self
            .stack
            .last_mut()
            .is_some_and(|block| !block.props.insert(property.clone()));
        if duplicate {
            self.report(
                start,
                "declaration-block-no-duplicate-properties",
                format!("Unexpected duplicate \"{property}\""),
            );
        }

        if let Some(pos) = value.to_ascii_lowercase().find("!important") {
            self.report(value_start + pos, "declaration-no-important", "Unexpected !important");
        }

        for (pos, _) in value.match_indices('#') {
            let rest = &value[pos + 1..];
            if rest.starts_with('{') {
                continue;
            }
            let len = rest.bytes().take_while(u8::is_ascii_alphanumeric).count();
            if len == 0 {
                continue;
            }
            let hex = &rest[..len];
            let valid = matches!(len, 3 | 4 | 6 | 8) && hex.bytes().all(|b| b.is_ascii_hexdigit());
            if !valid {
                self.report(
                    value_start + pos,
                    "color-no-invalid-hex",
                    format!("Unexpected invalid hex color \"#{hex}\""),
                );
            }
        }
    }

    fn eol_whitespace(&mut self) {
        let src = self.src;
        let mut offset = 0;
        for line in src.split('\n') {
            let content = line.strip_suffix('\r').unwrap_or(line);
            let trimmed = content.trim_end_matches([' ', '\t']);
            if trimmed.len() != content.len() {
                self.report(
                    offset + trimmed.len(),
                    "no-eol-whitespace",
                    "Unexpected whitespace at end of line",
                );
            }
            offset += line.len() + 1;
        }
    }
}

fn first_non_space(src: &str, from: usize, to: usize) -> usize {
    let text = &src[from..to];
    from + (text.len() - text.trim_start().len())
}

/// Index just past the closing quote (or end of input).
fn skip_string(bytes: &[u8], open: usize, quote: u8) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            b'\n' => return i,
            _ => i += 1,
        }
    }
    bytes.len()
}
