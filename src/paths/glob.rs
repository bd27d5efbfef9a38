//! Glob compilation and matching directory walks.

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use std::path::{Path, PathBuf};

/// Compile a root-relative glob where `*` does not cross `/`.
pub fn compile_glob(pattern: &str) -> Result<GlobMatcher> {
    build_glob(pattern, false)
}

/// Like [`compile_glob`], ignoring ASCII case (`Photo.JPG` matches `*.jpg`).
pub fn compile_glob_nocase(pattern: &str) -> Result<GlobMatcher> {
    build_glob(pattern, true)
}

fn build_glob(pattern: &str, case_insensitive: bool) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(pattern)
        .literal_separator(true)
        .case_insensitive(case_insensitive)
        .build()
        .with_context(|| format!("invalid glob `{pattern}`"))?;
    Ok(glob.compile_matcher())
}

/// Leading components of a glob that contain no metacharacters.
///
/// `src/img/**/*.png` -> `src/img`
pub fn glob_base(pattern: &str) -> PathBuf {
    pattern
        .split('/')
        .take_while(|part| !part.contains(['*', '?', '[', '{']))
        .collect()
}

/// Walk `root/base` and return files whose root-relative path matches.
///
/// `base` may name a file (a literal glob) or a directory. Results are
/// sorted so every consumer sees a stable order.
pub fn walk_matching(
    root: &Path,
    base: &Path,
    matcher: &GlobMatcher,
    exclude: Option<&GlobMatcher>,
) -> Vec<PathBuf> {
    let start = root.join(base);
    let is_match = |path: &Path| {
        path.strip_prefix(root).is_ok_and(|relative| {
            matcher.is_match(relative) && !exclude.is_some_and(|e| e.is_match(relative))
        })
    };

    if start.is_file() {
        return if is_match(&start) { vec![start] } else { Vec::new() };
    }
    if !start.is_dir() {
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = jwalk::WalkDir::new(&start)
        .skip_hidden(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path())
        .filter(|path| is_match(path))
        .collect();

    files.sort();
    files
}
