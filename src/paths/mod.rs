//! Path table: where each asset kind is read from, watched at and written to.
//!
//! Every [`AssetKind`] maps to exactly one [`PathSpec`]. Globs are relative to
//! the project root and compiled with literal separators, so `*` never
//! crosses a `/`. Image globs ignore case.
//!
//! | Kind        | source glob                                | output         |
//! |-------------|--------------------------------------------|----------------|
//! | Markup      | `src/pug/*.pug`                            | `dist`         |
//! | StyleSource | `src/scss/style.scss`                      | `dist/css`     |
//! | StyleRaw    | `src/css/**/*.css`                         | `dist/css`     |
//! | Script      | `src/js/index.js`                          | `dist/js`      |
//! | Image       | `src/img/**/*.{jpg,...}` minus `icons/**`  | `dist/img`     |
//! | Icon        | `src/img/icons/**/*.svg`                   | `dist/img`     |
//! | Font        | `src/fonts/**/*.{ttf,otf}`                 | `dist/fonts`   |

mod glob;

pub use glob::{compile_glob, compile_glob_nocase, glob_base, walk_matching};

use anyhow::Result;
use globset::GlobMatcher;
use std::path::{Path, PathBuf};

use crate::config::ProjectConfig;
use crate::core::AssetKind;

/// Declarative location of one asset kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSpec {
    pub kind: AssetKind,
    /// Files a full build reads
    pub source: String,
    /// Files whose change triggers a rebuild (superset of `source`)
    pub watch: String,
    /// Files excluded from both globs
    pub exclude: Option<String>,
    /// Output directory, relative to the project root
    pub output: PathBuf,
}

impl PathSpec {
    /// Fixed project layout under the `source` and `output` roots.
    pub fn layout(kind: AssetKind, source: &str, output: &str) -> Self {
        let src = |rest: &str| join_glob(source, rest);
        let out = |rest: &str| PathBuf::from(join_glob(output, rest));

        let (source_glob, watch, exclude, output) = match kind {
            AssetKind::Markup => (src("pug/*.pug"), src("pug/**/*.pug"), None, out("")),
            AssetKind::StyleSource => (
                src("scss/style.scss"),
                src("scss/**/*.scss"),
                None,
                out("css"),
            ),
            AssetKind::StyleRaw => (src("css/**/*.css"), src("css/**/*.css"), None, out("css")),
            AssetKind::Script => (src("js/index.js"), src("js/**/*.js"), None, out("js")),
            AssetKind::Image => {
                let images = src("img/**/*.{jpg,jpeg,png,webp,svg,ico,gif}");
                (images.clone(), images, Some(src("img/icons/**")), out("img"))
            }
            AssetKind::Icon => (
                src("img/icons/**/*.svg"),
                src("img/icons/**/*.svg"),
                None,
                out("img"),
            ),
            AssetKind::Font => (
                src("fonts/**/*.{ttf,otf}"),
                src("fonts/**/*.{ttf,otf}"),
                None,
                out("fonts"),
            ),
        };

        Self {
            kind,
            source: source_glob,
            watch,
            exclude,
            output,
        }
    }
}

/// Join a root directory and a relative glob, dropping a `.` root.
fn join_glob(base: &str, rest: &str) -> String {
    let base = base.trim_end_matches('/');
    match (base, rest) {
        ("" | ".", rest) => rest.to_string(),
        (base, "") => base.to_string(),
        (base, rest) => format!("{base}/{rest}"),
    }
}

struct CompiledSpec {
    spec: PathSpec,
    source: GlobMatcher,
    watch: GlobMatcher,
    exclude: Option<GlobMatcher>,
}

/// Immutable lookup from asset kind to its compiled path spec.
pub struct PathTable {
    root: PathBuf,
    output_root: PathBuf,
    source_root: PathBuf,
    specs: Vec<CompiledSpec>,
}

impl PathTable {
    pub fn from_config(config: &ProjectConfig) -> Result<Self> {
        let source = config.paths.source.to_string_lossy().replace('\\', "/");
        let output = config.paths.output.to_string_lossy().replace('\\', "/");
        Self::new(&config.root, &source, &output)
    }

    pub fn new(root: &Path, source: &str, output: &str) -> Result<Self> {
        let specs = AssetKind::ALL
            .iter()
            .map(|&kind| {
                let spec = PathSpec::layout(kind, source, output);
                // camera files often carry upper-case extensions
                let compile: fn(&str) -> Result<GlobMatcher> = match kind {
                    AssetKind::Image => compile_glob_nocase,
                    _ => compile_glob,
                };
                Ok(CompiledSpec {
                    source: compile(&spec.source)?,
                    watch: compile(&spec.watch)?,
                    exclude: spec.exclude.as_deref().map(compile).transpose()?,
                    spec,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            root: root.to_path_buf(),
            output_root: root.join(output),
            source_root: root.join(source),
            specs,
        })
    }

    fn compiled(&self, kind: AssetKind) -> &CompiledSpec {
        &self.specs[kind.index()]
    }

    pub fn get(&self, kind: AssetKind) -> &PathSpec {
        &self.compiled(kind).spec
    }

    pub fn specs(&self) -> impl Iterator<Item = &PathSpec> {
        self.specs.iter().map(|c| &c.spec)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute output root (the directory Clean removes).
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Absolute source root (the directory the watcher observes).
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Absolute output directory of a kind.
    pub fn output_dir(&self, kind: AssetKind) -> PathBuf {
        self.root.join(&self.get(kind).output)
    }

    /// Absolute directory that relative output paths of a kind are computed from.
    pub fn source_base(&self, kind: AssetKind) -> PathBuf {
        self.root.join(glob_base(&self.get(kind).source))
    }

    /// Source files of a kind, sorted. A missing directory yields no files.
    pub fn sources(&self, kind: AssetKind) -> Vec<PathBuf> {
        let c = self.compiled(kind);
        walk_matching(&self.root, &glob_base(&c.spec.source), &c.source, c.exclude.as_ref())
    }

    /// Every file the watch glob of a kind covers, sorted.
    pub fn watched_files(&self, kind: AssetKind) -> Vec<PathBuf> {
        let c = self.compiled(kind);
        walk_matching(&self.root, &glob_base(&c.spec.watch), &c.watch, c.exclude.as_ref())
    }

    /// Whether a root-relative path falls under the watch glob of a kind.
    pub fn is_watched(&self, kind: AssetKind, relative: &Path) -> bool {
        let c = self.compiled(kind);
        c.watch.is_match(relative) && !c.exclude.as_ref().is_some_and(|e| e.is_match(relative))
    }

    /// Path relative to the project root, if inside it.
    pub fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.root).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn table(root: &Path) -> PathTable {
        PathTable::new(root, "src", "dist").unwrap()
    }

    #[test]
    fn test_exactly_one_spec_per_kind() {
        let table = table(Path::new("/project"));
        let kinds: Vec<_> = table.specs().map(|s| s.kind).collect();
        assert_eq!(kinds.len(), AssetKind::ALL.len());
        for kind in AssetKind::ALL {
            assert_eq!(kinds.iter().filter(|k| **k == kind).count(), 1, "{kind}");
            assert_eq!(table.get(kind).kind, kind);
        }
    }

    #[test]
    fn test_layout_globs() {
        let table = table(Path::new("/project"));
        assert_eq!(table.get(AssetKind::Markup).source, "src/pug/*.pug");
        assert_eq!(table.get(AssetKind::Markup).output, PathBuf::from("dist"));
        assert_eq!(table.get(AssetKind::StyleSource).watch, "src/scss/**/*.scss");
        assert_eq!(table.get(AssetKind::Font).output, PathBuf::from("dist/fonts"));
        assert_eq!(
            table.output_dir(AssetKind::Script),
            PathBuf::from("/project/dist/js")
        );
    }

    #[test]
    fn test_join_glob_dot_root() {
        assert_eq!(join_glob(".", "pug/*.pug"), "pug/*.pug");
        assert_eq!(join_glob("assets/", "js/index.js"), "assets/js/index.js");
        assert_eq!(join_glob("dist", ""), "dist");
    }

    #[test]
    fn test_image_and_icon_globs_do_not_overlap() {
        let table = table(Path::new("/project"));
        let icon = Path::new("src/img/icons/arrow.svg");
        let image = Path::new("src/img/logo.svg");

        assert!(!table.is_watched(AssetKind::Image, icon));
        assert!(table.is_watched(AssetKind::Icon, icon));
        assert!(table.is_watched(AssetKind::Image, image));
        assert!(!table.is_watched(AssetKind::Icon, image));
    }

    #[test]
    fn test_image_extensions_ignore_case() {
        let table = table(Path::new("/project"));
        assert!(table.is_watched(AssetKind::Image, Path::new("src/img/Photo.JPG")));
        assert!(table.compiled(AssetKind::Image).source.is_match("src/img/Photo.PNG"));
        assert!(!table.is_watched(AssetKind::Image, Path::new("src/img/icons/Arrow.SVG")));
    }

    #[test]
    fn test_markup_source_is_top_level_only() {
        let table = table(Path::new("/project"));
        assert!(table.is_watched(AssetKind::Markup, Path::new("src/pug/parts/head.pug")));
        let c = table.compiled(AssetKind::Markup);
        assert!(c.source.is_match("src/pug/index.pug"));
        assert!(!c.source.is_match("src/pug/parts/head.pug"));
    }

    #[test]
    fn test_sources_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        let img = dir.path().join("src/img");
        fs::create_dir_all(img.join("icons")).unwrap();
        fs::write(img.join("b.png"), "").unwrap();
        fs::write(img.join("a.jpg"), "").unwrap();
        fs::write(img.join("notes.txt"), "").unwrap();
        fs::write(img.join("icons/x.svg"), "").unwrap();

        let table = table(dir.path());
        let images = table.sources(AssetKind::Image);
        assert_eq!(images, vec![img.join("a.jpg"), img.join("b.png")]);
        assert_eq!(table.sources(AssetKind::Icon), vec![img.join("icons/x.svg")]);
    }

    #[test]
    fn test_missing_source_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let table = table(dir.path());
        assert!(table.sources(AssetKind::Font).is_empty());
    }
}
