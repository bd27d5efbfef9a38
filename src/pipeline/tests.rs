use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::TempDir;

use super::*;
use crate::core::Mode;
use crate::reload::{Refresh, ReloadBus};
use crate::step::testing::{context, put};
use crate::step::{Registry, StepContext, StepError, StepReport, TransformStep};

// ============================================================================
// Composition
// ============================================================================

#[test]
fn test_clean_runs_first() {
    for mode in [Mode::Development, Mode::Production] {
        let order = compose(mode).topological_order().unwrap();
        assert_eq!(order[0], StepId::Clean);
        let plan = compose(mode);
        for id in plan.steps().filter(|id| *id != StepId::Clean) {
            assert!(!plan.prerequisites(id).is_empty(), "{id} runs before clean");
        }
    }
}

#[test]
fn test_webp_after_images() {
    let order = compose(Mode::Production).topological_order().unwrap();
    let images = order.iter().position(|s| *s == StepId::Images).unwrap();
    let webp = order.iter().position(|s| *s == StepId::Webp).unwrap();
    assert!(images < webp);
}

#[test]
fn test_mode_selects_style_steps() {
    let dev = compose(Mode::Development);
    assert!(dev.contains(StepId::StylesDev));
    assert!(dev.contains(StepId::StylesLint));
    assert!(!dev.contains(StepId::StylesProd));

    let prod = compose(Mode::Production);
    assert!(prod.contains(StepId::StylesProd));
    assert!(!prod.contains(StepId::StylesLint));
    assert!(!prod.contains(StepId::StylesDev));
    assert_eq!(prod.len(), 11);
}

#[test]
fn test_cycle_rejected() {
    let plan = Plan::new(Mode::Development)
        .step(StepId::Clean, &[])
        .step(StepId::Images, &[StepId::Webp])
        .step(StepId::Webp, &[StepId::Images]);
    match plan.validate() {
        Err(PlanError::Cycle(stuck)) => {
            assert_eq!(stuck, vec![StepId::Images, StepId::Webp]);
        }
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn test_unknown_prerequisite_rejected() {
    let plan = Plan::new(Mode::Production).step(StepId::Webp, &[StepId::Images]);
    assert_eq!(
        plan.validate(),
        Err(PlanError::UnknownPrerequisite {
            step: StepId::Webp,
            prerequisite: StepId::Images,
        })
    );
}

#[test]
fn test_duplicate_rejected() {
    let plan = Plan::new(Mode::Production)
        .step(StepId::Clean, &[])
        .step(StepId::Clean, &[]);
    assert_eq!(plan.validate(), Err(PlanError::Duplicate(StepId::Clean)));
}

// ============================================================================
// Execution
// ============================================================================

/// Step that records when it ran and optionally fails.
struct FakeStep {
    id: StepId,
    delay: Duration,
    fail: bool,
    log: Arc<Mutex<Vec<StepId>>>,
}

impl TransformStep for FakeStep {
    fn id(&self) -> StepId {
        self.id
    }

    fn refresh(&self) -> Option<Refresh> {
        Some(Refresh::Page)
    }

    fn run(&self, _ctx: &StepContext) -> Result<StepReport, StepError> {
        thread::sleep(self.delay);
        self.log.lock().push(self.id);
        if self.fail {
            return Err(StepError::tool("fake", "rejected input"));
        }
        Ok(StepReport::default())
    }
}

fn fake_registry(specs: &[(StepId, u64, bool)], log: &Arc<Mutex<Vec<StepId>>>) -> Registry {
    specs.iter().fold(Registry::default(), |registry, &(id, delay, fail)| {
        registry.with(FakeStep {
            id,
            delay: Duration::from_millis(delay),
            fail,
            log: Arc::clone(log),
        })
    })
}

#[tokio::test]
async fn test_dependent_waits_for_slow_prerequisite() {
    let dir = TempDir::new().unwrap();
    let log = Arc::default();
    let registry = fake_registry(
        &[
            (StepId::Clean, 0, false),
            (StepId::Images, 150, false),
            (StepId::Webp, 0, false),
            (StepId::Markup, 0, false),
        ],
        &log,
    );
    let plan = Plan::new(Mode::Production)
        .step(StepId::Clean, &[])
        .step(StepId::Images, &[StepId::Clean])
        .step(StepId::Webp, &[StepId::Images])
        .step(StepId::Markup, &[StepId::Clean]);

    let executor = Executor::new(registry, context(&dir, Mode::Production, ""), ReloadBus::new());
    let summary = executor.run(&plan).await.unwrap();

    assert!(summary.succeeded());
    let ran = log.lock().clone();
    assert_eq!(ran.first(), Some(&StepId::Clean));
    // markup is independent of the slow images step
    let pos = |id| ran.iter().position(|s| *s == id).unwrap();
    assert!(pos(StepId::Markup) < pos(StepId::Images));
    assert!(pos(StepId::Images) < pos(StepId::Webp));
}

#[tokio::test]
async fn test_failed_prerequisite_skips_dependents() {
    let dir = TempDir::new().unwrap();
    let log = Arc::default();
    let registry = fake_registry(
        &[
            (StepId::Clean, 0, false),
            (StepId::Images, 0, true),
            (StepId::Webp, 0, false),
            (StepId::Sprite, 0, false),
        ],
        &log,
    );
    let plan = Plan::new(Mode::Production)
        .step(StepId::Clean, &[])
        .step(StepId::Images, &[StepId::Clean])
        .step(StepId::Webp, &[StepId::Images])
        .step(StepId::Sprite, &[StepId::Clean]);

    let executor = Executor::new(registry, context(&dir, Mode::Production, ""), ReloadBus::new());
    let summary = executor.run(&plan).await.unwrap();

    assert!(matches!(
        summary.outcome(StepId::Webp),
        Some(StepOutcome::Skipped { cause: StepId::Images })
    ));
    assert!(summary.outcome(StepId::Sprite).is_some_and(StepOutcome::is_done));
    assert!(!log.lock().contains(&StepId::Webp));
    // images gates webp, so its failure fails the run
    assert!(summary.halted());
    assert!(!summary.succeeded());
}

#[tokio::test]
async fn test_leaf_failure_fails_only_strict_runs() {
    let dir = TempDir::new().unwrap();
    let plan = Plan::new(Mode::Production)
        .step(StepId::Clean, &[])
        .step(StepId::Sprite, &[StepId::Clean]);
    let specs = [(StepId::Clean, 0, false), (StepId::Sprite, 0, true)];

    for (strict, expected) in [(false, true), (true, false)] {
        let registry = fake_registry(&specs, &Arc::default());
        let executor = Executor::new(registry, context(&dir, Mode::Production, ""), ReloadBus::new())
            .strict(strict);
        let summary = executor.run(&plan).await.unwrap();
        assert_eq!(summary.succeeded(), expected, "strict = {strict}");
        assert!(!summary.halted());
        assert_eq!(summary.failures().count(), 1);
    }
}

#[tokio::test]
async fn test_successful_steps_publish_refresh() {
    let dir = TempDir::new().unwrap();
    let bus = ReloadBus::new();
    let mut rx = bus.subscribe();
    let registry = fake_registry(&[(StepId::Markup, 0, false)], &Arc::default());
    let executor = Executor::new(registry, context(&dir, Mode::Development, ""), bus);

    let outcome = executor.run_one(StepId::Markup).await.unwrap();
    assert!(outcome.is_done());
    let notification = rx.try_recv().unwrap();
    assert_eq!(notification.step, StepId::Markup);
    assert_eq!(notification.refresh, Refresh::Page);
}

#[tokio::test]
async fn test_panicking_step_is_a_failure() {
    struct Panics;
    impl TransformStep for Panics {
        fn id(&self) -> StepId {
            StepId::Scripts
        }
        fn run(&self, _ctx: &StepContext) -> Result<StepReport, StepError> {
            panic!("bundler state corrupted")
        }
    }

    let dir = TempDir::new().unwrap();
    let executor = Executor::new(
        Registry::default().with(Panics),
        context(&dir, Mode::Development, ""),
        ReloadBus::new(),
    );
    match executor.run_one(StepId::Scripts).await.unwrap() {
        StepOutcome::Failed { error, fatal } => {
            assert!(fatal);
            assert!(error.to_string().contains("bundler state corrupted"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_step_is_an_error() {
    let dir = TempDir::new().unwrap();
    let executor = Executor::new(
        Registry::default(),
        context(&dir, Mode::Development, ""),
        ReloadBus::new(),
    );
    assert!(executor.run(&compose(Mode::Development)).await.is_err());
}

#[tokio::test]
async fn test_independent_steps_overlap() {
    struct Counting {
        id: StepId,
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }
    impl TransformStep for Counting {
        fn id(&self) -> StepId {
            self.id
        }
        fn run(&self, _ctx: &StepContext) -> Result<StepReport, StepError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(StepReport::default())
        }
    }

    let dir = TempDir::new().unwrap();
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let registry = [StepId::FontsWoff, StepId::FontsWoff2]
        .into_iter()
        .fold(Registry::default(), |r, id| {
            r.with(Counting {
                id,
                active: Arc::clone(&active),
                peak: Arc::clone(&peak),
            })
        });
    let plan = Plan::new(Mode::Production)
        .step(StepId::FontsWoff, &[])
        .step(StepId::FontsWoff2, &[]);

    let executor = Executor::new(registry, context(&dir, Mode::Production, ""), ReloadBus::new());
    executor.run(&plan).await.unwrap();
    assert_eq!(peak.load(Ordering::SeqCst), 2);
}

// ============================================================================
// End to end with stand-in tools
// ============================================================================

#[cfg(unix)]
const FAKE_TOOLS: &str = r#"
[tools.pug]
command = ["cat"]
[tools.sass]
command = ["sh", "-c", '''
dir=$(dirname "$0")
while IFS= read -r line; do
  case $line in
    @import*) cat "$dir/_$(echo "$line" | sed "s/^@import *['\"]\(.*\)['\"];*$/\1/").scss" ;;
    *) printf '%s\n' "$line" ;;
  esac
done < "$0"
''', "$INPUT"]
[tools.bundler]
command = ["cat", "$INPUT"]
[tools.woff]
command = ["sh", "-c", "cp \"$0\" \"$1\"", "$INPUT", "$OUTPUT"]
[tools.woff2]
command = ["sh", "-c", "cp \"$0\" \"$1\"", "$INPUT", "$OUTPUT"]
"#;

#[cfg(unix)]
fn sample_project(dir: &TempDir) {
    put(dir, "src/pug/index.pug", "<!DOCTYPE html><html><body><p>hi</p></body></html>");
    put(dir, "src/scss/style.scss", "@import 'vars';\n.a {\n  color: red;\n}\n");
    put(dir, "src/scss/_vars.scss", ".from-partial {\n  margin: 0;\n}\n");
    put(dir, "src/css/reset.css", "* { margin: 0 }\n");
    put(dir, "src/js/index.js", "export const answer = 6 * 7;\n");
    put(
        dir,
        "src/img/icons/arrow.svg",
        r#"<svg viewBox="0 0 10 10"><path d="M0 0L10 10"/></svg>"#,
    );
    put(dir, "src/fonts/Inter.ttf", b"ttf");

    let png = dir.path().join("src/img/dot.png");
    image::RgbImage::from_pixel(16, 16, image::Rgb([200, 40, 40]))
        .save(&png)
        .unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn test_production_build_writes_every_output() {
    let dir = TempDir::new().unwrap();
    sample_project(&dir);
    put(&dir, "dist/stale.txt", "left from a previous run");
    let ctx = context(&dir, Mode::Production, FAKE_TOOLS);

    let executor = Executor::new(Registry::builtin(), ctx, ReloadBus::new()).strict(true);
    let summary = executor.run(&compose(Mode::Production)).await.unwrap();

    let failures: Vec<_> = summary.failures().map(|(id, e)| format!("{id}: {e}")).collect();
    assert!(failures.is_empty(), "{failures:?}");
    assert!(summary.succeeded());

    let dist = dir.path().join("dist");
    for file in [
        "index.html",
        "css/style.css",
        "css/style.min.css",
        "css/reset.css",
        "js/script.js",
        "img/dot.png",
        "img/dot.webp",
        "img/sprite.svg",
        "fonts/Inter.woff",
        "fonts/Inter.woff2",
    ] {
        assert!(dist.join(file).is_file(), "missing dist/{file}");
    }
    assert!(!dist.join("stale.txt").exists());
    assert!(!dist.join("css/_vars.css").exists());

    // the nested partial is compiled into both stylesheets
    let read = |file: &str| std::fs::read_to_string(dist.join(file)).unwrap();
    let (css, min) = (read("css/style.css"), read("css/style.min.css"));
    for sheet in [&css, &min] {
        assert!(sheet.contains(".from-partial"), "{sheet}");
        assert!(sheet.contains(".a"), "{sheet}");
        assert!(!sheet.contains("@import"), "{sheet}");
    }
    assert!(min.len() < css.len());

    assert!(read("img/sprite.svg").contains(r#"<symbol id="arrow" viewBox="0 0 10 10">"#));
}

#[cfg(unix)]
#[tokio::test]
async fn test_repeated_build_is_stable() {
    let dir = TempDir::new().unwrap();
    sample_project(&dir);
    let executor = Executor::new(
        Registry::builtin(),
        context(&dir, Mode::Production, FAKE_TOOLS),
        ReloadBus::new(),
    );

    let first = executor.run(&compose(Mode::Production)).await.unwrap();
    let second = executor.run(&compose(Mode::Production)).await.unwrap();
    assert!(first.succeeded() && second.succeeded());
    assert_eq!(first.written(), second.written());
}
