use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tempfile::TempDir;

use super::debouncer::{ChangeKind, DEBOUNCE_MS, Debouncer, is_temp_file};
use super::*;
use crate::core::AssetKind;
use crate::reload::ReloadBus;
use crate::step::testing::context;
use crate::step::{Registry, StepContext, StepError, StepReport, TransformStep};

// ============================================================================
// Debouncer
// ============================================================================

fn make_event(paths: &[&str], kind: notify::EventKind) -> notify::Event {
    notify::Event {
        kind,
        paths: paths.iter().map(PathBuf::from).collect(),
        attrs: Default::default(),
    }
}

fn modify_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Data(
        notify::event::DataChange::Any,
    ))
}

fn create_kind() -> notify::EventKind {
    notify::EventKind::Create(notify::event::CreateKind::File)
}

fn remove_kind() -> notify::EventKind {
    notify::EventKind::Remove(notify::event::RemoveKind::File)
}

#[test]
fn test_debouncer_empty() {
    let debouncer = Debouncer::new();
    assert!(!debouncer.is_ready());
    assert!(debouncer.sleep_duration() > Duration::from_secs(60));
}

#[test]
fn test_create_then_remove_cancels() {
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(&["/p/src/pug/new.pug"], create_kind()));
    debouncer.add_event(&make_event(&["/p/src/pug/new.pug"], remove_kind()));
    assert!(debouncer.changes.is_empty());
}

#[test]
fn test_modify_then_remove_is_remove() {
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(&["/p/src/js/a.js"], modify_kind()));
    debouncer.add_event(&make_event(&["/p/src/js/a.js"], remove_kind()));
    assert_eq!(
        debouncer.changes[&PathBuf::from("/p/src/js/a.js")],
        ChangeKind::Removed
    );
}

#[test]
fn test_remove_then_create_is_restore() {
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(&["/p/src/js/a.js"], remove_kind()));
    debouncer.add_event(&make_event(&["/p/src/js/a.js"], create_kind()));
    assert_eq!(
        debouncer.changes[&PathBuf::from("/p/src/js/a.js")],
        ChangeKind::Created
    );
}

#[test]
fn test_first_event_wins() {
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(&["/p/src/js/a.js"], create_kind()));
    debouncer.add_event(&make_event(&["/p/src/js/a.js"], modify_kind()));
    assert_eq!(
        debouncer.changes[&PathBuf::from("/p/src/js/a.js")],
        ChangeKind::Created
    );
}

#[test]
fn test_metadata_and_temp_files_ignored() {
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(
        &["/p/src/js/a.js"],
        notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
            notify::event::MetadataKind::WriteTime,
        )),
    ));
    debouncer.add_event(&make_event(
        &["/p/src/scss/.style.scss.swp", "/p/src/scss/style.scss~"],
        modify_kind(),
    ));
    assert!(debouncer.changes.is_empty());
    assert!(debouncer.last_event.is_none());
}

#[test]
fn test_temp_file_patterns() {
    assert!(is_temp_file(std::path::Path::new("a.tmp")));
    assert!(is_temp_file(std::path::Path::new("src/.#index.pug")));
    assert!(is_temp_file(std::path::Path::new("src/4913")));
    assert!(!is_temp_file(std::path::Path::new("src/scss/_vars.scss")));
}

#[test]
fn test_ready_after_quiet_period() {
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(&["/p/src/js/a.js"], modify_kind()));
    assert!(!debouncer.is_ready());
    assert!(debouncer.take_if_ready().is_none());

    debouncer.last_event = Some(Instant::now() - Duration::from_millis(DEBOUNCE_MS + 10));
    let batch = debouncer.take_if_ready().unwrap();
    assert_eq!(batch.len(), 1);
    assert!(debouncer.changes.is_empty());
    assert!(!debouncer.is_ready());
}

// ============================================================================
// Rules and routing
// ============================================================================

#[test]
fn test_one_rule_per_kind() {
    for mode in [Mode::Development, Mode::Production] {
        let rules = rules_for(mode);
        assert_eq!(rules.len(), AssetKind::ALL.len());
        for kind in AssetKind::ALL {
            assert_eq!(rules.iter().filter(|r| r.kind == kind).count(), 1);
        }
    }
}

#[test]
fn test_rule_steps_read_rule_kind() {
    let registry = Registry::builtin();
    for mode in [Mode::Development, Mode::Production] {
        for rule in rules_for(mode) {
            for &id in rule.group.steps() {
                assert!(registry.reads(id, rule.kind), "{id} ignores {}", rule.name());
            }
        }
    }
    assert!(registry.get(StepId::Clean).unwrap().inputs().is_empty());
    assert_eq!(registry.get(StepId::Webp).unwrap().inputs(), &[AssetKind::Image]);
}

#[test]
fn test_style_rule_depends_on_mode() {
    let style = |mode| {
        rules_for(mode)
            .into_iter()
            .find(|r| r.kind == AssetKind::StyleSource)
            .unwrap()
            .group
    };
    assert_eq!(
        style(Mode::Development),
        Group::Series(vec![StepId::StylesDev, StepId::StylesLint])
    );
    assert_eq!(style(Mode::Production), Group::Series(vec![StepId::StylesProd]));
}

#[test]
fn test_font_rule_is_parallel() {
    let rules = rules_for(Mode::Development);
    let font = rules.iter().find(|r| r.kind == AssetKind::Font).unwrap();
    assert!(matches!(font.group, Group::Parallel(_)));
    assert_eq!(font.group.steps(), &[StepId::FontsWoff, StepId::FontsWoff2]);
}

fn dispatcher(dir: &TempDir, mode: Mode, registry: Registry) -> Arc<Dispatcher> {
    let executor = Executor::new(registry, context(dir, mode, ""), ReloadBus::new());
    Arc::new(Dispatcher::new(Arc::new(executor), mode))
}

fn rule_index(dispatcher: &Dispatcher, kind: AssetKind) -> usize {
    dispatcher.rules.iter().position(|r| r.kind == kind).unwrap()
}

#[test]
fn test_route_matches_watch_globs() {
    let dir = TempDir::new().unwrap();
    let d = dispatcher(&dir, Mode::Development, Registry::default());
    let root = dir.path();

    // partials are watched even though only style.scss is compiled
    let routed = d.route(&[root.join("src/scss/base/_type.scss")]);
    assert_eq!(routed, vec![rule_index(&d, AssetKind::StyleSource)]);

    let routed = d.route(&[root.join("src/img/icons/x.svg")]);
    assert_eq!(routed, vec![rule_index(&d, AssetKind::Icon)]);

    let routed = d.route(&[root.join("src/img/photo.jpg")]);
    assert_eq!(routed, vec![rule_index(&d, AssetKind::Image)]);
}

#[test]
fn test_route_triggers_each_rule_once() {
    let dir = TempDir::new().unwrap();
    let d = dispatcher(&dir, Mode::Development, Registry::default());
    let root = dir.path();

    let routed = d.route(&[
        root.join("src/pug/index.pug"),
        root.join("src/pug/parts/nav.pug"),
        root.join("src/js/index.js"),
        root.join("dist/index.html"),
        PathBuf::from("/elsewhere/src/pug/x.pug"),
    ]);
    assert_eq!(
        routed,
        vec![
            rule_index(&d, AssetKind::Markup),
            rule_index(&d, AssetKind::Script)
        ]
    );
}

// ============================================================================
// Slots and groups
// ============================================================================

struct Recorder {
    id: StepId,
    delay: Duration,
    error: Option<fn() -> StepError>,
    log: Arc<Mutex<Vec<StepId>>>,
}

impl TransformStep for Recorder {
    fn id(&self) -> StepId {
        self.id
    }

    fn run(&self, _ctx: &StepContext) -> Result<StepReport, StepError> {
        std::thread::sleep(self.delay);
        self.log.lock().push(self.id);
        match self.error {
            Some(error) => Err(error()),
            None => Ok(StepReport::default()),
        }
    }
}

fn recorder(id: StepId, log: &Arc<Mutex<Vec<StepId>>>) -> Recorder {
    Recorder {
        id,
        delay: Duration::ZERO,
        error: None,
        log: Arc::clone(log),
    }
}

async fn wait_idle(dispatcher: &Dispatcher) {
    let deadline = Instant::now() + Duration::from_secs(10);
    // a freshly spawned run may not have begun yet
    tokio::time::sleep(Duration::from_millis(20)).await;
    while !dispatcher.is_idle() {
        assert!(Instant::now() < deadline, "rule never returned to idle");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_triggers_while_running_rerun_once() {
    let dir = TempDir::new().unwrap();
    let log = Arc::default();
    let slow = Recorder {
        delay: Duration::from_millis(200),
        ..recorder(StepId::Markup, &log)
    };
    let d = dispatcher(&dir, Mode::Development, Registry::default().with(slow));
    let markup = rule_index(&d, AssetKind::Markup);

    assert_eq!(d.trigger(markup), Trigger::Start);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(d.trigger(markup), Trigger::Queued);
    assert_eq!(d.trigger(markup), Trigger::Coalesced);

    wait_idle(&d).await;
    assert_eq!(log.lock().len(), 2);
}

#[tokio::test]
async fn test_dev_style_change_compiles_then_lints() {
    let dir = TempDir::new().unwrap();
    let log = Arc::default();
    let registry = Registry::default()
        .with(recorder(StepId::StylesDev, &log))
        .with(recorder(StepId::StylesLint, &log))
        .with(recorder(StepId::StylesProd, &log));
    let d = dispatcher(&dir, Mode::Development, registry);

    d.trigger(rule_index(&d, AssetKind::StyleSource));
    wait_idle(&d).await;
    assert_eq!(*log.lock(), vec![StepId::StylesDev, StepId::StylesLint]);
}

#[tokio::test]
async fn test_prod_style_change_compiles_only() {
    let dir = TempDir::new().unwrap();
    let log = Arc::default();
    let registry = Registry::default()
        .with(recorder(StepId::StylesDev, &log))
        .with(recorder(StepId::StylesLint, &log))
        .with(recorder(StepId::StylesProd, &log));
    let d = dispatcher(&dir, Mode::Production, registry);

    d.trigger(rule_index(&d, AssetKind::StyleSource));
    wait_idle(&d).await;
    assert_eq!(*log.lock(), vec![StepId::StylesProd]);
}

#[tokio::test]
async fn test_series_continues_after_tool_error() {
    let dir = TempDir::new().unwrap();
    let log = Arc::default();
    let failing = Recorder {
        error: Some(|| StepError::tool("sass", "expected \";\"")),
        ..recorder(StepId::StylesDev, &log)
    };
    let registry = Registry::default()
        .with(failing)
        .with(recorder(StepId::StylesLint, &log));
    let d = dispatcher(&dir, Mode::Development, registry);

    d.trigger(rule_index(&d, AssetKind::StyleSource));
    wait_idle(&d).await;
    assert_eq!(*log.lock(), vec![StepId::StylesDev, StepId::StylesLint]);
}

#[tokio::test]
async fn test_series_stops_at_fatal_error() {
    let dir = TempDir::new().unwrap();
    let log = Arc::default();
    let failing = Recorder {
        error: Some(|| StepError::io("dist/img", std::io::ErrorKind::PermissionDenied.into())),
        ..recorder(StepId::Images, &log)
    };
    let registry = Registry::default()
        .with(failing)
        .with(recorder(StepId::Webp, &log));
    let d = dispatcher(&dir, Mode::Development, registry);

    d.trigger(rule_index(&d, AssetKind::Image));
    wait_idle(&d).await;
    assert_eq!(*log.lock(), vec![StepId::Images]);

    // the router stays usable after a failed rebuild
    assert_eq!(d.trigger(rule_index(&d, AssetKind::Image)), Trigger::Start);
    wait_idle(&d).await;
    assert_eq!(log.lock().len(), 2);
}

#[tokio::test]
async fn test_parallel_group_runs_all() {
    let dir = TempDir::new().unwrap();
    let log = Arc::default();
    let registry = Registry::default()
        .with(recorder(StepId::FontsWoff, &log))
        .with(recorder(StepId::FontsWoff2, &log));
    let d = dispatcher(&dir, Mode::Development, registry);

    d.trigger(rule_index(&d, AssetKind::Font));
    wait_idle(&d).await;
    let mut ran = log.lock().clone();
    ran.sort();
    assert_eq!(ran, vec![StepId::FontsWoff, StepId::FontsWoff2]);
}
