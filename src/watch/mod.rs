//! Watch Router
//!
//! Watches the source root and re-runs the steps of every rule whose watch
//! glob matches a changed file.
//!
//! ```text
//! notify → Debouncer (timing, dedup) → route (glob match) → RuleSlot → Executor
//! ```
//!
//! The watcher starts in [`WatchRouter::new`], before the initial build, so
//! edits made while that build runs are buffered rather than lost.

mod debouncer;
mod rules;
mod slot;

#[cfg(test)]
mod tests;

pub use rules::{Group, WatchRule, rules_for};
pub use slot::{RuleSlot, SlotState, Trigger};

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinSet;

use crate::core::Mode;
use crate::logger::{status_error, status_success, status_warning};
use crate::pipeline::{Executor, StepOutcome};
use crate::step::StepId;
use crate::{debug, log};
use debouncer::Debouncer;

/// Rules plus their slots; shared with the tasks running rebuilds.
struct Dispatcher {
    executor: Arc<Executor>,
    rules: Vec<WatchRule>,
    slots: Vec<Mutex<RuleSlot>>,
}

impl Dispatcher {
    fn new(executor: Arc<Executor>, mode: Mode) -> Self {
        let rules = rules_for(mode);
        for rule in &rules {
            for &id in rule.group.steps() {
                if !executor.registry().reads(id, rule.kind) {
                    log!("watch"; "`{}` does not read {} sources", id, rule.name());
                }
            }
        }
        let slots = rules.iter().map(|_| Mutex::default()).collect();
        Self {
            executor,
            rules,
            slots,
        }
    }

    /// Indices of the rules matching any changed path.
    fn route<'a>(&self, changed: impl IntoIterator<Item = &'a PathBuf>) -> Vec<usize> {
        let paths = &self.executor.context().paths;
        let relative: Vec<_> = changed
            .into_iter()
            .filter_map(|p| paths.relative(p))
            .collect();

        (0..self.rules.len())
            .filter(|&i| {
                let kind = self.rules[i].kind;
                relative.iter().any(|p| paths.is_watched(kind, p))
            })
            .collect()
    }

    fn trigger(self: &Arc<Self>, index: usize) -> Trigger {
        let trigger = self.slots[index].lock().trigger();
        let name = self.rules[index].name();
        match trigger {
            Trigger::Start => {
                let this = Arc::clone(self);
                tokio::spawn(async move { this.drive(index).await });
            }
            Trigger::Queued => debug!("watch"; "{} busy, re-run queued", name),
            Trigger::Coalesced => debug!("watch"; "{} already queued", name),
        }
        trigger
    }

    /// Run a rule until no trigger arrived during the last run.
    async fn drive(&self, index: usize) {
        self.slots[index].lock().begin();
        loop {
            self.run_group(&self.rules[index]).await;
            if !self.slots[index].lock().finish() {
                break;
            }
        }
    }

    async fn run_group(&self, rule: &WatchRule) {
        let outcomes = match &rule.group {
            Group::Series(steps) => self.run_series(steps).await,
            Group::Parallel(steps) => self.run_parallel(steps).await,
        };
        report(rule, &outcomes);
    }

    async fn run_series(&self, steps: &[StepId]) -> Vec<(StepId, StepOutcome)> {
        let mut outcomes = Vec::with_capacity(steps.len());
        for &id in steps {
            let Some(outcome) = self.run_step(id).await else {
                break;
            };
            let stop = matches!(outcome, StepOutcome::Failed { fatal: true, .. });
            outcomes.push((id, outcome));
            if stop {
                break;
            }
        }
        outcomes
    }

    async fn run_parallel(&self, steps: &[StepId]) -> Vec<(StepId, StepOutcome)> {
        let mut set = JoinSet::new();
        for &id in steps {
            let executor = Arc::clone(&self.executor);
            set.spawn(async move { (id, executor.run_one(id).await) });
        }

        let mut outcomes = Vec::with_capacity(steps.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((id, Ok(outcome))) => outcomes.push((id, outcome)),
                Ok((id, Err(e))) => log!("watch"; "{}: {:#}", id, e),
                Err(e) => log!("watch"; "rebuild task failed: {}", e),
            }
        }
        // completion order is arbitrary
        outcomes.sort_by_key(|(id, _)| *id);
        outcomes
    }

    async fn run_step(&self, id: StepId) -> Option<StepOutcome> {
        match self.executor.run_one(id).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                log!("watch"; "{}: {:#}", id, e);
                None
            }
        }
    }

    #[cfg(test)]
    fn is_idle(&self) -> bool {
        self.slots.iter().all(|s| s.lock().state() == SlotState::Idle)
    }
}

/// Overwrite the status line with the outcome of one rule run.
fn report(rule: &WatchRule, outcomes: &[(StepId, StepOutcome)]) {
    let names = outcomes
        .iter()
        .map(|(id, _)| id.name())
        .collect::<Vec<_>>()
        .join(", ");

    let errors: Vec<String> = outcomes
        .iter()
        .filter_map(|(id, outcome)| match outcome {
            StepOutcome::Failed { error, .. } => Some(format!("{id}: {error}")),
            _ => None,
        })
        .collect();
    if !errors.is_empty() {
        status_error(&format!("{} rebuild failed", rule.name()), &errors.join("\n"));
        return;
    }

    let warnings: usize = outcomes
        .iter()
        .map(|(_, outcome)| match outcome {
            StepOutcome::Done(report) => report.warnings.len(),
            _ => 0,
        })
        .sum();
    if warnings > 0 {
        status_warning(
            &format!("{} rebuilt ({names})", rule.name()),
            &crate::utils::plural_count(warnings, "warning"),
        );
    } else {
        status_success(&format!("{} rebuilt ({names})", rule.name()));
    }
}

/// File watcher driving rule rebuilds.
pub struct WatchRouter {
    /// Sync channel fed by notify
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    _watcher: RecommendedWatcher,
    dispatcher: Arc<Dispatcher>,
}

impl WatchRouter {
    /// Start watching the source root. Events buffer until [`run`](Self::run).
    pub fn new(mode: Mode, executor: Arc<Executor>) -> Result<Self> {
        let source_root = executor.context().paths.source_root().to_path_buf();
        if !source_root.is_dir() {
            bail!("source directory `{}` does not exist", source_root.display());
        }

        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })
        .context("failed to create file watcher")?;
        watcher
            .watch(&source_root, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch `{}`", source_root.display()))?;

        debug!("watch"; "watching {}", source_root.display());
        Ok(Self {
            notify_rx,
            _watcher: watcher,
            dispatcher: Arc::new(Dispatcher::new(executor, mode)),
        })
    }

    /// Route debounced changes until `stop` fires or is dropped.
    pub async fn run(self, mut stop: oneshot::Receiver<()>) {
        let notify_rx = self.notify_rx;
        let dispatcher = self.dispatcher;
        let mut debouncer = Debouncer::new();

        let (async_tx, mut async_rx) = tokio::sync::mpsc::channel::<notify::Event>(64);

        // notify's callback channel is sync; bridge it on a plain thread
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => log!("watch"; "notify error: {}", e),
                }
            }
        });

        loop {
            tokio::select! {
                biased;
                _ = &mut stop => break,
                Some(event) = async_rx.recv() => debouncer.add_event(&event),
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    let Some(changes) = debouncer.take_if_ready() else {
                        continue;
                    };
                    for (path, kind) in &changes {
                        debug!("watch"; "{}: {}", kind.label(), path.display());
                    }
                    for index in dispatcher.route(changes.keys()) {
                        dispatcher.trigger(index);
                    }
                }
            }
        }
        debug!("watch"; "stopped");
    }
}
