//! Plan execution on the tokio blocking pool.
//!
//! A step starts once every prerequisite is `Done`. A failed step's
//! transitive dependents are `Skipped`. Successful steps with a refresh kind
//! publish a notification on the reload bus.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use rustc_hash::FxHashMap;
use tokio::task::JoinSet;

use super::Plan;
use crate::logger::ProgressLine;
use crate::reload::{Notification, ReloadBus};
use crate::step::{self, Registry, StepContext, StepError, StepId, StepReport, TransformStep};
use crate::{debug, log};

#[derive(Debug)]
pub enum StepOutcome {
    Done(StepReport),
    Failed { error: StepError, fatal: bool },
    /// Not run because a prerequisite did not complete.
    Skipped { cause: StepId },
}

impl StepOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

/// Outcomes of one plan run, in topological order.
#[derive(Debug)]
pub struct RunSummary {
    pub outcomes: Vec<(StepId, StepOutcome)>,
    /// Steps other steps wait on; their failure fails the run.
    mandatory: Vec<StepId>,
    strict: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    #[cfg(test)]
    pub fn outcome(&self, id: StepId) -> Option<&StepOutcome> {
        self.outcomes.iter().find(|(s, _)| *s == id).map(|(_, o)| o)
    }

    pub fn failures(&self) -> impl Iterator<Item = (StepId, &StepError)> {
        self.outcomes.iter().filter_map(|(id, outcome)| match outcome {
            StepOutcome::Failed { error, .. } => Some((*id, error)),
            _ => None,
        })
    }

    /// Files written by all steps.
    pub fn written(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, outcome)| match outcome {
                StepOutcome::Done(report) => report.written.len(),
                _ => 0,
            })
            .sum()
    }

    /// Whether a step other steps depend on failed.
    ///
    /// Such a run leaves the output incomplete whatever `strict` says.
    pub fn halted(&self) -> bool {
        self.failures().any(|(id, _)| self.mandatory.contains(&id))
    }

    /// Exit status of the run.
    ///
    /// Fails when the run halted, or any step failed under `strict`.
    pub fn succeeded(&self) -> bool {
        !self.halted() && !(self.strict && self.failures().next().is_some())
    }
}

pub struct Executor {
    registry: Arc<Registry>,
    ctx: StepContext,
    bus: ReloadBus,
    strict: bool,
    progress: bool,
}

impl Executor {
    pub fn new(registry: Registry, ctx: StepContext, bus: ReloadBus) -> Self {
        Self {
            registry: Arc::new(registry),
            ctx,
            bus,
            strict: false,
            progress: false,
        }
    }

    /// Treat every failed step as a failed run.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Show a progress line while a plan runs.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn context(&self) -> &StepContext {
        &self.ctx
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub async fn run(&self, plan: &Plan) -> Result<RunSummary> {
        let order = plan.topological_order()?;
        let started = Instant::now();
        let progress = self.progress.then(|| ProgressLine::new("build", order.len()));

        let mut pending = order.clone();
        let mut outcomes: FxHashMap<StepId, StepOutcome> = FxHashMap::default();
        let mut running = JoinSet::new();

        loop {
            let mut i = 0;
            while i < pending.len() {
                let id = pending[i];
                let prerequisites = plan.prerequisites(id);

                let blocked = prerequisites.iter().find_map(|p| match outcomes.get(p) {
                    Some(StepOutcome::Failed { .. }) => Some(*p),
                    Some(StepOutcome::Skipped { cause }) => Some(*cause),
                    _ => None,
                });
                if let Some(cause) = blocked {
                    pending.remove(i);
                    debug!(id.name(); "skipped: `{}` failed", cause);
                    if let Some(progress) = &progress {
                        progress.advance(id.name());
                    }
                    outcomes.insert(id, StepOutcome::Skipped { cause });
                    continue;
                }

                let ready = prerequisites
                    .iter()
                    .all(|p| outcomes.get(p).is_some_and(StepOutcome::is_done));
                if ready {
                    pending.remove(i);
                    let step = self.step(id)?;
                    let ctx = self.ctx.clone();
                    running.spawn_blocking(move || (id, run_step(step.as_ref(), &ctx)));
                    continue;
                }
                i += 1;
            }

            let Some(joined) = running.join_next().await else {
                break;
            };
            let (id, outcome) = joined?;
            self.settle(id, &outcome);
            if let Some(progress) = &progress {
                progress.advance(id.name());
            }
            outcomes.insert(id, outcome);
        }

        if let Some(progress) = progress {
            progress.finish();
        }

        let mandatory = order
            .iter()
            .copied()
            .filter(|id| plan.dependents(*id).next().is_some())
            .collect();
        let outcomes = order
            .into_iter()
            .filter_map(|id| outcomes.remove(&id).map(|o| (id, o)))
            .collect();

        Ok(RunSummary {
            outcomes,
            mandatory,
            strict: self.strict,
            elapsed: started.elapsed(),
        })
    }

    /// Run a single step outside any plan (watch-triggered rebuilds).
    pub async fn run_one(&self, id: StepId) -> Result<StepOutcome> {
        let step = self.step(id)?;
        let ctx = self.ctx.clone();
        let outcome = tokio::task::spawn_blocking(move || run_step(step.as_ref(), &ctx)).await?;
        self.settle(id, &outcome);
        Ok(outcome)
    }

    fn step(&self, id: StepId) -> Result<Arc<dyn TransformStep>> {
        self.registry
            .get(id)
            .ok_or_else(|| anyhow!("no step registered for `{id}`"))
    }

    /// Log a finished step and publish its refresh.
    fn settle(&self, id: StepId, outcome: &StepOutcome) {
        match outcome {
            StepOutcome::Done(report) => {
                step::log_warnings(id, report);
                debug!(id.name(); "wrote {} file(s)", report.written.len());
                let refresh = self.registry.get(id).and_then(|s| s.refresh());
                if let Some(refresh) = refresh {
                    self.bus.publish(Notification { step: id, refresh });
                }
            }
            StepOutcome::Failed { error, .. } => log!("error"; "{}: {}", id, error),
            StepOutcome::Skipped { .. } => {}
        }
    }
}

fn run_step(step: &dyn TransformStep, ctx: &StepContext) -> StepOutcome {
    let result = catch_unwind(AssertUnwindSafe(|| step.run(ctx))).unwrap_or_else(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".into());
        Err(StepError::Other(anyhow!("step panicked: {message}")))
    });

    match result {
        Ok(report) => StepOutcome::Done(report),
        Err(error) => StepOutcome::Failed {
            fatal: error.is_fatal(),
            error,
        },
    }
}
