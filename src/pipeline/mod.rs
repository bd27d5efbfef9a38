//! Pipeline composition and execution.
//!
//! ```text
//!                  ┌─> Markup
//!                  ├─> StylesRaw
//!                  ├─> StylesDev ─ StylesLint     (development)
//!                  ├─> StylesProd                 (production)
//!   Clean ─────────┼─> Scripts
//!                  ├─> Images ──> Webp
//!                  ├─> Sprite
//!                  ├─> FontsWoff
//!                  └─> FontsWoff2
//! ```
//!
//! A [`Plan`] is a declared DAG of step ids. The composer only decides which
//! steps exist for a mode; ordering is derived from the declared
//! prerequisites by [`Plan::topological_order`], and the [`Executor`] runs
//! independent steps concurrently.

mod executor;

#[cfg(test)]
mod tests;

pub use executor::{Executor, RunSummary, StepOutcome};

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::core::Mode;
use crate::step::StepId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("step `{step}` depends on `{prerequisite}`, which is not in the plan")]
    UnknownPrerequisite { step: StepId, prerequisite: StepId },

    #[error("dependency cycle among: {}", .0.iter().map(|s| s.name()).collect::<Vec<_>>().join(", "))]
    Cycle(Vec<StepId>),

    #[error("step `{0}` is declared twice")]
    Duplicate(StepId),
}

/// Declared steps with their prerequisites, in declaration order.
#[derive(Debug, Clone)]
pub struct Plan {
    mode: Mode,
    nodes: Vec<(StepId, Vec<StepId>)>,
}

impl Plan {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            nodes: Vec::new(),
        }
    }

    /// Declare a step that runs after `after`.
    pub fn step(mut self, id: StepId, after: &[StepId]) -> Self {
        self.nodes.push((id, after.to_vec()));
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Step ids in declaration order.
    pub fn steps(&self) -> impl Iterator<Item = StepId> + '_ {
        self.nodes.iter().map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, id: StepId) -> bool {
        self.nodes.iter().any(|(s, _)| *s == id)
    }

    pub fn prerequisites(&self, id: StepId) -> &[StepId] {
        self.nodes
            .iter()
            .find(|(s, _)| *s == id)
            .map(|(_, after)| after.as_slice())
            .unwrap_or(&[])
    }

    /// Steps that list `id` as a prerequisite.
    pub fn dependents(&self, id: StepId) -> impl Iterator<Item = StepId> + '_ {
        self.nodes
            .iter()
            .filter(move |(_, after)| after.contains(&id))
            .map(|(s, _)| *s)
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        self.topological_order().map(|_| ())
    }

    /// Kahn's algorithm; ties go to the earlier declaration.
    pub fn topological_order(&self) -> Result<Vec<StepId>, PlanError> {
        let mut index: FxHashMap<StepId, usize> = FxHashMap::default();
        for (i, (id, _)) in self.nodes.iter().enumerate() {
            if index.insert(*id, i).is_some() {
                return Err(PlanError::Duplicate(*id));
            }
        }

        let mut indegree = vec![0usize; self.nodes.len()];
        for (i, (id, after)) in self.nodes.iter().enumerate() {
            for prerequisite in after {
                if !index.contains_key(prerequisite) {
                    return Err(PlanError::UnknownPrerequisite {
                        step: *id,
                        prerequisite: *prerequisite,
                    });
                }
                indegree[i] += 1;
            }
        }

        let mut order = Vec::with_capacity(self.nodes.len());
        let mut done = vec![false; self.nodes.len()];
        // Lowest ready index first keeps declaration order among peers
        while let Some(next) = (0..self.nodes.len()).find(|&i| !done[i] && indegree[i] == 0) {
            done[next] = true;
            let id = self.nodes[next].0;
            order.push(id);
            for dependent in self.dependents(id) {
                indegree[index[&dependent]] -= 1;
            }
        }

        if order.len() < self.nodes.len() {
            let stuck = self
                .nodes
                .iter()
                .enumerate()
                .filter(|(i, _)| !done[*i])
                .map(|(_, (id, _))| *id)
                .collect();
            return Err(PlanError::Cycle(stuck));
        }
        Ok(order)
    }
}

/// The fixed plan for a mode.
pub fn compose(mode: Mode) -> Plan {
    use StepId::*;

    let after_clean = [Clean];
    let plan = Plan::new(mode)
        .step(Clean, &[])
        .step(Markup, &after_clean)
        .step(StylesRaw, &after_clean);

    let plan = match mode {
        Mode::Development => plan
            .step(StylesDev, &after_clean)
            .step(StylesLint, &after_clean),
        Mode::Production => plan.step(StylesProd, &after_clean),
    };

    plan.step(Scripts, &after_clean)
        .step(Images, &after_clean)
        .step(Webp, &[Images])
        .step(Sprite, &after_clean)
        .step(FontsWoff, &after_clean)
        .step(FontsWoff2, &after_clean)
}
