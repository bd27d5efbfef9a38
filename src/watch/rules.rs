//! Watch rules: which steps a change to each asset kind re-runs.

use crate::core::{AssetKind, Mode};
use crate::step::StepId;

/// How the steps of a rule are run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Group {
    /// In order; a fatal failure stops the rest.
    Series(Vec<StepId>),
    /// All at once.
    Parallel(Vec<StepId>),
}

impl Group {
    pub fn steps(&self) -> &[StepId] {
        match self {
            Self::Series(steps) | Self::Parallel(steps) => steps,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRule {
    /// Watch glob owner; the rule fires for paths under its watch glob.
    pub kind: AssetKind,
    pub group: Group,
}

impl WatchRule {
    fn series(kind: AssetKind, steps: &[StepId]) -> Self {
        Self {
            kind,
            group: Group::Series(steps.to_vec()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.label()
    }
}

/// Rules for a mode, one per asset kind.
pub fn rules_for(mode: Mode) -> Vec<WatchRule> {
    use StepId::*;

    let styles: &[StepId] = match mode {
        Mode::Development => &[StylesDev, StylesLint],
        Mode::Production => &[StylesProd],
    };

    vec![
        WatchRule::series(AssetKind::Markup, &[Markup]),
        WatchRule::series(AssetKind::StyleRaw, &[StylesRaw]),
        WatchRule::series(AssetKind::StyleSource, styles),
        WatchRule::series(AssetKind::Script, &[Scripts]),
        WatchRule::series(AssetKind::Image, &[Images, Webp]),
        WatchRule::series(AssetKind::Icon, &[Sprite]),
        WatchRule {
            kind: AssetKind::Font,
            group: Group::Parallel(vec![FontsWoff, FontsWoff2]),
        },
    ]
}
