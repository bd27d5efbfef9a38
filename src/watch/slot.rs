//! Per-rule rebuild state.
//!
//! ```text
//! Idle ──trigger──> Triggered ──begin──> Running ──finish──> Idle
//!                                           │  ▲
//!                              trigger: set │  │ finish with pending:
//!                              pending flag ▼  │ run once more
//!                                         (pending)
//! ```
//!
//! Any number of triggers while Running collapse into one pending re-run.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotState {
    #[default]
    Idle,
    Triggered,
    Running,
}

/// Result of a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The caller must start a run.
    Start,
    /// A run is in flight; one re-run is now queued.
    Queued,
    /// A run is already queued or about to start.
    Coalesced,
}

#[derive(Debug, Default)]
pub struct RuleSlot {
    state: SlotState,
    pending: bool,
}

impl RuleSlot {
    pub fn state(&self) -> SlotState {
        self.state
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn trigger(&mut self) -> Trigger {
        match self.state {
            SlotState::Idle => {
                self.state = SlotState::Triggered;
                Trigger::Start
            }
            SlotState::Triggered => Trigger::Coalesced,
            SlotState::Running if self.pending => Trigger::Coalesced,
            SlotState::Running => {
                self.pending = true;
                Trigger::Queued
            }
        }
    }

    /// The run starts (from Triggered, or again after a pending finish).
    pub fn begin(&mut self) {
        self.state = SlotState::Running;
        self.pending = false;
    }

    /// The run ended. Returns whether to run once more.
    pub fn finish(&mut self) -> bool {
        if self.pending {
            self.pending = false;
            self.state = SlotState::Running;
            true
        } else {
            self.state = SlotState::Idle;
            false
        }
    }
}
