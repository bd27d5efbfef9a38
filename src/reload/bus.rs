//! Process-scoped notification bus.
//!
//! Created once at startup and handed explicitly to the executor (publisher)
//! and the WebSocket hub (subscriber). Publishing without subscribers is a
//! no-op, so one-shot builds carry the bus at no cost.

use tokio::sync::broadcast;

use crate::step::StepId;

/// How the browser should pick up a step's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Refresh {
    /// Full page reload
    Page,
    /// Re-fetch stylesheets only
    Css,
}

/// "Step X produced new output."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub step: StepId,
    pub refresh: Refresh,
}

const CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct ReloadBus {
    tx: broadcast::Sender<Notification>,
}

impl ReloadBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, notification: Notification) {
        // Err only means nobody is listening
        let _ = self.tx.send(notification);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for ReloadBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = ReloadBus::new();
        bus.publish(Notification {
            step: StepId::Markup,
            refresh: Refresh::Page,
        });
    }

    #[test]
    fn test_clones_share_channel() {
        let bus = ReloadBus::new();
        let mut rx = bus.subscribe();
        let publisher = bus.clone();
        publisher.publish(Notification {
            step: StepId::StylesDev,
            refresh: Refresh::Css,
        });

        let got = rx.try_recv().unwrap();
        assert_eq!(got.step, StepId::StylesDev);
        assert_eq!(got.refresh, Refresh::Css);
    }
}
