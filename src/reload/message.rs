//! Live-reload message protocol.
//!
//! JSON messages pushed from the dev server to browser clients:
//!
//! - `connected`: handshake acknowledgement
//! - `reload`: reload the page
//! - `css`: re-fetch stylesheets without reloading

use serde::{Deserialize, Serialize};

use super::{Notification, Refresh};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HotReloadMessage {
    Connected { version: String },
    Reload { step: String },
    Css { step: String },
}

impl HotReloadMessage {
    pub fn connected() -> Self {
        Self::Connected {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"reload","step":""}"#.into())
    }
}

impl From<Notification> for HotReloadMessage {
    fn from(n: Notification) -> Self {
        let step = n.step.name().to_string();
        match n.refresh {
            Refresh::Page => Self::Reload { step },
            Refresh::Css => Self::Css { step },
        }
    }
}
