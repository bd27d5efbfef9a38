//! Live reload: notification bus, wire messages and the WebSocket hub.

mod bus;
mod message;
mod server;

pub use bus::{Notification, Refresh, ReloadBus};
pub use message::HotReloadMessage;
pub use server::start_ws_server;
