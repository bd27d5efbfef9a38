//! WebSocket hub for live reload.
//!
//! Two threads:
//! - acceptor: non-blocking accept loop, performs the handshake and greets
//!   each client with a `connected` message
//! - broadcaster: forwards every bus notification to all connected clients,
//!   dropping clients whose socket fails

use std::net::{IpAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tungstenite::{Message, WebSocket};

use super::{HotReloadMessage, ReloadBus};
use crate::{core::is_shutdown, debug, log};

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

/// Start the hub. Returns the port actually bound.
pub fn start_ws_server(interface: IpAddr, base_port: u16, bus: &ReloadBus) -> Result<u16> {
    let (listener, port) = try_bind_port(interface, base_port, MAX_PORT_RETRIES)?;
    listener.set_nonblocking(true)?;

    let clients: Clients = Arc::default();

    let acceptor_clients = Arc::clone(&clients);
    std::thread::spawn(move || accept_loop(&listener, &acceptor_clients));

    let mut rx = bus.subscribe();
    std::thread::spawn(move || {
        loop {
            let message = match rx.blocking_recv() {
                Ok(notification) => HotReloadMessage::from(notification),
                // Missed notifications: a full reload covers all of them
                Err(RecvError::Lagged(_)) => HotReloadMessage::Reload {
                    step: String::new(),
                },
                Err(RecvError::Closed) => break,
            };
            broadcast(&clients, &message);
        }
    });

    Ok(port)
}

fn accept_loop(listener: &TcpListener, clients: &Clients) {
    while !is_shutdown() {
        match listener.accept() {
            Ok((stream, addr)) => {
                debug!("reload"; "client connected: {}", addr);
                // Handshake and writes are blocking, bounded by a timeout
                let _ = stream.set_nonblocking(false);
                let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
                add_client(stream, clients);
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => {
                log!("reload"; "accept error: {}", e);
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }
}

fn add_client(stream: TcpStream, clients: &Clients) {
    match tungstenite::accept(stream) {
        Ok(mut ws) => {
            let hello = HotReloadMessage::connected().to_json();
            if let Err(e) = ws.send(Message::Text(hello.into())) {
                debug!("reload"; "failed to greet client: {}", e);
                return;
            }
            let mut clients = clients.lock();
            clients.push(ws);
            debug!("reload"; "{} client(s) connected", clients.len());
        }
        Err(e) => debug!("reload"; "handshake failed: {}", e),
    }
}

fn broadcast(clients: &Clients, message: &HotReloadMessage) {
    let json = message.to_json();
    let mut clients = clients.lock();
    clients.retain_mut(|ws| ws.send(Message::Text(json.clone().into())).is_ok());
    debug!("reload"; "sent {} to {} client(s)", json, clients.len());
}

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind((interface, port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "Failed to bind WebSocket server after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reload::{Notification, Refresh};
    use crate::step::StepId;
    use std::net::Ipv4Addr;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[test]
    fn test_bind_retries_next_port() {
        let (first, port) = try_bind_port(LOCALHOST, 0, 1).unwrap();
        // Port taken: the retry moves on
        let (_second, next) = try_bind_port(LOCALHOST, port, 3).unwrap();
        assert_ne!(port, next);
        drop(first);
    }

    #[test]
    fn test_client_receives_css_notification() {
        let bus = ReloadBus::new();
        let port = start_ws_server(LOCALHOST, 47100, &bus).unwrap();

        let (mut socket, _) = tungstenite::connect(format!("ws://127.0.0.1:{port}")).unwrap();
        let hello = socket.read().unwrap();
        assert!(hello.to_text().unwrap().contains("connected"));

        // The client is registered after the greeting; give the acceptor a moment
        std::thread::sleep(Duration::from_millis(200));
        bus.publish(Notification {
            step: StepId::StylesDev,
            refresh: Refresh::Css,
        });

        let msg = socket.read().unwrap();
        assert_eq!(msg.to_text().unwrap(), r#"{"type":"css","step":"styles"}"#);
    }
}
