//! Development server with live reload support.
//!
//! Serves the output root over HTTP on a small thread pool. HTML responses
//! get the live-reload client injected; the client itself is served from
//! memory and connects to the WebSocket hub in [`crate::reload`].

mod inject;
mod lifecycle;
mod path;
mod response;

use crate::{
    config::ServeConfig,
    debug,
    embed::serve::LIVERELOAD_URL,
    log,
};
use anyhow::{Context, Result};
use crossbeam::channel;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tiny_http::{Method, Request, Server};

/// Per-request view of the server settings.
#[derive(Debug, Clone)]
struct ServeState {
    output_root: PathBuf,
    /// Live-reload hub port; `None` when not watching
    ws_port: Option<u16>,
}

/// Bound server ready to accept requests
pub struct BoundServer {
    server: Arc<Server>,
    addr: SocketAddr,
    shutdown_rx: channel::Receiver<()>,
}

/// Bind the HTTP server without starting the request loop.
pub fn bind_server(config: &ServeConfig) -> Result<BoundServer> {
    let (server, addr) = lifecycle::bind_with_retry(config.interface, config.port)?;
    let server = Arc::new(server);

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    lifecycle::register_server_for_shutdown(Arc::clone(&server), shutdown_tx);

    Ok(BoundServer {
        server,
        addr,
        shutdown_rx,
    })
}

impl BoundServer {
    /// Signalled once when Ctrl+C is pressed.
    pub fn shutdown_signal(&self) -> channel::Receiver<()> {
        self.shutdown_rx.clone()
    }

    /// Serve `output_root` until the server is unblocked (blocking).
    pub fn run(self, output_root: &Path, ws_port: Option<u16>) -> Result<()> {
        log!("serve"; "http://{}", self.addr);
        let state = Arc::new(ServeState {
            output_root: output_root.to_path_buf(),
            ws_port,
        });
        run_request_loop(&self.server, &state)
    }
}

fn run_request_loop(server: &Server, state: &Arc<ServeState>) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .thread_name(|i| format!("serve-{i}"))
        .build()
        .context("failed to create request thread pool")?;

    for request in server.incoming_requests() {
        let state = Arc::clone(state);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &state) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    debug!("serve"; "request loop stopped");
    Ok(())
}

/// Handle a single HTTP request
fn handle_request(request: Request, state: &ServeState) -> Result<()> {
    if crate::core::is_shutdown() {
        return response::respond_unavailable(request);
    }

    if !matches!(request.method(), Method::Get | Method::Head) {
        return response::respond_method_not_allowed(request);
    }

    let url = request.url().split(['?', '#']).next().unwrap_or_default();
    if let Some(port) = state.ws_port
        && url == LIVERELOAD_URL
    {
        return response::respond_livereload_js(request, port);
    }

    let livereload = state.ws_port.is_some();
    match path::resolve_path(request.url(), &state.output_root) {
        Some(path) => response::respond_file(request, &path, livereload),
        None => response::respond_not_found(request, &state.output_root, livereload),
    }
}
