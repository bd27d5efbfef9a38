//! `dev` command: build, then watch and serve with live reload.
//!
//! Startup order matters:
//! 1. the watcher starts, buffering source edits
//! 2. the initial Clean + pipeline run, which stops `dev` when a
//!    mandatory-order step failed
//! 3. the WebSocket hub and HTTP server bind
//! 4. the router drains the buffered edits and keeps routing until Ctrl+C

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::oneshot;

use super::{
    build::{finish, log_summary},
    serve,
};
use crate::{
    config::ProjectConfig,
    debug, log,
    pipeline::{Executor, Plan, compose},
    reload::{ReloadBus, start_ws_server},
    step::{Registry, StepContext},
    watch::WatchRouter,
};

pub fn run_dev(config: &Arc<ProjectConfig>) -> Result<()> {
    let mode = config.build.mode;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let bus = ReloadBus::new();
    let ctx = StepContext::new(mode, Arc::clone(config))?;
    let executor = Arc::new(
        Executor::new(Registry::builtin(), ctx, bus.clone())
            .strict(config.build.strict)
            .with_progress(true),
    );

    let router = if config.serve.watch {
        Some(WatchRouter::new(mode, Arc::clone(&executor))?)
    } else {
        None
    };

    log!("dev"; "{} pipeline", mode);
    runtime.block_on(initial_build(&executor, &compose(mode)))?;

    let ws_port = match router {
        Some(_) => {
            let port = start_ws_server(config.serve.interface, config.serve.ws_port, &bus)?;
            debug!("reload"; "ws://{}:{}", config.serve.interface, port);
            Some(port)
        }
        None => None,
    };

    let server = serve::bind_server(&config.serve)?;

    if let Some(router) = router {
        let (stop_tx, stop_rx) = oneshot::channel();
        let shutdown = server.shutdown_signal();
        std::thread::spawn(move || {
            let _ = shutdown.recv();
            let _ = stop_tx.send(());
        });
        runtime.spawn(router.run(stop_rx));
        log!("watch"; "watching {}", config.source_dir().display());
    }

    server.run(executor.context().paths.output_root(), ws_port)?;

    // In-flight rebuilds get a moment to finish writing
    runtime.shutdown_timeout(Duration::from_secs(2));
    Ok(())
}

/// Run the initial pipeline.
///
/// Leaf failures still serve whatever was written. A failed Clean or any
/// other step with dependents leaves nothing worth serving.
async fn initial_build(executor: &Executor, plan: &Plan) -> Result<()> {
    let summary = executor.run(plan).await?;
    if summary.halted() {
        return finish(&summary);
    }
    log_summary(&summary);
    Ok(())
}
