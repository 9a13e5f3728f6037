// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor: signal-driven lifecycle controller.

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{debug, info};

/// Wait for SIGTERM/SIGINT, then fan out termination. Every actor
/// subscribed to the shutdown channel halts at its next recv boundary.
pub async fn run(shutdown: watch::Sender<bool>) -> Result<(), std::io::Error> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => info!("supervisor caught SIGTERM; shutting down"),
        _ = sigint.recv() => info!("supervisor caught SIGINT; shutting down"),
    }

    let _ = shutdown.send(true);
    debug!("supervisor: terminated");
    Ok(())
}
