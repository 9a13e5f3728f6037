// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wiring for the monitor/scheduler/supervisor triad.

use std::sync::Arc;
use std::time::Duration;

use bolo_core::Clock;
use tracing::{debug, error};

use crate::monitor::{Monitor, MonitorHandle};

/// Spawn the full triad for a relay process and return the telemetry
/// handle. The monitor flushes every `interval`; SIGTERM/SIGINT shuts
/// the triad down through the handle's shutdown channel.
pub fn spawn(
    prefix: &str,
    endpoint: &str,
    interval: Duration,
    clock: Arc<dyn Clock>,
) -> MonitorHandle {
    let (monitor, handle) = Monitor::new(prefix, endpoint, clock);
    tokio::spawn(monitor.run());

    // Scheduler: tick the monitor's flush cadence.
    let ticks = handle.ticks.clone();
    let mut shutdown = handle.shutdown.subscribe();
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval.max(Duration::from_millis(1)));
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = timer.tick() => {
                    if ticks.send(()).await.is_err() {
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("scheduler: terminated");
    });

    // Supervisor: termination signals fan out on the shutdown channel.
    let shutdown = handle.shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = bolo_daemon::supervisor::run(shutdown).await {
            error!(error = %e, "failed to install signal handlers");
        }
    });

    handle
}
