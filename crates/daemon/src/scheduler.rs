// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler: the kernel's periodic tick source.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::debug;

pub(crate) struct Scheduler {
    period: Duration,
    ticks: mpsc::Sender<()>,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(period: Duration, ticks: mpsc::Sender<()>, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            period,
            ticks,
            shutdown,
        }
    }

    /// Emit ticks until shutdown (or the kernel goes away).
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    debug!("scheduler tocked");
                    if self.ticks.send(()).await.is_err() {
                        break;
                    }
                }

                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("scheduler: terminated");
    }
}
