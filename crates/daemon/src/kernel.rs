// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The kernel: a single task owning the metric store.
//!
//! All store mutations happen here, so the store needs no locks. The
//! kernel reacts to producer submissions, management requests, and
//! scheduler ticks, and publishes derived observations onto the
//! broadcast channel. Ordering guarantees:
//! - per metric name, broadcasts follow submission order
//! - TRANSITION precedes the STATE broadcast of the same update
//! - a closing window's broadcast precedes the new datum's effect

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use bolo_core::{Clock, Event, Status, Store};
use bolo_storage::{read_snapshot, save_keys, write_snapshot};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info};

use crate::dump;
use crate::protocol::{Broadcast, Pdu, Reply, Request, Submission};

/// Broadcast channel depth. Slow subscribers past this many undelivered
/// PDUs start losing messages (publish is best-effort fan-out).
const BROADCAST_DEPTH: usize = 1024;

/// Kernel cadences and persistence targets.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    pub savefile: PathBuf,
    pub keysfile: PathBuf,
    pub snapshot_size_mib: usize,
    /// Seconds between freshness sweeps.
    pub freshness_interval: i64,
    /// Seconds between snapshot + keys-file writes.
    pub savestate_interval: i64,
    /// Seconds a window lingers past its end before tick-driven closure.
    pub grace_period: i64,
}

/// Why a submission was rejected. The display text is the ERROR reply.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("State Not Found")]
    StateNotFound,
    #[error("Counter Not Found")]
    CounterNotFound,
    #[error("Sample Not Found")]
    SampleNotFound,
    #[error("Rate Not Found")]
    RateNotFound,
}

/// A submission plus a best-effort path for ERROR replies back down the
/// producer's connection.
#[derive(Debug)]
pub struct SubmissionEnvelope {
    pub submission: Submission,
    pub errors: Option<mpsc::Sender<String>>,
}

/// A management request with its reply slot.
#[derive(Debug)]
pub struct RequestEnvelope {
    pub request: Request,
    pub reply: oneshot::Sender<Reply>,
}

/// Channel ends for talking to a running kernel.
#[derive(Debug, Clone)]
pub struct KernelHandle {
    pub submissions: mpsc::Sender<SubmissionEnvelope>,
    pub requests: mpsc::Sender<RequestEnvelope>,
    pub ticks: mpsc::Sender<()>,
    pub broadcasts: broadcast::Sender<Pdu>,
    pub shutdown: watch::Sender<bool>,
}

/// The aggregator kernel.
pub struct Kernel {
    store: Store,
    keys: HashMap<String, String>,
    clock: Arc<dyn Clock>,
    config: KernelConfig,

    broadcasts: broadcast::Sender<Pdu>,
    submissions: mpsc::Receiver<SubmissionEnvelope>,
    requests: mpsc::Receiver<RequestEnvelope>,
    ticks: mpsc::Receiver<()>,
    shutdown: watch::Receiver<bool>,

    freshness_last: i64,
    savestate_last: i64,
}

impl Kernel {
    pub fn new(
        store: Store,
        keys: HashMap<String, String>,
        clock: Arc<dyn Clock>,
        config: KernelConfig,
    ) -> (Self, KernelHandle) {
        let (submission_tx, submission_rx) = mpsc::channel(1024);
        let (request_tx, request_rx) = mpsc::channel(64);
        let (tick_tx, tick_rx) = mpsc::channel(8);
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_DEPTH);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = KernelHandle {
            submissions: submission_tx,
            requests: request_tx,
            ticks: tick_tx,
            broadcasts: broadcast_tx.clone(),
            shutdown: shutdown_tx,
        };

        let kernel = Self {
            store,
            keys,
            clock,
            config,
            broadcasts: broadcast_tx,
            submissions: submission_rx,
            requests: request_rx,
            ticks: tick_rx,
            shutdown: shutdown_rx,
            freshness_last: 0,
            savestate_last: 0,
        };

        (kernel, handle)
    }

    /// Run the kernel until a terminate is published (or every input
    /// channel closes). A final snapshot + keys flush happens on the way
    /// out.
    pub async fn run(mut self) {
        loop {
            // Biased: terminate wins, then queued submissions drain ahead
            // of management requests and ticks, so a request observes
            // every submission accepted before it.
            tokio::select! {
                biased;

                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        debug!("kernel received terminate");
                        break;
                    }
                }

                Some(envelope) = self.submissions.recv() => {
                    if let Err(e) = self.handle_submission(envelope.submission) {
                        debug!(error = %e, "rejecting submission");
                        if let Some(errors) = envelope.errors {
                            let _ = errors.try_send(e.to_string());
                        }
                    }
                }

                Some(envelope) = self.requests.recv() => {
                    let reply = self.handle_request(envelope.request);
                    let _ = envelope.reply.send(reply);
                }

                Some(()) = self.ticks.recv() => {
                    self.handle_tick();
                }

                else => break,
            }
        }

        self.save_state();
        info!("kernel: terminated");
    }

    /// Apply one submission, publishing derived broadcasts.
    pub fn handle_submission(&mut self, submission: Submission) -> Result<(), SubmitError> {
        match submission {
            Submission::State {
                ts,
                name,
                code,
                summary,
            } => {
                let now = self.clock.now();
                let state = self
                    .store
                    .find_state(&name, now)
                    .ok_or(SubmitError::StateNotFound)?;
                if state.ignore {
                    return Ok(());
                }

                debug!(%name, code, ts, %summary, "updating state");
                let transition = state.observe(ts, Status::from_code(code), &summary);
                if transition {
                    publish(&self.broadcasts, Broadcast::transition(state));
                }
                publish(&self.broadcasts, Broadcast::state(state));
            }

            Submission::Counter { ts, name, delta } => {
                let counter = self
                    .store
                    .find_counter(&name)
                    .ok_or(SubmitError::CounterNotFound)?;
                if counter.ignore {
                    return Ok(());
                }

                if rolled_over(counter.last_seen, ts, |t| counter.window.start(t)) {
                    debug!(%name, "counter window rollover");
                    publish(&self.broadcasts, Broadcast::counter(counter));
                    counter.reset();
                }

                debug!(%name, ts, delta, "updating counter");
                counter.observe(ts, delta);
            }

            Submission::Sample { ts, name, values } => {
                let sample = self
                    .store
                    .find_sample(&name)
                    .ok_or(SubmitError::SampleNotFound)?;
                if sample.ignore {
                    return Ok(());
                }

                if rolled_over(sample.last_seen, ts, |t| sample.window.start(t)) {
                    debug!(%name, "sample window rollover");
                    publish(&self.broadcasts, Broadcast::sample(sample));
                    sample.reset();
                }

                debug!(%name, ts, n = values.len(), "updating sample set");
                for v in values {
                    sample.observe(ts, v);
                }
            }

            Submission::Rate { ts, name, value } => {
                let rate = self
                    .store
                    .find_rate(&name)
                    .ok_or(SubmitError::RateNotFound)?;
                if rate.ignore {
                    return Ok(());
                }

                if rolled_over(rate.last_seen, ts, |t| rate.window.start(t)) {
                    debug!(%name, "rate window rollover");
                    publish(&self.broadcasts, Broadcast::rate(rate));
                    rate.reset();
                }

                debug!(%name, ts, value, "updating rate set");
                rate.observe(ts, value);
            }

            Submission::Event { ts, name, extra } => {
                let event = Event {
                    timestamp: ts,
                    name,
                    extra,
                };
                publish(&self.broadcasts, Broadcast::event(&event));
                self.store.events.push(event);
            }

            Submission::SetKeys { pairs } => {
                for (key, value) in pairs {
                    debug!(%key, %value, "set key");
                    self.keys.insert(key, value);
                }
            }
        }

        Ok(())
    }

    /// Answer one management request.
    pub fn handle_request(&mut self, request: Request) -> Reply {
        match request {
            Request::State { name } => match self.store.state(&name) {
                Some(state) => Reply::State {
                    name: state.name.clone(),
                    last_seen: state.last_seen,
                    stale: state.stale,
                    status: state.status.wire_name().to_string(),
                    summary: state.summary.clone(),
                },
                None => Reply::error("State Not Found"),
            },

            Request::Dump => match dump::dump_states(&self.store) {
                Ok(yaml) => Reply::Dump { yaml },
                Err(e) => {
                    error!(error = %e, "state dump failed");
                    Reply::error("Internal error")
                }
            },

            Request::GetKeys { keys } => Reply::Values {
                pairs: keys
                    .iter()
                    .filter_map(|k| self.keys.get(k).map(|v| (k.clone(), v.clone())))
                    .collect(),
            },

            Request::DelKeys { keys } => {
                for key in &keys {
                    info!(%key, "deleting key");
                    self.keys.remove(key);
                }
                Reply::Ok
            }

            Request::SearchKeys { pattern } => match regex::Regex::new(&pattern) {
                Ok(re) => {
                    let mut keys: Vec<String> = self
                        .keys
                        .keys()
                        .filter(|k| re.is_match(k))
                        .cloned()
                        .collect();
                    keys.sort();
                    Reply::Keys { keys }
                }
                Err(e) => Reply::error(e.to_string()),
            },

            Request::GetEvents { since } => match dump::dump_events(&self.store, since) {
                Ok(yaml) => Reply::Events { yaml },
                Err(e) => {
                    error!(error = %e, "event dump failed");
                    Reply::error("Internal error")
                }
            },

            Request::SaveState => {
                self.save_state();
                Reply::Ok
            }
        }
    }

    /// Scheduler tick: close expired windows, then run the freshness and
    /// savestate cadences when due.
    pub fn handle_tick(&mut self) {
        let now = self.clock.now();
        let cutoff = now - self.config.grace_period;

        for counter in self.store.counters_mut() {
            if counter.ignore || counter.last_seen == 0 || counter.window.end(counter.last_seen) >= cutoff
            {
                continue;
            }
            publish(&self.broadcasts, Broadcast::counter(counter));
            counter.reset();
        }

        for sample in self.store.samples_mut() {
            if sample.ignore || sample.last_seen == 0 || sample.window.end(sample.last_seen) >= cutoff {
                continue;
            }
            publish(&self.broadcasts, Broadcast::sample(sample));
            sample.reset();
        }

        for rate in self.store.rates_mut() {
            if rate.ignore || rate.last_seen == 0 || rate.window.end(rate.last_seen) >= cutoff {
                continue;
            }
            publish(&self.broadcasts, Broadcast::rate(rate));
            rate.reset();
        }

        if self.freshness_last + self.config.freshness_interval < now {
            self.freshness_last = now;
            self.check_freshness(now);
        }

        if self.savestate_last + self.config.savestate_interval < now {
            self.savestate_last = now;
            self.save_state();
        }
    }

    /// Mark every expired state stale, broadcasting the results.
    fn check_freshness(&mut self, now: i64) {
        debug!("checking freshness");
        for state in self.store.states_mut() {
            if state.ignore || !state.is_expired(now) {
                continue;
            }

            info!(name = %state.name, "state is stale; marking");
            let transition = state.mark_stale(now);
            if transition {
                publish(&self.broadcasts, Broadcast::transition(state));
            }
            publish(&self.broadcasts, Broadcast::state(state));
        }
    }

    /// Write the snapshot and keys file. Failures are logged, never
    /// fatal: in-memory state stays authoritative and the next cadence
    /// retries.
    fn save_state(&self) {
        if let Err(e) = write_snapshot(
            &self.store,
            &self.config.savefile,
            self.config.snapshot_size_mib,
            self.clock.now(),
        ) {
            error!(
                path = %self.config.savefile.display(),
                error = %e,
                "failed to write snapshot"
            );
        }

        if let Err(e) = save_keys(&self.keys, &self.config.keysfile, self.clock.now_millis()) {
            error!(
                path = %self.config.keysfile.display(),
                error = %e,
                "failed to write keys file"
            );
        }
    }

    /// Load persisted state into a freshly configured store.
    ///
    /// Missing files are a clean start; a corrupt snapshot materializes
    /// nothing (the configured metrics still exist).
    pub fn load_state(&mut self) {
        let now = self.clock.now();
        match read_snapshot(&mut self.store, &self.config.savefile, now) {
            Ok(stats) => info!(
                loaded = stats.loaded,
                skipped = stats.skipped,
                "restored state from snapshot"
            ),
            Err(bolo_storage::SnapshotError::Io(e))
                if e.kind() == std::io::ErrorKind::NotFound =>
            {
                info!("no snapshot found, starting with configured state")
            }
            Err(e) => error!(
                path = %self.config.savefile.display(),
                error = %e,
                "snapshot unreadable, starting with configured state"
            ),
        }

        match bolo_storage::load_keys(&self.config.keysfile) {
            Ok(keys) => {
                info!(keys = keys.len(), "restored keys file");
                self.keys = keys;
            }
            Err(bolo_storage::KeysError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no keys file found, starting empty")
            }
            Err(e) => error!(
                path = %self.config.keysfile.display(),
                error = %e,
                "keys file unreadable, starting empty"
            ),
        }
    }
}

/// Window rollover check: a prior observation exists and the new
/// timestamp lands in a different window.
fn rolled_over(last_seen: i64, ts: i64, window_start: impl Fn(i64) -> i64) -> bool {
    last_seen > 0 && last_seen != ts && window_start(last_seen) != window_start(ts)
}

fn publish(broadcasts: &broadcast::Sender<Pdu>, broadcast: Broadcast) {
    debug!(pdu = ?broadcast, "broadcasting");
    let _ = broadcasts.send(broadcast.to_pdu());
}

#[cfg(test)]
#[path = "kernel_tests.rs"]
mod tests;
