// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Self-telemetry aggregation for relay processes.
//!
//! Worker code records COUNT and SAMPLE telemetry through a
//! [`MonitorHandle`]; the monitor folds them into per-metric
//! accumulators and, on each scheduler tick, submits the batch to the
//! aggregator's ingestion endpoint as COUNTER/SAMPLE PDUs named
//! `prefix:name`.

use std::collections::HashMap;
use std::sync::Arc;

use bolo_core::Clock;
use bolo_daemon::protocol::Submission;
use bolo_daemon::protocol_wire;
use rand::Rng;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Reservoir bound: at most this many samples per metric per interval.
pub const MAX_SAMPLES: usize = 1024;

/// Kind of a telemetry metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Count,
    Sample,
}

/// Telemetry messages from relay worker code.
#[derive(Debug, Clone, PartialEq)]
pub enum Telemetry {
    /// Pre-register a metric so it reports zero even before data.
    Init { kind: MetricKind, name: String },
    Count { name: String, value: u64 },
    Sample { name: String, value: f64 },
}

/// Bounded sample reservoir, median-reduced on flush.
#[derive(Debug, Default)]
struct Reservoir {
    samples: Vec<f64>,
    seen: usize,
}

impl Reservoir {
    /// Record a value; once full, replace a random slot (reservoir
    /// sampling keeps the kept set uniform over everything seen).
    fn push(&mut self, value: f64) {
        self.seen += 1;
        if self.samples.len() < MAX_SAMPLES {
            self.samples.push(value);
        } else {
            let slot = rand::rng().random_range(0..self.seen);
            if slot < MAX_SAMPLES {
                self.samples[slot] = value;
            }
        }
    }

    fn median(&mut self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples
            .sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mid = self.samples.len() / 2;
        if self.samples.len() % 2 == 0 {
            (self.samples[mid - 1] + self.samples[mid]) / 2.0
        } else {
            self.samples[mid]
        }
    }

    fn reset(&mut self) {
        self.samples.clear();
        self.seen = 0;
    }
}

#[derive(Debug)]
enum Metric {
    Count(u64),
    Samples(Reservoir),
}

/// Handle for recording telemetry into a running monitor.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    pub telemetry: mpsc::Sender<Telemetry>,
    pub ticks: mpsc::Sender<()>,
    pub shutdown: watch::Sender<bool>,
}

impl MonitorHandle {
    pub async fn init(&self, kind: MetricKind, name: impl Into<String>) {
        let _ = self
            .telemetry
            .send(Telemetry::Init {
                kind,
                name: name.into(),
            })
            .await;
    }

    pub async fn count(&self, name: impl Into<String>, value: u64) {
        let _ = self
            .telemetry
            .send(Telemetry::Count {
                name: name.into(),
                value,
            })
            .await;
    }

    pub async fn sample(&self, name: impl Into<String>, value: f64) {
        let _ = self
            .telemetry
            .send(Telemetry::Sample {
                name: name.into(),
                value,
            })
            .await;
    }
}

/// The telemetry aggregation actor.
pub struct Monitor {
    prefix: String,
    endpoint: String,
    clock: Arc<dyn Clock>,
    metrics: HashMap<String, Metric>,
    conn: Option<TcpStream>,

    telemetry: mpsc::Receiver<Telemetry>,
    ticks: mpsc::Receiver<()>,
    shutdown: watch::Receiver<bool>,
}

impl Monitor {
    /// Build a monitor submitting to the aggregator ingestion endpoint
    /// (`tcp://host:port` or `host:port`), naming metrics
    /// `prefix:name`.
    pub fn new(
        prefix: impl Into<String>,
        endpoint: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> (Self, MonitorHandle) {
        let (telemetry_tx, telemetry_rx) = mpsc::channel(256);
        let (tick_tx, tick_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = MonitorHandle {
            telemetry: telemetry_tx,
            ticks: tick_tx,
            shutdown: shutdown_tx,
        };

        let monitor = Self {
            prefix: prefix.into(),
            endpoint: endpoint.into(),
            clock,
            metrics: HashMap::new(),
            conn: None,
            telemetry: telemetry_rx,
            ticks: tick_rx,
            shutdown: shutdown_rx,
        };

        (monitor, handle)
    }

    /// Run until shutdown.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(message) = self.telemetry.recv() => self.apply(message),

                Some(()) = self.ticks.recv() => {
                    let batch = self.collect();
                    self.submit(batch).await;
                }

                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }

                else => break,
            }
        }
        info!("monitor: terminated");
    }

    /// Fold one telemetry message into the accumulators. A name
    /// registered as one kind silently drops data of the other.
    fn apply(&mut self, message: Telemetry) {
        match message {
            Telemetry::Init { kind, name } => {
                self.metric(name, kind);
            }
            Telemetry::Count { name, value } => {
                if let Some(Metric::Count(count)) = self.metric(name, MetricKind::Count) {
                    *count += value;
                }
            }
            Telemetry::Sample { name, value } => {
                if let Some(Metric::Samples(reservoir)) = self.metric(name, MetricKind::Sample) {
                    reservoir.push(value);
                }
            }
        }
    }

    fn metric(&mut self, name: String, kind: MetricKind) -> Option<&mut Metric> {
        let entry = self.metrics.entry(name).or_insert_with(|| match kind {
            MetricKind::Count => Metric::Count(0),
            MetricKind::Sample => Metric::Samples(Reservoir::default()),
        });
        match (&entry, kind) {
            (Metric::Count(_), MetricKind::Count) | (Metric::Samples(_), MetricKind::Sample) => {
                Some(entry)
            }
            _ => None,
        }
    }

    /// Drain the accumulators into outbound submissions, resetting each
    /// metric for the next interval.
    fn collect(&mut self) -> Vec<Submission> {
        let ts = self.clock.now();
        let mut batch: Vec<Submission> = Vec::with_capacity(self.metrics.len());

        let mut names: Vec<&String> = self.metrics.keys().collect();
        names.sort();
        let names: Vec<String> = names.into_iter().cloned().collect();

        for name in names {
            let full = format!("{}:{}", self.prefix, name);
            match self.metrics.get_mut(&name) {
                Some(Metric::Count(count)) => {
                    debug!(metric = %full, value = *count, "submitting count");
                    batch.push(Submission::Counter {
                        ts,
                        name: full,
                        delta: *count as i64,
                    });
                    *count = 0;
                }
                Some(Metric::Samples(reservoir)) => {
                    let median = reservoir.median();
                    debug!(metric = %full, median, "submitting sample");
                    batch.push(Submission::Sample {
                        ts,
                        name: full,
                        values: vec![median],
                    });
                    reservoir.reset();
                }
                None => {}
            }
        }

        batch
    }

    /// Push a batch to the aggregator, reconnecting on demand. Failures
    /// drop the connection; the data for this interval is gone (publish
    /// back to the aggregator is best-effort, like any other producer).
    async fn submit(&mut self, batch: Vec<Submission>) {
        if batch.is_empty() {
            return;
        }

        if self.conn.is_none() {
            let addr = self.endpoint.strip_prefix("tcp://").unwrap_or(&self.endpoint);
            match TcpStream::connect(addr).await {
                Ok(stream) => self.conn = Some(stream),
                Err(e) => {
                    warn!(endpoint = %self.endpoint, error = %e, "cannot reach aggregator");
                    return;
                }
            }
        }

        if let Some(conn) = self.conn.as_mut() {
            for submission in &batch {
                if let Err(e) = protocol_wire::write_pdu(conn, &submission.to_pdu()).await {
                    warn!(error = %e, "telemetry submission failed, dropping connection");
                    self.conn = None;
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
