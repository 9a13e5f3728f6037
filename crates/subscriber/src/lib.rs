// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bolo-subscriber: actor scaffolding for relay processes.
//!
//! Relays (RRD writers, SQL inserters, log shippers...) embed this
//! triad: a monitor that aggregates the relay's own telemetry and
//! periodically submits it back to the aggregator, a scheduler that
//! drives the flush cadence, and a supervisor that turns termination
//! signals into a clean shutdown.

pub mod harness;
pub mod monitor;

pub use harness::spawn;
pub use monitor::{MetricKind, Monitor, MonitorHandle, Telemetry};
