// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bolo-config: declarative configuration for the aggregator.
//!
//! The configuration is a TOML document describing endpoints, file
//! paths, scheduler cadences, and the initial shape of the metric store
//! (types, windows, literal and pattern-matched metric declarations).

mod metrics;

pub use metrics::{MetricDecl, StateDecl, TypeDecl, WindowRef};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bolo_core::{Retention, Store};
use serde::Deserialize;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown type '{0}'")]
    UnknownType(String),

    #[error("unknown window '{0}'")]
    UnknownWindow(String),

    #[error("no type for state '{0}' and no default-type in effect")]
    MissingType(String),

    #[error("no window for {kind} '{name}' and no default-window in effect")]
    MissingWindow { kind: &'static str, name: String },

    #[error("{kind} declaration needs exactly one of `name` or `match`")]
    AmbiguousDecl { kind: &'static str },

    #[error("failed to compile pattern /{pattern}/: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("bad max_events retention '{0}': expected a count or a time span")]
    Retention(String),

    #[error("bad endpoint '{0}': expected [tcp://]host:port")]
    Endpoint(String),
}

/// Event-ring retention: a bare integer keeps that many events; a time
/// span string keeps events younger than the span.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RetentionSpec {
    Count(u64),
    Span(String),
}

impl RetentionSpec {
    pub fn to_retention(&self) -> Result<Retention, ConfigError> {
        match self {
            RetentionSpec::Count(n) => Ok(Retention::Count(*n as usize)),
            RetentionSpec::Span(s) => {
                if let Ok(n) = s.parse::<u64>() {
                    return Ok(Retention::Count(n as usize));
                }
                let span = humantime::parse_duration(s)
                    .map_err(|_| ConfigError::Retention(s.clone()))?;
                Ok(Retention::Age(span.as_secs() as i64))
            }
        }
    }
}

impl Default for RetentionSpec {
    fn default() -> Self {
        RetentionSpec::Count(1000)
    }
}

/// Aggregator configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Ingestion endpoint producers push submissions to.
    #[serde(default = "default_listener")]
    pub listener: String,

    /// Management request/reply endpoint.
    #[serde(default = "default_controller")]
    pub controller: String,

    /// Broadcast fan-out endpoint subscribers read from.
    #[serde(default = "default_broadcast")]
    pub broadcast: String,

    /// Binary snapshot path.
    #[serde(default = "default_savefile")]
    pub savefile: PathBuf,

    /// Plain-text keys file path.
    #[serde(default = "default_keysfile")]
    pub keysfile: PathBuf,

    /// Log file; stderr when unset.
    #[serde(default)]
    pub logfile: Option<PathBuf>,

    /// Size of the mmapped snapshot region, in MiB.
    #[serde(default = "default_snapshot_size_mib")]
    pub snapshot_size_mib: usize,

    /// Scheduler tick period in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Seconds between freshness sweeps.
    #[serde(default = "default_freshness")]
    pub freshness: i64,

    /// Seconds between snapshot + keys-file writes.
    #[serde(default = "default_savestate")]
    pub savestate: i64,

    /// Seconds a window lingers past its end before tick-driven closure,
    /// absorbing late submissions.
    #[serde(default = "default_grace_period")]
    pub grace_period: i64,

    /// Event-ring retention.
    #[serde(default)]
    pub max_events: RetentionSpec,

    /// Type bound to state declarations that name none.
    #[serde(default)]
    pub default_type: Option<String>,

    /// Window bound to counter/sample/rate declarations that name none.
    #[serde(default)]
    pub default_window: Option<String>,

    #[serde(default)]
    pub types: BTreeMap<String, TypeDecl>,

    /// Named windows: name -> period in seconds.
    #[serde(default)]
    pub windows: BTreeMap<String, i64>,

    #[serde(default)]
    pub states: Vec<StateDecl>,

    #[serde(default)]
    pub counters: Vec<MetricDecl>,

    #[serde(default)]
    pub samples: Vec<MetricDecl>,

    #[serde(default)]
    pub rates: Vec<MetricDecl>,
}

fn default_listener() -> String {
    "tcp://*:2999".to_string()
}

fn default_controller() -> String {
    "tcp://127.0.0.1:2998".to_string()
}

fn default_broadcast() -> String {
    "tcp://*:2997".to_string()
}

fn default_savefile() -> PathBuf {
    PathBuf::from("/var/lib/bolo/save.db")
}

fn default_keysfile() -> PathBuf {
    PathBuf::from("/var/lib/bolo/keys")
}

fn default_snapshot_size_mib() -> usize {
    8
}

fn default_tick_ms() -> u64 {
    1000
}

fn default_freshness() -> i64 {
    2
}

fn default_savestate() -> i64 {
    15
}

fn default_grace_period() -> i64 {
    15
}

impl Config {
    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse a configuration document.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Build the initial metric store this configuration describes.
    ///
    /// `now` anchors the expiry of literally declared (pending) states.
    pub fn build_store(&self, now: i64) -> Result<Store, ConfigError> {
        metrics::build_store(self, now)
    }
}

/// Normalize an endpoint string into a socket bind/connect address.
///
/// Accepts `tcp://host:port` or bare `host:port`; `*` means all
/// interfaces.
pub fn socket_addr(endpoint: &str) -> Result<String, ConfigError> {
    let addr = endpoint.strip_prefix("tcp://").unwrap_or(endpoint);
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| ConfigError::Endpoint(endpoint.to_string()))?;
    if host.is_empty() || port.is_empty() || port.parse::<u16>().is_err() {
        return Err(ConfigError::Endpoint(endpoint.to_string()));
    }
    let host = if host == "*" { "0.0.0.0" } else { host };
    Ok(format!("{host}:{port}"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
