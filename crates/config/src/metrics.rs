// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Metric declarations and store construction.

use std::sync::Arc;

use bolo_core::{StateType, Status, Store, Window};
use regex::Regex;
use serde::Deserialize;

use crate::{Config, ConfigError};

/// A state type declaration: freshness plus the status/summary applied
/// when the freshness sweep marks members stale.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeDecl {
    #[serde(default = "default_freshness")]
    pub freshness: i64,

    /// Stale status name; warning when unset.
    #[serde(default = "default_status")]
    pub status: String,

    /// Stale summary; generated from the freshness when unset.
    #[serde(default)]
    pub summary: Option<String>,
}

fn default_freshness() -> i64 {
    300
}

fn default_status() -> String {
    "warning".to_string()
}

/// A state declaration: a literal `name` or a `match` pattern, bound to
/// a type (falling back to the document's `default_type`).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateDecl {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, rename = "match")]
    pub pattern: Option<String>,

    #[serde(default, rename = "type")]
    pub state_type: Option<String>,

    #[serde(default)]
    pub ignore: bool,
}

/// A counter/sample/rate declaration: a literal `name` or a `match`
/// pattern, bound to a window (named, anonymous seconds, or the
/// document's `default_window`).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricDecl {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, rename = "match")]
    pub pattern: Option<String>,

    #[serde(default)]
    pub window: Option<WindowRef>,

    #[serde(default)]
    pub ignore: bool,
}

/// Window reference in a metric declaration.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WindowRef {
    /// Anonymous window of this many seconds.
    Seconds(i64),
    /// A window from the `[windows]` table.
    Named(String),
}

enum Decl<'a> {
    Literal(&'a str),
    Pattern(Regex),
}

fn parse_decl<'a>(
    kind: &'static str,
    name: &'a Option<String>,
    pattern: &Option<String>,
) -> Result<Decl<'a>, ConfigError> {
    match (name, pattern) {
        (Some(name), None) => Ok(Decl::Literal(name)),
        (None, Some(pattern)) => {
            let re = Regex::new(pattern).map_err(|source| ConfigError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
            Ok(Decl::Pattern(re))
        }
        _ => Err(ConfigError::AmbiguousDecl { kind }),
    }
}

pub(crate) fn build_store(config: &Config, now: i64) -> Result<Store, ConfigError> {
    let mut store = Store::new(config.max_events.to_retention()?);

    for (name, decl) in &config.types {
        let status = Status::parse(&decl.status).unwrap_or(Status::Warning);
        store.add_type(StateType::new(
            name,
            decl.freshness,
            status,
            decl.summary.clone(),
        ));
    }

    for (name, seconds) in &config.windows {
        store.add_window(Window::named(name, *seconds));
    }

    for decl in &config.states {
        let type_name = decl
            .state_type
            .as_deref()
            .or(config.default_type.as_deref())
            .ok_or_else(|| ConfigError::MissingType(describe(&decl.name, &decl.pattern)))?;
        let state_type = store
            .type_named(type_name)
            .ok_or_else(|| ConfigError::UnknownType(type_name.to_string()))?;

        match parse_decl("state", &decl.name, &decl.pattern)? {
            Decl::Literal(name) => store.insert_state(name, state_type, now),
            Decl::Pattern(re) => store.add_state_rule(re, state_type, decl.ignore),
        }
    }

    for decl in &config.counters {
        add_windowed(&mut store, config, decl, "counter")?;
    }
    for decl in &config.samples {
        add_windowed(&mut store, config, decl, "sample")?;
    }
    for decl in &config.rates {
        add_windowed(&mut store, config, decl, "rate")?;
    }

    Ok(store)
}

fn add_windowed(
    store: &mut Store,
    config: &Config,
    decl: &MetricDecl,
    kind: &'static str,
) -> Result<(), ConfigError> {
    let window = resolve_window(store, config, decl, kind)?;

    match parse_decl(kind, &decl.name, &decl.pattern)? {
        Decl::Literal(name) => match kind {
            "counter" => store.insert_counter(name, window),
            "sample" => store.insert_sample(name, window),
            _ => store.insert_rate(name, window),
        },
        Decl::Pattern(re) => match kind {
            "counter" => store.add_counter_rule(re, window, decl.ignore),
            "sample" => store.add_sample_rule(re, window, decl.ignore),
            _ => store.add_rate_rule(re, window, decl.ignore),
        },
    }

    Ok(())
}

fn resolve_window(
    store: &mut Store,
    config: &Config,
    decl: &MetricDecl,
    kind: &'static str,
) -> Result<Arc<Window>, ConfigError> {
    match &decl.window {
        Some(WindowRef::Named(name)) => store
            .window_named(name)
            .ok_or_else(|| ConfigError::UnknownWindow(name.clone())),
        Some(WindowRef::Seconds(seconds)) => Ok(store.add_window(Window::anonymous(*seconds))),
        None => {
            let name =
                config
                    .default_window
                    .as_deref()
                    .ok_or_else(|| ConfigError::MissingWindow {
                        kind,
                        name: describe(&decl.name, &decl.pattern),
                    })?;
            store
                .window_named(name)
                .ok_or_else(|| ConfigError::UnknownWindow(name.to_string()))
        }
    }
}

fn describe(name: &Option<String>, pattern: &Option<String>) -> String {
    name.clone()
        .or_else(|| pattern.as_ref().map(|p| format!("/{p}/")))
        .unwrap_or_else(|| "<unnamed>".to_string())
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
