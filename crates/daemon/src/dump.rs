// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! YAML dumps for the DUMP and GET.EVENTS management requests.

use std::collections::BTreeMap;

use bolo_core::Store;
use serde::Serialize;

const HEADER: &str = "---\n# generated by bolo\n";

#[derive(Serialize)]
struct StateDump<'a> {
    status: &'a str,
    message: &'a str,
    last_seen: i64,
    fresh: &'a str,
}

/// Render the current states as a YAML document, sorted by name.
pub(crate) fn dump_states(store: &Store) -> Result<String, serde_yaml::Error> {
    let mut states = BTreeMap::new();
    for state in store.states() {
        states.insert(
            state.name.as_str(),
            StateDump {
                status: state.status.wire_name(),
                message: &state.summary,
                last_seen: state.last_seen,
                fresh: if state.stale { "no" } else { "yes" },
            },
        );
    }

    let body = serde_yaml::to_string(&states)?;
    Ok(format!("{HEADER}{body}"))
}

#[derive(Serialize)]
struct EventDump<'a> {
    name: &'a str,
    when: i64,
    extra: &'a str,
}

/// Render buffered events with `timestamp >= since` as a YAML list.
pub(crate) fn dump_events(store: &Store, since: i64) -> Result<String, serde_yaml::Error> {
    let events: Vec<EventDump<'_>> = store
        .events
        .since(since)
        .map(|e| EventDump {
            name: &e.name,
            when: e.timestamp,
            extra: &e.extra,
        })
        .collect();

    let body = serde_yaml::to_string(&events)?;
    Ok(format!("{HEADER}{body}"))
}

#[cfg(test)]
#[path = "dump_tests.rs"]
mod tests;
