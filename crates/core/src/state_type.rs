// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Freshness policies shared by classes of states.

use crate::status::Status;

/// A named class of states sharing a freshness policy.
///
/// Immutable after configuration load; states hold an `Arc` to their type.
#[derive(Debug)]
pub struct StateType {
    name: String,
    freshness: i64,
    stale_status: Status,
    stale_summary: String,
}

impl StateType {
    /// Build a type. When no stale summary is given, one is generated
    /// from the freshness interval.
    pub fn new(
        name: impl Into<String>,
        freshness: i64,
        stale_status: Status,
        stale_summary: Option<String>,
    ) -> Self {
        let freshness = freshness.max(1);
        let stale_summary = stale_summary.unwrap_or_else(|| default_summary(freshness));
        Self {
            name: name.into(),
            freshness,
            stale_status,
            stale_summary,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum gap between observations, in seconds.
    pub fn freshness(&self) -> i64 {
        self.freshness
    }

    pub fn stale_status(&self) -> Status {
        self.stale_status
    }

    pub fn stale_summary(&self) -> &str {
        &self.stale_summary
    }
}

fn default_summary(freshness: i64) -> String {
    if freshness >= 3600 {
        format!(
            "No results received for more than {} hour{}",
            freshness / 3600,
            if freshness < 7200 { "" } else { "s" }
        )
    } else if freshness >= 60 {
        format!(
            "No results received for more than {} minute{}",
            freshness / 60,
            if freshness < 120 { "" } else { "s" }
        )
    } else {
        format!(
            "No results received for more than {} second{}",
            freshness,
            if freshness == 1 { "" } else { "s" }
        )
    }
}

#[cfg(test)]
#[path = "state_type_tests.rs"]
mod tests;
