// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bolo-storage: persistent state for the aggregator.
//!
//! Two files: the binary metric snapshot (mmapped, single-version
//! format) and the plain-text key/value facts file.

pub mod keys;
pub mod snapshot;

pub use keys::{load_keys, save_keys, KeysError};
pub use snapshot::{read_snapshot, write_snapshot, LoadStats, SnapshotError};
