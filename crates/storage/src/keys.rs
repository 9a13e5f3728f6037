// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The plain-text key/value facts file.
//!
//! One `key = value` binding per line, `#` comments ignored. The first
//! line is a `# generated <millis-since-epoch>` header and the last a
//! `# <n> keys` tally, both comments to the reader.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use thiserror::Error;
use tracing::info;

/// Errors from keys-file I/O.
#[derive(Debug, Error)]
pub enum KeysError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write the keys map to `path`, sorted by key.
pub fn save_keys(
    keys: &HashMap<String, String>,
    path: &Path,
    now_millis: i64,
) -> Result<(), KeysError> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);

    writeln!(out, "# generated {now_millis}")?;

    let mut sorted: Vec<_> = keys.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in &sorted {
        writeln!(out, "{key} = {value}")?;
    }

    writeln!(out, "# {} keys", sorted.len())?;
    out.flush()?;

    info!(path = %path.display(), keys = sorted.len(), "saved keys file");
    Ok(())
}

/// Read a keys file into a map.
///
/// Lines that do not parse as `key = value` (the `=` must be separated
/// from the key by whitespace) are skipped, as are comments and blanks.
pub fn load_keys(path: &Path) -> Result<HashMap<String, String>, KeysError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut keys = HashMap::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim_start();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, rest)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        let rest = rest.trim_start();
        let Some(value) = rest.strip_prefix('=') else {
            continue;
        };

        keys.insert(key.to_string(), value.trim_start().to_string());
    }

    Ok(keys)
}

#[cfg(test)]
#[path = "keys_tests.rs"]
mod tests;
