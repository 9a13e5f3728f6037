// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stdin stream mode: one submission per line, type keyword first.
//!
//! Line shapes (timestamps are explicit in stream mode):
//!
//! ```text
//! STATE   <ts> <name> <code> <message...>
//! COUNTER <ts> <name> [increment]
//! SAMPLE  <ts> <name> <value>...
//! RATE    <ts> <name> <value>
//! EVENT   <ts> <name> [extra...]
//! KEY     <key>[=<value>]...
//! ```

use anyhow::Result;
use bolo_daemon::protocol::Submission;
use bolo_daemon::protocol_wire;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

/// Map a status word to its wire code: 0/ok(ay), 1/warn(ing),
/// 2/crit(ical); anything else is unknown.
pub fn status_code(word: &str) -> u8 {
    match word.to_ascii_lowercase().as_str() {
        "0" | "ok" | "okay" => 0,
        "1" | "warn" | "warning" => 1,
        "2" | "crit" | "critical" => 2,
        _ => 3,
    }
}

/// Split `key=value` (a bare key means "1", matching the agent
/// convention for flag facts).
pub fn split_pair(pair: &str) -> (String, String) {
    match pair.split_once('=') {
        Some((key, value)) => (key.to_string(), value.to_string()),
        None => (pair.to_string(), "1".to_string()),
    }
}

/// Parse one stream line. Blank lines and lines that do not parse
/// yield `None` and are skipped.
pub fn parse_line(line: &str) -> Option<Submission> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let (&keyword, rest) = words.split_first()?;

    let ts = |rest: &[&str]| rest.first().and_then(|s| s.parse::<i64>().ok());

    match keyword.to_ascii_uppercase().as_str() {
        "STATE" => {
            let ts = ts(rest)?;
            let name = rest.get(1)?;
            let code = rest.get(2)?;
            let message = rest.get(3..)?;
            if message.is_empty() {
                return None;
            }
            Some(Submission::State {
                ts,
                name: name.to_string(),
                code: status_code(code),
                summary: message.join(" "),
            })
        }
        "COUNTER" => {
            let ts = ts(rest)?;
            let name = rest.get(1)?;
            let delta = match rest.get(2) {
                Some(word) => word.parse().ok()?,
                None => 1,
            };
            Some(Submission::Counter {
                ts,
                name: name.to_string(),
                delta,
            })
        }
        "SAMPLE" => {
            let ts = ts(rest)?;
            let name = rest.get(1)?;
            let values: Option<Vec<f64>> =
                rest.get(2..)?.iter().map(|w| w.parse().ok()).collect();
            let values = values?;
            if values.is_empty() {
                return None;
            }
            Some(Submission::Sample {
                ts,
                name: name.to_string(),
                values,
            })
        }
        "RATE" => {
            let ts = ts(rest)?;
            let name = rest.get(1)?;
            let value = rest.get(2)?.parse().ok()?;
            Some(Submission::Rate {
                ts,
                name: name.to_string(),
                value,
            })
        }
        "EVENT" => {
            let ts = ts(rest)?;
            let name = rest.get(1)?;
            let extra = rest.get(2..).unwrap_or(&[]).join(" ");
            Some(Submission::Event {
                ts,
                name: name.to_string(),
                extra,
            })
        }
        "KEY" => {
            if rest.is_empty() {
                return None;
            }
            Some(Submission::SetKeys {
                pairs: rest.iter().map(|p| split_pair(p)).collect(),
            })
        }
        _ => None,
    }
}

/// Read stdin line by line, submitting each parsed line.
pub async fn run(endpoint: &str) -> Result<()> {
    let address = endpoint.strip_prefix("tcp://").unwrap_or(endpoint);
    let mut stream = TcpStream::connect(address).await?;

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        let Some(submission) = parse_line(&line) else {
            if !line.trim().is_empty() {
                eprintln!("skipping unparseable line: {line}");
            }
            continue;
        };
        protocol_wire::write_pdu(&mut stream, &submission.to_pdu()).await?;
    }

    Ok(())
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
