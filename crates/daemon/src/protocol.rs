// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The PDU surface of the aggregator.
//!
//! A PDU is a sequence of UTF-8 frames; the first frame is the type
//! tag. The closed set of types is modeled as three enums: submissions
//! (ingestion endpoint, fire-and-forget), requests/replies (management
//! endpoint), and broadcasts (derived observations fanned out to
//! subscribers).

use bolo_core::{Counter, Event, Rate, Sample, State};
use thiserror::Error;

/// Protocol errors.
///
/// `Malformed` carries the short human message that goes back to the
/// peer in an ERROR reply.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("{0}")]
    Malformed(String),
}

/// A framed protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    frames: Vec<String>,
}

impl Pdu {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            frames: vec![tag.into()],
        }
    }

    pub fn from_frames(frames: Vec<String>) -> Self {
        Self { frames }
    }

    /// The type tag (first frame); empty for an empty PDU.
    pub fn tag(&self) -> &str {
        self.frames.first().map(String::as_str).unwrap_or("")
    }

    pub fn push(&mut self, frame: impl Into<String>) {
        self.frames.push(frame.into());
    }

    pub fn frame(&self, index: usize) -> Option<&str> {
        self.frames.get(index).map(String::as_str)
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// An ERROR PDU carrying a short human message.
pub fn error_pdu(message: &str) -> Pdu {
    let mut pdu = Pdu::new("ERROR");
    pdu.push(message);
    pdu
}

// -- frame helpers --------------------------------------------------------

fn check_frames(pdu: &Pdu, min: usize, max: Option<usize>) -> Result<(), ProtocolError> {
    let n = pdu.len();
    if n < min || max.is_some_and(|m| n > m) {
        return Err(ProtocolError::Malformed(format!(
            "malformed [{}] PDU (wrong frame count)",
            pdu.tag()
        )));
    }
    Ok(())
}

fn required(pdu: &Pdu, index: usize, what: &str) -> Result<String, ProtocolError> {
    match pdu.frame(index) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(ProtocolError::Malformed(format!(
            "malformed [{}] PDU (no {what})",
            pdu.tag()
        ))),
    }
}

fn number<T: std::str::FromStr>(
    pdu: &Pdu,
    index: usize,
    what: &str,
) -> Result<T, ProtocolError> {
    pdu.frame(index)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            ProtocolError::Malformed(format!("malformed [{}] PDU (bad {what})", pdu.tag()))
        })
}

fn fmt_float(v: f64) -> String {
    format!("{v:e}")
}

// -- submissions ----------------------------------------------------------

/// Fire-and-forget producer submissions accepted on the ingestion
/// endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    State {
        ts: i64,
        name: String,
        code: u8,
        summary: String,
    },
    Counter {
        ts: i64,
        name: String,
        delta: i64,
    },
    Sample {
        ts: i64,
        name: String,
        values: Vec<f64>,
    },
    Rate {
        ts: i64,
        name: String,
        value: u64,
    },
    Event {
        ts: i64,
        name: String,
        extra: String,
    },
    SetKeys {
        pairs: Vec<(String, String)>,
    },
}

impl Submission {
    pub fn parse(pdu: &Pdu) -> Result<Self, ProtocolError> {
        match pdu.tag() {
            "STATE" => {
                check_frames(pdu, 5, Some(5))?;
                Ok(Submission::State {
                    ts: number(pdu, 1, "timestamp")?,
                    name: required(pdu, 2, "name")?,
                    code: number(pdu, 3, "status code")?,
                    summary: required(pdu, 4, "message")?,
                })
            }
            "COUNTER" => {
                check_frames(pdu, 4, Some(4))?;
                Ok(Submission::Counter {
                    ts: number(pdu, 1, "timestamp")?,
                    name: required(pdu, 2, "name")?,
                    delta: number(pdu, 3, "increment")?,
                })
            }
            "SAMPLE" => {
                check_frames(pdu, 4, None)?;
                let ts = number(pdu, 1, "timestamp")?;
                let name = required(pdu, 2, "name")?;
                let mut values = Vec::with_capacity(pdu.len() - 3);
                for i in 3..pdu.len() {
                    values.push(number(pdu, i, "value")?);
                }
                Ok(Submission::Sample { ts, name, values })
            }
            "RATE" => {
                check_frames(pdu, 4, Some(4))?;
                Ok(Submission::Rate {
                    ts: number(pdu, 1, "timestamp")?,
                    name: required(pdu, 2, "name")?,
                    value: number(pdu, 3, "value")?,
                })
            }
            "EVENT" => {
                check_frames(pdu, 4, Some(4))?;
                Ok(Submission::Event {
                    ts: number(pdu, 1, "timestamp")?,
                    name: required(pdu, 2, "name")?,
                    extra: pdu.frame(3).unwrap_or("").to_string(),
                })
            }
            "SET.KEYS" => {
                check_frames(pdu, 3, None)?;
                if (pdu.len() - 1) % 2 != 0 {
                    return Err(ProtocolError::Malformed(
                        "malformed [SET.KEYS] PDU (odd key/value frames)".to_string(),
                    ));
                }
                let mut pairs = Vec::with_capacity((pdu.len() - 1) / 2);
                for i in (1..pdu.len()).step_by(2) {
                    pairs.push((
                        required(pdu, i, "key")?,
                        pdu.frame(i + 1).unwrap_or("").to_string(),
                    ));
                }
                Ok(Submission::SetKeys { pairs })
            }
            tag => Err(ProtocolError::Malformed(format!("unknown [{tag}] PDU"))),
        }
    }

    pub fn to_pdu(&self) -> Pdu {
        match self {
            Submission::State {
                ts,
                name,
                code,
                summary,
            } => {
                let mut pdu = Pdu::new("STATE");
                pdu.push(ts.to_string());
                pdu.push(name.clone());
                pdu.push(code.to_string());
                pdu.push(summary.clone());
                pdu
            }
            Submission::Counter { ts, name, delta } => {
                let mut pdu = Pdu::new("COUNTER");
                pdu.push(ts.to_string());
                pdu.push(name.clone());
                pdu.push(delta.to_string());
                pdu
            }
            Submission::Sample { ts, name, values } => {
                let mut pdu = Pdu::new("SAMPLE");
                pdu.push(ts.to_string());
                pdu.push(name.clone());
                for v in values {
                    pdu.push(v.to_string());
                }
                pdu
            }
            Submission::Rate { ts, name, value } => {
                let mut pdu = Pdu::new("RATE");
                pdu.push(ts.to_string());
                pdu.push(name.clone());
                pdu.push(value.to_string());
                pdu
            }
            Submission::Event { ts, name, extra } => {
                let mut pdu = Pdu::new("EVENT");
                pdu.push(ts.to_string());
                pdu.push(name.clone());
                pdu.push(extra.clone());
                pdu
            }
            Submission::SetKeys { pairs } => {
                let mut pdu = Pdu::new("SET.KEYS");
                for (k, v) in pairs {
                    pdu.push(k.clone());
                    pdu.push(v.clone());
                }
                pdu
            }
        }
    }
}

// -- management requests and replies --------------------------------------

/// Management requests accepted on the controller endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    State { name: String },
    Dump,
    GetKeys { keys: Vec<String> },
    DelKeys { keys: Vec<String> },
    SearchKeys { pattern: String },
    GetEvents { since: i64 },
    SaveState,
}

impl Request {
    pub fn parse(pdu: &Pdu) -> Result<Self, ProtocolError> {
        match pdu.tag() {
            "STATE" => {
                check_frames(pdu, 2, Some(2))?;
                Ok(Request::State {
                    name: required(pdu, 1, "name")?,
                })
            }
            "DUMP" => {
                check_frames(pdu, 1, Some(1))?;
                Ok(Request::Dump)
            }
            "GET.KEYS" => {
                check_frames(pdu, 2, None)?;
                Ok(Request::GetKeys {
                    keys: pdu.frames()[1..].to_vec(),
                })
            }
            "DEL.KEYS" => {
                check_frames(pdu, 2, None)?;
                Ok(Request::DelKeys {
                    keys: pdu.frames()[1..].to_vec(),
                })
            }
            "SEARCH.KEYS" => {
                check_frames(pdu, 2, Some(2))?;
                Ok(Request::SearchKeys {
                    pattern: required(pdu, 1, "pattern")?,
                })
            }
            "GET.EVENTS" => {
                check_frames(pdu, 2, Some(2))?;
                Ok(Request::GetEvents {
                    since: number(pdu, 1, "timestamp")?,
                })
            }
            "SAVESTATE" => {
                check_frames(pdu, 1, Some(1))?;
                Ok(Request::SaveState)
            }
            tag => Err(ProtocolError::Malformed(format!("unknown [{tag}] PDU"))),
        }
    }

    pub fn to_pdu(&self) -> Pdu {
        match self {
            Request::State { name } => {
                let mut pdu = Pdu::new("STATE");
                pdu.push(name.clone());
                pdu
            }
            Request::Dump => Pdu::new("DUMP"),
            Request::GetKeys { keys } => {
                let mut pdu = Pdu::new("GET.KEYS");
                for k in keys {
                    pdu.push(k.clone());
                }
                pdu
            }
            Request::DelKeys { keys } => {
                let mut pdu = Pdu::new("DEL.KEYS");
                for k in keys {
                    pdu.push(k.clone());
                }
                pdu
            }
            Request::SearchKeys { pattern } => {
                let mut pdu = Pdu::new("SEARCH.KEYS");
                pdu.push(pattern.clone());
                pdu
            }
            Request::GetEvents { since } => {
                let mut pdu = Pdu::new("GET.EVENTS");
                pdu.push(since.to_string());
                pdu
            }
            Request::SaveState => Pdu::new("SAVESTATE"),
        }
    }
}

/// Management replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    State {
        name: String,
        last_seen: i64,
        stale: bool,
        status: String,
        summary: String,
    },
    Dump {
        yaml: String,
    },
    Values {
        pairs: Vec<(String, String)>,
    },
    Keys {
        keys: Vec<String>,
    },
    Events {
        yaml: String,
    },
    Ok,
    Error {
        message: String,
    },
}

impl Reply {
    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error {
            message: message.into(),
        }
    }

    pub fn to_pdu(&self) -> Pdu {
        match self {
            Reply::State {
                name,
                last_seen,
                stale,
                status,
                summary,
            } => {
                let mut pdu = Pdu::new("STATE");
                pdu.push(name.clone());
                pdu.push(last_seen.to_string());
                pdu.push(if *stale { "stale" } else { "fresh" });
                pdu.push(status.clone());
                pdu.push(summary.clone());
                pdu
            }
            Reply::Dump { yaml } => {
                let mut pdu = Pdu::new("DUMP");
                pdu.push(yaml.clone());
                pdu
            }
            Reply::Values { pairs } => {
                let mut pdu = Pdu::new("VALUES");
                for (k, v) in pairs {
                    pdu.push(k.clone());
                    pdu.push(v.clone());
                }
                pdu
            }
            Reply::Keys { keys } => {
                let mut pdu = Pdu::new("KEYS");
                for k in keys {
                    pdu.push(k.clone());
                }
                pdu
            }
            Reply::Events { yaml } => {
                let mut pdu = Pdu::new("EVENTS");
                pdu.push(yaml.clone());
                pdu
            }
            Reply::Ok => Pdu::new("OK"),
            Reply::Error { message } => error_pdu(message),
        }
    }

    pub fn parse(pdu: &Pdu) -> Result<Self, ProtocolError> {
        match pdu.tag() {
            "STATE" => {
                check_frames(pdu, 6, Some(6))?;
                Ok(Reply::State {
                    name: required(pdu, 1, "name")?,
                    last_seen: number(pdu, 2, "timestamp")?,
                    stale: pdu.frame(3) == Some("stale"),
                    status: pdu.frame(4).unwrap_or("").to_string(),
                    summary: pdu.frame(5).unwrap_or("").to_string(),
                })
            }
            "DUMP" => {
                check_frames(pdu, 2, Some(2))?;
                Ok(Reply::Dump {
                    yaml: pdu.frame(1).unwrap_or("").to_string(),
                })
            }
            "VALUES" => {
                if (pdu.len() - 1) % 2 != 0 {
                    return Err(ProtocolError::Malformed(
                        "malformed [VALUES] PDU (odd key/value frames)".to_string(),
                    ));
                }
                let mut pairs = Vec::new();
                for i in (1..pdu.len()).step_by(2) {
                    pairs.push((
                        pdu.frame(i).unwrap_or("").to_string(),
                        pdu.frame(i + 1).unwrap_or("").to_string(),
                    ));
                }
                Ok(Reply::Values { pairs })
            }
            "KEYS" => Ok(Reply::Keys {
                keys: pdu.frames()[1..].to_vec(),
            }),
            "EVENTS" => {
                check_frames(pdu, 2, Some(2))?;
                Ok(Reply::Events {
                    yaml: pdu.frame(1).unwrap_or("").to_string(),
                })
            }
            "OK" => Ok(Reply::Ok),
            "ERROR" => Ok(Reply::Error {
                message: pdu.frame(1).unwrap_or("").to_string(),
            }),
            tag => Err(ProtocolError::Malformed(format!("unknown [{tag}] reply"))),
        }
    }
}

// -- broadcasts -----------------------------------------------------------

/// Derived observations published to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum Broadcast {
    State {
        name: String,
        ts: i64,
        stale: bool,
        status: String,
        summary: String,
    },
    Transition {
        name: String,
        ts: i64,
        stale: bool,
        status: String,
        summary: String,
    },
    Counter {
        window_start: i64,
        name: String,
        value: u64,
    },
    Sample {
        window_start: i64,
        name: String,
        n: u64,
        min: f64,
        max: f64,
        sum: f64,
        mean: f64,
        var: f64,
    },
    Rate {
        window_start: i64,
        name: String,
        window_seconds: i64,
        value: f64,
    },
    Event {
        ts: i64,
        name: String,
        extra: String,
    },
}

impl Broadcast {
    pub fn state(state: &State) -> Self {
        Broadcast::State {
            name: state.name.clone(),
            ts: state.last_seen,
            stale: state.stale,
            status: state.status.wire_name().to_string(),
            summary: state.summary.clone(),
        }
    }

    pub fn transition(state: &State) -> Self {
        Broadcast::Transition {
            name: state.name.clone(),
            ts: state.last_seen,
            stale: state.stale,
            status: state.status.wire_name().to_string(),
            summary: state.summary.clone(),
        }
    }

    pub fn counter(counter: &Counter) -> Self {
        Broadcast::Counter {
            window_start: counter.window_start(),
            name: counter.name.clone(),
            value: counter.value,
        }
    }

    pub fn sample(sample: &Sample) -> Self {
        Broadcast::Sample {
            window_start: sample.window_start(),
            name: sample.name.clone(),
            n: sample.n,
            min: sample.min,
            max: sample.max,
            sum: sample.sum,
            mean: sample.mean,
            var: sample.var,
        }
    }

    pub fn rate(rate: &Rate) -> Self {
        let span = rate.window.seconds();
        Broadcast::Rate {
            window_start: rate.window_start(),
            name: rate.name.clone(),
            window_seconds: span,
            value: rate.rate(span),
        }
    }

    pub fn event(event: &Event) -> Self {
        Broadcast::Event {
            ts: event.timestamp,
            name: event.name.clone(),
            extra: event.extra.clone(),
        }
    }

    pub fn to_pdu(&self) -> Pdu {
        match self {
            Broadcast::State {
                name,
                ts,
                stale,
                status,
                summary,
            }
            | Broadcast::Transition {
                name,
                ts,
                stale,
                status,
                summary,
            } => {
                let tag = if matches!(self, Broadcast::State { .. }) {
                    "STATE"
                } else {
                    "TRANSITION"
                };
                let mut pdu = Pdu::new(tag);
                pdu.push(name.clone());
                pdu.push(ts.to_string());
                pdu.push(if *stale { "stale" } else { "fresh" });
                pdu.push(status.clone());
                pdu.push(summary.clone());
                pdu
            }
            Broadcast::Counter {
                window_start,
                name,
                value,
            } => {
                let mut pdu = Pdu::new("COUNTER");
                pdu.push(window_start.to_string());
                pdu.push(name.clone());
                pdu.push(value.to_string());
                pdu
            }
            Broadcast::Sample {
                window_start,
                name,
                n,
                min,
                max,
                sum,
                mean,
                var,
            } => {
                let mut pdu = Pdu::new("SAMPLE");
                pdu.push(window_start.to_string());
                pdu.push(name.clone());
                pdu.push(n.to_string());
                pdu.push(fmt_float(*min));
                pdu.push(fmt_float(*max));
                pdu.push(fmt_float(*sum));
                pdu.push(fmt_float(*mean));
                pdu.push(fmt_float(*var));
                pdu
            }
            Broadcast::Rate {
                window_start,
                name,
                window_seconds,
                value,
            } => {
                let mut pdu = Pdu::new("RATE");
                pdu.push(window_start.to_string());
                pdu.push(name.clone());
                pdu.push(window_seconds.to_string());
                pdu.push(fmt_float(*value));
                pdu
            }
            Broadcast::Event { ts, name, extra } => {
                let mut pdu = Pdu::new("EVENT");
                pdu.push(ts.to_string());
                pdu.push(name.clone());
                pdu.push(extra.clone());
                pdu
            }
        }
    }

    pub fn parse(pdu: &Pdu) -> Result<Self, ProtocolError> {
        match pdu.tag() {
            "STATE" | "TRANSITION" => {
                check_frames(pdu, 6, Some(6))?;
                let name = required(pdu, 1, "name")?;
                let ts = number(pdu, 2, "timestamp")?;
                let stale = pdu.frame(3) == Some("stale");
                let status = pdu.frame(4).unwrap_or("").to_string();
                let summary = pdu.frame(5).unwrap_or("").to_string();
                if pdu.tag() == "STATE" {
                    Ok(Broadcast::State {
                        name,
                        ts,
                        stale,
                        status,
                        summary,
                    })
                } else {
                    Ok(Broadcast::Transition {
                        name,
                        ts,
                        stale,
                        status,
                        summary,
                    })
                }
            }
            "COUNTER" => {
                check_frames(pdu, 4, Some(4))?;
                Ok(Broadcast::Counter {
                    window_start: number(pdu, 1, "timestamp")?,
                    name: required(pdu, 2, "name")?,
                    value: number(pdu, 3, "value")?,
                })
            }
            "SAMPLE" => {
                check_frames(pdu, 9, Some(9))?;
                Ok(Broadcast::Sample {
                    window_start: number(pdu, 1, "timestamp")?,
                    name: required(pdu, 2, "name")?,
                    n: number(pdu, 3, "count")?,
                    min: number(pdu, 4, "min")?,
                    max: number(pdu, 5, "max")?,
                    sum: number(pdu, 6, "sum")?,
                    mean: number(pdu, 7, "mean")?,
                    var: number(pdu, 8, "variance")?,
                })
            }
            "RATE" => {
                check_frames(pdu, 5, Some(5))?;
                Ok(Broadcast::Rate {
                    window_start: number(pdu, 1, "timestamp")?,
                    name: required(pdu, 2, "name")?,
                    window_seconds: number(pdu, 3, "window")?,
                    value: number(pdu, 4, "rate")?,
                })
            }
            "EVENT" => {
                check_frames(pdu, 4, Some(4))?;
                Ok(Broadcast::Event {
                    ts: number(pdu, 1, "timestamp")?,
                    name: required(pdu, 2, "name")?,
                    extra: pdu.frame(3).unwrap_or("").to_string(),
                })
            }
            tag => Err(ProtocolError::Malformed(format!(
                "unknown [{tag}] broadcast"
            ))),
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
