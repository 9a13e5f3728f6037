// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The v1 binary snapshot format.
//!
//! ```text
//! Header  : "BOLO" | version u16-BE | flags u16-BE | timestamp u32-BE | count u32-BE
//! Record* : len u16-BE | kind-flags u16-BE | fixed body | NUL-terminated strings
//! Trailer : two NUL bytes
//! ```
//!
//! All integers are big-endian; doubles are the IEEE-754 bit pattern,
//! big-endian. The writer maps a fixed-size region and appends; the
//! trailer terminates reads. Records whose name is not covered by the
//! current configuration are logged and skipped on load, never
//! materialized.

use std::fs::OpenOptions;
use std::path::Path;

use bolo_core::{Event, Status, Store};
use memmap2::{Mmap, MmapMut};
use thiserror::Error;
use tracing::{debug, info, warn};

const MAGIC: &[u8; 4] = b"BOLO";
const VERSION: u16 = 1;
const KIND_MASK: u16 = 0x000f;

const KIND_STATE: u16 = 0x1;
const KIND_COUNTER: u16 = 0x2;
const KIND_SAMPLE: u16 = 0x3;
const KIND_EVENT: u16 = 0x4;
const KIND_RATE: u16 = 0x5;

/// Errors from snapshot I/O and decoding.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a bolo snapshot (bad magic)")]
    BadMagic,

    #[error("snapshot is a v{0} file; only v1 is supported")]
    UnsupportedVersion(u16),

    #[error("snapshot truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("snapshot trailer missing")]
    MissingTrailer,

    #[error("unknown record kind {kind:#x}")]
    UnknownRecord { kind: u16 },

    #[error("malformed string data at offset {offset}")]
    BadString { offset: usize },

    #[error("record for '{name}' does not fit the {size_mib} MiB snapshot region")]
    RegionFull { name: String, size_mib: usize },

    #[error("record for '{name}' exceeds the record size limit")]
    RecordTooLong { name: String },
}

/// Outcome of a snapshot load.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoadStats {
    /// Records merged into the store.
    pub loaded: usize,
    /// Records skipped because their name is not configured.
    pub skipped: usize,
}

// -- writing --------------------------------------------------------------

struct Cursor<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn put(&mut self, bytes: &[u8]) -> bool {
        if self.pos + bytes.len() > self.buf.len() {
            return false;
        }
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        true
    }
}

enum Body<'a> {
    State {
        last_seen: u32,
        status: u8,
        stale: bool,
        ignore: bool,
        name: &'a str,
        summary: &'a str,
    },
    Counter {
        last_seen: u32,
        value: u64,
        ignore: bool,
        name: &'a str,
    },
    Sample {
        last_seen: u32,
        n: u64,
        stats: [f64; 7],
        ignore: bool,
        name: &'a str,
    },
    Event {
        timestamp: u32,
        name: &'a str,
        extra: &'a str,
    },
    Rate {
        first_seen: u32,
        last_seen: u32,
        first: u64,
        last: u64,
        ignore: bool,
        name: &'a str,
    },
}

impl<'a> Body<'a> {
    fn kind(&self) -> u16 {
        match self {
            Body::State { .. } => KIND_STATE,
            Body::Counter { .. } => KIND_COUNTER,
            Body::Sample { .. } => KIND_SAMPLE,
            Body::Event { .. } => KIND_EVENT,
            Body::Rate { .. } => KIND_RATE,
        }
    }

    fn name(&self) -> &'a str {
        match self {
            Body::State { name, .. }
            | Body::Counter { name, .. }
            | Body::Sample { name, .. }
            | Body::Event { name, .. }
            | Body::Rate { name, .. } => name,
        }
    }

    fn encoded_len(&self) -> usize {
        let fixed = match self {
            Body::State { summary, .. } => 7 + self.name().len() + 1 + summary.len() + 1,
            Body::Counter { .. } => 13 + self.name().len() + 1,
            Body::Sample { .. } => 69 + self.name().len() + 1,
            Body::Event { extra, .. } => 4 + self.name().len() + 1 + extra.len() + 1,
            Body::Rate { .. } => 25 + self.name().len() + 1,
        };
        4 + fixed
    }

    fn write(&self, cur: &mut Cursor<'_>) -> bool {
        match self {
            Body::State {
                last_seen,
                status,
                stale,
                ignore,
                name,
                summary,
            } => {
                cur.put(&last_seen.to_be_bytes())
                    && cur.put(&[*status, u8::from(*stale), u8::from(*ignore)])
                    && cur.put(name.as_bytes())
                    && cur.put(&[0])
                    && cur.put(summary.as_bytes())
                    && cur.put(&[0])
            }
            Body::Counter {
                last_seen,
                value,
                ignore,
                name,
            } => {
                cur.put(&last_seen.to_be_bytes())
                    && cur.put(&value.to_be_bytes())
                    && cur.put(&[u8::from(*ignore)])
                    && cur.put(name.as_bytes())
                    && cur.put(&[0])
            }
            Body::Sample {
                last_seen,
                n,
                stats,
                ignore,
                name,
            } => {
                if !(cur.put(&last_seen.to_be_bytes()) && cur.put(&n.to_be_bytes())) {
                    return false;
                }
                for v in stats {
                    if !cur.put(&v.to_bits().to_be_bytes()) {
                        return false;
                    }
                }
                cur.put(&[u8::from(*ignore)]) && cur.put(name.as_bytes()) && cur.put(&[0])
            }
            Body::Event {
                timestamp,
                name,
                extra,
            } => {
                cur.put(&timestamp.to_be_bytes())
                    && cur.put(name.as_bytes())
                    && cur.put(&[0])
                    && cur.put(extra.as_bytes())
                    && cur.put(&[0])
            }
            Body::Rate {
                first_seen,
                last_seen,
                first,
                last,
                ignore,
                name,
            } => {
                cur.put(&first_seen.to_be_bytes())
                    && cur.put(&last_seen.to_be_bytes())
                    && cur.put(&first.to_be_bytes())
                    && cur.put(&last.to_be_bytes())
                    && cur.put(&[u8::from(*ignore)])
                    && cur.put(name.as_bytes())
                    && cur.put(&[0])
            }
        }
    }
}

fn write_record(
    cur: &mut Cursor<'_>,
    body: &Body<'_>,
    size_mib: usize,
) -> Result<(), SnapshotError> {
    let len = body.encoded_len();
    if len > u16::MAX as usize {
        return Err(SnapshotError::RecordTooLong {
            name: body.name().to_string(),
        });
    }

    let ok = cur.put(&(len as u16).to_be_bytes())
        && cur.put(&body.kind().to_be_bytes())
        && body.write(cur);
    if !ok {
        return Err(SnapshotError::RegionFull {
            name: body.name().to_string(),
            size_mib,
        });
    }
    Ok(())
}

/// Write the store's metric state to `path` as a v1 snapshot inside a
/// fixed mmapped region of `size_mib` MiB.
///
/// Records are written in sorted-name order per kind, so identical
/// stores produce byte-identical files apart from the header timestamp.
pub fn write_snapshot(
    store: &Store,
    path: &Path,
    size_mib: usize,
    timestamp: i64,
) -> Result<(), SnapshotError> {
    let size_mib = size_mib.max(1);
    let size = size_mib * 1024 * 1024;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.set_len(size as u64)?;

    let mut map = unsafe { MmapMut::map_mut(&file)? };
    let mut cur = Cursor {
        buf: &mut map[..],
        pos: 0,
    };

    let count = (store.states().count()
        + store.counters().count()
        + store.samples().count()
        + store.events.len()
        + store.rates().count()) as u32;

    let header_ok = cur.put(MAGIC)
        && cur.put(&VERSION.to_be_bytes())
        && cur.put(&0u16.to_be_bytes())
        && cur.put(&(timestamp as u32).to_be_bytes())
        && cur.put(&count.to_be_bytes());
    if !header_ok {
        return Err(SnapshotError::RegionFull {
            name: "<header>".to_string(),
            size_mib,
        });
    }

    let mut states: Vec<_> = store.states().collect();
    states.sort_by(|a, b| a.name.cmp(&b.name));
    for s in states {
        let body = Body::State {
            last_seen: s.last_seen as u32,
            status: s.status.code(),
            stale: s.stale,
            ignore: s.ignore,
            name: &s.name,
            summary: &s.summary,
        };
        write_record(&mut cur, &body, size_mib)?;
    }

    let mut counters: Vec<_> = store.counters().collect();
    counters.sort_by(|a, b| a.name.cmp(&b.name));
    for c in counters {
        let body = Body::Counter {
            last_seen: c.last_seen as u32,
            value: c.value,
            ignore: c.ignore,
            name: &c.name,
        };
        write_record(&mut cur, &body, size_mib)?;
    }

    let mut samples: Vec<_> = store.samples().collect();
    samples.sort_by(|a, b| a.name.cmp(&b.name));
    for s in samples {
        let body = Body::Sample {
            last_seen: s.last_seen as u32,
            n: s.n,
            stats: [s.min, s.max, s.sum, s.mean, s.mean_, s.var, s.var_],
            ignore: s.ignore,
            name: &s.name,
        };
        write_record(&mut cur, &body, size_mib)?;
    }

    for e in store.events.iter() {
        let body = Body::Event {
            timestamp: e.timestamp as u32,
            name: &e.name,
            extra: &e.extra,
        };
        write_record(&mut cur, &body, size_mib)?;
    }

    let mut rates: Vec<_> = store.rates().collect();
    rates.sort_by(|a, b| a.name.cmp(&b.name));
    for r in rates {
        let body = Body::Rate {
            first_seen: r.first_seen as u32,
            last_seen: r.last_seen as u32,
            first: r.first,
            last: r.last,
            ignore: r.ignore,
            name: &r.name,
        };
        write_record(&mut cur, &body, size_mib)?;
    }

    if !cur.put(&[0, 0]) {
        return Err(SnapshotError::RegionFull {
            name: "<trailer>".to_string(),
            size_mib,
        });
    }

    map.flush()?;
    info!(path = %path.display(), records = count, "saved state snapshot");
    Ok(())
}

// -- reading --------------------------------------------------------------

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], SnapshotError> {
        if self.pos + n > self.buf.len() {
            return Err(SnapshotError::Truncated { offset: self.pos });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_u8(&mut self) -> Result<u8, SnapshotError> {
        Ok(self.take(1)?[0])
    }

    fn take_u16(&mut self) -> Result<u16, SnapshotError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn take_u32(&mut self) -> Result<u32, SnapshotError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn take_u64(&mut self) -> Result<u64, SnapshotError> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_be_bytes(buf))
    }

    fn take_f64(&mut self) -> Result<f64, SnapshotError> {
        Ok(f64::from_bits(self.take_u64()?))
    }

    /// Take `want` bytes holding one NUL-terminated string.
    fn take_str(&mut self, want: usize) -> Result<String, SnapshotError> {
        let offset = self.pos;
        let raw = self.take(want)?;
        let Some((&0, bytes)) = raw.split_last() else {
            return Err(SnapshotError::BadString { offset });
        };
        String::from_utf8(bytes.to_vec()).map_err(|_| SnapshotError::BadString { offset })
    }

    /// Take `want` bytes holding two NUL-terminated strings.
    fn take_str2(&mut self, want: usize) -> Result<(String, String), SnapshotError> {
        let offset = self.pos;
        let raw = self.take(want)?;
        let Some(split) = raw.iter().position(|&b| b == 0) else {
            return Err(SnapshotError::BadString { offset });
        };
        if split + 1 >= raw.len() {
            return Err(SnapshotError::BadString { offset });
        }
        let first = String::from_utf8(raw[..split].to_vec())
            .map_err(|_| SnapshotError::BadString { offset })?;
        let rest = &raw[split + 1..];
        let Some((&0, bytes)) = rest.split_last() else {
            return Err(SnapshotError::BadString { offset });
        };
        let second = String::from_utf8(bytes.to_vec())
            .map_err(|_| SnapshotError::BadString { offset })?;
        Ok((first, second))
    }
}

enum Record {
    State {
        last_seen: i64,
        status: Status,
        stale: bool,
        ignore: bool,
        name: String,
        summary: String,
    },
    Counter {
        last_seen: i64,
        value: u64,
        ignore: bool,
        name: String,
    },
    Sample {
        last_seen: i64,
        n: u64,
        stats: [f64; 7],
        ignore: bool,
        name: String,
    },
    Event(Event),
    Rate {
        first_seen: i64,
        last_seen: i64,
        first: u64,
        last: u64,
        ignore: bool,
        name: String,
    },
}

/// Bytes of string data in a record: total length minus the record
/// header and the kind's fixed body.
fn var_len(len: usize, fixed: usize, offset: usize) -> Result<usize, SnapshotError> {
    len.checked_sub(4 + fixed)
        .ok_or(SnapshotError::Truncated { offset })
}

fn read_record(rd: &mut Reader<'_>) -> Result<Record, SnapshotError> {
    let offset = rd.pos;
    let len = rd.take_u16()? as usize;
    let flags = rd.take_u16()?;

    match flags & KIND_MASK {
        KIND_STATE => {
            let last_seen = rd.take_u32()? as i64;
            let status = Status::from_code(rd.take_u8()?);
            let stale = rd.take_u8()? != 0;
            let ignore = rd.take_u8()? != 0;
            let (name, summary) = rd.take_str2(var_len(len, 7, offset)?)?;
            Ok(Record::State {
                last_seen,
                status,
                stale,
                ignore,
                name,
                summary,
            })
        }
        KIND_COUNTER => {
            let last_seen = rd.take_u32()? as i64;
            let value = rd.take_u64()?;
            let ignore = rd.take_u8()? != 0;
            let name = rd.take_str(var_len(len, 13, offset)?)?;
            Ok(Record::Counter {
                last_seen,
                value,
                ignore,
                name,
            })
        }
        KIND_SAMPLE => {
            let last_seen = rd.take_u32()? as i64;
            let n = rd.take_u64()?;
            let mut stats = [0.0; 7];
            for v in &mut stats {
                *v = rd.take_f64()?;
            }
            let ignore = rd.take_u8()? != 0;
            let name = rd.take_str(var_len(len, 69, offset)?)?;
            Ok(Record::Sample {
                last_seen,
                n,
                stats,
                ignore,
                name,
            })
        }
        KIND_EVENT => {
            let timestamp = rd.take_u32()? as i64;
            let (name, extra) = rd.take_str2(var_len(len, 4, offset)?)?;
            Ok(Record::Event(Event {
                timestamp,
                name,
                extra,
            }))
        }
        KIND_RATE => {
            let first_seen = rd.take_u32()? as i64;
            let last_seen = rd.take_u32()? as i64;
            let first = rd.take_u64()?;
            let last = rd.take_u64()?;
            let ignore = rd.take_u8()? != 0;
            let name = rd.take_str(var_len(len, 25, offset)?)?;
            Ok(Record::Rate {
                first_seen,
                last_seen,
                first,
                last,
                ignore,
                name,
            })
        }
        kind => Err(SnapshotError::UnknownRecord { kind }),
    }
}

/// Read a v1 snapshot and merge it into `store`.
///
/// Parsing is two-phase: every record is decoded (and the trailer
/// verified) before anything is merged, so a corrupt file materializes
/// nothing. Records for unconfigured names are skipped with a log line.
/// `now` anchors the expiry of any states a match rule materializes.
pub fn read_snapshot(store: &mut Store, path: &Path, now: i64) -> Result<LoadStats, SnapshotError> {
    let file = OpenOptions::new().read(true).open(path)?;

    let map = unsafe { Mmap::map(&file)? };
    let mut rd = Reader {
        buf: &map[..],
        pos: 0,
    };

    if rd.take(4)? != MAGIC {
        return Err(SnapshotError::BadMagic);
    }
    let version = rd.take_u16()?;
    if version != VERSION {
        return Err(SnapshotError::UnsupportedVersion(version));
    }
    let _flags = rd.take_u16()?;
    let timestamp = rd.take_u32()?;
    let count = rd.take_u32()?;

    info!(
        path = %path.display(),
        version,
        timestamp,
        records = count,
        "reading state snapshot"
    );

    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        records.push(read_record(&mut rd)?);
    }
    if rd.take(2)? != [0, 0] {
        return Err(SnapshotError::MissingTrailer);
    }

    let mut stats = LoadStats::default();
    for record in records {
        let merged = merge_record(store, record, now);
        if merged {
            stats.loaded += 1;
        } else {
            stats.skipped += 1;
        }
    }

    debug!(loaded = stats.loaded, skipped = stats.skipped, "snapshot merged");
    Ok(stats)
}

fn merge_record(store: &mut Store, record: Record, now: i64) -> bool {
    match record {
        Record::State {
            last_seen,
            status,
            stale,
            ignore,
            name,
            summary,
        } => match store.find_state(&name, now) {
            Some(state) => {
                state.summary = summary;
                state.last_seen = last_seen;
                state.status = status;
                state.stale = stale;
                state.ignore = ignore;
                true
            }
            None => {
                warn!(%name, "state not found in configuration, skipping");
                false
            }
        },
        Record::Counter {
            last_seen,
            value,
            ignore,
            name,
        } => match store.find_counter(&name) {
            Some(counter) => {
                counter.last_seen = last_seen;
                counter.value = value;
                counter.ignore = ignore;
                true
            }
            None => {
                warn!(%name, "counter not found in configuration, skipping");
                false
            }
        },
        Record::Sample {
            last_seen,
            n,
            stats,
            ignore,
            name,
        } => match store.find_sample(&name) {
            Some(sample) => {
                sample.last_seen = last_seen;
                sample.n = n;
                sample.min = stats[0];
                sample.max = stats[1];
                sample.sum = stats[2];
                sample.mean = stats[3];
                sample.mean_ = stats[4];
                sample.var = stats[5];
                sample.var_ = stats[6];
                sample.ignore = ignore;
                true
            }
            None => {
                warn!(%name, "sample not found in configuration, skipping");
                false
            }
        },
        Record::Event(event) => {
            store.events.push(event);
            true
        }
        Record::Rate {
            first_seen,
            last_seen,
            first,
            last,
            ignore,
            name,
        } => match store.find_rate(&name) {
            Some(rate) => {
                rate.first_seen = first_seen;
                rate.last_seen = last_seen;
                rate.first = first;
                rate.last = last;
                rate.ignore = ignore;
                true
            }
            None => {
                warn!(%name, "rate not found in configuration, skipping");
                false
            }
        },
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
