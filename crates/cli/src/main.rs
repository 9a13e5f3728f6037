// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! bolo - producer and inspector CLI for the bolo aggregator

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod stream;

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Result};
use bolo_daemon::protocol::{Reply, Request, Submission};
use clap::{Parser, Subcommand};

const DEFAULT_SUBMIT_ENDPOINT: &str = "tcp://127.0.0.1:2999";
const DEFAULT_QUERY_ENDPOINT: &str = "tcp://127.0.0.1:2998";
const DEFAULT_LISTEN_ENDPOINT: &str = "tcp://127.0.0.1:2997";

#[derive(Parser)]
#[command(
    name = "bolo",
    version,
    about = "Bolo - submit observations to and inspect a bolo aggregator"
)]
struct Cli {
    /// Aggregator endpoint (default depends on the command)
    #[arg(short = 'e', long = "endpoint", global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit one observation
    Send {
        #[command(subcommand)]
        what: SendCommands,
    },
    /// Read submissions from stdin, one per line, type keyword first
    Stream,
    /// Look up one state
    Stat { name: String },
    /// Dump all states as YAML
    Dump,
    /// Fetch values for keys
    GetKeys {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Delete keys
    DelKeys {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// List keys matching a pattern
    SearchKeys { pattern: String },
    /// Dump buffered events at or after a timestamp
    GetEvents {
        #[arg(default_value_t = 0)]
        since: i64,
    },
    /// Force a snapshot and keys-file flush
    Savestate,
    /// Print broadcasts as they arrive
    Listen,
}

#[derive(Subcommand)]
enum SendCommands {
    /// Update a state: NAME CODE MESSAGE...
    State {
        name: String,
        /// 0/ok, 1/warn(ing), 2/crit(ical); anything else is unknown
        code: String,
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// Increment a counter
    Counter {
        name: String,
        #[arg(default_value_t = 1)]
        increment: i64,
    },
    /// Add values to a sample set
    Sample {
        name: String,
        #[arg(required = true)]
        values: Vec<f64>,
    },
    /// Record a rate reading
    Rate { name: String, value: u64 },
    /// Record an event
    Event {
        name: String,
        extra: Vec<String>,
    },
    /// Set key/value facts: KEY=VALUE...
    Key {
        #[arg(required = true)]
        pairs: Vec<String>,
    },
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let endpoint = cli.endpoint.as_deref();

    match cli.command {
        Commands::Send { what } => {
            let submission = build_submission(what);
            let endpoint = endpoint.unwrap_or(DEFAULT_SUBMIT_ENDPOINT);
            client::submit(endpoint, vec![submission]).await
        }

        Commands::Stream => {
            let endpoint = endpoint.unwrap_or(DEFAULT_SUBMIT_ENDPOINT);
            stream::run(endpoint).await
        }

        Commands::Stat { name } => {
            let reply = query(endpoint, Request::State { name }).await?;
            let Reply::State {
                name,
                last_seen,
                stale,
                status,
                summary,
            } = reply
            else {
                bail!("unexpected reply");
            };
            let freshness = if stale { "stale" } else { "fresh" };
            println!("{name} {last_seen} {freshness} {status} {summary}");
            Ok(())
        }

        Commands::Dump => {
            let Reply::Dump { yaml } = query(endpoint, Request::Dump).await? else {
                bail!("unexpected reply");
            };
            print!("{yaml}");
            Ok(())
        }

        Commands::GetKeys { keys } => {
            let Reply::Values { pairs } = query(endpoint, Request::GetKeys { keys }).await? else {
                bail!("unexpected reply");
            };
            for (key, value) in pairs {
                println!("{key} = {value}");
            }
            Ok(())
        }

        Commands::DelKeys { keys } => {
            query(endpoint, Request::DelKeys { keys }).await?;
            Ok(())
        }

        Commands::SearchKeys { pattern } => {
            let Reply::Keys { keys } = query(endpoint, Request::SearchKeys { pattern }).await?
            else {
                bail!("unexpected reply");
            };
            for key in keys {
                println!("{key}");
            }
            Ok(())
        }

        Commands::GetEvents { since } => {
            let Reply::Events { yaml } = query(endpoint, Request::GetEvents { since }).await?
            else {
                bail!("unexpected reply");
            };
            print!("{yaml}");
            Ok(())
        }

        Commands::Savestate => {
            query(endpoint, Request::SaveState).await?;
            Ok(())
        }

        Commands::Listen => {
            let endpoint = endpoint.unwrap_or(DEFAULT_LISTEN_ENDPOINT);
            client::listen(endpoint).await
        }
    }
}

async fn query(endpoint: Option<&str>, request: Request) -> Result<Reply> {
    let endpoint = endpoint.unwrap_or(DEFAULT_QUERY_ENDPOINT);
    match client::request(endpoint, request).await? {
        Reply::Error { message } => bail!("error: {message}"),
        reply => Ok(reply),
    }
}

fn build_submission(what: SendCommands) -> Submission {
    match what {
        SendCommands::State {
            name,
            code,
            message,
        } => Submission::State {
            ts: now(),
            name,
            code: stream::status_code(&code),
            summary: message.join(" "),
        },
        SendCommands::Counter { name, increment } => Submission::Counter {
            ts: now(),
            name,
            delta: increment,
        },
        SendCommands::Sample { name, values } => Submission::Sample {
            ts: now(),
            name,
            values,
        },
        SendCommands::Rate { name, value } => Submission::Rate {
            ts: now(),
            name,
            value,
        },
        SendCommands::Event { name, extra } => Submission::Event {
            ts: now(),
            name,
            extra: extra.join(" "),
        },
        SendCommands::Key { pairs } => Submission::SetKeys {
            pairs: pairs.iter().map(|p| stream::split_pair(p)).collect(),
        },
    }
}
