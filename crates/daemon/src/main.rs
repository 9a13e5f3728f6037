// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bolo aggregator daemon (bolod)
//!
//! Binds the ingestion, management, and broadcast sockets, restores
//! persisted state, and runs the kernel until SIGTERM/SIGINT.

use std::path::PathBuf;
use std::sync::Arc;

use bolo_config::Config;
use bolo_core::SystemClock;
use bolo_daemon::lifecycle;
use tracing::{error, info};

const DEFAULT_CONFIG_FILE: &str = "/etc/bolo.toml";

fn usage() {
    println!("bolod {}", env!("CARGO_PKG_VERSION"));
    println!("Bolo aggregator daemon - collects, aggregates, and broadcasts monitoring data");
    println!();
    println!("USAGE:");
    println!("    bolod [--config /etc/bolo.toml]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config PATH    Configuration file (default: {DEFAULT_CONFIG_FILE})");
    println!("    -h, --help           Print help information");
    println!("    -v, --version        Print version information");
}

fn parse_args() -> Result<PathBuf, String> {
    let mut config = PathBuf::from(DEFAULT_CONFIG_FILE);
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("bolod {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--help" | "-h" | "help" => {
                usage();
                std::process::exit(0);
            }
            "--config" | "-c" => {
                config = args
                    .next()
                    .map(PathBuf::from)
                    .ok_or_else(|| "missing argument to --config".to_string())?;
            }
            other => return Err(format!("unexpected argument '{other}'")),
        }
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match parse_args() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("Usage: bolod [--config PATH | --help | --version]");
            std::process::exit(1);
        }
    };

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("bolod: {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    // Keep the non-blocking writer's guard alive for the process lifetime.
    let _log_guard = setup_logging(&config)?;

    info!(config = %config_path.display(), "starting bolo aggregator");

    let startup = match lifecycle::startup(&config, Arc::new(SystemClock)).await {
        Ok(startup) => startup,
        Err(e) => {
            error!("failed to start daemon: {e}");
            eprintln!("bolod: {e}");
            std::process::exit(1);
        }
    };

    let (kernel, handle) = startup.spawn_actors();

    // Supervisor owns the termination signals.
    let shutdown = handle.shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = bolo_daemon::supervisor::run(shutdown).await {
            error!(error = %e, "failed to install signal handlers");
        }
    });

    info!("daemon ready");

    // The kernel runs on the main task and performs the final state
    // flush on its way out.
    kernel.run().await;

    info!("daemon stopped");
    Ok(())
}

fn setup_logging(
    config: &Config,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.logfile {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| format!("bad logfile path: {}", path.display()))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
            Ok(None)
        }
    }
}
