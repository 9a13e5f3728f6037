// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup and shutdown.

use std::sync::Arc;
use std::time::Duration;

use bolo_config::{socket_addr, Config, ConfigError};
use bolo_core::Clock;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

use crate::controller::Controller;
use crate::kernel::{Kernel, KernelConfig, KernelHandle};
use crate::listener::Listener;
use crate::publisher::Publisher;
use crate::scheduler::Scheduler;

/// Lifecycle errors.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind {0}: {1}")]
    BindFailed(String, std::io::Error),
}

/// Everything startup produces: the kernel (to run on the main task),
/// its handle, and the socket/tick actors to spawn.
pub struct StartupResult {
    pub kernel: Kernel,
    pub handle: KernelHandle,
    pub(crate) listener: Listener,
    pub(crate) controller: Controller,
    pub(crate) publisher: Publisher,
    pub(crate) scheduler: Scheduler,
}

impl StartupResult {
    /// Spawn the socket and scheduler actors.
    pub fn spawn_actors(self) -> (Kernel, KernelHandle) {
        tokio::spawn(self.listener.run());
        tokio::spawn(self.controller.run());
        tokio::spawn(self.publisher.run());
        tokio::spawn(self.scheduler.run());
        (self.kernel, self.handle)
    }
}

/// Build the store from configuration, restore persisted state, bind
/// the three external sockets, and assemble the actors.
pub async fn startup(
    config: &Config,
    clock: Arc<dyn Clock>,
) -> Result<StartupResult, LifecycleError> {
    let now = clock.now();
    let store = config.build_store(now)?;

    let kernel_config = KernelConfig {
        savefile: config.savefile.clone(),
        keysfile: config.keysfile.clone(),
        snapshot_size_mib: config.snapshot_size_mib,
        freshness_interval: config.freshness,
        savestate_interval: config.savestate,
        grace_period: config.grace_period,
    };

    let (mut kernel, handle) = Kernel::new(store, Default::default(), clock, kernel_config);
    kernel.load_state();

    let listener_sock = bind(&config.listener).await?;
    let controller_sock = bind(&config.controller).await?;
    let broadcast_sock = bind(&config.broadcast).await?;

    info!(
        listener = %config.listener,
        controller = %config.controller,
        broadcast = %config.broadcast,
        "daemon sockets bound"
    );

    let listener = Listener::new(
        listener_sock,
        handle.submissions.clone(),
        handle.shutdown.subscribe(),
    );
    let controller = Controller::new(
        controller_sock,
        handle.requests.clone(),
        handle.shutdown.subscribe(),
    );
    let publisher = Publisher::new(
        broadcast_sock,
        handle.broadcasts.clone(),
        handle.shutdown.subscribe(),
    );
    let scheduler = Scheduler::new(
        Duration::from_millis(config.tick_ms.max(1)),
        handle.ticks.clone(),
        handle.shutdown.subscribe(),
    );

    Ok(StartupResult {
        kernel,
        handle,
        listener,
        controller,
        publisher,
        scheduler,
    })
}

async fn bind(endpoint: &str) -> Result<TcpListener, LifecycleError> {
    let addr = socket_addr(endpoint)?;
    TcpListener::bind(&addr)
        .await
        .map_err(|e| LifecycleError::BindFailed(endpoint.to_string(), e))
}
