// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broadcast publisher: best-effort fan-out to subscribers.
//!
//! Every subscriber connection gets its own receiver on the kernel's
//! broadcast channel. A subscriber that falls more than the channel
//! depth behind loses the missed PDUs, not the connection.

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, warn};

use crate::protocol::Pdu;
use crate::protocol_wire;

pub(crate) struct Publisher {
    socket: TcpListener,
    broadcasts: broadcast::Sender<Pdu>,
    shutdown: watch::Receiver<bool>,
}

impl Publisher {
    pub fn new(
        socket: TcpListener,
        broadcasts: broadcast::Sender<Pdu>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            socket,
            broadcasts,
            shutdown,
        }
    }

    /// Accept subscriber connections until shutdown.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                accepted = self.socket.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "subscriber connected");
                        tokio::spawn(handle_subscriber(stream, self.broadcasts.subscribe()));
                    }
                    Err(e) => error!(error = %e, "publisher accept error"),
                },

                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("publisher: terminated");
    }
}

async fn handle_subscriber(mut stream: TcpStream, mut broadcasts: broadcast::Receiver<Pdu>) {
    loop {
        match broadcasts.recv().await {
            Ok(pdu) => {
                if protocol_wire::write_pdu(&mut stream, &pdu).await.is_err() {
                    debug!("subscriber disconnected");
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "slow subscriber missed broadcasts");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
