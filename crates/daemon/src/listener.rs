// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ingestion listener: producers push submission PDUs here.
//!
//! Submissions are fire-and-forget; a rejected submission (malformed
//! PDU, unknown metric) gets a best-effort ERROR PDU written back down
//! the same connection.

use tokio::net::{tcp::OwnedWriteHalf, TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

use crate::kernel::SubmissionEnvelope;
use crate::protocol::{error_pdu, ProtocolError, Submission};
use crate::protocol_wire;

pub(crate) struct Listener {
    socket: TcpListener,
    submissions: mpsc::Sender<SubmissionEnvelope>,
    shutdown: watch::Receiver<bool>,
}

impl Listener {
    pub fn new(
        socket: TcpListener,
        submissions: mpsc::Sender<SubmissionEnvelope>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            socket,
            submissions,
            shutdown,
        }
    }

    /// Accept producer connections until shutdown.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                accepted = self.socket.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "producer connected");
                        let submissions = self.submissions.clone();
                        tokio::spawn(handle_producer(stream, submissions));
                    }
                    Err(e) => error!(error = %e, "listener accept error"),
                },

                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("listener: terminated");
    }
}

async fn handle_producer(stream: TcpStream, submissions: mpsc::Sender<SubmissionEnvelope>) {
    let (mut reader, writer) = stream.into_split();

    // Errors flow back on their own task so a slow producer can't stall
    // submission reads.
    let (error_tx, error_rx) = mpsc::channel::<String>(16);
    tokio::spawn(write_errors(writer, error_rx));

    loop {
        let pdu = match protocol_wire::read_pdu(&mut reader).await {
            Ok(pdu) => pdu,
            Err(ProtocolError::ConnectionClosed) => {
                debug!("producer disconnected");
                break;
            }
            Err(e @ ProtocolError::MessageTooLarge { .. }) => {
                // The oversized payload was not consumed; the stream is
                // desynced and has to go.
                warn!(error = %e, "dropping producer connection");
                let _ = error_tx.try_send(e.to_string());
                break;
            }
            Err(ProtocolError::Io(e)) => {
                warn!(error = %e, "producer read error");
                break;
            }
            Err(e) => {
                warn!(error = %e, "rejecting unreadable submission");
                let _ = error_tx.try_send(e.to_string());
                continue;
            }
        };

        match Submission::parse(&pdu) {
            Ok(submission) => {
                let envelope = SubmissionEnvelope {
                    submission,
                    errors: Some(error_tx.clone()),
                };
                if submissions.send(envelope).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "rejecting malformed submission");
                let _ = error_tx.try_send(e.to_string());
            }
        }
    }
}

async fn write_errors(mut writer: OwnedWriteHalf, mut errors: mpsc::Receiver<String>) {
    while let Some(message) = errors.recv().await {
        if protocol_wire::write_pdu(&mut writer, &error_pdu(&message))
            .await
            .is_err()
        {
            break;
        }
    }
}
