// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Management controller: request/reply for inspectors and operators.

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, warn};

use crate::kernel::RequestEnvelope;
use crate::protocol::{error_pdu, ProtocolError, Request};
use crate::protocol_wire;

pub(crate) struct Controller {
    socket: TcpListener,
    requests: mpsc::Sender<RequestEnvelope>,
    shutdown: watch::Receiver<bool>,
}

impl Controller {
    pub fn new(
        socket: TcpListener,
        requests: mpsc::Sender<RequestEnvelope>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            socket,
            requests,
            shutdown,
        }
    }

    /// Accept management clients until shutdown.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                accepted = self.socket.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "management client connected");
                        let requests = self.requests.clone();
                        tokio::spawn(handle_client(stream, requests));
                    }
                    Err(e) => error!(error = %e, "controller accept error"),
                },

                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("controller: terminated");
    }
}

async fn handle_client(mut stream: TcpStream, requests: mpsc::Sender<RequestEnvelope>) {
    loop {
        let pdu = match protocol_wire::read_pdu(&mut stream).await {
            Ok(pdu) => pdu,
            Err(ProtocolError::ConnectionClosed) => {
                debug!("management client disconnected");
                return;
            }
            Err(e @ ProtocolError::MessageTooLarge { .. }) => {
                let _ = protocol_wire::write_pdu(&mut stream, &error_pdu(&e.to_string())).await;
                return;
            }
            Err(ProtocolError::Io(e)) => {
                warn!(error = %e, "management read error");
                return;
            }
            Err(e) => {
                if protocol_wire::write_pdu(&mut stream, &error_pdu(&e.to_string()))
                    .await
                    .is_err()
                {
                    return;
                }
                continue;
            }
        };

        let request = match Request::parse(&pdu) {
            Ok(request) => request,
            Err(e) => {
                warn!(pdu = pdu.tag(), error = %e, "unhandled management PDU");
                if protocol_wire::write_pdu(&mut stream, &error_pdu(&e.to_string()))
                    .await
                    .is_err()
                {
                    return;
                }
                continue;
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = RequestEnvelope {
            request,
            reply: reply_tx,
        };
        if requests.send(envelope).await.is_err() {
            return;
        }

        let reply = match reply_rx.await {
            Ok(reply) => reply,
            Err(_) => return,
        };

        if protocol_wire::write_pdu(&mut stream, &reply.to_pdu())
            .await
            .is_err()
        {
            return;
        }
    }
}
