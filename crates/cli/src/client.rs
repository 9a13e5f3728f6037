// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket plumbing for the CLI.

use anyhow::{Context, Result};
use bolo_daemon::protocol::{Pdu, ProtocolError, Reply, Request, Submission};
use bolo_daemon::protocol_wire;
use tokio::net::TcpStream;

fn address(endpoint: &str) -> &str {
    endpoint.strip_prefix("tcp://").unwrap_or(endpoint)
}

async fn connect(endpoint: &str) -> Result<TcpStream> {
    TcpStream::connect(address(endpoint))
        .await
        .with_context(|| format!("failed to connect to {endpoint}"))
}

/// Push submissions to the ingestion endpoint (fire-and-forget).
pub async fn submit(endpoint: &str, submissions: Vec<Submission>) -> Result<()> {
    let mut stream = connect(endpoint).await?;
    for submission in &submissions {
        protocol_wire::write_pdu(&mut stream, &submission.to_pdu())
            .await
            .with_context(|| format!("failed to submit to {endpoint}"))?;
    }
    Ok(())
}

/// One management request/reply round trip.
pub async fn request(endpoint: &str, request: Request) -> Result<Reply> {
    let mut stream = connect(endpoint).await?;
    protocol_wire::write_pdu(&mut stream, &request.to_pdu())
        .await
        .with_context(|| format!("failed to send request to {endpoint}"))?;

    let pdu = protocol_wire::read_pdu(&mut stream)
        .await
        .with_context(|| format!("no response received from {endpoint}"))?;
    Ok(Reply::parse(&pdu)?)
}

/// Subscribe to the broadcast endpoint and print each PDU as one line,
/// frames separated by spaces.
pub async fn listen(endpoint: &str) -> Result<()> {
    let mut stream = connect(endpoint).await?;
    loop {
        let pdu: Pdu = match protocol_wire::read_pdu(&mut stream).await {
            Ok(pdu) => pdu,
            Err(ProtocolError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        println!("{}", pdu.frames().join(" "));
    }
}
