// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire format encoding/decoding for PDUs.
//!
//! Wire format: 4-byte payload length prefix (big-endian), then the
//! payload: a u16-BE frame count followed by each frame as a u32-BE
//! length and UTF-8 bytes.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::protocol::{Pdu, ProtocolError};

/// Maximum encoded PDU size (16 MB).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Maximum frames per PDU.
pub const MAX_FRAMES: usize = u16::MAX as usize;

/// Encode a PDU payload (without the length prefix).
pub fn encode(pdu: &Pdu) -> Result<Vec<u8>, ProtocolError> {
    if pdu.is_empty() {
        return Err(ProtocolError::Malformed("empty PDU".to_string()));
    }
    if pdu.len() > MAX_FRAMES {
        return Err(ProtocolError::Malformed("too many frames".to_string()));
    }

    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(&(pdu.len() as u16).to_be_bytes());
    for frame in pdu.frames() {
        buf.extend_from_slice(&(frame.len() as u32).to_be_bytes());
        buf.extend_from_slice(frame.as_bytes());
    }

    if buf.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: buf.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(buf)
}

fn take<'a>(bytes: &'a [u8], pos: &mut usize, n: usize) -> Result<&'a [u8], ProtocolError> {
    if *pos + n > bytes.len() {
        return Err(ProtocolError::Malformed("truncated PDU".to_string()));
    }
    let slice = &bytes[*pos..*pos + n];
    *pos += n;
    Ok(slice)
}

/// Decode a PDU payload.
pub fn decode(bytes: &[u8]) -> Result<Pdu, ProtocolError> {
    let mut pos = 0usize;

    let count_bytes = take(bytes, &mut pos, 2)?;
    let count = u16::from_be_bytes([count_bytes[0], count_bytes[1]]) as usize;
    if count == 0 {
        return Err(ProtocolError::Malformed("empty PDU".to_string()));
    }

    let mut frames = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        let len_bytes = take(bytes, &mut pos, 4)?;
        let len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]);
        let raw = take(bytes, &mut pos, len as usize)?;
        let frame = std::str::from_utf8(raw)
            .map_err(|_| ProtocolError::Malformed("invalid UTF-8 in frame".to_string()))?;
        frames.push(frame.to_string());
    }

    if pos != bytes.len() {
        return Err(ProtocolError::Malformed("trailing bytes in PDU".to_string()));
    }
    Ok(Pdu::from_frames(frames))
}

/// Read a length-prefixed PDU from an async reader.
pub async fn read_pdu<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Pdu, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed);
        }
        Err(e) => return Err(ProtocolError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf) as usize;

    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    decode(&buf)
}

/// Write a length-prefixed PDU to an async writer.
pub async fn write_pdu<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    pdu: &Pdu,
) -> Result<(), ProtocolError> {
    let data = encode(pdu)?;
    writer.write_all(&(data.len() as u32).to_be_bytes()).await?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}
