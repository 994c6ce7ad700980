//! Binary wire format for put sessions.
//!
//! # Wire format
//!
//! ```text
//! HANDSHAKE (client -> server):     [32 bytes: hex token ASCII]
//! AUTH RESPONSE (server -> client): [1 byte: 0x01=OK, 0x00=rejected]
//!
//! FRAME (client -> server):
//!   [1 byte: tag]
//!   [4 bytes BE: payload_len]
//!   [payload_len bytes: payload]
//!
//!   0x01 OPEN      [4 bytes BE: permissions][remote_file UTF-8]
//!   0x02 CONTENTS  [raw chunk bytes]
//!   0x03 HASH      [1 byte: method code][digest bytes]
//!   0x00 CLOSE     (empty, end of stream)
//!
//! RESPONSE (server -> client):
//!   [1 byte: 0x01=OK, 0x00=error]
//!   [2 bytes BE: message_len]
//!   [message_len bytes: message UTF-8]
//! ```

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::{MAX_FRAME_LEN, TOKEN_LEN};
use crate::error::WireError;
use crate::messages::{HashMethod, HashType, PutDetails, PutRequest, PutResponse};

/// Authentication response: accepted.
pub const AUTH_OK: u8 = 0x01;

/// Authentication response: rejected.
pub const AUTH_REJECTED: u8 = 0x00;

pub const TAG_CLOSE: u8 = 0x00;
pub const TAG_OPEN: u8 = 0x01;
pub const TAG_CONTENTS: u8 = 0x02;
pub const TAG_HASH: u8 = 0x03;

const STATUS_OK: u8 = 0x01;
const STATUS_ERROR: u8 = 0x00;

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// Writes the authentication token (32 hex ASCII bytes).
pub async fn write_token<W: AsyncWrite + Unpin>(
    writer: &mut W,
    token: &str,
) -> Result<(), WireError> {
    if token.len() != TOKEN_LEN {
        return Err(WireError::Malformed(format!(
            "token must be {TOKEN_LEN} bytes, got {}",
            token.len()
        )));
    }
    writer.write_all(token.as_bytes()).await?;
    Ok(())
}

/// Reads the authentication token (32 hex ASCII bytes).
pub async fn read_token<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String, WireError> {
    let mut buf = [0u8; TOKEN_LEN];
    reader.read_exact(&mut buf).await?;
    String::from_utf8(buf.to_vec())
        .map_err(|e| WireError::Malformed(format!("invalid token encoding: {e}")))
}

/// Writes the authentication response byte.
pub async fn write_auth_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    accepted: bool,
) -> Result<(), WireError> {
    writer
        .write_u8(if accepted { AUTH_OK } else { AUTH_REJECTED })
        .await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the authentication response byte.
pub async fn read_auth_response<R: AsyncRead + Unpin>(reader: &mut R) -> Result<bool, WireError> {
    let byte = reader.read_u8().await?;
    Ok(byte == AUTH_OK)
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

async fn write_frame_header<W: AsyncWrite + Unpin>(
    writer: &mut W,
    tag: u8,
    len: usize,
) -> Result<(), WireError> {
    if len > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    writer.write_u8(tag).await?;
    writer.write_u32(len as u32).await?;
    Ok(())
}

/// Writes an open frame.
pub async fn write_open<W: AsyncWrite + Unpin>(
    writer: &mut W,
    details: &PutDetails,
) -> Result<(), WireError> {
    let name = details.remote_file.as_bytes();
    write_frame_header(writer, TAG_OPEN, 4 + name.len()).await?;
    writer.write_u32(details.permissions).await?;
    writer.write_all(name).await?;
    Ok(())
}

/// Writes a contents frame carrying one chunk.
pub async fn write_contents<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), WireError> {
    write_frame_header(writer, TAG_CONTENTS, data.len()).await?;
    writer.write_all(data).await?;
    Ok(())
}

/// Writes a hash frame.
pub async fn write_hash<W: AsyncWrite + Unpin>(
    writer: &mut W,
    hash: &HashType,
) -> Result<(), WireError> {
    write_frame_header(writer, TAG_HASH, 1 + hash.hash.len()).await?;
    writer.write_u8(hash.method.wire_code()).await?;
    writer.write_all(&hash.hash).await?;
    Ok(())
}

/// Writes any request frame.
pub async fn write_request<W: AsyncWrite + Unpin>(
    writer: &mut W,
    req: &PutRequest,
) -> Result<(), WireError> {
    match req {
        PutRequest::Open(details) => write_open(writer, details).await,
        PutRequest::Contents(data) => write_contents(writer, data).await,
        PutRequest::Hash(hash) => write_hash(writer, hash).await,
    }
}

/// Writes the end-of-stream frame.
pub async fn write_close<W: AsyncWrite + Unpin>(writer: &mut W) -> Result<(), WireError> {
    write_frame_header(writer, TAG_CLOSE, 0).await
}

/// Reads the next request frame.
///
/// Returns `None` when the end-of-stream frame is encountered.
pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<PutRequest>, WireError> {
    let tag = reader.read_u8().await?;
    let len = reader.read_u32().await? as usize;
    if len > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    match tag {
        TAG_CLOSE => {
            if len != 0 {
                return Err(WireError::Malformed(format!(
                    "close frame carries {len} bytes"
                )));
            }
            Ok(None)
        }
        TAG_OPEN => {
            if len < 4 {
                return Err(WireError::Malformed(format!("open frame too short: {len}")));
            }
            let permissions = reader.read_u32().await?;
            let mut name = vec![0u8; len - 4];
            reader.read_exact(&mut name).await?;
            let remote_file = String::from_utf8(name)
                .map_err(|e| WireError::Malformed(format!("invalid UTF-8 remote file: {e}")))?;
            Ok(Some(PutRequest::Open(PutDetails {
                remote_file,
                permissions,
            })))
        }
        TAG_CONTENTS => {
            let mut data = vec![0u8; len];
            reader.read_exact(&mut data).await?;
            Ok(Some(PutRequest::Contents(data)))
        }
        TAG_HASH => {
            if len < 1 {
                return Err(WireError::Malformed("empty hash frame".into()));
            }
            let code = reader.read_u8().await?;
            let method = HashMethod::from_wire_code(code).ok_or(WireError::UnknownHashMethod(code))?;
            let mut hash = vec![0u8; len - 1];
            reader.read_exact(&mut hash).await?;
            Ok(Some(PutRequest::Hash(HashType { method, hash })))
        }
        other => Err(WireError::UnknownTag(other)),
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Writes the terminal response. Messages longer than `u16::MAX` bytes
/// are cut at a character boundary.
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    resp: &PutResponse,
) -> Result<(), WireError> {
    let message = truncate_utf8(&resp.message, u16::MAX as usize);
    writer
        .write_u8(if resp.accepted { STATUS_OK } else { STATUS_ERROR })
        .await?;
    writer.write_u16(message.len() as u16).await?;
    writer.write_all(message.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the terminal response.
pub async fn read_response<R: AsyncRead + Unpin>(reader: &mut R) -> Result<PutResponse, WireError> {
    let status = reader.read_u8().await?;
    let len = reader.read_u16().await? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    let message = String::from_utf8(buf)
        .map_err(|e| WireError::Malformed(format!("invalid UTF-8 response: {e}")))?;
    match status {
        STATUS_OK => Ok(PutResponse::ok(message)),
        STATUS_ERROR => Ok(PutResponse::rejected(message)),
        other => Err(WireError::Malformed(format!("unknown response status {other}"))),
    }
}

fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
