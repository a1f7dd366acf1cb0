//! Length-prefixed JSON framing.
//!
//! A message is a big-endian `u32` byte count followed by that many bytes of
//! UTF-8 JSON. Each side writes exactly one message and then half-closes its
//! write direction.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;
use crate::Result;

/// Largest accepted message body.
pub const MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;

/// Serialize a message body.
///
/// # Errors
///
/// Returns an error if the message cannot be serialized or is too large.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    let data = serde_json::to_vec(message).map_err(|e| ProtocolError::Encode(e.to_string()))?;
    if data.len() > MAX_MESSAGE_BYTES {
        return Err(ProtocolError::FrameTooLarge {
            size: data.len(),
            limit: MAX_MESSAGE_BYTES,
        }
        .into());
    }
    Ok(data)
}

/// Parse a message body.
///
/// # Errors
///
/// Returns an error if the body is not a valid message of type `T`.
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    serde_json::from_slice(data).map_err(|e| ProtocolError::from(e).into())
}

/// Write one framed message and half-close the writer.
///
/// # Errors
///
/// Returns an error on encoding or I/O failure.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let data = encode(message)?;
    let len = u32::try_from(data.len()).map_err(|_| ProtocolError::FrameTooLarge {
        size: data.len(),
        limit: MAX_MESSAGE_BYTES,
    })?;

    writer.write_u32(len).await?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    writer.shutdown().await?;
    Ok(())
}

/// Read exactly one framed message.
///
/// # Errors
///
/// Returns an error if the peer closes early, the frame is oversized,
/// or the body does not decode.
pub async fn read_message<R, T>(reader: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = reader.read_u32().await.map_err(eof_to_protocol)?;
    let len = usize::try_from(len).unwrap_or(usize::MAX);
    if len > MAX_MESSAGE_BYTES {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            limit: MAX_MESSAGE_BYTES,
        }
        .into());
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await.map_err(eof_to_protocol)?;
    decode(&buf)
}

fn eof_to_protocol(e: std::io::Error) -> crate::Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        ProtocolError::UnexpectedEof.into()
    } else {
        e.into()
    }
}
