//! Length-prefixed, acknowledged framing
//!
//! Each frame is an 8-byte little-endian length followed by the payload.
//! The receiver answers the length and then the payload with a one-byte
//! boolean, so the sender never has more than one unacknowledged part in
//! flight. An oversized length is answered with a NAK and the payload is
//! never sent.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

pub const LENGTH_PREFIX_BYTES: usize = 8;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

const ACK: u8 = 1;
const NAK: u8 = 0;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame too large: max {max} got {got}")]
    TooLarge { got: usize, max: usize },

    #[error("peer rejected the frame")]
    Rejected,

    #[error("invalid acknowledgement byte {0}")]
    BadAck(u8),

    #[error("invalid payload: {0}")]
    Json(#[from] serde_json::Error),
}

async fn send_ack<S: AsyncWrite + Unpin>(stream: &mut S, ok: bool) -> Result<(), FrameError> {
    stream.write_all(&[if ok { ACK } else { NAK }]).await?;
    stream.flush().await?;
    Ok(())
}

async fn receive_ack<S: AsyncRead + Unpin>(stream: &mut S) -> Result<(), FrameError> {
    match stream.read_u8().await? {
        ACK => Ok(()),
        NAK => Err(FrameError::Rejected),
        other => Err(FrameError::BadAck(other)),
    }
}

/// Send one frame, waiting for the peer to acknowledge the length and the payload
pub async fn write_frame<S>(stream: &mut S, payload: &[u8]) -> Result<(), FrameError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    debug!(len = payload.len(), "write_frame: called");
    stream.write_all(&(payload.len() as u64).to_le_bytes()).await?;
    stream.flush().await?;
    receive_ack(stream).await?;

    stream.write_all(payload).await?;
    stream.flush().await?;
    receive_ack(stream).await
}

/// Receive one frame of at most `max_bytes`, acknowledging each part
pub async fn read_frame<S>(stream: &mut S, max_bytes: usize) -> Result<Vec<u8>, FrameError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_BYTES];
    stream.read_exact(&mut prefix).await?;
    let len = u64::from_le_bytes(prefix);
    let len = match usize::try_from(len) {
        Ok(len) if len <= max_bytes => len,
        _ => {
            warn!(len, max_bytes, "Rejecting oversized frame");
            send_ack(stream, false).await?;
            return Err(FrameError::TooLarge {
                got: usize::try_from(len).unwrap_or(usize::MAX),
                max: max_bytes,
            });
        }
    };
    send_ack(stream, true).await?;

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await?;
    send_ack(stream, true).await?;
    debug!(len, "read_frame: received");
    Ok(payload)
}

pub async fn write_message<S, T>(stream: &mut S, message: &T) -> Result<(), FrameError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(message)?;
    write_frame(stream, &payload).await
}

pub async fn read_message<S, T>(stream: &mut S, max_bytes: usize) -> Result<T, FrameError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    T: DeserializeOwned,
{
    let payload = read_frame(stream, max_bytes).await?;
    Ok(serde_json::from_slice(&payload)?)
}
