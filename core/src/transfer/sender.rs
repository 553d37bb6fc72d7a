//! Sender chunk loop — flow-controlled, fixed-maximum-size slices
//!
//! Chunks carry no sequence numbers: ordering is guaranteed by the
//! channel's in-order reliable delivery, which is a required configuration
//! invariant of the transport, not an omission.

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

/// Maximum chunk payload size in bytes.
pub const CHUNK_SIZE: usize = 16384;

/// Readiness of a data channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Failure reported by a data channel send.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ChannelError(pub String);

/// An open peer-to-peer byte channel, consumed as an opaque capability.
#[async_trait]
pub trait DataChannel: Send + Sync {
    /// Current readiness state.
    fn ready_state(&self) -> ChannelState;
    /// Send one chunk; resolves once the send is accepted by the channel.
    async fn send(&self, data: &[u8]) -> Result<(), ChannelError>;
}

/// Sender error types.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("Data channel is not open yet (state: {0:?})")]
    ChannelNotOpen(ChannelState),
    #[error("Failed to read file at offset {offset}: {source}")]
    Read {
        offset: u64,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to send chunk at offset {offset}: {source}")]
    Channel {
        offset: u64,
        #[source]
        source: ChannelError,
    },
}

/// Split `len` bytes from `reader` into sequential chunks of at most
/// [`CHUNK_SIZE`] bytes and send them over `channel`.
///
/// Each read is awaited before its send, and each send before the next
/// read: the loop is flow-controlled, not fire-and-forget, which provides
/// natural backpressure against the channel's internal buffer. Offsets are
/// strictly increasing with no gaps or overlaps. Every call starts from
/// offset zero.
///
/// Preconditions: the channel must report `Open`; otherwise nothing is
/// sent and a descriptive error is returned.
///
/// Returns the number of chunks sent.
pub async fn send_file<R, C>(reader: &mut R, len: u64, channel: &C) -> Result<u64, SendError>
where
    R: AsyncRead + Unpin + ?Sized,
    C: DataChannel + ?Sized,
{
    let state = channel.ready_state();
    if state != ChannelState::Open {
        return Err(SendError::ChannelNotOpen(state));
    }

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut offset = 0u64;
    let mut chunks = 0u64;

    while offset < len {
        let want = CHUNK_SIZE.min((len - offset) as usize);
        reader
            .read_exact(&mut buf[..want])
            .await
            .map_err(|source| SendError::Read { offset, source })?;
        channel
            .send(&buf[..want])
            .await
            .map_err(|source| SendError::Channel { offset, source })?;

        offset += want as u64;
        chunks += 1;
        trace!(offset, chunk = chunks, size = want, "chunk sent");
    }

    debug!(bytes = len, chunks, "file sent");
    Ok(chunks)
}

// ============================================================================
// TESTS
// ============================================================================
