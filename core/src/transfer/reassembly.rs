//! Reassembly buffer — ordered chunk accumulation and file materialization
//!
//! Chunks are appended in arrival order; correctness depends on the
//! transport delivering in order and reliably. Materialization is an
//! explicit trigger, not chunk-count- or size-driven, because the chunk
//! stream itself carries no end marker; metadata that declares a total
//! size additionally enables automatic completion detection.

use crate::signal::protocol::FileMetadata;
use thiserror::Error;
use tracing::{debug, warn};

/// A payload received from the data channel, before type checking.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundPayload {
    /// A binary chunk.
    Binary(Vec<u8>),
    /// Anything else the channel surfaced; never appended.
    Text(String),
}

/// The reassembled file, ready to hand to the save action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileArtifact {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Reassembly error types; messages are user-visible statuses.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReassemblyError {
    #[error("No file available to receive")]
    EmptyBuffer,
    #[error("No file metadata available")]
    MissingMetadata,
}

/// Accumulates the chunk stream of the current transfer.
///
/// At most one transfer is meaningful at a time: new metadata overwrites
/// the old. A closed channel leaves any partial buffer in place rather
/// than discarding it.
#[derive(Debug, Default)]
pub struct ReassemblyBuffer {
    chunks: Vec<Vec<u8>>,
    received_bytes: u64,
    metadata: Option<FileMetadata>,
}

impl ReassemblyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the transfer's metadata, overwriting any prior transfer's.
    pub fn set_metadata(&mut self, metadata: FileMetadata) {
        debug!(name = %metadata.name, mime = %metadata.mime_type, "file metadata received");
        self.metadata = Some(metadata);
    }

    /// Metadata of the current transfer, if any has arrived.
    pub fn metadata(&self) -> Option<&FileMetadata> {
        self.metadata.as_ref()
    }

    /// Append an inbound payload. Non-binary payloads are rejected and
    /// logged, never appended. Returns whether the payload was kept.
    pub fn push(&mut self, payload: InboundPayload) -> bool {
        match payload {
            InboundPayload::Binary(chunk) => {
                self.push_chunk(chunk);
                true
            }
            InboundPayload::Text(_) => {
                warn!("unexpected non-binary payload on data channel, discarding");
                false
            }
        }
    }

    /// Append a binary chunk in arrival order.
    pub fn push_chunk(&mut self, chunk: Vec<u8>) {
        self.received_bytes += chunk.len() as u64;
        self.chunks.push(chunk);
    }

    /// Number of buffered chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Total buffered bytes.
    pub fn received_bytes(&self) -> u64 {
        self.received_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// True once the metadata declares a size and the buffered bytes match
    /// it. Always false for size-less metadata, where only the explicit
    /// trigger can finish the transfer.
    pub fn is_complete(&self) -> bool {
        matches!(
            self.metadata.as_ref().and_then(|m| m.size),
            Some(size) if size == self.received_bytes
        )
    }

    /// Explicit receive trigger: concatenate the buffered chunks into one
    /// artifact tagged with the declared MIME type and filename.
    ///
    /// Requires a non-empty buffer and present metadata; otherwise fails
    /// with a descriptive status and leaves everything unchanged. On
    /// success the buffer is cleared so a subsequent transfer starts
    /// clean; metadata is retained until overwritten.
    pub fn materialize(&mut self) -> Result<FileArtifact, ReassemblyError> {
        if self.chunks.is_empty() {
            return Err(ReassemblyError::EmptyBuffer);
        }
        let metadata = self.metadata.as_ref().ok_or(ReassemblyError::MissingMetadata)?;

        let mut bytes = Vec::with_capacity(self.received_bytes as usize);
        for chunk in &self.chunks {
            bytes.extend_from_slice(chunk);
        }
        let artifact = FileArtifact {
            name: metadata.name.clone(),
            mime_type: metadata.mime_type.clone(),
            bytes,
        };

        self.chunks.clear();
        self.received_bytes = 0;
        debug!(name = %artifact.name, bytes = artifact.bytes.len(), "file materialized");
        Ok(artifact)
    }
}

// ============================================================================
// TESTS
// ============================================================================
