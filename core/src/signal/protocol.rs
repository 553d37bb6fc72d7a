//! Signaling wire protocol — envelope types and JSON encoding
//!
//! Text frames carry JSON envelopes tagged by event name; binary frames
//! carry raw file-chunk payloads and are never JSON-decoded. The relay
//! forwards both kinds unmodified and never interprets offer/answer/
//! candidate payloads.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Metadata describing the file a sender has selected.
///
/// Produced once per file selection and broadcast before (or interleaved
/// with) the chunk stream. Selecting a new file overwrites the previous
/// metadata on every receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Filename the receiver should save under.
    pub name: String,
    /// Declared MIME type of the artifact.
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Total file size in bytes. When present, receivers can detect
    /// transfer completion without an explicit end-of-stream marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl FileMetadata {
    /// Metadata with a declared total size.
    pub fn sized(name: impl Into<String>, mime_type: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: Some(size),
        }
    }
}

/// A signaling envelope exchanged through the relay.
///
/// Offer/answer/candidate payloads are opaque to everything but the two
/// peer endpoints that produce and consume them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum SignalEvent {
    /// File name/type/size from the sending peer.
    FileMetadata(FileMetadata),
    /// Session description offer from the initiator.
    Offer(serde_json::Value),
    /// Session description answer from the responder.
    Answer(serde_json::Value),
    /// Connection candidate, exchanged opportunistically in both directions.
    IceCandidate(serde_json::Value),
}

impl SignalEvent {
    /// Wire name of the event, as it appears in the JSON tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            SignalEvent::FileMetadata(_) => "file-metadata",
            SignalEvent::Offer(_) => "offer",
            SignalEvent::Answer(_) => "answer",
            SignalEvent::IceCandidate(_) => "ice-candidate",
        }
    }

    /// Encode as a JSON text frame.
    pub fn to_text(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Decode from a JSON text frame.
    pub fn from_text(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Decode(e.to_string()))
    }
}

/// A relay-forwardable frame: an admitted signaling envelope (already
/// validated as JSON) or an opaque binary chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// JSON text of a [`SignalEvent`].
    Text(String),
    /// Raw file-chunk bytes (relayed fallback path).
    Chunk(Vec<u8>),
}

impl Frame {
    /// Size of the frame payload in bytes.
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(t) => t.len(),
            Frame::Chunk(c) => c.len(),
        }
    }

    /// Whether the frame payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Envelope encode/decode errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to encode envelope: {0}")]
    Encode(String),
    #[error("failed to decode envelope: {0}")]
    Decode(String),
}

// ============================================================================
// TESTS
// ============================================================================
