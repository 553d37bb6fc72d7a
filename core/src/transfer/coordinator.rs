//! Transfer coordinator — owns the negotiation machine, the reassembly
//! buffer, the current file selection, and the chunk route
//!
//! All state is lifecycle-scoped and passed in at construction; nothing is
//! ambient. Envelopes to emit leave through a channel to the signal
//! client, so transitions stay synchronous decision points with their side
//! effects as outputs.

use super::negotiation::{Negotiation, NegotiationError, PeerEndpoint, SignalingState};
use super::reassembly::{FileArtifact, InboundPayload, ReassemblyBuffer, ReassemblyError};
use super::sender::{send_file, DataChannel, SendError};
use crate::signal::protocol::{FileMetadata, SignalEvent};
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// How chunks reach the receiving peer.
///
/// The direct peer-to-peer channel is the primary path; relayed
/// `file-chunk` frames are the documented fallback. The two are
/// alternatives: whichever delivers first is fixed for the transfer and
/// frames from the other are discarded, never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkRoute {
    /// Chunks arrive on the peer-to-peer data channel, bypassing the relay.
    Direct,
    /// Chunks arrive as binary frames forwarded by the relay.
    Relayed,
}

/// Coordinator error types; messages are user-visible statuses.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("No file selected or data channel not available")]
    NoFileSelected,
    #[error("Selected file has no known size")]
    SizeUnknown,
    #[error("Signal channel closed")]
    SignalChannelClosed,
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),
    #[error(transparent)]
    Send(#[from] SendError),
    #[error(transparent)]
    Reassembly(#[from] ReassemblyError),
}

/// Drives one peer's side of a transfer, either role.
pub struct Coordinator<E> {
    negotiation: Negotiation<E>,
    buffer: ReassemblyBuffer,
    selected: Option<FileMetadata>,
    route: Option<ChunkRoute>,
    events_out: mpsc::UnboundedSender<SignalEvent>,
}

impl<E: PeerEndpoint> Coordinator<E> {
    /// Build a coordinator around an endpoint capability and the outbound
    /// half of the signal connection.
    pub fn new(endpoint: E, events_out: mpsc::UnboundedSender<SignalEvent>) -> Self {
        Self {
            negotiation: Negotiation::new(endpoint),
            buffer: ReassemblyBuffer::new(),
            selected: None,
            route: None,
            events_out,
        }
    }

    /// Current negotiation state.
    pub fn signaling_state(&self) -> SignalingState {
        self.negotiation.state()
    }

    /// The receive-side buffer.
    pub fn buffer(&self) -> &ReassemblyBuffer {
        &self.buffer
    }

    /// Route chunks are currently flowing on, once established.
    pub fn chunk_route(&self) -> Option<ChunkRoute> {
        self.route
    }

    fn emit(&self, event: SignalEvent) -> Result<(), CoordinatorError> {
        self.events_out
            .send(event)
            .map_err(|_| CoordinatorError::SignalChannelClosed)
    }

    /// User action: select a file to send. Publishes its metadata and
    /// overwrites any prior selection.
    pub fn select_file(&mut self, metadata: FileMetadata) -> Result<(), CoordinatorError> {
        debug!(name = %metadata.name, "file selected");
        self.emit(SignalEvent::FileMetadata(metadata.clone()))?;
        self.selected = Some(metadata);
        Ok(())
    }

    /// User action: create and publish a connection offer. Returns whether
    /// an offer was actually emitted (repeat triggers are no-ops).
    pub async fn create_offer(&mut self) -> Result<bool, CoordinatorError> {
        match self.negotiation.start_offer().await? {
            Some(event) => {
                self.emit(event)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Dispatch one envelope received from the relay.
    pub async fn handle_event(&mut self, event: SignalEvent) -> Result<(), CoordinatorError> {
        match event {
            SignalEvent::FileMetadata(metadata) => self.buffer.set_metadata(metadata),
            SignalEvent::Offer(desc) => {
                if let Some(answer) = self.negotiation.on_offer(desc).await {
                    self.emit(answer)?;
                }
            }
            SignalEvent::Answer(desc) => {
                self.negotiation.on_answer(desc).await;
            }
            SignalEvent::IceCandidate(candidate) => {
                self.negotiation.on_ice_candidate(candidate).await;
            }
        }
        Ok(())
    }

    /// Accept an inbound payload from either delivery path. The first
    /// binary chunk fixes the route for the transfer; chunks on the other
    /// path are discarded with a warning. Returns whether the payload was
    /// buffered.
    pub fn handle_payload(&mut self, route: ChunkRoute, payload: InboundPayload) -> bool {
        if !matches!(payload, InboundPayload::Binary(_)) {
            // Type check happens in the buffer, which warns and rejects
            return self.buffer.push(payload);
        }
        match self.route {
            None => {
                debug!(?route, "chunk route established");
                self.route = Some(route);
            }
            Some(fixed) if fixed != route => {
                warn!(?route, established = ?fixed, "chunk on non-established route, discarding");
                return false;
            }
            Some(_) => {}
        }
        self.buffer.push(payload)
    }

    /// The data channel reported readiness.
    pub fn channel_open(&mut self) {
        self.negotiation.on_channel_open();
    }

    /// The data channel closed. The partial buffer, if any, is left in
    /// place pending a fresh negotiation cycle.
    pub fn channel_closed(&mut self) {
        self.negotiation.on_channel_close();
    }

    /// Send the selected file over an open data channel.
    ///
    /// Preconditions: a file must be selected with a known size and the
    /// channel must be open; otherwise a descriptive error is returned and
    /// nothing is sent. The selection is cleared after a successful send,
    /// so re-selecting starts the next transfer from offset zero.
    pub async fn send_selected<R, C>(
        &mut self,
        reader: &mut R,
        channel: &C,
    ) -> Result<u64, CoordinatorError>
    where
        R: AsyncRead + Unpin + ?Sized,
        C: DataChannel + ?Sized,
    {
        let metadata = self.selected.as_ref().ok_or(CoordinatorError::NoFileSelected)?;
        let len = metadata.size.ok_or(CoordinatorError::SizeUnknown)?;

        let chunks = send_file(reader, len, channel).await?;
        self.selected = None;
        Ok(chunks)
    }

    /// True once the received byte count matches the metadata's declared
    /// size, when one was declared.
    pub fn transfer_complete(&self) -> bool {
        self.buffer.is_complete()
    }

    /// Explicit receive trigger: materialize the buffered transfer. On
    /// success the route resets so the next transfer can establish its
    /// own; on failure nothing changes.
    pub fn receive_file(&mut self) -> Result<FileArtifact, CoordinatorError> {
        let artifact = self.buffer.materialize()?;
        self.route = None;
        Ok(artifact)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::negotiation::EndpointError;
    use crate::transfer::sender::{ChannelError, ChannelState};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    struct StubEndpoint;

    #[async_trait]
    impl PeerEndpoint for StubEndpoint {
        async fn create_offer(&self) -> Result<Value, EndpointError> {
            Ok(json!({"type": "offer"}))
        }
        async fn create_answer(&self) -> Result<Value, EndpointError> {
            Ok(json!({"type": "answer"}))
        }
        async fn set_local_description(&self, _desc: &Value) -> Result<(), EndpointError> {
            Ok(())
        }
        async fn set_remote_description(&self, _desc: &Value) -> Result<(), EndpointError> {
            Ok(())
        }
        async fn add_ice_candidate(&self, _candidate: &Value) -> Result<(), EndpointError> {
            Ok(())
        }
    }

    struct OpenChannel {
        sent: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl DataChannel for OpenChannel {
        fn ready_state(&self) -> ChannelState {
            ChannelState::Open
        }
        async fn send(&self, data: &[u8]) -> Result<(), ChannelError> {
            self.sent.lock().push(data.to_vec());
            Ok(())
        }
    }

    fn coordinator() -> (
        Coordinator<StubEndpoint>,
        mpsc::UnboundedReceiver<SignalEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Coordinator::new(StubEndpoint, tx), rx)
    }

    #[tokio::test]
    async fn test_select_file_publishes_metadata() {
        let (mut coordinator, mut rx) = coordinator();
        let metadata = FileMetadata::sized("a.txt", "text/plain", 5);

        coordinator.select_file(metadata.clone()).unwrap();

        match rx.try_recv().unwrap() {
            SignalEvent::FileMetadata(m) => assert_eq!(m, metadata),
            other => panic!("Expected metadata event, got {}", other.event_type()),
        }
    }

    #[tokio::test]
    async fn test_create_offer_emits_once() {
        let (mut coordinator, mut rx) = coordinator();

        assert!(coordinator.create_offer().await.unwrap());
        assert!(matches!(rx.try_recv().unwrap(), SignalEvent::Offer(_)));

        // Second trigger while the offer is unanswered: no-op, no envelope
        assert!(!coordinator.create_offer().await.unwrap());
        assert!(rx.try_recv().is_err());
        assert_eq!(coordinator.signaling_state(), SignalingState::HaveLocalOffer);
    }

    #[tokio::test]
    async fn test_inbound_offer_produces_answer() {
        let (mut coordinator, mut rx) = coordinator();

        coordinator
            .handle_event(SignalEvent::Offer(json!({"sdp": "x"})))
            .await
            .unwrap();

        assert!(matches!(rx.try_recv().unwrap(), SignalEvent::Answer(_)));
    }

    #[tokio::test]
    async fn test_stray_answer_changes_nothing() {
        let (mut coordinator, mut rx) = coordinator();

        coordinator
            .handle_event(SignalEvent::Answer(json!({"sdp": "x"})))
            .await
            .unwrap();

        assert!(rx.try_recv().is_err());
        assert_eq!(coordinator.signaling_state(), SignalingState::Stable);
    }

    #[tokio::test]
    async fn test_first_chunk_fixes_route() {
        let (mut coordinator, _rx) = coordinator();

        assert!(coordinator.handle_payload(ChunkRoute::Relayed, InboundPayload::Binary(vec![1])));
        assert_eq!(coordinator.chunk_route(), Some(ChunkRoute::Relayed));

        // A chunk on the other path is discarded, not merged
        assert!(!coordinator.handle_payload(ChunkRoute::Direct, InboundPayload::Binary(vec![2])));
        assert_eq!(coordinator.buffer().chunk_count(), 1);
    }

    #[tokio::test]
    async fn test_non_binary_payload_never_fixes_route() {
        let (mut coordinator, _rx) = coordinator();

        assert!(!coordinator.handle_payload(
            ChunkRoute::Direct,
            InboundPayload::Text("nope".to_string())
        ));
        assert_eq!(coordinator.chunk_route(), None);
    }

    #[tokio::test]
    async fn test_receive_resets_route_for_next_transfer() {
        let (mut coordinator, _rx) = coordinator();
        coordinator
            .handle_event(SignalEvent::FileMetadata(FileMetadata::sized(
                "b.bin",
                "application/octet-stream",
                1,
            )))
            .await
            .unwrap();
        coordinator.handle_payload(ChunkRoute::Direct, InboundPayload::Binary(vec![7]));
        assert!(coordinator.transfer_complete());

        let artifact = coordinator.receive_file().unwrap();
        assert_eq!(artifact.bytes, vec![7]);
        assert_eq!(coordinator.chunk_route(), None);
    }

    #[tokio::test]
    async fn test_receive_with_empty_buffer_is_rejected() {
        let (mut coordinator, _rx) = coordinator();

        let err = coordinator.receive_file().unwrap_err();
        assert_eq!(err.to_string(), "No file available to receive");
    }

    #[tokio::test]
    async fn test_send_without_selection_is_rejected() {
        let (mut coordinator, _rx) = coordinator();
        let channel = OpenChannel {
            sent: Mutex::new(Vec::new()),
        };
        let data = vec![0u8; 10];

        let err = coordinator
            .send_selected(&mut &data[..], &channel)
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::NoFileSelected));
        assert!(channel.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_send_clears_selection() {
        let (mut coordinator, _rx) = coordinator();
        let data = vec![5u8; 100];
        coordinator
            .select_file(FileMetadata::sized("c.bin", "application/octet-stream", 100))
            .unwrap();

        let channel = OpenChannel {
            sent: Mutex::new(Vec::new()),
        };
        let chunks = coordinator
            .send_selected(&mut &data[..], &channel)
            .await
            .unwrap();
        assert_eq!(chunks, 1);

        // Selection is consumed; sending again needs a fresh selection
        let err = coordinator
            .send_selected(&mut &data[..], &channel)
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::NoFileSelected));
    }
}
