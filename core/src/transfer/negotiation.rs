//! Negotiation state machine for the peer-to-peer channel
//!
//! One authoritative state field, transitions guarded by preconditions,
//! envelope emission as transition output. Sequencing violations (an
//! answer with no outstanding offer, an offer while not stable) are an
//! expected byproduct of broadcast signaling with more than two peers:
//! they are warned about and discarded, never fatal.

use crate::signal::protocol::SignalEvent;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Negotiation states, following the browser signaling-state vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    /// No exchange in flight; offers may be created or accepted.
    Stable,
    /// A local offer is outstanding, awaiting the peer's answer.
    HaveLocalOffer,
    /// A remote offer is being answered.
    HaveRemoteOffer,
    /// The data channel reported readiness.
    Open,
    /// The channel closed; a fresh offer is required to restart.
    Closed,
}

/// Failure reported by the native peer-connection capability.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct EndpointError(pub String);

/// The native peer-connection object, consumed as an opaque capability.
///
/// Every operation is asynchronous and fallible; the state machine awaits
/// each before emitting any dependent envelope.
#[async_trait]
pub trait PeerEndpoint: Send + Sync {
    /// Produce a local session-description offer.
    async fn create_offer(&self) -> Result<Value, EndpointError>;
    /// Produce an answer to the currently set remote offer.
    async fn create_answer(&self) -> Result<Value, EndpointError>;
    /// Commit a description as the local end of the negotiation.
    async fn set_local_description(&self, desc: &Value) -> Result<(), EndpointError>;
    /// Commit a description as the remote end of the negotiation.
    async fn set_remote_description(&self, desc: &Value) -> Result<(), EndpointError>;
    /// Apply a connection candidate from the peer.
    async fn add_ice_candidate(&self, candidate: &Value) -> Result<(), EndpointError>;
}

/// Negotiation error types. Only user-triggered operations surface these;
/// inbound envelope handling degrades to warn-and-discard instead.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("Failed to create offer: {0}")]
    OfferFailed(#[source] EndpointError),
}

/// The negotiation state machine, owning its endpoint capability.
pub struct Negotiation<E> {
    endpoint: E,
    state: SignalingState,
}

impl<E: PeerEndpoint> Negotiation<E> {
    pub fn new(endpoint: E) -> Self {
        Self {
            endpoint,
            state: SignalingState::Stable,
        }
    }

    /// Current authoritative state.
    pub fn state(&self) -> SignalingState {
        self.state
    }

    /// Initiator action: create an offer and commit it locally.
    ///
    /// Valid from `Stable` (or `Closed`, to restart after a disconnect).
    /// Repeat triggers while an offer is outstanding are no-ops, guarding
    /// against duplicate offers. Returns the envelope to emit, or `None`
    /// when the trigger was ignored.
    pub async fn start_offer(&mut self) -> Result<Option<SignalEvent>, NegotiationError> {
        match self.state {
            SignalingState::Stable | SignalingState::Closed => {}
            other => {
                warn!(state = ?other, "ignoring offer trigger, negotiation not stable");
                return Ok(None);
            }
        }

        let offer = self
            .endpoint
            .create_offer()
            .await
            .map_err(NegotiationError::OfferFailed)?;
        self.endpoint
            .set_local_description(&offer)
            .await
            .map_err(NegotiationError::OfferFailed)?;

        self.state = SignalingState::HaveLocalOffer;
        debug!("offer created, awaiting answer");
        Ok(Some(SignalEvent::Offer(offer)))
    }

    /// Responder transition: accept a remote offer and synthesize an answer.
    ///
    /// Valid only while `Stable`; otherwise the offer is discarded with a
    /// warning and no retry. The answer envelope is only produced after
    /// the local description commit resolves.
    pub async fn on_offer(&mut self, desc: Value) -> Option<SignalEvent> {
        if self.state != SignalingState::Stable {
            warn!(state = ?self.state, "signaling state is not stable, discarding offer");
            return None;
        }
        self.state = SignalingState::HaveRemoteOffer;

        if let Err(e) = self.endpoint.set_remote_description(&desc).await {
            warn!(error = %e, "failed to set remote offer, discarding");
            self.state = SignalingState::Stable;
            return None;
        }
        let answer = match self.endpoint.create_answer().await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "failed to create answer, discarding offer");
                self.state = SignalingState::Stable;
                return None;
            }
        };
        if let Err(e) = self.endpoint.set_local_description(&answer).await {
            warn!(error = %e, "failed to commit answer locally, discarding offer");
            self.state = SignalingState::Stable;
            return None;
        }

        // Description exchange complete; the channel open event moves us on.
        self.state = SignalingState::Stable;
        debug!("answer created for remote offer");
        Some(SignalEvent::Answer(answer))
    }

    /// Initiator transition: apply the peer's answer.
    ///
    /// Valid only while exactly one offer is outstanding; otherwise the
    /// answer is discarded and state is unaffected. Returns whether it was
    /// applied.
    pub async fn on_answer(&mut self, desc: Value) -> bool {
        if self.state != SignalingState::HaveLocalOffer {
            warn!(state = ?self.state, "no outstanding offer, discarding answer");
            return false;
        }

        if let Err(e) = self.endpoint.set_remote_description(&desc).await {
            warn!(error = %e, "failed to set remote answer, discarding");
            return false;
        }

        self.state = SignalingState::Stable;
        debug!("answer applied, awaiting channel readiness");
        true
    }

    /// Apply a connection candidate in arrival order, independent of the
    /// offer/answer state. A candidate the endpoint rejects (typically one
    /// arriving before its description) is a recoverable no-op.
    pub async fn on_ice_candidate(&mut self, candidate: Value) -> bool {
        match self.endpoint.add_ice_candidate(&candidate).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "candidate not applicable yet, ignoring");
                false
            }
        }
    }

    /// The underlying channel signalled readiness.
    pub fn on_channel_open(&mut self) {
        debug!("data channel open");
        self.state = SignalingState::Open;
    }

    /// The underlying channel closed; no automatic reconnection.
    pub fn on_channel_close(&mut self) {
        debug!("data channel closed");
        self.state = SignalingState::Closed;
    }
}

// ============================================================================
// TESTS
// ============================================================================
