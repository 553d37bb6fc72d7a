//! Transfer layer: negotiation state machine, sender chunk loop, and the
//! receive-side reassembly buffer, tied together by the coordinator.

pub mod coordinator;
pub mod negotiation;
pub mod reassembly;
pub mod sender;

pub use coordinator::{ChunkRoute, Coordinator, CoordinatorError};
pub use negotiation::{
    EndpointError, Negotiation, NegotiationError, PeerEndpoint, SignalingState,
};
pub use reassembly::{FileArtifact, InboundPayload, ReassemblyBuffer, ReassemblyError};
pub use sender::{send_file, ChannelError, ChannelState, DataChannel, SendError, CHUNK_SIZE};
