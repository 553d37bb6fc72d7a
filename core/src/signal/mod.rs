//! Signaling layer: wire protocol, relay hub, and the peer-side client.

pub mod client;
pub mod hub;
pub mod protocol;

pub use client::{Inbound, SignalClient, SignalClientError};
pub use hub::{PeerId, RelayHub, RelayHubConfig, RelayHubError, RelayHubStats, DEFAULT_SESSION};
pub use protocol::{FileMetadata, Frame, ProtocolError, SignalEvent};
