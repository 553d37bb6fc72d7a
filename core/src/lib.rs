//! peerbeam-core — signaling relay and transfer-correlation protocol
//!
//! Two peers exchange a file directly over a peer-to-peer data channel; a
//! small relay bootstraps the connection by forwarding signaling and
//! metadata envelopes between the members of a session. The relay never
//! sees file contents on the primary path — chunks flow peer to peer —
//! though a relayed `file-chunk` fallback path exists for peers without a
//! direct channel.
//!
//! Layers:
//! - [`signal`] — wire envelopes, the relay hub (session registry +
//!   broadcast fan-out), and the peer-side websocket client.
//! - [`transfer`] — the negotiation state machine, the 16 KiB sender
//!   chunk loop, and the reassembly buffer that correlates metadata with
//!   the chunk stream.
//!
//! Connection establishment, encryption, and congestion control belong to
//! the peer-to-peer transport and are consumed as opaque capabilities
//! ([`transfer::PeerEndpoint`], [`transfer::DataChannel`]).

pub mod signal;
pub mod transfer;

pub use signal::{FileMetadata, RelayHub, SignalClient, SignalEvent};
pub use transfer::{Coordinator, ReassemblyBuffer, CHUNK_SIZE};
