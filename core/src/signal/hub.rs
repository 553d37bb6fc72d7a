//! Relay hub — session registry and broadcast fan-out
//!
//! The hub holds no file data and no durable state: it tracks connected
//! peers just well enough to deliver every admitted frame to all other
//! members of the sender's session. Peers join a named session at connect
//! time; with everyone in the default session the hub behaves as one
//! global broadcast domain.

use super::protocol::Frame;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

/// Identifier assigned to each relay connection.
pub type PeerId = Uuid;

/// Session peers land in when they do not name one.
pub const DEFAULT_SESSION: &str = "lobby";

/// Relay hub configuration.
#[derive(Debug, Clone)]
pub struct RelayHubConfig {
    /// Maximum concurrent connections across all sessions.
    pub max_connections: usize,
}

impl Default for RelayHubConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
        }
    }
}

/// Statistics about hub operations.
#[derive(Debug, Clone, Default)]
pub struct RelayHubStats {
    /// Number of currently connected peers.
    pub connections_active: usize,
    /// Total frames delivered to peers.
    pub frames_relayed: u64,
    /// Total payload bytes delivered to peers.
    pub bytes_relayed: u64,
    /// Inbound frames dropped as malformed.
    pub frames_dropped: u64,
}

/// Hub error types.
#[derive(Debug, Error)]
pub enum RelayHubError {
    #[error("Connection limit exceeded")]
    ConnectionLimitExceeded,
}

/// The relay hub: sessions -> peers -> outbound frame senders.
///
/// The registry is mutated only on connect/disconnect and read on every
/// broadcast. Frames queued to a peer that disconnected mid-broadcast are
/// silently discarded along with its channel.
pub struct RelayHub {
    config: RelayHubConfig,
    sessions: Arc<RwLock<HashMap<String, HashMap<PeerId, mpsc::UnboundedSender<Frame>>>>>,
    stats: Arc<RwLock<RelayHubStats>>,
}

impl RelayHub {
    /// Create a hub with default configuration.
    pub fn new() -> Self {
        Self::with_config(RelayHubConfig::default())
    }

    /// Create a hub with custom configuration.
    pub fn with_config(config: RelayHubConfig) -> Self {
        Self {
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(RelayHubStats::default())),
        }
    }

    /// Register a peer in a session.
    ///
    /// The sender half is how the hub reaches the peer; the connection
    /// handler owns the receiving half.
    pub fn register(
        &self,
        session: &str,
        peer_id: PeerId,
        sender: mpsc::UnboundedSender<Frame>,
    ) -> Result<(), RelayHubError> {
        let mut sessions = self.sessions.write();

        let active: usize = sessions.values().map(|peers| peers.len()).sum();
        if active >= self.config.max_connections {
            return Err(RelayHubError::ConnectionLimitExceeded);
        }

        sessions
            .entry(session.to_string())
            .or_default()
            .insert(peer_id, sender);
        debug!(%peer_id, session, "peer joined");

        let mut stats = self.stats.write();
        stats.connections_active = active + 1;
        Ok(())
    }

    /// Remove a peer; empty sessions are dropped with it.
    pub fn unregister(&self, session: &str, peer_id: &PeerId) {
        let mut sessions = self.sessions.write();

        if let Some(peers) = sessions.get_mut(session) {
            peers.remove(peer_id);
            if peers.is_empty() {
                sessions.remove(session);
            }
            debug!(%peer_id, session, "peer left");
        }

        let mut stats = self.stats.write();
        stats.connections_active = sessions.values().map(|peers| peers.len()).sum();
    }

    /// Deliver a frame to every peer in `session` except `from`.
    ///
    /// Returns how many peers the frame was queued to. Fewer than two
    /// session members makes this a no-op, never an error.
    pub fn broadcast(&self, session: &str, from: &PeerId, frame: Frame) -> usize {
        let sessions = self.sessions.read();

        let Some(peers) = sessions.get(session) else {
            return 0;
        };

        let payload_len = frame.len() as u64;
        let mut delivered = 0usize;
        for (peer_id, sender) in peers {
            if peer_id == from {
                continue;
            }
            if sender.send(frame.clone()).is_ok() {
                delivered += 1;
            }
        }
        trace!(%from, session, delivered, "broadcast");

        let mut stats = self.stats.write();
        stats.frames_relayed += delivered as u64;
        stats.bytes_relayed += payload_len * delivered as u64;
        delivered
    }

    /// Count a malformed inbound frame that was dropped without fan-out.
    pub fn note_dropped(&self) {
        self.stats.write().frames_dropped += 1;
    }

    /// Number of peers currently in a session.
    pub fn session_peers(&self, session: &str) -> usize {
        self.sessions
            .read()
            .get(session)
            .map_or(0, |peers| peers.len())
    }

    /// Current hub statistics.
    pub fn stats(&self) -> RelayHubStats {
        self.stats.read().clone()
    }
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn join(hub: &RelayHub, session: &str) -> (PeerId, mpsc::UnboundedReceiver<Frame>) {
        let peer_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        hub.register(session, peer_id, tx).expect("Failed to register");
        (peer_id, rx)
    }

    #[test]
    fn test_hub_creation() {
        let hub = RelayHub::new();
        let stats = hub.stats();
        assert_eq!(stats.connections_active, 0);
        assert_eq!(stats.frames_relayed, 0);
    }

    #[test]
    fn test_broadcast_excludes_sender() {
        let hub = RelayHub::new();
        let (a, mut rx_a) = join(&hub, DEFAULT_SESSION);
        let (_b, mut rx_b) = join(&hub, DEFAULT_SESSION);
        let (_c, mut rx_c) = join(&hub, DEFAULT_SESSION);

        let delivered = hub.broadcast(DEFAULT_SESSION, &a, Frame::Text("{\"event\":\"offer\",\"payload\":{}}".to_string()));

        assert_eq!(delivered, 2);
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_c.try_recv().is_ok());
        assert!(rx_a.try_recv().is_err(), "sender must never hear its own frame");
    }

    #[test]
    fn test_broadcast_alone_is_noop() {
        let hub = RelayHub::new();
        let (a, mut rx_a) = join(&hub, DEFAULT_SESSION);

        let delivered = hub.broadcast(DEFAULT_SESSION, &a, Frame::Chunk(vec![1, 2, 3]));

        assert_eq!(delivered, 0);
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_unknown_session_is_noop() {
        let hub = RelayHub::new();
        let delivered = hub.broadcast("nowhere", &Uuid::new_v4(), Frame::Chunk(vec![1]));
        assert_eq!(delivered, 0);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let hub = RelayHub::new();
        let (a, _rx_a) = join(&hub, "alpha");
        let (_b, mut rx_b) = join(&hub, "alpha");
        let (_c, mut rx_c) = join(&hub, "beta");

        let delivered = hub.broadcast("alpha", &a, Frame::Chunk(vec![9]));

        assert_eq!(delivered, 1);
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_c.try_recv().is_err(), "other sessions must not receive the frame");
    }

    #[test]
    fn test_unregister_drops_peer_from_future_broadcasts() {
        let hub = RelayHub::new();
        let (a, _rx_a) = join(&hub, DEFAULT_SESSION);
        let (b, mut rx_b) = join(&hub, DEFAULT_SESSION);
        let (_c, mut rx_c) = join(&hub, DEFAULT_SESSION);

        hub.unregister(DEFAULT_SESSION, &b);

        let delivered = hub.broadcast(DEFAULT_SESSION, &a, Frame::Chunk(vec![7]));
        assert_eq!(delivered, 1);
        assert!(rx_b.try_recv().is_err());
        assert!(rx_c.try_recv().is_ok());
        assert_eq!(hub.stats().connections_active, 2);
    }

    #[test]
    fn test_unregister_removes_empty_session() {
        let hub = RelayHub::new();
        let (a, _rx) = join(&hub, "solo");
        assert_eq!(hub.session_peers("solo"), 1);

        hub.unregister("solo", &a);
        assert_eq!(hub.session_peers("solo"), 0);
    }

    #[test]
    fn test_connection_limit() {
        let hub = RelayHub::with_config(RelayHubConfig { max_connections: 2 });
        let (_a, _rx_a) = join(&hub, DEFAULT_SESSION);
        let (_b, _rx_b) = join(&hub, DEFAULT_SESSION);

        let (tx, _rx) = mpsc::unbounded_channel();
        let result = hub.register(DEFAULT_SESSION, Uuid::new_v4(), tx);
        assert!(matches!(result, Err(RelayHubError::ConnectionLimitExceeded)));
    }

    #[test]
    fn test_stats_tracking() {
        let hub = RelayHub::new();
        let (a, _rx_a) = join(&hub, DEFAULT_SESSION);
        let (_b, _rx_b) = join(&hub, DEFAULT_SESSION);

        hub.broadcast(DEFAULT_SESSION, &a, Frame::Chunk(vec![0u8; 100]));
        hub.note_dropped();

        let stats = hub.stats();
        assert_eq!(stats.connections_active, 2);
        assert_eq!(stats.frames_relayed, 1);
        assert_eq!(stats.bytes_relayed, 100);
        assert_eq!(stats.frames_dropped, 1);
    }

    #[test]
    fn test_frames_arrive_in_send_order() {
        let hub = RelayHub::new();
        let (a, _rx_a) = join(&hub, DEFAULT_SESSION);
        let (_b, mut rx_b) = join(&hub, DEFAULT_SESSION);

        for i in 0..5u8 {
            hub.broadcast(DEFAULT_SESSION, &a, Frame::Chunk(vec![i]));
        }
        for i in 0..5u8 {
            assert_eq!(rx_b.try_recv().unwrap(), Frame::Chunk(vec![i]));
        }
    }
}
