//! Relay service — websocket endpoint in front of the hub
//!
//! One websocket per peer. Inbound text frames must parse as signaling
//! envelopes before fan-out; malformed ones are dropped silently (counted,
//! no negative acknowledgment). Binary frames are the relayed `file-chunk`
//! fallback path and are forwarded opaquely.

use crate::config::RelayConfig;
use futures::{SinkExt, StreamExt};
use peerbeam_core::signal::{Frame, PeerId, RelayHub, RelayHubConfig, SignalEvent, DEFAULT_SESSION};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, trace, warn};
use uuid::Uuid;
use warp::filters::BoxedFilter;
use warp::Filter;

#[derive(Debug, Deserialize)]
struct SessionQuery {
    session: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: String,
    connections_active: usize,
    frames_relayed: u64,
}

/// Build the relay routes: websocket upgrade at `/ws` (optional `session`
/// query) and a JSON health probe at `/api/health`.
pub fn routes(hub: Arc<RelayHub>) -> BoxedFilter<(impl warp::Reply,)> {
    let hub_filter = warp::any().map({
        let hub = hub.clone();
        move || hub.clone()
    });

    let ws_route = warp::path("ws")
        .and(warp::ws())
        .and(warp::query::<SessionQuery>())
        .and(hub_filter.clone())
        .map(|ws: warp::ws::Ws, query: SessionQuery, hub: Arc<RelayHub>| {
            let session = query
                .session
                .unwrap_or_else(|| DEFAULT_SESSION.to_string());
            ws.on_upgrade(move |socket| handle_connection(socket, session, hub))
        })
        .boxed();

    let health_route = warp::path!("api" / "health")
        .and(warp::get())
        .and(hub_filter)
        .map(|hub: Arc<RelayHub>| {
            let stats = hub.stats();
            warp::reply::json(&HealthResponse {
                status: "ok",
                version: env!("CARGO_PKG_VERSION").to_string(),
                connections_active: stats.connections_active,
                frames_relayed: stats.frames_relayed,
            })
        })
        .boxed();

    let cors = warp::cors().allow_any_origin();
    ws_route.or(health_route).with(cors).boxed()
}

/// Run the relay until the process is stopped.
pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
    let hub = Arc::new(RelayHub::with_config(RelayHubConfig {
        max_connections: config.max_connections,
    }));
    let addr = config.socket_addr()?;

    info!(%addr, "relay listening");
    warp::serve(routes(hub)).run(addr).await;
    Ok(())
}

async fn handle_connection(socket: warp::ws::WebSocket, session: String, hub: Arc<RelayHub>) {
    let peer_id: PeerId = Uuid::new_v4();
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
    if let Err(e) = hub.register(&session, peer_id, tx) {
        warn!(%peer_id, error = %e, "rejecting connection");
        let _ = ws_tx.send(warp::ws::Message::close()).await;
        return;
    }
    info!(%peer_id, session, "peer connected");

    // Hub -> websocket
    let forward_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let msg = match frame {
                Frame::Text(text) => warp::ws::Message::text(text),
                Frame::Chunk(data) => warp::ws::Message::binary(data),
            };
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    // Websocket -> hub
    while let Some(result) = ws_rx.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(_) => break,
        };
        if msg.is_close() {
            break;
        }
        if msg.is_binary() {
            hub.broadcast(&session, &peer_id, Frame::Chunk(msg.into_bytes()));
        } else if let Ok(text) = msg.to_str() {
            match SignalEvent::from_text(text) {
                Ok(event) => {
                    trace!(%peer_id, event = event.event_type(), "forwarding envelope");
                    hub.broadcast(&session, &peer_id, Frame::Text(text.to_string()));
                }
                // Dropped silently; the relay never raises errors to clients
                Err(_) => hub.note_dropped(),
            }
        }
    }

    info!(%peer_id, session, "peer disconnected");
    hub.unregister(&session, &peer_id);
    forward_task.abort();
}

// ============================================================================
// TESTS
// ============================================================================
