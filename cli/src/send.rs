// `peerbeam send` — publish metadata, then stream the file through the
// relayed file-chunk fallback path.
//
// A terminal peer has no browser RTC stack, so the relayed route is its
// data channel; the chunk loop and flow control are the same as on the
// direct path.

use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::*;
use peerbeam_core::signal::{FileMetadata, SignalClient, SignalEvent};
use peerbeam_core::transfer::{send_file, ChannelError, ChannelState, DataChannel};
use std::path::Path;
use tokio::fs::File;
use tokio::sync::Mutex;
use tracing::info;

/// Adapts the relay connection to the data-channel capability.
struct RelayedChannel {
    client: Mutex<SignalClient>,
}

#[async_trait]
impl DataChannel for RelayedChannel {
    fn ready_state(&self) -> ChannelState {
        ChannelState::Open
    }

    async fn send(&self, data: &[u8]) -> Result<(), ChannelError> {
        self.client
            .lock()
            .await
            .send_chunk(data)
            .await
            .map_err(|e| ChannelError(e.to_string()))
    }
}

/// Websocket URL for a relay base and session name.
pub fn session_url(relay: &str, session: &str) -> String {
    format!("{}/ws?session={}", relay.trim_end_matches('/'), session)
}

pub async fn run(relay: &str, session: &str, path: &Path) -> Result<()> {
    let len = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?
        .len();
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file.bin")
        .to_string();

    let url = session_url(relay, session);
    let mut client = SignalClient::connect(&url)
        .await
        .with_context(|| format!("Failed to reach relay at {}", relay))?;

    let metadata = FileMetadata::sized(&name, "application/octet-stream", len);
    client
        .send_event(&SignalEvent::FileMetadata(metadata))
        .await?;
    info!(name, len, session, "metadata published");

    let mut file = File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let channel = RelayedChannel {
        client: Mutex::new(client),
    };
    let chunks = send_file(&mut file, len, &channel).await?;

    println!(
        "  {} sent {} ({} bytes, {} chunks)",
        "✓".green(),
        name.bold(),
        len,
        chunks
    );
    channel.client.into_inner().close().await.ok();
    Ok(())
}
