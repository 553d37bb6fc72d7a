// `peerbeam recv` — accumulate metadata and chunks from the relay session
// and materialize the file once the declared size is reached.

use anyhow::{bail, Context, Result};
use colored::*;
use peerbeam_core::signal::{Inbound, SignalClient, SignalEvent};
use peerbeam_core::transfer::{InboundPayload, ReassemblyBuffer};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Strip any directory components a remote peer put in the declared name.
fn safe_file_name(declared: &str) -> PathBuf {
    Path::new(declared)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("received.bin"))
}

pub async fn run(relay: &str, session: &str, output: &Path) -> Result<()> {
    let url = crate::send::session_url(relay, session);
    let mut client = SignalClient::connect(&url)
        .await
        .with_context(|| format!("Failed to reach relay at {}", relay))?;

    println!("  waiting for a file in session {}...", session.bold());
    let mut buffer = ReassemblyBuffer::new();

    while let Some(inbound) = client.next().await {
        match inbound {
            Inbound::Event(SignalEvent::FileMetadata(metadata)) => {
                println!(
                    "  incoming: {} ({})",
                    metadata.name.bold(),
                    metadata.mime_type
                );
                buffer.set_metadata(metadata);
            }
            Inbound::Event(other) => {
                debug!(event = other.event_type(), "ignoring signaling envelope");
            }
            Inbound::Chunk(data) => {
                buffer.push(InboundPayload::Binary(data));
            }
        }

        if buffer.is_complete() {
            let artifact = buffer.materialize()?;
            let dest = output.join(safe_file_name(&artifact.name));
            tokio::fs::write(&dest, &artifact.bytes)
                .await
                .with_context(|| format!("Failed to write {}", dest.display()))?;
            println!(
                "  {} saved {} ({} bytes)",
                "✓".green(),
                dest.display(),
                artifact.bytes.len()
            );
            client.close().await.ok();
            return Ok(());
        }
    }

    // The relay connection ended before completion. Partial data is kept
    // in memory only; nothing is written to disk.
    if buffer.is_empty() {
        bail!("Relay connection closed before any file data arrived");
    }
    bail!(
        "Transfer incomplete: {} bytes buffered when the connection closed",
        buffer.received_bytes()
    )
}

// ============================================================================
// TESTS
// ============================================================================
