//! End-to-end split/reassemble behavior across the sender loop and the
//! reassembly buffer, without a network in between.

use async_trait::async_trait;
use parking_lot::Mutex;
use peerbeam_core::signal::FileMetadata;
use peerbeam_core::transfer::{
    send_file, ChannelError, ChannelState, DataChannel, InboundPayload, ReassemblyBuffer,
    CHUNK_SIZE,
};
use proptest::prelude::*;

struct RecordingChannel {
    sent: Mutex<Vec<Vec<u8>>>,
}

impl RecordingChannel {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DataChannel for RecordingChannel {
    fn ready_state(&self) -> ChannelState {
        ChannelState::Open
    }
    async fn send(&self, data: &[u8]) -> Result<(), ChannelError> {
        self.sent.lock().push(data.to_vec());
        Ok(())
    }
}

fn roundtrip(data: &[u8]) -> Vec<u8> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("Failed to build runtime");

    let channel = RecordingChannel::new();
    runtime
        .block_on(send_file(&mut &data[..], data.len() as u64, &channel))
        .expect("Failed to send");

    let mut buffer = ReassemblyBuffer::new();
    buffer.set_metadata(FileMetadata::sized(
        "file.bin",
        "application/octet-stream",
        data.len() as u64,
    ));
    for chunk in channel.sent.lock().drain(..) {
        assert!(buffer.push(InboundPayload::Binary(chunk)));
    }
    assert!(buffer.is_complete());
    buffer.materialize().expect("Failed to materialize").bytes
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn reassembled_artifact_is_byte_identical(data in proptest::collection::vec(any::<u8>(), 1..100_000)) {
        prop_assert_eq!(roundtrip(&data), data);
    }
}

#[test]
fn metadata_may_arrive_after_chunks() {
    // Ordering relative to chunk arrival is free as long as metadata
    // precedes the receive trigger.
    let mut buffer = ReassemblyBuffer::new();
    buffer.push_chunk(b"late metadata ".to_vec());
    buffer.push_chunk(b"still works".to_vec());
    buffer.set_metadata(FileMetadata::sized("x.txt", "text/plain", 25));

    assert!(buffer.is_complete());
    let artifact = buffer.materialize().unwrap();
    assert_eq!(artifact.bytes, b"late metadata still works");
}

#[test]
fn chunk_boundaries_match_declared_maximum() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let data = vec![0u8; CHUNK_SIZE * 3 + 1];
    let channel = RecordingChannel::new();

    let chunks = runtime
        .block_on(send_file(&mut &data[..], data.len() as u64, &channel))
        .unwrap();

    assert_eq!(chunks, 4);
    let sent = channel.sent.lock();
    assert!(sent[..3].iter().all(|c| c.len() == CHUNK_SIZE));
    assert_eq!(sent[3].len(), 1);
}
