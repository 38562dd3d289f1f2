//! StreamSession - Per-Viewer MJPEG Delivery
//!
//! ## Responsibilities
//!
//! - One loop per accepted streaming connection
//! - Pull the freshest frame within a bounded wait, substituting
//!   placeholder content whenever the camera has nothing new
//! - Emit each frame as one `multipart/x-mixed-replace` chunk
//! - Tear down on viewer disconnect without touching other sessions

use crate::fallback_source::FallbackSource;
use crate::frame_channel::{FrameChannel, FrameSubscriber};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Multipart boundary marker; browsers key off this to split frames.
pub const BOUNDARY: &str = "FRAME";

/// Budget for one live-frame wait before substituting the placeholder.
const LIVE_WAIT: Duration = Duration::from_secs(1);

/// Budget for one placeholder tick (the ticker runs at 1 Hz).
const FALLBACK_WAIT: Duration = Duration::from_millis(1500);

/// Encode one frame as a multipart chunk: boundary, content headers,
/// payload, trailing CRLF.
pub fn encode_chunk(payload: &[u8]) -> Bytes {
    let head = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY,
        payload.len()
    );

    let mut chunk = Vec::with_capacity(head.len() + payload.len() + 2);
    chunk.extend_from_slice(head.as_bytes());
    chunk.extend_from_slice(payload);
    chunk.extend_from_slice(b"\r\n");
    Bytes::from(chunk)
}

/// One viewer's streaming loop.
pub struct StreamSession {
    id: Uuid,
    live: FrameSubscriber,
    fallback: FrameSubscriber,
    placeholder: Bytes,
}

impl StreamSession {
    pub fn new(frames: &FrameChannel, fallback: &FallbackSource) -> Self {
        let id = Uuid::new_v4();
        tracing::info!(session_id = %id, "Stream session opened");
        Self {
            id,
            live: frames.subscribe(),
            fallback: fallback.subscribe(),
            placeholder: fallback.current(),
        }
    }

    /// Run until the viewer goes away.
    ///
    /// A failed send means the receiving body was dropped (viewer
    /// disconnected); that is the only termination condition.
    pub async fn run(mut self, tx: mpsc::Sender<Bytes>) {
        let mut live_seq = 0u64;
        let mut fallback_seq = 0u64;

        loop {
            let payload = match self.live.await_fresh(live_seq, LIVE_WAIT).await {
                Some(frame) => {
                    live_seq = frame.seq;
                    frame.payload
                }
                // No fresh camera frame in budget: ride the shared
                // placeholder ticker so idle viewers pace together.
                None => match self.fallback.await_fresh(fallback_seq, FALLBACK_WAIT).await {
                    Some(frame) => {
                        fallback_seq = frame.seq;
                        frame.payload
                    }
                    None => self.placeholder.clone(),
                },
            };

            if tx.send(encode_chunk(&payload)).await.is_err() {
                break;
            }
        }

        tracing::info!(session_id = %self.id, "Stream session closed");
    }

    /// Spawn the session; the receiver feeds the HTTP body.
    pub fn spawn(frames: &Arc<FrameChannel>, fallback: &Arc<FallbackSource>) -> mpsc::Receiver<Bytes> {
        let session = Self::new(frames, fallback);
        let (tx, rx) = mpsc::channel(2);
        tokio::spawn(session.run(tx));
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_chunk_framing() {
        let chunk = encode_chunk(b"0123456789");
        let text = String::from_utf8_lossy(&chunk);
        assert!(text.starts_with("--FRAME\r\n"));
        assert!(text.contains("Content-Type: image/jpeg\r\n"));
        assert!(text.contains("Content-Length: 10\r\n\r\n"));
        assert!(text.ends_with("0123456789\r\n"));
    }

    #[test]
    fn test_chunk_length_matches_payload_bytes() {
        let payload = vec![0xABu8; 333];
        let chunk = encode_chunk(&payload);
        let header_end = chunk
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("header terminator")
            + 4;
        assert_eq!(&chunk[header_end..header_end + 333], &payload[..]);
    }

    #[tokio::test]
    async fn test_live_frames_are_streamed() {
        let frames = Arc::new(FrameChannel::new());
        let fallback = Arc::new(FallbackSource::new(None).expect("fallback"));
        let mut rx = StreamSession::spawn(&frames, &fallback);

        frames.publish(Bytes::from_static(b"live-frame"));
        let chunk = rx.recv().await.expect("chunk");
        let text = String::from_utf8_lossy(&chunk);
        assert!(text.contains("Content-Length: 10"));
        assert!(chunk.windows(10).any(|w| w == b"live-frame"));
    }

    #[tokio::test]
    async fn test_fallback_within_wait_budget() {
        let frames = Arc::new(FrameChannel::new());
        let fallback = Arc::new(FallbackSource::new(None).expect("fallback"));
        fallback.clone().start();

        let start = Instant::now();
        let mut rx = StreamSession::spawn(&frames, &fallback);
        let chunk = rx.recv().await.expect("placeholder chunk");

        // Nothing was ever published: the placeholder must arrive within
        // the live budget plus one fallback tick.
        assert!(start.elapsed() < LIVE_WAIT + FALLBACK_WAIT + Duration::from_millis(500));
        let placeholder = fallback.current();
        assert!(chunk.len() > placeholder.len());
    }

    #[tokio::test]
    async fn test_disconnect_tears_down_session_only() {
        let frames = Arc::new(FrameChannel::new());
        let fallback = Arc::new(FallbackSource::new(None).expect("fallback"));

        let rx_dropped = StreamSession::spawn(&frames, &fallback);
        let mut rx_alive = StreamSession::spawn(&frames, &fallback);
        drop(rx_dropped);

        frames.publish(Bytes::from_static(b"after-drop"));
        let chunk = rx_alive.recv().await.expect("surviving session");
        assert!(chunk.windows(10).any(|w| w == b"after-drop"));
    }
}
