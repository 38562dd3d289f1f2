//! FrameChannel - Single-Slot Frame Broadcast
//!
//! ## Responsibilities
//!
//! - Decouple one frame producer from any number of viewers
//! - Overwrite semantics: consumers always observe the latest frame,
//!   never a backlog
//! - Blocking wait with timeout for the next fresh frame
//! - Cadence warnings when publish/read intervals fall behind pacing
//!
//! Built on `tokio::sync::watch`: the slot holds exactly one frame, a
//! publish wakes every waiter, and a slow consumer silently skips to the
//! newest value. Sequence numbers let a consumer ask for "anything newer
//! than what I last saw".

use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Default pacing bound; gaps above this are logged as cadence warnings
/// (matches a 5 fps floor).
pub const DEFAULT_PACING_WARN: Duration = Duration::from_millis(200);

/// One published frame.
///
/// The payload is immutable once published; clones share the underlying
/// buffer, so consumers never alias into a mutable slot.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Encoded image bytes
    pub payload: Bytes,
    /// Strictly increasing per publish; 0 means "nothing published yet"
    pub seq: u64,
    /// Publish instant
    pub captured_at: Instant,
}

impl Frame {
    fn empty() -> Self {
        Self {
            payload: Bytes::new(),
            seq: 0,
            captured_at: Instant::now(),
        }
    }
}

/// Single-producer, many-consumer frame slot.
pub struct FrameChannel {
    tx: watch::Sender<Frame>,
    seq: AtomicU64,
    pacing_warn: Duration,
    last_publish: Mutex<Option<Instant>>,
}

impl FrameChannel {
    /// Create a channel with the default pacing bound.
    pub fn new() -> Self {
        Self::with_pacing(DEFAULT_PACING_WARN)
    }

    /// Create a channel with a custom pacing bound (slow tickers use a
    /// wider one so they do not warn on every publish).
    pub fn with_pacing(pacing_warn: Duration) -> Self {
        let (tx, _) = watch::channel(Frame::empty());
        Self {
            tx,
            seq: AtomicU64::new(0),
            pacing_warn,
            last_publish: Mutex::new(None),
        }
    }

    /// Publish a frame, overwriting the slot and waking all waiters.
    ///
    /// Exactly one producer may call this; callers serialize. Returns the
    /// sequence number assigned to the frame.
    pub fn publish(&self, payload: Bytes) -> u64 {
        let now = Instant::now();
        {
            let mut last = self.last_publish.lock().expect("publish clock lock");
            if let Some(prev) = *last {
                let gap = now.duration_since(prev);
                if gap > self.pacing_warn {
                    tracing::warn!(gap_ms = gap.as_millis() as u64, "Slow frame publish cadence");
                }
            }
            *last = Some(now);
        }

        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        self.tx.send_replace(Frame {
            payload,
            seq,
            captured_at: now,
        });
        seq
    }

    /// Sequence number of the most recently published frame.
    pub fn latest_seq(&self) -> u64 {
        self.seq.load(Ordering::Relaxed)
    }

    /// Create an independent consumer handle.
    pub fn subscribe(&self) -> FrameSubscriber {
        FrameSubscriber {
            rx: self.tx.subscribe(),
            pacing_warn: self.pacing_warn,
            last_read: None,
        }
    }
}

impl Default for FrameChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-consumer view of a [`FrameChannel`].
///
/// Each subscriber tracks its own read cadence; subscribers never affect
/// each other or the producer.
pub struct FrameSubscriber {
    rx: watch::Receiver<Frame>,
    pacing_warn: Duration,
    last_read: Option<Instant>,
}

impl FrameSubscriber {
    /// Wait until a frame with `seq > last_seen` is available, or the
    /// timeout elapses.
    ///
    /// The sequence predicate is re-checked after every wakeup, so a
    /// spurious wake never hands back a stale frame. Returns `None` on
    /// timeout (and when the producer side is gone).
    pub async fn await_fresh(&mut self, last_seen: u64, timeout: Duration) -> Option<Frame> {
        let now = Instant::now();
        if let Some(prev) = self.last_read {
            let gap = now.duration_since(prev);
            if gap > self.pacing_warn {
                tracing::warn!(gap_ms = gap.as_millis() as u64, "Slow frame read cadence");
            }
        }
        self.last_read = Some(now);

        match tokio::time::timeout(timeout, self.rx.wait_for(|f| f.seq > last_seen)).await {
            Ok(Ok(fresh)) => Some((*fresh).clone()),
            // Channel closed: producer dropped, treat like a timeout so the
            // caller degrades to fallback content.
            Ok(Err(_)) => None,
            Err(_) => None,
        }
    }

    /// The frame currently in the slot, without waiting.
    pub fn current(&mut self) -> Frame {
        (*self.rx.borrow_and_update()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_await_fresh_returns_published_frame() {
        let channel = FrameChannel::new();
        let mut sub = channel.subscribe();

        channel.publish(Bytes::from_static(b"frame-1"));
        let frame = sub
            .await_fresh(0, Duration::from_millis(100))
            .await
            .expect("frame should be available");
        assert_eq!(frame.seq, 1);
        assert_eq!(&frame.payload[..], b"frame-1");
    }

    #[tokio::test]
    async fn test_await_fresh_times_out_without_publish() {
        let channel = FrameChannel::new();
        let mut sub = channel.subscribe();

        let start = Instant::now();
        let result = sub.await_fresh(0, Duration::from_millis(50)).await;
        assert!(result.is_none());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_slow_consumer_skips_to_latest() {
        let channel = FrameChannel::new();
        let mut sub = channel.subscribe();

        channel.publish(Bytes::from_static(b"a"));
        channel.publish(Bytes::from_static(b"b"));
        channel.publish(Bytes::from_static(b"c"));

        // The intermediate frames are gone; only the newest is observable.
        let frame = sub
            .await_fresh(0, Duration::from_millis(100))
            .await
            .expect("latest frame");
        assert_eq!(frame.seq, 3);
        assert_eq!(&frame.payload[..], b"c");
    }

    #[tokio::test]
    async fn test_monotonic_freshness_per_consumer() {
        let channel = Arc::new(FrameChannel::new());
        let mut sub = channel.subscribe();

        let producer = {
            let channel = channel.clone();
            tokio::spawn(async move {
                for i in 0..20u8 {
                    channel.publish(Bytes::from(vec![i]));
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
            })
        };

        let mut last_seen = 0u64;
        while let Some(frame) = sub.await_fresh(last_seen, Duration::from_millis(100)).await {
            assert!(frame.seq > last_seen, "sequence must advance");
            last_seen = frame.seq;
            if last_seen >= 20 {
                break;
            }
        }
        producer.await.expect("producer task");
        assert_eq!(last_seen, 20);
    }

    #[tokio::test]
    async fn test_same_frame_not_delivered_twice() {
        let channel = FrameChannel::new();
        let mut sub = channel.subscribe();

        channel.publish(Bytes::from_static(b"only"));
        let frame = sub
            .await_fresh(0, Duration::from_millis(50))
            .await
            .expect("first read");
        // Asking for something newer than what we saw must time out.
        let again = sub.await_fresh(frame.seq, Duration::from_millis(50)).await;
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_fan_out_isolation_on_dropped_consumer() {
        let channel = FrameChannel::new();
        let mut survivor = channel.subscribe();
        let dropped = channel.subscribe();
        drop(dropped);

        channel.publish(Bytes::from_static(b"still-flowing"));
        let frame = survivor
            .await_fresh(0, Duration::from_millis(100))
            .await
            .expect("surviving consumer unaffected");
        assert_eq!(frame.seq, 1);
    }

    #[tokio::test]
    async fn test_concurrent_consumers_observe_whole_frames() {
        let channel = Arc::new(FrameChannel::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let mut sub = channel.subscribe();
            handles.push(tokio::spawn(async move {
                let mut last_seen = 0u64;
                for _ in 0..10 {
                    if let Some(frame) =
                        sub.await_fresh(last_seen, Duration::from_millis(200)).await
                    {
                        // Payloads are published whole: every byte of a frame
                        // carries the same marker value.
                        assert!(!frame.payload.is_empty());
                        let first = frame.payload[0];
                        assert!(frame.payload.iter().all(|b| *b == first));
                        last_seen = frame.seq;
                    }
                }
            }));
        }

        let producer = {
            let channel = channel.clone();
            tokio::spawn(async move {
                for i in 0..30u8 {
                    channel.publish(Bytes::from(vec![i; 512]));
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            })
        };

        for handle in handles {
            handle.await.expect("consumer task");
        }
        producer.await.expect("producer task");
    }
}
