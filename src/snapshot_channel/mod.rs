//! SnapshotChannel - Latest High-Resolution Capture
//!
//! Overwrite-only cache for the most recent on-demand still. Reads are
//! synchronous: whatever was last stored, or nothing if no capture has
//! happened yet. There is no blocking wait here; the capture path writes,
//! the HTTP path reads.

use bytes::Bytes;
use std::sync::Mutex;

/// Cache of the most recent snapshot.
pub struct SnapshotChannel {
    latest: Mutex<Option<Bytes>>,
}

impl SnapshotChannel {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            latest: Mutex::new(None),
        }
    }

    /// Overwrite the cached snapshot.
    pub fn store(&self, data: Bytes) {
        let mut latest = self.latest.lock().expect("snapshot lock");
        tracing::debug!(size = data.len(), "Snapshot cached");
        *latest = Some(data);
    }

    /// The most recently stored snapshot, if any.
    pub fn latest(&self) -> Option<Bytes> {
        self.latest.lock().expect("snapshot lock").clone()
    }
}

impl Default for SnapshotChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_until_first_store() {
        let cache = SnapshotChannel::new();
        assert!(cache.latest().is_none());
    }

    #[test]
    fn test_store_overwrites() {
        let cache = SnapshotChannel::new();
        cache.store(Bytes::from_static(b"first"));
        cache.store(Bytes::from_static(b"second"));
        assert_eq!(cache.latest().expect("cached")[..], b"second"[..]);
    }
}
