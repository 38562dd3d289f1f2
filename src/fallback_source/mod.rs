//! FallbackSource - Placeholder Frames for Degraded Streams
//!
//! ## Responsibilities
//!
//! - Hold one placeholder image, loaded from a logo file or synthesized
//! - Re-publish it at ~1 Hz on an internal channel so idle viewers block
//!   on a shared ticker instead of polling
//! - Serve every viewer whenever the camera has nothing fresh

use crate::error::{Error, Result};
use crate::frame_channel::{FrameChannel, FrameSubscriber};
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Tick interval for the shared placeholder publisher.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Synthesized placeholder dimensions when no logo file is available.
const PLACEHOLDER_SIZE: (u32, u32) = (1280, 720);

/// Shared supplier of placeholder frames.
pub struct FallbackSource {
    payload: Bytes,
    channel: FrameChannel,
}

impl FallbackSource {
    /// Load the placeholder from `logo_file`, synthesizing a plain dark
    /// JPEG when the file is absent or unset.
    pub fn new(logo_file: Option<&Path>) -> Result<Self> {
        let payload = match logo_file {
            Some(path) if path.exists() => {
                tracing::info!(path = %path.display(), "Loaded placeholder image");
                Bytes::from(std::fs::read(path)?)
            }
            Some(path) => {
                tracing::warn!(path = %path.display(), "Placeholder image missing, synthesizing");
                synthesize_placeholder()?
            }
            None => {
                tracing::info!("No placeholder image configured, synthesizing");
                synthesize_placeholder()?
            }
        };
        tracing::debug!(size = payload.len(), "Placeholder image ready");

        Ok(Self {
            payload,
            // The ticker runs at 1 Hz; widen the pacing bound so routine
            // ticks never register as cadence warnings.
            channel: FrameChannel::with_pacing(Duration::from_secs(3)),
        })
    }

    /// Spawn the shared ticker task.
    pub fn start(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK_INTERVAL);
            loop {
                ticker.tick().await;
                self.channel.publish(self.payload.clone());
            }
        });
    }

    /// The placeholder bytes, available without waiting.
    pub fn current(&self) -> Bytes {
        self.payload.clone()
    }

    /// Subscribe to the 1 Hz placeholder ticker.
    pub fn subscribe(&self) -> FrameSubscriber {
        self.channel.subscribe()
    }
}

/// Build a plain dark JPEG placeholder in memory.
fn synthesize_placeholder() -> Result<Bytes> {
    let (width, height) = PLACEHOLDER_SIZE;
    let img = image::GrayImage::from_pixel(width, height, image::Luma([16u8]));

    let mut jpeg = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 80);
    encoder
        .encode_image(&img)
        .map_err(|e| Error::Internal(format!("placeholder encode failed: {}", e)))?;

    Ok(Bytes::from(jpeg))
}
