//! CaptureSupervisor - Camera Lifecycle and Production
//!
//! ## Responsibilities
//!
//! - Own the single camera device: open, configure, produce, close
//! - Run the producer task feeding the frame channel at the configured
//!   rate
//! - Serialize start/stop/restart/apply_control/snapshot against each
//!   other; a restart fully stops production before reopening
//! - Degrade every driver failure to a logged warning and a safe state
//!
//! State machine: `Closed -> Open -> Streaming -> Closed`.

pub mod device;
pub mod pattern;

pub use device::{
    CameraDevice, CaptureConfig, DeviceControl, DeviceError, DeviceFactory, DeviceResult,
    DeviceState,
};
pub use pattern::PatternCamera;

use crate::config_store::ConfigStore;
use crate::error::{Error, Result};
use crate::frame_channel::FrameChannel;
use crate::snapshot_channel::SnapshotChannel;
use bytes::Bytes;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Shared handle to the open device. The producer takes this lock only
/// around a single capture call, never across an await.
type SharedDevice = Arc<StdMutex<Box<dyn CameraDevice>>>;

struct Producer {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct Inner {
    state: DeviceState,
    device: Option<SharedDevice>,
    producer: Option<Producer>,
}

/// Sole owner and gate of the camera device.
pub struct CaptureSupervisor {
    inner: Mutex<Inner>,
    factory: DeviceFactory,
    settings: Arc<ConfigStore>,
    frames: Arc<FrameChannel>,
    snapshots: Arc<SnapshotChannel>,
}

impl CaptureSupervisor {
    pub fn new(
        factory: DeviceFactory,
        settings: Arc<ConfigStore>,
        frames: Arc<FrameChannel>,
        snapshots: Arc<SnapshotChannel>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: DeviceState::Closed,
                device: None,
                producer: None,
            }),
            factory,
            settings,
            frames,
            snapshots,
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> DeviceState {
        self.inner.lock().await.state
    }

    /// Open the device with current settings and begin producing frames.
    ///
    /// Calling while already open logs a warning and is a no-op.
    pub async fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.start_locked(&mut inner).await
    }

    /// Halt production and release the device. Idempotent.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        self.stop_locked(&mut inner).await;
    }

    /// Stop then start, as one critical section: no frame publish can
    /// race the device close, and nothing interleaves before the reopen.
    pub async fn restart(&self) -> Result<()> {
        tracing::info!("Restarting video capture");
        let mut inner = self.inner.lock().await;
        self.stop_locked(&mut inner).await;
        self.start_locked(&mut inner).await
    }

    /// Apply an in-place control without reopening the device.
    ///
    /// Failure is logged and reported; the lifecycle state never changes.
    pub async fn apply_control(&self, control: DeviceControl, value: f64) -> Result<()> {
        let inner = self.inner.lock().await;
        let Some(device) = inner.device.as_ref() else {
            tracing::warn!(control = control.as_str(), "Camera is not opened yet");
            return Err(Error::Device("camera is not open".to_string()));
        };

        tracing::info!(control = control.as_str(), value = value, "Applying camera control");
        let result = device.lock().expect("device lock").set_control(control, value);
        result.map_err(|e| {
            tracing::warn!(control = control.as_str(), error = %e, "Failed to apply control");
            Error::Device(e.to_string())
        })
    }

    /// One-shot high-resolution capture via the secondary device path;
    /// runs concurrently with streaming (stills interleave between
    /// stream frames). The result is cached in the snapshot channel and
    /// returned.
    pub async fn snapshot(&self) -> Result<Bytes> {
        let inner = self.inner.lock().await;
        let Some(device) = inner.device.as_ref() else {
            tracing::warn!("Snapshot requested while camera is closed");
            return Err(Error::Device("camera is not open".to_string()));
        };

        let result = device.lock().expect("device lock").capture_still();
        match result {
            Ok(data) => {
                tracing::info!(size = data.len(), "Snapshot captured");
                self.snapshots.store(data.clone());
                Ok(data)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to capture snapshot");
                Err(Error::Device(e.to_string()))
            }
        }
    }

    async fn start_locked(&self, inner: &mut Inner) -> Result<()> {
        if inner.state != DeviceState::Closed {
            tracing::warn!(state = inner.state.as_str(), "Camera was not closed before open");
            return Ok(());
        }

        let config = self.capture_config().await?;
        tracing::info!(
            width = config.resolution.0,
            height = config.resolution.1,
            frame_rate = config.frame_rate,
            hflip = config.hflip,
            vflip = config.vflip,
            "Opening camera"
        );

        let mut device = (self.factory)().map_err(|e| {
            tracing::warn!(error = %e, "Failed to open camera");
            Error::Device(e.to_string())
        })?;

        if let Err(e) = device.configure(&config) {
            tracing::warn!(error = %e, "Failed to configure camera");
            device.close();
            return Err(Error::Device(e.to_string()));
        }
        inner.state = DeviceState::Open;

        let shared: SharedDevice = Arc::new(StdMutex::new(device));
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(produce_frames(
            Arc::clone(&shared),
            Arc::clone(&self.frames),
            config.frame_rate,
            stop_rx,
        ));

        inner.device = Some(shared);
        inner.producer = Some(Producer {
            stop: stop_tx,
            handle,
        });
        inner.state = DeviceState::Streaming;
        tracing::info!("Video capture started");
        Ok(())
    }

    async fn stop_locked(&self, inner: &mut Inner) {
        if inner.state == DeviceState::Closed {
            tracing::debug!("Camera already closed");
            return;
        }

        // Join the producer before touching the device so no publish can
        // race the close.
        if let Some(producer) = inner.producer.take() {
            let _ = producer.stop.send(true);
            if let Err(e) = producer.handle.await {
                tracing::warn!(error = %e, "Producer task ended abnormally");
            }
        }

        if let Some(device) = inner.device.take() {
            device.lock().expect("device lock").close();
        }
        inner.state = DeviceState::Closed;
        tracing::info!("Video capture stopped");
    }

    async fn capture_config(&self) -> Result<CaptureConfig> {
        let transform = self.settings.transform().await?;
        Ok(CaptureConfig {
            resolution: self.settings.resolution().await?,
            snapshot_resolution: self.settings.snapshot_resolution().await?,
            frame_rate: self.settings.frame_rate().await?,
            hflip: transform.hflip,
            vflip: transform.vflip,
            af_mode: self.settings.af_mode().await?,
            awb_mode: self.settings.awb_mode().await?,
            brightness: self.settings.brightness().await?,
        })
    }
}

/// Producer loop: one frame per tick into the channel until stopped.
async fn produce_frames(
    device: SharedDevice,
    frames: Arc<FrameChannel>,
    frame_rate: f64,
    mut stop: watch::Receiver<bool>,
) {
    let interval = Duration::from_secs_f64(1.0 / frame_rate.max(1.0));
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = ticker.tick() => {
                let result = device.lock().expect("device lock").next_frame();
                match result {
                    Ok(payload) => {
                        frames.publish(payload);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to capture live frame");
                    }
                }
            }
        }
    }
    tracing::debug!("Producer loop exited");
}
