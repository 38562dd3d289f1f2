//! Camera device abstraction.
//!
//! The sensor driver is an opaque capability behind [`CameraDevice`]:
//! configure it, pull encoded stream frames, grab one high-resolution
//! still, close it. The supervisor owns exactly one device at a time and
//! is the only caller.

use bytes::Bytes;

/// Result type for device operations.
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// Driver-level failures. These never escape the supervisor unconverted;
/// it degrades each one to a logged warning and a safe state.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("open failed: {0}")]
    Open(String),
    #[error("configure failed: {0}")]
    Configure(String),
    #[error("capture failed: {0}")]
    Capture(String),
    #[error("control {name} rejected: {reason}")]
    Control { name: String, reason: String },
}

/// Device lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Closed,
    Open,
    Streaming,
}

impl DeviceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Closed => "closed",
            DeviceState::Open => "open",
            DeviceState::Streaming => "streaming",
        }
    }
}

/// Controls that apply in place, without reopening the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceControl {
    AfMode,
    AwbMode,
    Brightness,
}

impl DeviceControl {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceControl::AfMode => "af_mode",
            DeviceControl::AwbMode => "awb_mode",
            DeviceControl::Brightness => "brightness",
        }
    }
}

/// Full configuration applied when the device opens.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Streaming resolution (width, height)
    pub resolution: (u32, u32),
    /// Still-capture resolution (width, height)
    pub snapshot_resolution: (u32, u32),
    /// Frames per second
    pub frame_rate: f64,
    /// Horizontal flip
    pub hflip: bool,
    /// Vertical flip
    pub vflip: bool,
    /// Autofocus mode identifier
    pub af_mode: i64,
    /// White-balance mode identifier
    pub awb_mode: i64,
    /// Brightness offset in [-1, 1]
    pub brightness: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            resolution: (1280, 720),
            snapshot_resolution: (3840, 2160),
            frame_rate: 25.0,
            hflip: false,
            vflip: false,
            af_mode: 2,
            awb_mode: 1,
            brightness: 0.0,
        }
    }
}

/// Abstraction over one camera sensor.
pub trait CameraDevice: Send {
    /// Apply the full configuration. Called once after open, before any
    /// frame is pulled.
    fn configure(&mut self, config: &CaptureConfig) -> DeviceResult<()>;

    /// Pull the next encoded stream frame (JPEG) at the configured
    /// streaming resolution.
    fn next_frame(&mut self) -> DeviceResult<Bytes>;

    /// Capture one encoded still (PNG) at the configured snapshot
    /// resolution, via the secondary capture path; safe to interleave
    /// with `next_frame`.
    fn capture_still(&mut self) -> DeviceResult<Bytes>;

    /// Apply one in-place control.
    fn set_control(&mut self, control: DeviceControl, value: f64) -> DeviceResult<()>;

    /// Release the sensor.
    fn close(&mut self);
}

/// Factory used by the supervisor to open the device; opening is the
/// factory call itself.
pub type DeviceFactory = Box<dyn Fn() -> DeviceResult<Box<dyn CameraDevice>> + Send + Sync>;
