//! Livecam Server Library
//!
//! Live video delivery from one camera sensor to any number of viewers,
//! with on-demand snapshots and a bidirectional control protocol.
//!
//! ## Architecture (components in dependency order)
//!
//! 1. FrameChannel - single-slot overwrite broadcast from the producer
//! 2. FallbackSource - placeholder supplier for degraded streams
//! 3. SnapshotChannel - latest high-resolution still
//! 4. CaptureSupervisor - camera lifecycle and frame production
//! 5. StreamSession - per-viewer MJPEG delivery
//! 6. ConfigStore - validated capture settings
//! 7. Control plane - WebSocket command protocol
//! 8. SystemOps - external OS operations
//! 9. WebAPI - viewer HTTP endpoints
//!
//! ## Design Principles
//!
//! - One owner per resource: the supervisor is the only device holder,
//!   the frame channel the only producer/viewer shared state
//! - Degrade, never die: device and external failures surface as logged
//!   warnings and fallback content, not process exits

pub mod capture;
pub mod config_store;
pub mod control;
pub mod error;
pub mod fallback_source;
pub mod frame_channel;
pub mod snapshot_channel;
pub mod state;
pub mod stream_session;
pub mod system_ops;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
