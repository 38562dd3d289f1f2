//! Application state
//!
//! Holds all shared components and state. Every component is constructed
//! once at startup and handed to the collaborators that need it; there
//! is no global registry.

use crate::capture::CaptureSupervisor;
use crate::config_store::ConfigStore;
use crate::fallback_source::FallbackSource;
use crate::frame_channel::FrameChannel;
use crate::snapshot_channel::SnapshotChannel;
use crate::system_ops::SystemOps;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process configuration: defaults, shallow-merged with an optional JSON
/// config file (file keys win, unspecified keys keep defaults).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Bind host
    pub host: String,
    /// Viewer (HTTP) port
    pub http_port: u16,
    /// Control (WebSocket) port
    pub control_port: u16,
    /// Capture settings file path
    pub video_config: PathBuf,
    /// Static asset directory
    pub www_dir: PathBuf,
    /// Placeholder image shown when no frame is available
    pub logo_file: Option<PathBuf>,
    /// Software install root (holds system/, network/, updates/)
    pub software_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
            control_port: 8090,
            video_config: PathBuf::from("video_config.json"),
            www_dir: PathBuf::from("www"),
            logo_file: Some(PathBuf::from("logo.jpg")),
            software_dir: PathBuf::from(".."),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file over the defaults. A missing
    /// file is not an error; a malformed one is.
    pub async fn load(path: &Path) -> crate::error::Result<Self> {
        match tokio::fs::read(path).await {
            Ok(raw) => {
                let config: Self = serde_json::from_slice(&raw).map_err(|e| {
                    crate::error::Error::Config(format!(
                        "invalid config file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                tracing::info!(path = %path.display(), "Loaded process config");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Process config
    pub config: AppConfig,
    /// Capture settings registry
    pub settings: Arc<ConfigStore>,
    /// Camera lifecycle owner
    pub capture: Arc<CaptureSupervisor>,
    /// Live frame fan-out
    pub frames: Arc<FrameChannel>,
    /// Placeholder supplier
    pub fallback: Arc<FallbackSource>,
    /// Latest high-resolution still
    pub snapshots: Arc<SnapshotChannel>,
    /// External OS operations
    pub system_ops: Arc<SystemOps>,
    /// System health metrics
    pub system_health: Arc<RwLock<SystemHealth>>,
}

/// System health metrics
#[derive(Debug, Clone, Default)]
pub struct SystemHealth {
    pub cpu_percent: f32,
    pub memory_percent: f32,
}

impl SystemHealth {
    pub fn update(&mut self, cpu: f32, memory: f32) {
        self.cpu_percent = cpu;
        self.memory_percent = memory;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_config_file_uses_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/camera.json"))
            .await
            .expect("defaults");
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.control_port, 8090);
    }

    #[tokio::test]
    async fn test_config_file_overrides_partially() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("camera.json");
        std::fs::write(&path, r#"{"control_port": 9001}"#).expect("write config");

        let config = AppConfig::load(&path).await.expect("load");
        assert_eq!(config.control_port, 9001);
        // Unspecified keys keep their defaults.
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.video_config, PathBuf::from("video_config.json"));
    }

    #[tokio::test]
    async fn test_malformed_config_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("camera.json");
        std::fs::write(&path, "{not json").expect("write config");
        assert!(AppConfig::load(&path).await.is_err());
    }
}
