//! Per-connection command router.
//!
//! Each handler follows the same contract: read the current state; a
//! request that changes nothing yields a code-0 "no change" status and
//! performs no side effect; applied changes are persisted before the
//! acknowledgment; fields that require reopening the device trigger
//! exactly one restart after the whole message has been validated and
//! applied. Failures become status responses carrying the external exit
//! code where one exists, -1 otherwise.

use super::protocol::{ControlRequest, ControlResponse, Method, CODE_ERROR, CODE_OK};
use crate::capture::DeviceControl;
use crate::config_store::{setting_names, SelectOutcome};
use crate::error::{Error, Result};
use crate::state::AppState;
use crate::system_ops::{AP_INTERFACE, STA_INTERFACE};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// Outbound side of one control connection. Handlers may emit several
/// responses per request (e.g. an "in progress" notice before a final
/// status); order is preserved.
pub struct Responder {
    tx: mpsc::UnboundedSender<String>,
}

impl Responder {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }

    pub fn send(&self, response: &ControlResponse) {
        match serde_json::to_string(response) {
            Ok(text) => {
                tracing::info!(response = %text, "Send response");
                if self.tx.send(text).is_err() {
                    tracing::debug!("Control connection closed before response");
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to serialize response"),
        }
    }
}

/// Requested capture-setting changes; every field is optional and every
/// present field is validated before anything is applied.
#[derive(Debug, Default, Deserialize)]
struct VideoParams {
    af_mode: Option<usize>,
    awb_mode: Option<usize>,
    brightness: Option<f64>,
    transform: Option<usize>,
    frame_rate: Option<usize>,
    resolution: Option<usize>,
    snapshot_resolution: Option<usize>,
}

/// Command router for one control connection.
pub struct ControlDispatcher {
    state: AppState,
}

impl ControlDispatcher {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Route one request. Always emits at least one response carrying the
    /// request id.
    pub async fn handle(&self, request: ControlRequest, out: &Responder) {
        let id = request.id.clone();
        let Some(method) = Method::parse(&request.method) else {
            tracing::warn!(method = %request.method, "Unsupported method");
            out.send(&ControlResponse::status(CODE_ERROR, "Unsupported method", id));
            return;
        };

        tracing::info!(method = method.as_str(), "Handling control request");
        let outcome = match method {
            Method::CheckSystemStatus => self.check_system_status(&id, out).await,
            Method::RestartSystem => self.restart_system(&id, out).await,
            Method::ShutdownSystem => self.shutdown_system(&id, out).await,
            Method::CheckSoftwareVersions => self.check_software_versions(&id, out).await,
            Method::InstallSoftware => self.install_software(request.params, &id, out).await,
            Method::CheckWifiApStatus => self.check_wifi_ap_status(&id, out).await,
            Method::SetupWifiAp => Err(Error::NotImplemented("setup_wifi_ap".to_string())),
            Method::CheckWifiStaStatus => self.check_wifi_sta_status(&id, out).await,
            Method::SetupWifiSta => self.setup_wifi_sta(request.params, &id, out).await,
            Method::CheckVideoSettings => self.check_video_settings(&id, out).await,
            Method::SetupVideo => self.setup_video(request.params, &id, out).await,
        };

        if let Err(e) = outcome {
            tracing::warn!(method = method.as_str(), error = %e, "Control request failed");
            out.send(&ControlResponse::status(e.control_code(), e.to_string(), id));
        }
    }

    async fn check_system_status(&self, id: &Option<Value>, out: &Responder) -> Result<()> {
        let health = self.state.system_health.read().await.clone();
        let result = json!({
            "hostname": sysinfo::System::host_name(),
            "device_state": self.state.capture.state().await.as_str(),
            "cpu_percent": health.cpu_percent,
            "memory_percent": health.memory_percent,
            "checked_at": chrono::Utc::now().to_rfc3339(),
        });
        out.send(&ControlResponse::result(result, id.clone()));
        Ok(())
    }

    async fn restart_system(&self, id: &Option<Value>, out: &Responder) -> Result<()> {
        tracing::warn!("System restart requested");
        let code = self.state.system_ops.schedule_reboot().await?;
        if code == 0 {
            // The connection will drop; tell the client to come back.
            out.send(&ControlResponse::status(
                CODE_ERROR,
                "System restart, please reconnect later",
                id.clone(),
            ));
        } else {
            out.send(&ControlResponse::status(
                code,
                "Failed to restart the system",
                id.clone(),
            ));
        }
        Ok(())
    }

    async fn shutdown_system(&self, id: &Option<Value>, out: &Responder) -> Result<()> {
        tracing::warn!("System shutdown requested");
        let code = self.state.system_ops.schedule_shutdown().await?;
        if code == 0 {
            out.send(&ControlResponse::status(
                CODE_ERROR,
                "System shutdown in seconds",
                id.clone(),
            ));
        } else {
            out.send(&ControlResponse::status(
                code,
                "Failed to shutdown the system",
                id.clone(),
            ));
        }
        Ok(())
    }

    async fn check_software_versions(&self, id: &Option<Value>, out: &Responder) -> Result<()> {
        match self.state.system_ops.check_updates().await {
            Ok(0) => out.send(&ControlResponse::status(
                CODE_OK,
                "Software updates checked successfully",
                id.clone(),
            )),
            Ok(code) => out.send(&ControlResponse::status(
                code,
                "Failed to check software updates",
                id.clone(),
            )),
            Err(e) => {
                tracing::warn!(error = %e, "Update check failed to run");
                out.send(&ControlResponse::status(
                    CODE_ERROR,
                    "Error checking software updates",
                    id.clone(),
                ));
            }
        }

        let installed = self
            .state
            .system_ops
            .installed_version()
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to read installed version");
                None
            });
        let (latest, fallback) = self
            .state
            .system_ops
            .available_versions()
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to read available versions");
                (None, None)
            });

        out.send(&ControlResponse::result(
            json!({
                "installed_version": installed,
                "latest_version": latest,
                "fallback_version": fallback,
            }),
            id.clone(),
        ));
        Ok(())
    }

    async fn install_software(
        &self,
        params: Option<Value>,
        id: &Option<Value>,
        out: &Responder,
    ) -> Result<()> {
        let version = params
            .as_ref()
            .and_then(|p| p.get("version"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let Some(version) = version else {
            out.send(&ControlResponse::status(
                CODE_ERROR,
                "Software version is not set",
                id.clone(),
            ));
            return Ok(());
        };

        let installed = self.state.system_ops.installed_version().await.ok().flatten();
        if installed.as_deref() == Some(version.as_str()) {
            out.send(&ControlResponse::status(
                CODE_OK,
                format!("Software {} is already installed, no change", version),
                id.clone(),
            ));
            return Ok(());
        }

        tracing::info!(version = %version, "Installing software");
        out.send(&ControlResponse::status(
            CODE_OK,
            "Installation takes time, please wait...",
            id.clone(),
        ));

        let code = self.state.system_ops.install_update(&version).await?;
        if code == 0 {
            out.send(&ControlResponse::status(
                CODE_OK,
                format!("Software {} installed successfully", version),
                id.clone(),
            ));
            self.restart_system(id, out).await
        } else {
            out.send(&ControlResponse::status(
                code,
                format!("Failed to install software {}", version),
                id.clone(),
            ));
            Ok(())
        }
    }

    async fn check_wifi_ap_status(&self, id: &Option<Value>, out: &Responder) -> Result<()> {
        let (ssid, password) = self
            .state
            .system_ops
            .wifi_ap_credentials()
            .await
            .map_err(|e| Error::Internal(format!("failed to read WiFi AP settings: {}", e)))?;
        let address = self.state.system_ops.interface_address(AP_INTERFACE).await?;
        if ssid.is_none() {
            tracing::info!("WiFi AP is not set up");
        }
        out.send(&ControlResponse::result(
            json!({
                "setup": { "ssid": ssid, "password": password },
                "address": address,
            }),
            id.clone(),
        ));
        Ok(())
    }

    async fn check_wifi_sta_status(&self, id: &Option<Value>, out: &Responder) -> Result<()> {
        let (ssid, password) = self
            .state
            .system_ops
            .wifi_sta_credentials()
            .await
            .map_err(|e| Error::Internal(format!("failed to read WiFi STA settings: {}", e)))?;
        let address = self.state.system_ops.interface_address(STA_INTERFACE).await?;
        if ssid.is_none() {
            tracing::info!("WiFi STA is not set up");
        }
        out.send(&ControlResponse::result(
            json!({
                "setup": { "ssid": ssid, "password": password },
                "address": address,
            }),
            id.clone(),
        ));
        Ok(())
    }

    async fn setup_wifi_sta(
        &self,
        params: Option<Value>,
        id: &Option<Value>,
        out: &Responder,
    ) -> Result<()> {
        let params = params.unwrap_or(Value::Null);
        let Some(ssid) = params.get("ssid").and_then(|v| v.as_str()) else {
            out.send(&ControlResponse::status(
                CODE_ERROR,
                "WiFi SSID is not set",
                id.clone(),
            ));
            return Ok(());
        };
        let password = params.get("password").and_then(|v| v.as_str()).unwrap_or("");

        let (current_ssid, current_password) = self
            .state
            .system_ops
            .wifi_sta_credentials()
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to read current WiFi settings");
                (None, None)
            });

        if current_ssid.as_deref() == Some(ssid)
            && current_password.as_deref().unwrap_or("") == password
        {
            out.send(&ControlResponse::status(
                CODE_OK,
                "WiFi settings unchanged",
                id.clone(),
            ));
            return Ok(());
        }

        let code = self.state.system_ops.setup_wifi_sta(ssid, password).await?;
        if code != 0 {
            out.send(&ControlResponse::status(
                code,
                "Failed to change WiFi settings",
                id.clone(),
            ));
            return Ok(());
        }
        out.send(&ControlResponse::status(
            CODE_OK,
            "WiFi settings changed",
            id.clone(),
        ));

        tracing::info!("Restarting network to apply WiFi settings");
        let code = self.state.system_ops.schedule_network_restart().await?;
        if code == 0 {
            out.send(&ControlResponse::status(
                CODE_ERROR,
                "Network restart, please reconnect later",
                id.clone(),
            ));
        } else {
            out.send(&ControlResponse::status(
                code,
                "Failed to restart network",
                id.clone(),
            ));
        }
        Ok(())
    }

    async fn check_video_settings(&self, id: &Option<Value>, out: &Responder) -> Result<()> {
        let document = self.state.settings.document().await;
        out.send(&ControlResponse::result(
            serde_json::to_value(document)?,
            id.clone(),
        ));
        Ok(())
    }

    async fn setup_video(
        &self,
        params: Option<Value>,
        id: &Option<Value>,
        out: &Responder,
    ) -> Result<()> {
        let params: VideoParams = match params {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| Error::Validation(format!("invalid setup_video params: {}", e)))?,
            None => VideoParams::default(),
        };

        let settings = &self.state.settings;

        // Validate the whole request before touching anything; a single
        // bad field rejects the message with zero side effects.
        for (name, requested) in [
            (setting_names::AF_MODE, params.af_mode),
            (setting_names::AWB_MODE, params.awb_mode),
            (setting_names::TRANSFORM, params.transform),
            (setting_names::FRAME_RATE, params.frame_rate),
            (setting_names::RESOLUTION, params.resolution),
            (setting_names::SNAPSHOT_RESOLUTION, params.snapshot_resolution),
        ] {
            if let Some(index) = requested {
                settings.validate_select(name, index).await?;
            }
        }
        if let Some(value) = params.brightness {
            settings.validate_value(setting_names::BRIGHTNESS, value).await?;
        }

        let mut notices: Vec<String> = Vec::new();
        let mut need_restart = false;

        // In-place controls: pushed to the open device immediately; a
        // closed device just keeps the persisted value for its next open.
        if let Some(index) = params.af_mode {
            if let SelectOutcome::Changed(value) = settings.select(setting_names::AF_MODE, index).await? {
                self.push_control(DeviceControl::AfMode, &value).await;
                notices.push("Video AF mode changed".to_string());
            }
        }
        if let Some(index) = params.awb_mode {
            if let SelectOutcome::Changed(value) = settings.select(setting_names::AWB_MODE, index).await? {
                self.push_control(DeviceControl::AwbMode, &value).await;
                notices.push("Video AWB mode changed".to_string());
            }
        }
        if let Some(value) = params.brightness {
            if settings.set_value(setting_names::BRIGHTNESS, value).await?.changed() {
                self.push_control(DeviceControl::Brightness, &json!(value)).await;
                notices.push("Video brightness changed".to_string());
            }
        }

        // Settings that require reopening the device.
        for (name, requested, notice) in [
            (setting_names::TRANSFORM, params.transform, "Video transform changed"),
            (setting_names::FRAME_RATE, params.frame_rate, "Video frame rate changed"),
            (setting_names::RESOLUTION, params.resolution, "Video resolution changed"),
            (
                setting_names::SNAPSHOT_RESOLUTION,
                params.snapshot_resolution,
                "Video snapshot resolution changed",
            ),
        ] {
            if let Some(index) = requested {
                if settings.select(name, index).await?.changed() {
                    notices.push(notice.to_string());
                    need_restart = true;
                }
            }
        }

        if notices.is_empty() {
            out.send(&ControlResponse::status(
                CODE_OK,
                "Video settings unchanged",
                id.clone(),
            ));
            return Ok(());
        }

        settings.save().await?;
        for notice in notices {
            out.send(&ControlResponse::status(CODE_OK, notice, id.clone()));
        }

        if need_restart {
            tracing::warn!("Restarting video capture to apply configuration");
            if let Err(e) = self.state.capture.restart().await {
                tracing::warn!(error = %e, "Video restart failed");
                out.send(&ControlResponse::status(
                    CODE_ERROR,
                    "Failed to restart video capture",
                    id.clone(),
                ));
            }
        }
        Ok(())
    }

    async fn push_control(&self, control: DeviceControl, value: &Value) {
        let Some(value) = value.as_f64() else {
            tracing::warn!(control = control.as_str(), "Control value is not numeric");
            return;
        };
        // The supervisor logs failures; the persisted setting still takes
        // effect at the next device start.
        let _ = self.state.capture.apply_control(control, value).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureSupervisor, DeviceFactory, PatternCamera};
    use crate::config_store::ConfigStore;
    use crate::fallback_source::FallbackSource;
    use crate::frame_channel::FrameChannel;
    use crate::snapshot_channel::SnapshotChannel;
    use crate::state::{AppConfig, SystemHealth};
    use crate::system_ops::SystemOps;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::RwLock;

    struct Fixture {
        dir: tempfile::TempDir,
        dispatcher: ControlDispatcher,
        responder: Responder,
        rx: mpsc::UnboundedReceiver<String>,
        opens: Arc<AtomicUsize>,
        settings_path: std::path::PathBuf,
    }

    impl Fixture {
        async fn handle(&mut self, request: serde_json::Value) -> Vec<Value> {
            let request: ControlRequest = serde_json::from_value(request).expect("request");
            self.dispatcher.handle(request, &self.responder).await;
            let mut responses = Vec::new();
            while let Ok(text) = self.rx.try_recv() {
                responses.push(serde_json::from_str(&text).expect("response json"));
            }
            responses
        }
    }

    fn write_script(path: &Path, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::write(path, body).expect("write script");
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings_path = dir.path().join("video_config.json");
        let settings = Arc::new(ConfigStore::load(settings_path.clone()).await.expect("settings"));
        // Small frames keep encodes cheap.
        settings
            .select(setting_names::RESOLUTION, 0)
            .await
            .expect("resolution");
        settings
            .select(setting_names::SNAPSHOT_RESOLUTION, 0)
            .await
            .expect("snapshot resolution");

        let frames = Arc::new(FrameChannel::new());
        let snapshots = Arc::new(SnapshotChannel::new());
        let opens = Arc::new(AtomicUsize::new(0));
        let factory_opens = opens.clone();
        let factory: DeviceFactory = Box::new(move || {
            factory_opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(PatternCamera::new()))
        });
        let capture = Arc::new(CaptureSupervisor::new(
            factory,
            settings.clone(),
            frames.clone(),
            snapshots.clone(),
        ));

        let software_dir = dir.path().join("software");
        std::fs::create_dir_all(software_dir.join("system")).expect("system dir");
        std::fs::create_dir_all(software_dir.join("network")).expect("network dir");
        std::fs::create_dir_all(software_dir.join("updates")).expect("updates dir");
        let system_ops = Arc::new(
            SystemOps::new(software_dir).with_wifi_conf(
                dir.path().join("wpa_supplicant.conf"),
                dir.path().join("hostapd.conf"),
            ),
        );

        let state = AppState {
            config: AppConfig::default(),
            settings,
            capture,
            frames,
            fallback: Arc::new(FallbackSource::new(None).expect("fallback")),
            snapshots,
            system_ops,
            system_health: Arc::new(RwLock::new(SystemHealth::default())),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        Fixture {
            dir,
            dispatcher: ControlDispatcher::new(state),
            responder: Responder::new(tx),
            rx,
            opens,
            settings_path,
        }
    }

    #[tokio::test]
    async fn test_unknown_method_yields_coded_error_with_id() {
        let mut fx = fixture().await;
        let responses = fx
            .handle(json!({"method": "unknown_x", "id": 7}))
            .await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["error"]["code"], -1);
        assert_eq!(responses[0]["error"]["message"], "Unsupported method");
        assert_eq!(responses[0]["id"], 7);
    }

    #[tokio::test]
    async fn test_known_method_echoes_id() {
        let mut fx = fixture().await;
        let responses = fx
            .handle(json!({"method": "check_video_settings", "id": 42}))
            .await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], 42);
        assert_eq!(responses[0]["result"]["version"], "1.0");
        assert_eq!(responses[0]["result"]["frame_rate"]["selected"], 3);
    }

    #[tokio::test]
    async fn test_setup_video_no_change_is_noop() {
        let mut fx = fixture().await;
        // Index 0 is already selected for resolution in this fixture.
        let responses = fx
            .handle(json!({"method": "setup_video", "params": {"resolution": 0}, "id": 1}))
            .await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["error"]["code"], 0);
        assert_eq!(responses[0]["error"]["message"], "Video settings unchanged");
        // No persistence on a no-op.
        assert!(!fx.settings_path.exists());
    }

    #[tokio::test]
    async fn test_setup_video_invalid_index_rejects_whole_message() {
        let mut fx = fixture().await;
        let responses = fx
            .handle(json!({
                "method": "setup_video",
                "params": {"frame_rate": 1, "resolution": 99},
                "id": 2
            }))
            .await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["error"]["code"], -1);
        assert_eq!(responses[0]["id"], 2);
        // The valid field was not applied either.
        let doc = fx.dispatcher.state.settings.document().await;
        match doc.entries.get(setting_names::FRAME_RATE).expect("entry") {
            crate::config_store::SettingEntry::Options(set) => assert_eq!(set.selected, 3),
            _ => panic!("frame_rate is an option set"),
        }
        assert!(!fx.settings_path.exists());
    }

    #[tokio::test]
    async fn test_setup_video_coalesces_restart() {
        let mut fx = fixture().await;
        fx.dispatcher.state.capture.start().await.expect("start");
        assert_eq!(fx.opens.load(Ordering::SeqCst), 1);

        let responses = fx
            .handle(json!({
                "method": "setup_video",
                "params": {"resolution": 1, "frame_rate": 0},
                "id": 3
            }))
            .await;

        // Both fields changed, one restart.
        assert_eq!(fx.opens.load(Ordering::SeqCst), 2);
        let messages: Vec<String> = responses
            .iter()
            .map(|r| r["error"]["message"].as_str().unwrap_or_default().to_string())
            .collect();
        assert!(messages.iter().any(|m| m.contains("frame rate")));
        assert!(messages.iter().any(|m| m.contains("resolution")));
        assert!(responses.iter().all(|r| r["error"]["code"] == 0));
        assert!(fx.settings_path.exists());

        fx.dispatcher.state.capture.stop().await;
    }

    #[tokio::test]
    async fn test_setup_video_control_change_does_not_restart() {
        let mut fx = fixture().await;
        fx.dispatcher.state.capture.start().await.expect("start");

        let responses = fx
            .handle(json!({"method": "setup_video", "params": {"brightness": 0.5}, "id": 4}))
            .await;
        assert_eq!(fx.opens.load(Ordering::SeqCst), 1, "no reopen for brightness");
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["error"]["code"], 0);
        assert!(fx.settings_path.exists());

        fx.dispatcher.state.capture.stop().await;
    }

    #[tokio::test]
    async fn test_setup_wifi_sta_is_idempotent() {
        let mut fx = fixture().await;
        let conf = fx.dir.path().join("wpa_supplicant.conf");
        let log = fx.dir.path().join("calls.log");
        let script = fx.dir.path().join("software/network/setup-wifi-sta.sh");
        write_script(
            &script,
            &format!(
                "#!/bin/sh\necho called >> {}\nprintf 'ssid=\"%s\"\\npsk=\"%s\"\\n' \"$1\" \"$2\" > {}\nexit 0\n",
                log.display(),
                conf.display()
            ),
        );

        let request = json!({
            "method": "setup_wifi_sta",
            "params": {"ssid": "LabNet", "password": "hunter2"},
            "id": 5
        });

        let responses = fx.handle(request.clone()).await;
        let messages: Vec<String> = responses
            .iter()
            .map(|r| r["error"]["message"].as_str().unwrap_or_default().to_string())
            .collect();
        assert!(messages.iter().any(|m| m == "WiFi settings changed"));
        let calls = std::fs::read_to_string(&log).expect("call log");
        assert_eq!(calls.lines().count(), 1);

        // Same request again: the external operation is not invoked.
        let responses = fx.handle(request).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["error"]["code"], 0);
        assert_eq!(responses[0]["error"]["message"], "WiFi settings unchanged");
        let calls = std::fs::read_to_string(&log).expect("call log");
        assert_eq!(calls.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_setup_wifi_sta_requires_ssid() {
        let mut fx = fixture().await;
        let responses = fx
            .handle(json!({"method": "setup_wifi_sta", "params": {}, "id": 6}))
            .await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["error"]["message"], "WiFi SSID is not set");
    }

    #[tokio::test]
    async fn test_setup_wifi_ap_is_not_implemented() {
        let mut fx = fixture().await;
        let responses = fx
            .handle(json!({"method": "setup_wifi_ap", "params": {"ssid": "x"}, "id": 8}))
            .await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["error"]["code"], -1);
        assert!(responses[0]["error"]["message"]
            .as_str()
            .expect("message")
            .contains("Not implemented"));
        assert_eq!(responses[0]["id"], 8);
    }

    #[tokio::test]
    async fn test_install_software_already_installed_is_noop() {
        let mut fx = fixture().await;
        std::fs::write(
            fx.dir.path().join("software/VERSION.txt"),
            "CURRENT_VERSION=2.0.0\n",
        )
        .expect("version file");

        // No updates.sh exists: reaching the installer would error, so a
        // single code-0 response proves it was never invoked.
        let responses = fx
            .handle(json!({"method": "install_software", "params": {"version": "2.0.0"}, "id": 9}))
            .await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["error"]["code"], 0);
        assert!(responses[0]["error"]["message"]
            .as_str()
            .expect("message")
            .contains("no change"));
    }

    #[tokio::test]
    async fn test_install_software_requires_version() {
        let mut fx = fixture().await;
        let responses = fx
            .handle(json!({"method": "install_software", "id": 10}))
            .await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["error"]["message"], "Software version is not set");
    }

    #[tokio::test]
    async fn test_check_software_versions_reports_files() {
        let mut fx = fixture().await;
        write_script(
            &fx.dir.path().join("software/system/updates.sh"),
            "#!/bin/sh\nexit 0\n",
        );
        std::fs::write(
            fx.dir.path().join("software/VERSION.txt"),
            "CURRENT_VERSION=1.2.0\n",
        )
        .expect("installed");
        std::fs::write(
            fx.dir.path().join("software/updates/VERSION.txt"),
            "CURRENT_VERSION=1.3.0\nFALLBACK_VERSION=1.1.0\n",
        )
        .expect("available");

        let responses = fx
            .handle(json!({"method": "check_software_versions", "id": 11}))
            .await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["error"]["code"], 0);
        assert_eq!(responses[1]["result"]["installed_version"], "1.2.0");
        assert_eq!(responses[1]["result"]["latest_version"], "1.3.0");
        assert_eq!(responses[1]["result"]["fallback_version"], "1.1.0");
        assert_eq!(responses[1]["id"], 11);
    }

    #[tokio::test]
    async fn test_check_system_status_reports_device_state() {
        let mut fx = fixture().await;
        let responses = fx
            .handle(json!({"method": "check_system_status", "id": 12}))
            .await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["result"]["device_state"], "closed");
        assert_eq!(responses[0]["id"], 12);
    }
}
