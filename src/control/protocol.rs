//! Control protocol message shapes.
//!
//! One logical request per inbound message; one or more responses per
//! request, every one carrying the request's correlation id. Responses
//! are either a result or a coded status.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status code meaning "done / nothing to do" in a status response.
pub const CODE_OK: i32 = 0;
/// Generic failure code used when no external exit status exists.
pub const CODE_ERROR: i32 = -1;

/// An inbound control request.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlRequest {
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

/// Error/status payload inside a status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusBody {
    pub code: i32,
    pub message: String,
}

/// An outbound control response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlResponse {
    Result { result: Value, id: Option<Value> },
    Status { error: StatusBody, id: Option<Value> },
}

impl ControlResponse {
    pub fn result(result: Value, id: Option<Value>) -> Self {
        Self::Result { result, id }
    }

    pub fn status(code: i32, message: impl Into<String>, id: Option<Value>) -> Self {
        Self::Status {
            error: StatusBody {
                code,
                message: message.into(),
            },
            id,
        }
    }
}

/// The closed set of supported methods. Unknown method strings are a
/// typed branch, not a lookup failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    CheckSystemStatus,
    RestartSystem,
    ShutdownSystem,
    CheckSoftwareVersions,
    InstallSoftware,
    CheckWifiApStatus,
    SetupWifiAp,
    CheckWifiStaStatus,
    SetupWifiSta,
    CheckVideoSettings,
    SetupVideo,
}

impl Method {
    /// Map a method string to its variant; `None` is the unsupported
    /// branch.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "check_system_status" => Some(Self::CheckSystemStatus),
            "restart_system" => Some(Self::RestartSystem),
            "shutdown_system" => Some(Self::ShutdownSystem),
            "check_software_versions" => Some(Self::CheckSoftwareVersions),
            "install_software" => Some(Self::InstallSoftware),
            "check_wifi_ap_status" => Some(Self::CheckWifiApStatus),
            "setup_wifi_ap" => Some(Self::SetupWifiAp),
            "check_wifi_sta_status" => Some(Self::CheckWifiStaStatus),
            "setup_wifi_sta" => Some(Self::SetupWifiSta),
            "check_video_settings" => Some(Self::CheckVideoSettings),
            "setup_video" => Some(Self::SetupVideo),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckSystemStatus => "check_system_status",
            Self::RestartSystem => "restart_system",
            Self::ShutdownSystem => "shutdown_system",
            Self::CheckSoftwareVersions => "check_software_versions",
            Self::InstallSoftware => "install_software",
            Self::CheckWifiApStatus => "check_wifi_ap_status",
            Self::SetupWifiAp => "setup_wifi_ap",
            Self::CheckWifiStaStatus => "check_wifi_sta_status",
            Self::SetupWifiSta => "setup_wifi_sta",
            Self::CheckVideoSettings => "check_video_settings",
            Self::SetupVideo => "setup_video",
        }
    }
}
