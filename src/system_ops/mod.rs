//! SystemOps - External Operating-System Actions
//!
//! ## Responsibilities
//!
//! - Invoke the named administrative operations (reboot, shutdown,
//!   update check/install, wifi setup, network restart) as external
//!   processes, reporting their exit codes
//! - Read wifi credentials and software versions from their `KEY=value`
//!   config files
//! - Resolve interface addresses
//!
//! Every operation returns an exit code or typed error; nothing here is
//! allowed to take the process down.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Wifi station config (wpa_supplicant).
const WPA_SUPPLICANT_CONF: &str = "/etc/wpa_supplicant/wpa_supplicant.conf";
/// Wifi access-point config (hostapd).
const HOSTAPD_CONF: &str = "/etc/hostapd/hostapd.conf";

/// Station-mode wireless interface.
pub const STA_INTERFACE: &str = "wlan0";
/// Access-point wireless interface.
pub const AP_INTERFACE: &str = "uap0";

/// Adapter over the host system's administrative scripts and tools.
pub struct SystemOps {
    system_dir: PathBuf,
    network_dir: PathBuf,
    updates_dir: PathBuf,
    software_dir: PathBuf,
    wpa_conf: PathBuf,
    hostapd_conf: PathBuf,
}

impl SystemOps {
    /// Create an adapter rooted at the software install directory, which
    /// holds the `system/`, `network/` and `updates/` script trees.
    pub fn new(software_dir: PathBuf) -> Self {
        let system_dir = software_dir.join("system");
        let network_dir = software_dir.join("network");
        let updates_dir = software_dir.join("updates");
        tracing::info!(
            software_dir = %software_dir.display(),
            system_dir = %system_dir.display(),
            network_dir = %network_dir.display(),
            updates_dir = %updates_dir.display(),
            "SystemOps initialized"
        );
        Self {
            system_dir,
            network_dir,
            updates_dir,
            software_dir,
            wpa_conf: PathBuf::from(WPA_SUPPLICANT_CONF),
            hostapd_conf: PathBuf::from(HOSTAPD_CONF),
        }
    }

    /// Override the wifi config file locations (non-standard layouts).
    pub fn with_wifi_conf(mut self, wpa_conf: PathBuf, hostapd_conf: PathBuf) -> Self {
        self.wpa_conf = wpa_conf;
        self.hostapd_conf = hostapd_conf;
        self
    }

    /// Schedule a system reboot a few seconds out, detached so the
    /// response can still be delivered.
    pub async fn schedule_reboot(&self) -> Result<i32> {
        spawn_detached(&["sudo", "-b", "bash", "-c", "sleep 5; reboot"]).await
    }

    /// Schedule a system shutdown a few seconds out.
    pub async fn schedule_shutdown(&self) -> Result<i32> {
        spawn_detached(&["sudo", "-b", "bash", "-c", "sleep 5; shutdown now"]).await
    }

    /// Run the update-check script; exit 0 means the updates tree is
    /// refreshed.
    pub async fn check_updates(&self) -> Result<i32> {
        let script = self.system_dir.join("updates.sh");
        run_command(&script, &["check"]).await
    }

    /// Run the installer for one version.
    pub async fn install_update(&self, version: &str) -> Result<i32> {
        let script = self.system_dir.join("updates.sh");
        run_command(&script, &["install", version]).await
    }

    /// Write new station-mode wifi credentials.
    pub async fn setup_wifi_sta(&self, ssid: &str, password: &str) -> Result<i32> {
        let script = self.network_dir.join("setup-wifi-sta.sh");
        run_command(&script, &[ssid, password]).await
    }

    /// Schedule a wifi restart a few seconds out, detached.
    pub async fn schedule_network_restart(&self) -> Result<i32> {
        let script = self.network_dir.join("restart-wifi.sh");
        let deferred = format!("sleep 5; bash {}", script.display());
        spawn_detached(&["sudo", "-b", "bash", "-c", &deferred]).await
    }

    /// First IPv4 address of an interface, or None when the interface is
    /// down/unconfigured.
    pub async fn interface_address(&self, interface: &str) -> Result<Option<String>> {
        let output = Command::new("ip")
            .args(["-4", "-o", "addr", "show", "dev", interface])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            tracing::debug!(interface = %interface, "No address information");
            return Ok(None);
        }

        let text = String::from_utf8_lossy(&output.stdout);
        Ok(parse_inet_address(&text))
    }

    /// Station-mode (ssid, password) from wpa_supplicant config.
    pub async fn wifi_sta_credentials(&self) -> Result<(Option<String>, Option<String>)> {
        tracing::info!(path = %self.wpa_conf.display(), "Checking wifi STA credentials");
        let content = tokio::fs::read_to_string(&self.wpa_conf).await?;
        Ok((
            find_key_value(&content, "ssid"),
            find_key_value(&content, "psk"),
        ))
    }

    /// Access-point (ssid, password) from hostapd config.
    pub async fn wifi_ap_credentials(&self) -> Result<(Option<String>, Option<String>)> {
        tracing::info!(path = %self.hostapd_conf.display(), "Checking wifi AP credentials");
        let content = tokio::fs::read_to_string(&self.hostapd_conf).await?;
        Ok((
            find_key_value(&content, "ssid"),
            find_key_value(&content, "wpa_passphrase"),
        ))
    }

    /// Installed software version from the install tree's VERSION.txt.
    pub async fn installed_version(&self) -> Result<Option<String>> {
        let path = self.software_dir.join("VERSION.txt");
        let content = tokio::fs::read_to_string(&path).await?;
        Ok(find_key_value(&content, "CURRENT_VERSION"))
    }

    /// (latest, fallback) versions from the updates tree's VERSION.txt.
    pub async fn available_versions(&self) -> Result<(Option<String>, Option<String>)> {
        let path = self.updates_dir.join("VERSION.txt");
        let content = tokio::fs::read_to_string(&path).await?;
        Ok((
            find_key_value(&content, "CURRENT_VERSION"),
            find_key_value(&content, "FALLBACK_VERSION"),
        ))
    }
}

/// Run a command to completion and report its exit code; a signal death
/// reports -1.
async fn run_command(program: &Path, args: &[&str]) -> Result<i32> {
    tracing::info!(program = %program.display(), ?args, "Running external command");
    let output = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    tracing::debug!(stdout = %String::from_utf8_lossy(&output.stdout), "Command stdout");
    tracing::debug!(stderr = %String::from_utf8_lossy(&output.stderr), "Command stderr");

    let code = output.status.code().unwrap_or(-1);
    tracing::debug!(code = code, "Command finished");
    Ok(code)
}

/// Spawn a command without waiting for completion (used for deferred
/// reboot/shutdown/restart, which must outlive this process).
async fn spawn_detached(argv: &[&str]) -> Result<i32> {
    tracing::info!(?argv, "Spawning detached command");
    match Command::new(argv[0]).args(&argv[1..]).spawn() {
        Ok(_) => Ok(0),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to spawn detached command");
            Ok(-1)
        }
    }
}

/// Find `key = value` in a config file body, stripping surrounding
/// quotes from the value.
pub fn find_key_value(content: &str, key: &str) -> Option<String> {
    for line in content.lines() {
        let mut parts = line.splitn(2, '=');
        let k = parts.next()?.trim();
        if k == key {
            if let Some(v) = parts.next() {
                return Some(v.trim().trim_matches('"').to_string());
            }
        }
    }
    None
}

/// Pull the address out of `ip -4 -o addr show` output
/// (`... inet 192.168.1.20/24 ...`).
fn parse_inet_address(output: &str) -> Option<String> {
    let mut tokens = output.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "inet" {
            let addr = tokens.next()?;
            return Some(addr.split('/').next().unwrap_or(addr).to_string());
        }
    }
    None
}

/// Convert a nonzero exit code into an [`Error::External`].
pub fn expect_success(code: i32, what: &str) -> Result<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(Error::External {
            code,
            message: what.to_string(),
        })
    }
}
