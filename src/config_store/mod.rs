//! ConfigStore - Validated Capture Settings
//!
//! ## Responsibilities
//!
//! - Single source of truth for capture settings (option sets and ranges)
//! - Validated mutation: out-of-range indices/values are rejected, a
//!   same-value write reports `Unchanged` and performs no side effect
//! - JSON persistence: compiled-in defaults shallow-merged with an
//!   optional override file, explicit save

mod types;

pub use types::{
    default_settings, setting_names, NamedOption, OptionSet, RangeSetting, SettingEntry,
    SettingsDoc, Transform,
};

use crate::error::{Error, Result};
use std::path::PathBuf;
use tokio::sync::RwLock;

/// Outcome of a mutating call.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectOutcome {
    /// The requested state equals the current state; nothing was written.
    Unchanged,
    /// The setting changed; carries the newly effective value.
    Changed(serde_json::Value),
}

impl SelectOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, SelectOutcome::Changed(_))
    }
}

/// Validated, persistable settings registry.
pub struct ConfigStore {
    path: PathBuf,
    doc: RwLock<SettingsDoc>,
}

impl ConfigStore {
    /// Load settings: compiled-in defaults, with the override file (if it
    /// exists) merged over them per top-level key.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let mut doc = default_settings();

        match tokio::fs::read(&path).await {
            Ok(raw) => {
                let overrides: serde_json::Map<String, serde_json::Value> =
                    serde_json::from_slice(&raw)?;
                tracing::info!(path = %path.display(), keys = overrides.len(), "Loaded settings overrides");
                for (key, value) in overrides {
                    if key == "version" {
                        doc.version = value.as_str().unwrap_or(&doc.version).to_string();
                        continue;
                    }
                    let entry: SettingEntry = serde_json::from_value(value).map_err(|e| {
                        Error::Config(format!("invalid settings entry {}: {}", key, e))
                    })?;
                    doc.entries.insert(key, entry);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No settings file, using defaults");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            path,
            doc: RwLock::new(doc),
        })
    }

    /// Persist the full settings document.
    pub async fn save(&self) -> Result<()> {
        let doc = self.doc.read().await;
        let text = serde_json::to_string_pretty(&*doc)?;
        tokio::fs::write(&self.path, text).await?;
        tracing::info!(path = %self.path.display(), "Settings saved");
        Ok(())
    }

    /// A clone of the full document, for introspection/UI population.
    pub async fn document(&self) -> SettingsDoc {
        self.doc.read().await.clone()
    }

    /// The full entry for one setting (options plus selection, or range
    /// plus value).
    pub async fn entry(&self, name: &str) -> Result<SettingEntry> {
        let doc = self.doc.read().await;
        doc.entries
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("setting {}", name)))
    }

    /// The currently effective value: the selected option's value for an
    /// option set, the numeric value for a range.
    pub async fn selected(&self, name: &str) -> Result<serde_json::Value> {
        match self.entry(name).await? {
            SettingEntry::Options(set) => Ok(set.selected_option().value.clone()),
            SettingEntry::Range(range) => Ok(serde_json::json!(range.value)),
        }
    }

    /// Check that `index` would be a valid selection, without mutating.
    pub async fn validate_select(&self, name: &str, index: usize) -> Result<()> {
        match self.entry(name).await? {
            SettingEntry::Options(set) => {
                if index < set.options.len() {
                    Ok(())
                } else {
                    Err(Error::Validation(format!(
                        "option index {} out of range for {}",
                        index, name
                    )))
                }
            }
            SettingEntry::Range(_) => Err(Error::Validation(format!(
                "{} is a range setting, not an option set",
                name
            ))),
        }
    }

    /// Check that `value` would be in range, without mutating.
    pub async fn validate_value(&self, name: &str, value: f64) -> Result<()> {
        match self.entry(name).await? {
            SettingEntry::Range(range) => {
                if value >= range.range[0] && value <= range.range[1] {
                    Ok(())
                } else {
                    Err(Error::Validation(format!(
                        "value {} out of range for {}",
                        value, name
                    )))
                }
            }
            SettingEntry::Options(_) => Err(Error::Validation(format!(
                "{} is an option set, not a range setting",
                name
            ))),
        }
    }

    /// Change the selected index of an option set.
    ///
    /// Selecting the current index reports `Unchanged` and writes nothing.
    /// An out-of-range index or unknown name fails and leaves the
    /// selection untouched.
    pub async fn select(&self, name: &str, index: usize) -> Result<SelectOutcome> {
        let mut doc = self.doc.write().await;
        let entry = doc
            .entries
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(format!("setting {}", name)))?;

        match entry {
            SettingEntry::Options(set) => {
                if index >= set.options.len() {
                    return Err(Error::Validation(format!(
                        "option index {} out of range for {}",
                        index, name
                    )));
                }
                if set.selected == index {
                    return Ok(SelectOutcome::Unchanged);
                }
                set.selected = index;
                let value = set.selected_option().value.clone();
                tracing::info!(setting = %name, index = index, "Setting selection changed");
                Ok(SelectOutcome::Changed(value))
            }
            SettingEntry::Range(_) => Err(Error::Validation(format!(
                "{} is a range setting, not an option set",
                name
            ))),
        }
    }

    /// Change the value of a range setting, validated against its bounds.
    pub async fn set_value(&self, name: &str, value: f64) -> Result<SelectOutcome> {
        let mut doc = self.doc.write().await;
        let entry = doc
            .entries
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(format!("setting {}", name)))?;

        match entry {
            SettingEntry::Range(range) => {
                if value < range.range[0] || value > range.range[1] {
                    return Err(Error::Validation(format!(
                        "value {} out of range for {}",
                        value, name
                    )));
                }
                if range.value == value {
                    return Ok(SelectOutcome::Unchanged);
                }
                range.value = value;
                tracing::info!(setting = %name, value = value, "Setting value changed");
                Ok(SelectOutcome::Changed(serde_json::json!(value)))
            }
            SettingEntry::Options(_) => Err(Error::Validation(format!(
                "{} is an option set, not a range setting",
                name
            ))),
        }
    }

    // Typed accessors for the capture layer.

    /// Streaming resolution as (width, height).
    pub async fn resolution(&self) -> Result<(u32, u32)> {
        resolution_pair(self.selected(setting_names::RESOLUTION).await?)
    }

    /// Snapshot resolution as (width, height).
    pub async fn snapshot_resolution(&self) -> Result<(u32, u32)> {
        resolution_pair(self.selected(setting_names::SNAPSHOT_RESOLUTION).await?)
    }

    /// Frame rate in frames per second.
    pub async fn frame_rate(&self) -> Result<f64> {
        let value = self.selected(setting_names::FRAME_RATE).await?;
        value
            .as_f64()
            .ok_or_else(|| Error::Config("frame_rate value is not numeric".to_string()))
    }

    /// Orientation flags.
    pub async fn transform(&self) -> Result<Transform> {
        let value = self.selected(setting_names::TRANSFORM).await?;
        serde_json::from_value(value)
            .map_err(|e| Error::Config(format!("invalid transform value: {}", e)))
    }

    /// Autofocus mode identifier.
    pub async fn af_mode(&self) -> Result<i64> {
        mode_id(self.selected(setting_names::AF_MODE).await?, setting_names::AF_MODE)
    }

    /// White-balance mode identifier.
    pub async fn awb_mode(&self) -> Result<i64> {
        mode_id(self.selected(setting_names::AWB_MODE).await?, setting_names::AWB_MODE)
    }

    /// Brightness offset.
    pub async fn brightness(&self) -> Result<f64> {
        let value = self.selected(setting_names::BRIGHTNESS).await?;
        value
            .as_f64()
            .ok_or_else(|| Error::Config("brightness value is not numeric".to_string()))
    }
}

fn resolution_pair(value: serde_json::Value) -> Result<(u32, u32)> {
    let parts = value
        .as_array()
        .ok_or_else(|| Error::Config("resolution value is not a pair".to_string()))?;
    match (
        parts.first().and_then(|v| v.as_u64()),
        parts.get(1).and_then(|v| v.as_u64()),
    ) {
        (Some(w), Some(h)) => Ok((w as u32, h as u32)),
        _ => Err(Error::Config("resolution value is not a pair".to_string())),
    }
}

fn mode_id(value: serde_json::Value, name: &str) -> Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| Error::Config(format!("{} value is not an integer", name)))
}
