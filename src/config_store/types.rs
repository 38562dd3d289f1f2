//! ConfigStore data types
//!
//! Settings are either an option set (named variants with one selected
//! index) or a bounded numeric range. The serialized document shape is a
//! top-level `version` string plus one key per setting, matching the
//! on-disk `video_config.json`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Setting name constants
pub mod setting_names {
    pub const TRANSFORM: &str = "transform";
    pub const FRAME_RATE: &str = "frame_rate";
    pub const RESOLUTION: &str = "resolution";
    pub const SNAPSHOT_RESOLUTION: &str = "snapshot_resolution";
    pub const AF_MODE: &str = "af_mode";
    pub const AWB_MODE: &str = "awb_mode";
    pub const BRIGHTNESS: &str = "brightness";
}

/// One selectable variant of an option set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedOption {
    /// Display name
    pub name: String,
    /// Value handed to the capture layer when selected
    pub value: serde_json::Value,
}

/// A named, enumerable list of values plus one selected index.
///
/// Invariant: `selected < options.len()` at all times; mutation through
/// [`crate::config_store::ConfigStore`] rejects out-of-range indices
/// instead of clamping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSet {
    pub options: Vec<NamedOption>,
    pub selected: usize,
}

impl OptionSet {
    /// The currently selected option.
    pub fn selected_option(&self) -> &NamedOption {
        &self.options[self.selected]
    }
}

/// A bounded numeric value. Invariant: `range[0] <= value <= range[1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeSetting {
    pub range: [f64; 2],
    pub value: f64,
}

/// A single settings entry. The two shapes have disjoint field names, so
/// the untagged representation round-trips unambiguously.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingEntry {
    Options(OptionSet),
    Range(RangeSetting),
}

/// The whole settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsDoc {
    pub version: String,
    #[serde(flatten)]
    pub entries: BTreeMap<String, SettingEntry>,
}

/// Image orientation flags, decoded from the `transform` setting value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transform {
    pub hflip: bool,
    pub vflip: bool,
}

fn options(entries: &[(&str, serde_json::Value)], selected: usize) -> SettingEntry {
    SettingEntry::Options(OptionSet {
        options: entries
            .iter()
            .map(|(name, value)| NamedOption {
                name: (*name).to_string(),
                value: value.clone(),
            })
            .collect(),
        selected,
    })
}

/// Compiled-in defaults; an override file merges over these per
/// top-level key at load time.
pub fn default_settings() -> SettingsDoc {
    use serde_json::json;

    let mut entries = BTreeMap::new();
    entries.insert(
        setting_names::TRANSFORM.to_string(),
        options(
            &[
                ("Identity", json!({"hflip": false, "vflip": false})),
                ("Horizontal Flip", json!({"hflip": true, "vflip": false})),
                ("Vertical Flip", json!({"hflip": false, "vflip": true})),
                ("180\u{b0} Rotation", json!({"hflip": true, "vflip": true})),
            ],
            0,
        ),
    );
    entries.insert(
        setting_names::FRAME_RATE.to_string(),
        options(
            &[
                ("10 fps", json!(10.0)),
                ("15 fps", json!(15.0)),
                ("20 fps", json!(20.0)),
                ("25 fps", json!(25.0)),
                ("30 fps", json!(30.0)),
            ],
            3,
        ),
    );
    entries.insert(
        setting_names::RESOLUTION.to_string(),
        options(
            &[
                ("640x480 (4:3)", json!([640, 480])),
                ("800x600 (4:3)", json!([800, 600])),
                ("1280x720 (16:9)", json!([1280, 720])),
                ("1920x1080 (16:9)", json!([1920, 1080])),
            ],
            2,
        ),
    );
    entries.insert(
        setting_names::SNAPSHOT_RESOLUTION.to_string(),
        options(
            &[
                ("1280x720 (16:9)", json!([1280, 720])),
                ("1920x1080 (16:9)", json!([1920, 1080])),
                ("3840x2160 (16:9)", json!([3840, 2160])),
            ],
            2,
        ),
    );
    entries.insert(
        setting_names::AF_MODE.to_string(),
        options(
            &[("Manual", json!(0)), ("Auto", json!(1)), ("Continuous", json!(2))],
            2,
        ),
    );
    entries.insert(
        setting_names::AWB_MODE.to_string(),
        options(
            &[
                ("Off", json!(0)),
                ("Auto", json!(1)),
                ("Tungsten", json!(2)),
                ("Fluorescent", json!(3)),
                ("Indoor", json!(4)),
                ("Daylight", json!(5)),
                ("Cloudy", json!(6)),
            ],
            1,
        ),
    );
    entries.insert(
        setting_names::BRIGHTNESS.to_string(),
        SettingEntry::Range(RangeSetting {
            range: [-1.0, 1.0],
            value: 0.0,
        }),
    );

    SettingsDoc {
        version: "1.0".to_string(),
        entries,
    }
}
