//! Config model and persistence helpers.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Top-level configuration stored in `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Assistant credentials and model selection.
    pub assistant: AssistantCfg,
    /// User profile values shown in the UI.
    pub user: UserCfg,
    /// Capture timing and device-simulator knobs.
    pub capture: CaptureCfg,
}

/// Conversational assistant settings. An empty api_key disables the chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantCfg {
    /// Gemini API key. Leave empty to disable the assistant.
    pub api_key: String,
    /// Model name used for streaming chat.
    pub model: String,
}

/// User metadata shown on the packet screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCfg {
    /// Crew member name.
    pub crew_name: String,
}

/// Capture behavior and simulated-device settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureCfg {
    /// Upper bound for a single GPS fix request, in seconds.
    pub gps_timeout_secs: u64,
    /// Barcode scan sampling interval, in milliseconds (~frame rate).
    pub scan_interval_ms: u64,
    /// Simulator: whether the camera can be opened at all.
    pub sim_camera_available: bool,
    /// Simulator: whether barcode detection is supported.
    pub sim_barcode_supported: bool,
    /// Simulator: whether geolocation is available.
    pub sim_gps_available: bool,
    /// Simulator: barcode value "seen" by the camera.
    pub sim_barcode_value: String,
    /// Simulator: frames sampled before the barcode is detected.
    pub sim_frames_until_detect: u32,
    /// Simulator: site latitude used as the GPS fix center.
    pub site_latitude: f64,
    /// Simulator: site longitude used as the GPS fix center.
    pub site_longitude: f64,
}

impl Config {
    /// Load from disk or create defaults when missing.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let s = fs::read_to_string(path)?;
            Ok(toml::from_str(&s)?)
        } else {
            let cfg = Self::default();
            cfg.save(path)?;
            Ok(cfg)
        }
    }

    /// Persist the config as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let s = toml::to_string_pretty(self)?;
        fs::write(path, s)?;
        Ok(())
    }
}

impl Default for Config {
    /// Defaults walk through the happy path of the gas-main demo order.
    fn default() -> Self {
        Self {
            assistant: AssistantCfg {
                api_key: "".into(),
                model: "gemini-2.5-flash".into(),
            },
            user: UserCfg {
                crew_name: "Field Crew".into(),
            },
            capture: CaptureCfg {
                gps_timeout_secs: 10,
                scan_interval_ms: 33,
                sim_camera_available: true,
                sim_barcode_supported: true,
                sim_gps_available: true,
                sim_barcode_value: "GASPIPE-HDPE-4IN".into(),
                sim_frames_until_detect: 45,
                site_latitude: 40.712800,
                site_longitude: 74.006000,
            },
        }
    }
}
