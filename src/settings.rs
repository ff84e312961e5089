/// Audio/video settings persisted as JSON.
///
/// File shape:
///   { "resolution": [1280, 720], "music_on": true,
///     "volume_music": 0.5, "volume_sfx": 0.7 }
///
/// Loading is forgiving: a missing or corrupt file yields defaults, each
/// known key that parses replaces its default, unknown keys are ignored,
/// and a resolution outside `RESOLUTIONS` falls back to 1280x720.
/// Every successful change is written back immediately.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::SettingsError;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Resolution(pub u32, pub u32);

impl Resolution {
    pub fn width(self) -> u32 { self.0 }
    pub fn height(self) -> u32 { self.1 }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.0, self.1)
    }
}

pub const RESOLUTIONS: [Resolution; 4] = [
    Resolution(800, 600),
    Resolution(1024, 768),
    Resolution(1280, 720),
    Resolution(1920, 1080),
];

pub const DEFAULT_RESOLUTION: Resolution = Resolution(1280, 720);

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Settings {
    pub resolution: Resolution,
    pub music_on: bool,
    pub volume_music: f32,
    pub volume_sfx: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            resolution: DEFAULT_RESOLUTION,
            music_on: true,
            volume_music: 0.5,
            volume_sfx: 0.7,
        }
    }
}

impl Settings {
    /// Merge a parsed JSON document over the defaults, key by key.
    fn from_json(text: &str) -> Result<Self, SettingsError> {
        let value: Value = serde_json::from_str(text)?;
        let obj = value.as_object().ok_or(SettingsError::NotAnObject)?;
        let mut s = Settings::default();

        if let Some(v) = obj.get("resolution") {
            match serde_json::from_value::<Resolution>(v.clone()) {
                Ok(res) => s.resolution = res,
                Err(e) => warn!("ignoring resolution {v}: {e}"),
            }
        }
        if let Some(v) = obj.get("music_on").and_then(Value::as_bool) {
            s.music_on = v;
        }
        if let Some(v) = obj.get("volume_music").and_then(Value::as_f64) {
            s.volume_music = clamp_volume(v as f32);
        }
        if let Some(v) = obj.get("volume_sfx").and_then(Value::as_f64) {
            s.volume_sfx = clamp_volume(v as f32);
        }

        if !RESOLUTIONS.contains(&s.resolution) {
            warn!("invalid resolution {}, resetting to {}", s.resolution, DEFAULT_RESOLUTION);
            s.resolution = DEFAULT_RESOLUTION;
        }
        Ok(s)
    }
}

fn clamp_volume(v: f32) -> f32 {
    if v.is_nan() {
        return 0.0;
    }
    // Two decimals keep repeated 0.1 steps from drifting.
    (v.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

// ── Manager ──

pub struct SettingsManager {
    settings: Settings,
    /// `None` keeps settings in memory only.
    path: Option<PathBuf>,
}

impl SettingsManager {
    /// Load from `path`, falling back to defaults on any problem.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = match std::fs::read_to_string(&path) {
            Ok(text) => match Settings::from_json(&text) {
                Ok(s) => {
                    info!("loaded settings from {}", path.display());
                    s
                }
                Err(e) => {
                    warn!("settings file {} corrupted ({e}); using defaults", path.display());
                    Settings::default()
                }
            },
            Err(e) => {
                info!("no settings at {} ({e}); using defaults", path.display());
                Settings::default()
            }
        };
        SettingsManager { settings, path: Some(path) }
    }

    /// Defaults, never written to disk.
    pub fn in_memory() -> Self {
        SettingsManager { settings: Settings::default(), path: None }
    }

    pub fn settings(&self) -> &Settings { &self.settings }
    pub fn resolution(&self) -> Resolution { self.settings.resolution }
    pub fn music_on(&self) -> bool { self.settings.music_on }
    pub fn volume_music(&self) -> f32 { self.settings.volume_music }
    pub fn volume_sfx(&self) -> f32 { self.settings.volume_sfx }

    /// Music volume as actually heard (0 when music is off).
    pub fn effective_music_volume(&self) -> f32 {
        if self.settings.music_on { self.settings.volume_music } else { 0.0 }
    }

    /// Returns false (and keeps the current value) for unsupported sizes.
    pub fn set_resolution(&mut self, res: Resolution) -> bool {
        if !RESOLUTIONS.contains(&res) {
            warn!("invalid resolution {res}; keeping {}", self.settings.resolution);
            return false;
        }
        self.settings.resolution = res;
        self.persist();
        true
    }

    /// Step through `RESOLUTIONS`, wrapping at both ends.
    pub fn cycle_resolution(&mut self, forward: bool) {
        let n = RESOLUTIONS.len();
        let idx = RESOLUTIONS
            .iter()
            .position(|r| *r == self.settings.resolution)
            .unwrap_or(0);
        let next = if forward { (idx + 1) % n } else { (idx + n - 1) % n };
        self.set_resolution(RESOLUTIONS[next]);
    }

    pub fn set_music_on(&mut self, on: bool) {
        self.settings.music_on = on;
        self.persist();
    }

    pub fn set_volume_music(&mut self, v: f32) {
        self.settings.volume_music = clamp_volume(v);
        self.persist();
    }

    pub fn set_volume_sfx(&mut self, v: f32) {
        self.settings.volume_sfx = clamp_volume(v);
        self.persist();
    }

    /// Write the current settings, logging instead of failing.
    fn persist(&self) {
        if let Some(path) = &self.path {
            match self.save_to(path) {
                Ok(()) => debug!("settings saved to {}", path.display()),
                Err(e) => warn!("error saving settings to {}: {e}", path.display()),
            }
        }
    }

    fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let text = serde_json::to_string_pretty(&self.settings)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}
