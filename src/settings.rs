use crate::listener::OverrideKey;
use eframe::egui::Color32;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const SETTINGS_FILE: &str = "settings.json";

const FALLBACK_FLASH_COLORS: [Color32; 2] = [
    Color32::from_rgb(0xFF, 0xB6, 0xC1),
    Color32::from_rgb(0x98, 0xFB, 0x98),
];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    /// Window opacity while the countdown runs click-through. Defaults to `0.2`.
    #[serde(default = "default_opacity")]
    pub default_opacity: f32,
    /// Sound played when the timer expires. When the file is missing the
    /// alarm falls back to system beeps.
    #[serde(default = "default_alarm_sound")]
    pub alarm_sound: Option<String>,
    /// Key that temporarily makes the overlay interactive while held.
    #[serde(default = "default_override_key")]
    pub override_key: String,
    /// Two `#RRGGBB` colours alternated while the alarm flashes.
    #[serde(default = "default_flash_colors")]
    pub flash_colors: [String; 2],
    #[serde(default = "default_window_pos")]
    pub window_pos: (f32, f32),
    #[serde(default = "default_window_size")]
    pub window_size: (f32, f32),
    /// When enabled the application initialises the logger at debug level.
    #[serde(default)]
    pub debug_logging: bool,
}

fn default_opacity() -> f32 {
    0.2
}

fn default_alarm_sound() -> Option<String> {
    Some("alarm.mp3".into())
}

fn default_override_key() -> String {
    "alt_l".into()
}

fn default_flash_colors() -> [String; 2] {
    ["#FFB6C1".into(), "#98FB98".into()]
}

fn default_window_pos() -> (f32, f32) {
    (20.0, 20.0)
}

fn default_window_size() -> (f32, f32) {
    (200.0, 150.0)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_opacity: default_opacity(),
            alarm_sound: default_alarm_sound(),
            override_key: default_override_key(),
            flash_colors: default_flash_colors(),
            window_pos: default_window_pos(),
            window_size: default_window_size(),
            debug_logging: false,
        }
    }
}

impl Settings {
    /// Read settings from `path`. A missing or empty file yields the defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn default_opacity(&self) -> f32 {
        if self.default_opacity.is_finite() {
            self.default_opacity.clamp(0.0, 1.0)
        } else {
            default_opacity()
        }
    }

    pub fn override_key(&self) -> OverrideKey {
        match self.override_key.parse() {
            Ok(key) => key,
            Err(_) => {
                tracing::warn!(
                    "override key '{}' is not supported; using left Alt",
                    self.override_key
                );
                OverrideKey::default()
            }
        }
    }

    pub fn alarm_sound_path(&self) -> Option<PathBuf> {
        self.alarm_sound
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }

    pub fn flash_colors(&self) -> [Color32; 2] {
        [
            parse_color(&self.flash_colors[0]).unwrap_or(FALLBACK_FLASH_COLORS[0]),
            parse_color(&self.flash_colors[1]).unwrap_or(FALLBACK_FLASH_COLORS[1]),
        ]
    }
}

/// Parse a `#RRGGBB` colour string.
pub fn parse_color(value: &str) -> Option<Color32> {
    let raw = value.trim().trim_start_matches('#');
    if raw.len() != 6 || !raw.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&raw[0..2], 16).ok()?;
    let g = u8::from_str_radix(&raw[2..4], 16).ok()?;
    let b = u8::from_str_radix(&raw[4..6], 16).ok()?;
    Some(Color32::from_rgb(r, g, b))
}
