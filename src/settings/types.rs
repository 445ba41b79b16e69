use serde::{Deserialize, Serialize};

use crate::pipeline::chroma::{Hsv, HsvRange, HUE_RANGE};
use crate::pipeline::tick::PipelineConfig;
use crate::settings::error::{Result, SettingsError};

pub const MIN_UPDATE_INTERVAL_MS: u64 = 10;
pub const MAX_UPDATE_INTERVAL_MS: u64 = 5000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

/// The overlay window and the target it mirrors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    /// Exact title of the window to capture.
    pub title: String,
    pub position: Position,
    pub size: Size,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "Chroma Source".to_string(),
            position: Position { x: 100, y: 100 },
            size: Size {
                width: 640,
                height: 360,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromaKeySettings {
    pub hsv_lower: Hsv,
    pub hsv_upper: Hsv,
}

impl Default for ChromaKeySettings {
    fn default() -> Self {
        Self {
            hsv_lower: Hsv::new(50, 100, 100),
            hsv_upper: Hsv::new(70, 255, 255),
        }
    }
}

impl ChromaKeySettings {
    pub fn range(&self) -> HsvRange {
        HsvRange::new(self.hsv_lower, self.hsv_upper)
    }
}

/// Top-level settings file structure.
///
/// Missing fields fall back to their defaults so hand-edited files with
/// only a few keys still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub window_settings: WindowSettings,
    pub chroma_key_settings: ChromaKeySettings,
    /// Milliseconds between captures.
    pub update_interval: u64,
    /// Monitor the overlay was last placed on. Informational only.
    pub selected_screen: Option<String>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            window_settings: WindowSettings::default(),
            chroma_key_settings: ChromaKeySettings::default(),
            update_interval: 70,
            selected_screen: None,
        }
    }
}

impl OverlayConfig {
    /// Reject values the overlay cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_UPDATE_INTERVAL_MS..=MAX_UPDATE_INTERVAL_MS).contains(&self.update_interval) {
            return Err(SettingsError::Invalid(format!(
                "update interval must be between {MIN_UPDATE_INTERVAL_MS} and \
                 {MAX_UPDATE_INTERVAL_MS} ms, got {}",
                self.update_interval
            )));
        }
        let hsv = &self.chroma_key_settings;
        for (name, value) in [("lower", hsv.hsv_lower), ("upper", hsv.hsv_upper)] {
            if u16::from(value.h) >= HUE_RANGE {
                return Err(SettingsError::Invalid(format!(
                    "{name} hue must be 0-{}, got {}",
                    HUE_RANGE - 1,
                    value.h
                )));
            }
        }
        let size = self.window_settings.size;
        if size.width == 0 || size.height == 0 {
            return Err(SettingsError::Invalid(format!(
                "window size must be non-zero, got {}x{}",
                size.width, size.height
            )));
        }
        Ok(())
    }

    /// The per-tick view the capture pipeline runs on.
    pub fn to_pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            window_title: self.window_settings.title.clone(),
            hsv: self.chroma_key_settings.range(),
            update_interval_ms: self.update_interval,
        }
    }
}
