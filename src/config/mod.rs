//! Settings management for Selfie Camera
//!
//! Preferences live in `<config dir>/SelfieCamera/settings.json`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::camera::Facing;

/// Camera preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraSettings {
    /// Preferred (not mandatory) stream width
    #[serde(default = "default_ideal_width")]
    pub ideal_width: u32,

    /// Preferred (not mandatory) stream height
    #[serde(default = "default_ideal_height")]
    pub ideal_height: u32,

    /// Facing requested at startup
    #[serde(default)]
    pub facing: Facing,

    /// Explicit device index, overriding facing-based selection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<u32>,

    /// Force the "phone or tablet" switch heuristic on or off
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_override: Option<bool>,
}

fn default_ideal_width() -> u32 {
    640
}

fn default_ideal_height() -> u32 {
    480
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            ideal_width: default_ideal_width(),
            ideal_height: default_ideal_height(),
            facing: Facing::Front,
            device: None,
            mobile_override: None,
        }
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub camera: CameraSettings,

    /// Render loop rate (1-120)
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,

    /// Effect selected at startup
    #[serde(default = "default_initial_effect")]
    pub initial_effect: String,

    /// Directory holding the ONNX models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_dir: Option<PathBuf>,

    /// Where captures are saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_dir: Option<PathBuf>,
}

fn default_target_fps() -> u32 {
    30
}

fn default_initial_effect() -> String {
    "none".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            camera: CameraSettings::default(),
            target_fps: default_target_fps(),
            initial_effect: default_initial_effect(),
            model_dir: None,
            capture_dir: None,
        }
    }
}

impl Settings {
    /// Default settings file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("SelfieCamera");
            p.push("settings.json");
            p
        })
    }

    /// Load settings from the config directory, falling back to defaults when
    /// the file is missing or unreadable
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from_file(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Ignoring settings at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save to the config directory
    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::default_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to_file(&path)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)?;
        let mut settings: Self = serde_json::from_str(&contents)?;
        settings.sanitize();
        Ok(settings)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Clamp values into their valid ranges
    pub fn sanitize(&mut self) {
        self.target_fps = self.target_fps.clamp(1, 120);
        self.camera.ideal_width = self.camera.ideal_width.max(1);
        self.camera.ideal_height = self.camera.ideal_height.max(1);
        if self.initial_effect.trim().is_empty() {
            self.initial_effect = default_initial_effect();
        }
    }

    /// Capture directory, defaulting to the user's pictures folder
    pub fn capture_dir(&self) -> PathBuf {
        self.capture_dir
            .clone()
            .or_else(|| dirs::picture_dir().map(|p| p.join("Selfie Camera")))
            .unwrap_or_else(|| PathBuf::from("captures"))
    }
}

/// Settings-related errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Could not find config directory")]
    NoConfigDir,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.target_fps, 30);
        assert_eq!(settings.initial_effect, "none");
        assert_eq!(settings.camera.ideal_width, 640);
        assert_eq!(settings.camera.ideal_height, 480);
        assert_eq!(settings.camera.facing, Facing::Front);
        assert!(settings.model_dir.is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "targetFps": 24, "camera": { "facing": "back" } }"#).unwrap();
        assert_eq!(settings.target_fps, 24);
        assert_eq!(settings.camera.facing, Facing::Back);
        assert_eq!(settings.camera.ideal_width, 640);
        assert_eq!(settings.initial_effect, "none");
    }

    #[test]
    fn test_sanitize() {
        let mut settings = Settings {
            target_fps: 500,
            initial_effect: "  ".to_string(),
            ..Settings::default()
        };
        settings.camera.ideal_width = 0;
        settings.sanitize();
        assert_eq!(settings.target_fps, 120);
        assert_eq!(settings.camera.ideal_width, 1);
        assert_eq!(settings.initial_effect, "none");

        settings.target_fps = 0;
        settings.sanitize();
        assert_eq!(settings.target_fps, 1);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("selfie-settings-test-{}", std::process::id()));
        let path = dir.join("settings.json");
        let settings = Settings {
            initial_effect: "sepia".to_string(),
            model_dir: Some(PathBuf::from("/opt/models")),
            ..Settings::default()
        };
        settings.save_to_file(&path).unwrap();
        assert_eq!(Settings::load_from_file(&path).unwrap(), settings);

        fs::write(&path, "not json").unwrap();
        assert!(matches!(Settings::load_from_file(&path), Err(SettingsError::Json(_))));
        let _ = fs::remove_dir_all(&dir);
    }
}
