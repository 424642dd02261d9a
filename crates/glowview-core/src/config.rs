//! Viewer configuration loading and validation

use crate::controls::{self, ControlId};
use crate::settings::RenderSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("TOML write error: {0}")]
    WriteError(#[from] toml::ser::Error),
    #[error("invalid setting: {0}")]
    InvalidSetting(#[from] controls::ControlError),
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub settings: RenderSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Asset path of the model shown on startup
    #[serde(default = "default_model_path")]
    pub path: String,
    /// Uniform scale applied to the model root
    #[serde(default = "default_model_scale")]
    pub scale: f32,
    /// Translation applied to the model root
    #[serde(default = "default_model_offset")]
    pub offset: [f32; 3],
    /// Start the first animation clip once a model is loaded
    #[serde(default = "default_autoplay")]
    pub autoplay_first_clip: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_camera_position")]
    pub position: [f32; 3],
    #[serde(default)]
    pub target: [f32; 3],
    /// Vertical field of view in degrees
    #[serde(default = "default_fov")]
    pub fov_degrees: f32,
    #[serde(default = "default_near")]
    pub near: f32,
}

fn default_model_path() -> String {
    "models/scene.glb".to_string()
}

fn default_model_scale() -> f32 {
    10.0
}

fn default_model_offset() -> [f32; 3] {
    [0.0, -1.0, 0.0]
}

fn default_autoplay() -> bool {
    true
}

fn default_camera_position() -> [f32; 3] {
    [0.0, 2.0, 10.0]
}

fn default_fov() -> f32 {
    45.0
}

fn default_near() -> f32 {
    0.1
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            scale: default_model_scale(),
            offset: default_model_offset(),
            autoplay_first_clip: default_autoplay(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: default_camera_position(),
            target: [0.0; 3],
            fov_degrees: default_fov(),
            near: default_near(),
        }
    }
}

impl ViewerConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ViewerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from file, falling back to defaults when the file does not exist
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config = Self::from_toml_str(&content)?;
            info!(path = %path.display(), "Loaded configuration");
            Ok(config)
        } else {
            info!(
                path = %path.display(),
                "Configuration file not found, using defaults"
            );
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Run every setting through the same checks as the control panels
    pub fn validate(&self) -> Result<(), ConfigError> {
        for control in ControlId::ALL {
            controls::validate(control, control.current(&self.settings))?;
        }
        Ok(())
    }

    /// Apply `key=value` overrides such as URL query parameters.
    ///
    /// Recognized keys are `model`, `bloom`, `exposure`, and `aa`. Invalid or
    /// unknown entries are skipped with a warning. Returns the number applied.
    pub fn apply_overrides<'a>(&mut self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> usize {
        let mut applied = 0;
        for (key, value) in pairs {
            let control = match key {
                "model" => {
                    if value.trim().is_empty() {
                        warn!("Ignoring empty model override");
                    } else {
                        self.model.path = value.trim().to_string();
                        applied += 1;
                    }
                    continue;
                }
                "bloom" => ControlId::BloomStrength,
                "exposure" => ControlId::Exposure,
                "aa" => ControlId::Antialiasing,
                _ => {
                    warn!(key, "Ignoring unknown override");
                    continue;
                }
            };

            let patch = controls::parse_input(control, value).and_then(|v| controls::validate(control, v));
            match patch {
                Ok(patch) => {
                    self.settings.apply(&patch);
                    applied += 1;
                }
                Err(e) => warn!(key, value, "Ignoring override: {}", e),
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::ControlValue;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ViewerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.model.scale, 10.0);
        assert_eq!(config.camera.position, [0.0, 2.0, 10.0]);
    }

    #[test]
    fn test_partial_document() {
        let config = ViewerConfig::from_toml_str(
            r#"
            [model]
            path = "models/robot.glb"

            [settings.bloom]
            strength = 2.0
            "#,
        )
        .unwrap();

        assert_eq!(config.model.path, "models/robot.glb");
        assert!(config.model.autoplay_first_clip);
        assert_eq!(config.settings.bloom.strength, 2.0);
        assert_eq!(config.settings.bloom.radius, 0.4);
    }

    #[test]
    fn test_invalid_setting_is_rejected() {
        let err = ViewerConfig::from_toml_str(
            r#"
            [settings.lighting]
            shadow_map_size = 3000
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[settings.renderer]\nexposure = 0.8").unwrap();

        let config = ViewerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.settings.renderer.exposure, 0.8);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ViewerConfig::from_file(&dir.path().join("viewer.toml")).unwrap();
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("viewer.toml");
        let mut config = ViewerConfig::default();
        config.settings.lighting.metalness = 0.25;

        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        assert_eq!(ViewerConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_overrides() {
        let mut config = ViewerConfig::default();
        let applied = config.apply_overrides([
            ("model", "https://example.com/car.glb"),
            ("bloom", "2.5"),
            ("exposure", "9"),
            ("aa", "off"),
            ("theme", "dark"),
        ]);

        assert_eq!(applied, 3);
        assert_eq!(config.model.path, "https://example.com/car.glb");
        assert_eq!(config.settings.bloom.strength, 2.5);
        assert_eq!(config.settings.renderer.exposure, 1.5);
        assert!(!config.settings.renderer.antialiasing);
        assert_eq!(
            ControlId::Antialiasing.current(&config.settings),
            ControlValue::Toggle(false)
        );
    }
}
