//! Control panel inputs
//!
//! Each control validates its own input before anything is committed. A
//! rejected value leaves both the settings and the displayed value as they
//! were; nothing is reported to the user.

use crate::settings::{RenderSettings, SettingsPatch};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Smallest shadow map size a control accepts
pub const MIN_SHADOW_MAP_SIZE: u32 = 512;
/// Largest shadow map size a control accepts
pub const MAX_SHADOW_MAP_SIZE: u32 = 2048;

#[derive(Error, Debug, PartialEq)]
pub enum ControlError {
    #[error("{control}: `{input}` is not a number")]
    NotANumber { control: ControlId, input: String },
    #[error("{control}: {value} is outside {min}..={max}")]
    OutOfRange {
        control: ControlId,
        value: f32,
        min: f32,
        max: f32,
    },
    #[error("{control}: {value} is not a power of two")]
    NotPowerOfTwo { control: ControlId, value: u32 },
    #[error("{control}: expected a {expected} value")]
    WrongKind {
        control: ControlId,
        expected: &'static str,
    },
}

/// Every widget on the rendering panels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlId {
    LightIntensity,
    ShadowMapSize,
    ResolutionScale,
    Reflectivity,
    Metalness,
    Roughness,
    BloomStrength,
    BloomThreshold,
    BloomRadius,
    Exposure,
    Antialiasing,
}

/// Slider bounds of a numeric control
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliderRange {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

/// Value shown by a control
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlValue {
    Number(f32),
    Toggle(bool),
}

impl ControlId {
    pub const ALL: [ControlId; 11] = [
        ControlId::LightIntensity,
        ControlId::ShadowMapSize,
        ControlId::ResolutionScale,
        ControlId::Reflectivity,
        ControlId::Metalness,
        ControlId::Roughness,
        ControlId::BloomStrength,
        ControlId::BloomThreshold,
        ControlId::BloomRadius,
        ControlId::Exposure,
        ControlId::Antialiasing,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ControlId::LightIntensity => "Light Intensity",
            ControlId::ShadowMapSize => "Shadow Map Size",
            ControlId::ResolutionScale => "Resolution Scale",
            ControlId::Reflectivity => "Reflectivity",
            ControlId::Metalness => "Metalness",
            ControlId::Roughness => "Roughness",
            ControlId::BloomStrength => "Bloom Strength",
            ControlId::BloomThreshold => "Bloom Threshold",
            ControlId::BloomRadius => "Bloom Radius",
            ControlId::Exposure => "Exposure",
            ControlId::Antialiasing => "Antialiasing",
        }
    }

    /// Slider bounds, `None` for checkbox controls
    pub fn range(self) -> Option<SliderRange> {
        let (min, max, step) = match self {
            ControlId::LightIntensity => (0.1, 2.0, 0.1),
            ControlId::ShadowMapSize => (MIN_SHADOW_MAP_SIZE as f32, MAX_SHADOW_MAP_SIZE as f32, 512.0),
            ControlId::ResolutionScale => (0.5, 2.0, 0.1),
            ControlId::Reflectivity | ControlId::Metalness | ControlId::Roughness => (0.0, 1.0, 0.1),
            ControlId::BloomStrength => (0.0, 3.0, 0.1),
            ControlId::BloomThreshold | ControlId::BloomRadius => (0.0, 1.0, 0.01),
            ControlId::Exposure => (0.1, 2.0, 0.1),
            ControlId::Antialiasing => return None,
        };
        Some(SliderRange { min, max, step })
    }

    /// Value of this control in `settings`
    pub fn current(self, settings: &RenderSettings) -> ControlValue {
        let lighting = &settings.lighting;
        match self {
            ControlId::LightIntensity => ControlValue::Number(lighting.intensity),
            ControlId::ShadowMapSize => ControlValue::Number(lighting.shadow_map_size as f32),
            ControlId::ResolutionScale => ControlValue::Number(settings.renderer.resolution_scale),
            ControlId::Reflectivity => ControlValue::Number(lighting.reflectivity),
            ControlId::Metalness => ControlValue::Number(lighting.metalness),
            ControlId::Roughness => ControlValue::Number(lighting.roughness),
            ControlId::BloomStrength => ControlValue::Number(settings.bloom.strength),
            ControlId::BloomThreshold => ControlValue::Number(settings.bloom.threshold),
            ControlId::BloomRadius => ControlValue::Number(settings.bloom.radius),
            ControlId::Exposure => ControlValue::Number(settings.renderer.exposure),
            ControlId::Antialiasing => ControlValue::Toggle(settings.renderer.antialiasing),
        }
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parse text entered for a control
pub fn parse_input(control: ControlId, input: &str) -> Result<ControlValue, ControlError> {
    let input = input.trim();
    if control.range().is_none() {
        return match input.to_ascii_lowercase().as_str() {
            "true" | "on" | "1" | "yes" => Ok(ControlValue::Toggle(true)),
            "false" | "off" | "0" | "no" => Ok(ControlValue::Toggle(false)),
            _ => Err(ControlError::WrongKind {
                control,
                expected: "boolean",
            }),
        };
    }

    input
        .parse::<f32>()
        .ok()
        .filter(|value| !value.is_nan())
        .map(ControlValue::Number)
        .ok_or_else(|| ControlError::NotANumber {
            control,
            input: input.to_string(),
        })
}

/// Check a value against its control and build the partial update
pub fn validate(control: ControlId, value: ControlValue) -> Result<SettingsPatch, ControlError> {
    let number = match (control.range(), value) {
        (None, ControlValue::Toggle(enabled)) => {
            return Ok(SettingsPatch {
                antialiasing: Some(enabled),
                ..Default::default()
            });
        }
        (None, ControlValue::Number(_)) => {
            return Err(ControlError::WrongKind {
                control,
                expected: "boolean",
            })
        }
        (Some(_), ControlValue::Toggle(_)) => {
            return Err(ControlError::WrongKind {
                control,
                expected: "numeric",
            })
        }
        (Some(range), ControlValue::Number(number)) => {
            if !number.is_finite() || number < range.min || number > range.max {
                return Err(ControlError::OutOfRange {
                    control,
                    value: number,
                    min: range.min,
                    max: range.max,
                });
            }
            number
        }
    };

    let mut patch = SettingsPatch::default();
    match control {
        ControlId::LightIntensity => patch.light_intensity = Some(number),
        ControlId::ShadowMapSize => {
            let size = number.round() as u32;
            if !size.is_power_of_two() {
                return Err(ControlError::NotPowerOfTwo { control, value: size });
            }
            patch.shadow_map_size = Some(size);
        }
        ControlId::ResolutionScale => patch.resolution_scale = Some(number),
        ControlId::Reflectivity => patch.reflectivity = Some(number),
        ControlId::Metalness => patch.metalness = Some(number),
        ControlId::Roughness => patch.roughness = Some(number),
        ControlId::BloomStrength => patch.bloom_strength = Some(number),
        ControlId::BloomThreshold => patch.bloom_threshold = Some(number),
        ControlId::BloomRadius => patch.bloom_radius = Some(number),
        ControlId::Exposure => patch.exposure = Some(number),
        ControlId::Antialiasing => {}
    }
    Ok(patch)
}

/// Displayed values of the rendering controls
#[derive(Debug, Clone)]
pub struct ControlPanel {
    displayed: HashMap<ControlId, ControlValue>,
}

impl ControlPanel {
    pub fn new(settings: &RenderSettings) -> Self {
        let displayed = ControlId::ALL
            .iter()
            .map(|control| (*control, control.current(settings)))
            .collect();
        Self { displayed }
    }

    pub fn displayed(&self, control: ControlId) -> ControlValue {
        self.displayed
            .get(&control)
            .copied()
            .unwrap_or(ControlValue::Number(0.0))
    }

    pub fn number(&self, control: ControlId) -> f32 {
        match self.displayed(control) {
            ControlValue::Number(value) => value,
            ControlValue::Toggle(enabled) => f32::from(u8::from(enabled)),
        }
    }

    pub fn toggle(&self, control: ControlId) -> bool {
        matches!(self.displayed(control), ControlValue::Toggle(true))
    }

    /// Validate and commit a value.
    ///
    /// On success the displayed value is updated and `on_accept` receives the
    /// partial update. On failure nothing changes and `on_accept` is not called.
    pub fn submit(
        &mut self,
        control: ControlId,
        value: ControlValue,
        on_accept: impl FnOnce(SettingsPatch),
    ) -> Result<(), ControlError> {
        let patch = validate(control, value)?;
        let shown = match (control, patch.shadow_map_size) {
            (ControlId::ShadowMapSize, Some(size)) => ControlValue::Number(size as f32),
            _ => value,
        };
        self.displayed.insert(control, shown);
        on_accept(patch);
        Ok(())
    }

    /// Parse text input and submit it
    pub fn submit_text(
        &mut self,
        control: ControlId,
        input: &str,
        on_accept: impl FnOnce(SettingsPatch),
    ) -> Result<(), ControlError> {
        let value = parse_input(control, input)?;
        self.submit(control, value, on_accept)
    }

    /// Re-read every displayed value, e.g. after settings came from config
    pub fn sync(&mut self, settings: &RenderSettings) {
        *self = ControlPanel::new(settings);
    }
}
