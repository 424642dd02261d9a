//! Render settings and partial updates

use serde::{Deserialize, Serialize};

/// Everything the control panels can change about the rendered frame
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default)]
    pub lighting: LightingSettings,
    #[serde(default)]
    pub bloom: BloomSettings,
    #[serde(default)]
    pub renderer: RendererSettings,
}

/// Lights and surface response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightingSettings {
    /// Multiplier on every scene light
    #[serde(default = "default_light_intensity")]
    pub intensity: f32,
    /// Shadow map edge length in texels
    #[serde(default = "default_shadow_map_size")]
    pub shadow_map_size: u32,
    #[serde(default = "default_reflectivity")]
    pub reflectivity: f32,
    #[serde(default)]
    pub metalness: f32,
    #[serde(default = "default_roughness")]
    pub roughness: f32,
}

/// Glow applied to bloom-member meshes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloomSettings {
    #[serde(default = "default_bloom_strength")]
    pub strength: f32,
    #[serde(default = "default_bloom_radius")]
    pub radius: f32,
    #[serde(default = "default_bloom_threshold")]
    pub threshold: f32,
}

/// Output quality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererSettings {
    /// Offscreen targets are sized at window pixels times this factor
    #[serde(default = "default_resolution_scale")]
    pub resolution_scale: f32,
    #[serde(default = "default_antialiasing")]
    pub antialiasing: bool,
    /// Tone-mapping exposure, 1.0 is neutral
    #[serde(default = "default_exposure")]
    pub exposure: f32,
}

fn default_light_intensity() -> f32 {
    1.0
}

fn default_shadow_map_size() -> u32 {
    1024
}

fn default_reflectivity() -> f32 {
    0.5
}

fn default_roughness() -> f32 {
    0.5
}

fn default_bloom_strength() -> f32 {
    1.5
}

fn default_bloom_radius() -> f32 {
    0.4
}

fn default_bloom_threshold() -> f32 {
    0.85
}

fn default_resolution_scale() -> f32 {
    1.0
}

fn default_antialiasing() -> bool {
    true
}

fn default_exposure() -> f32 {
    1.5
}

impl Default for LightingSettings {
    fn default() -> Self {
        Self {
            intensity: default_light_intensity(),
            shadow_map_size: default_shadow_map_size(),
            reflectivity: default_reflectivity(),
            metalness: 0.0,
            roughness: default_roughness(),
        }
    }
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            strength: default_bloom_strength(),
            radius: default_bloom_radius(),
            threshold: default_bloom_threshold(),
        }
    }
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            resolution_scale: default_resolution_scale(),
            antialiasing: default_antialiasing(),
            exposure: default_exposure(),
        }
    }
}

/// Partial update produced by a control. Unset fields keep their value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SettingsPatch {
    pub light_intensity: Option<f32>,
    pub shadow_map_size: Option<u32>,
    pub reflectivity: Option<f32>,
    pub metalness: Option<f32>,
    pub roughness: Option<f32>,
    pub bloom_strength: Option<f32>,
    pub bloom_radius: Option<f32>,
    pub bloom_threshold: Option<f32>,
    pub resolution_scale: Option<f32>,
    pub antialiasing: Option<bool>,
    pub exposure: Option<f32>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == SettingsPatch::default()
    }
}

/// Which parts of the frame setup a settings change invalidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SettingsChanges {
    pub lighting: bool,
    pub shadows: bool,
    pub materials: bool,
    pub bloom: bool,
    pub resolution: bool,
    pub antialiasing: bool,
    pub exposure: bool,
}

impl SettingsChanges {
    /// Every flag set, used when a new scene needs all settings applied
    pub const ALL: SettingsChanges = SettingsChanges {
        lighting: true,
        shadows: true,
        materials: true,
        bloom: true,
        resolution: true,
        antialiasing: true,
        exposure: true,
    };

    pub fn is_empty(&self) -> bool {
        *self == SettingsChanges::default()
    }

    pub fn merge(&mut self, other: SettingsChanges) {
        self.lighting |= other.lighting;
        self.shadows |= other.shadows;
        self.materials |= other.materials;
        self.bloom |= other.bloom;
        self.resolution |= other.resolution;
        self.antialiasing |= other.antialiasing;
        self.exposure |= other.exposure;
    }
}

fn assign<T: PartialEq + Copy>(slot: &mut T, value: Option<T>) -> bool {
    match value {
        Some(value) if *slot != value => {
            *slot = value;
            true
        }
        _ => false,
    }
}

impl RenderSettings {
    /// Merge a patch, reporting what actually changed
    pub fn apply(&mut self, patch: &SettingsPatch) -> SettingsChanges {
        let lighting = &mut self.lighting;
        let bloom = &mut self.bloom;
        let renderer = &mut self.renderer;

        let light = assign(&mut lighting.intensity, patch.light_intensity);
        let shadows = assign(&mut lighting.shadow_map_size, patch.shadow_map_size);
        let reflectivity = assign(&mut lighting.reflectivity, patch.reflectivity);
        let metalness = assign(&mut lighting.metalness, patch.metalness);
        let roughness = assign(&mut lighting.roughness, patch.roughness);
        let strength = assign(&mut bloom.strength, patch.bloom_strength);
        let radius = assign(&mut bloom.radius, patch.bloom_radius);
        let threshold = assign(&mut bloom.threshold, patch.bloom_threshold);

        SettingsChanges {
            lighting: light,
            shadows,
            materials: reflectivity | metalness | roughness,
            bloom: strength | radius | threshold,
            resolution: assign(&mut renderer.resolution_scale, patch.resolution_scale),
            antialiasing: assign(&mut renderer.antialiasing, patch.antialiasing),
            exposure: assign(&mut renderer.exposure, patch.exposure),
        }
    }
}
