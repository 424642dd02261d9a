//! Scene lighting and surface settings

use std::collections::HashSet;

use bevy::camera::visibility::RenderLayers;
use bevy::light::{DirectionalLightShadowMap, PointLightShadowMap};
use bevy::prelude::*;
use glowview_core::settings::LightingSettings;
use glowview_core::MAIN_LAYER;

use crate::layers::PROXY_LAYER;
use crate::models::ModelMesh;
use crate::{Viewer, ViewerSet};

/// Ambient brightness at light intensity 1.0, in cd/m²
const AMBIENT_BRIGHTNESS: f32 = 400.0;
/// Directional illuminance at light intensity 1.0, in lux
const DIRECTIONAL_ILLUMINANCE: f32 = 6_000.0;
/// Point light power at light intensity 1.0, in lumens
const POINT_INTENSITY: f32 = 1_500_000.0;

/// A light whose strength follows the light intensity setting
#[derive(Component, Debug, Clone, Copy)]
pub struct SceneLight {
    /// Strength at light intensity 1.0
    pub base: f32,
}

/// Plugin for scene lights
pub struct SceneSetupPlugin;

impl Plugin for SceneSetupPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(AmbientLight {
            color: Color::WHITE,
            brightness: AMBIENT_BRIGHTNESS,
            ..default()
        })
        .init_resource::<DirectionalLightShadowMap>()
        .init_resource::<PointLightShadowMap>()
        .add_systems(Startup, setup_lights)
        .add_systems(
            Update,
            (apply_lighting, apply_shadow_size, apply_surface_settings).in_set(ViewerSet::ApplySettings),
        );
    }
}

fn setup_lights(mut commands: Commands) {
    // Lights reach both the base pass and the bloom proxies
    let layers = RenderLayers::from_layers(&[MAIN_LAYER, PROXY_LAYER]);

    commands.spawn((
        DirectionalLight {
            illuminance: DIRECTIONAL_ILLUMINANCE,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(10.0, 10.0, 10.0).looking_at(Vec3::ZERO, Vec3::Y),
        SceneLight {
            base: DIRECTIONAL_ILLUMINANCE,
        },
        layers.clone(),
    ));

    commands.spawn((
        PointLight {
            intensity: POINT_INTENSITY,
            range: 50.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(0.0, 2.0, 10.0),
        SceneLight { base: POINT_INTENSITY },
        layers,
    ));
}

fn apply_lighting(
    viewer: Res<Viewer>,
    mut ambient: ResMut<AmbientLight>,
    mut directional: Query<(&SceneLight, &mut DirectionalLight)>,
    mut point: Query<(&SceneLight, &mut PointLight), Without<DirectionalLight>>,
) {
    if !viewer.pending_changes().lighting {
        return;
    }
    let intensity = viewer.settings.lighting.intensity;

    ambient.brightness = AMBIENT_BRIGHTNESS * intensity;
    for (light, mut directional) in &mut directional {
        directional.illuminance = light.base * intensity;
    }
    for (light, mut point) in &mut point {
        point.intensity = light.base * intensity;
    }
}

fn apply_shadow_size(
    viewer: Res<Viewer>,
    mut directional: ResMut<DirectionalLightShadowMap>,
    mut point: ResMut<PointLightShadowMap>,
) {
    if !viewer.pending_changes().shadows {
        return;
    }
    let size = viewer.settings.lighting.shadow_map_size as usize;
    directional.size = size;
    point.size = size;
    tracing::debug!(size, "Shadow map size changed");
}

/// Write the metalness, roughness, and reflectivity settings into a material
pub fn apply_surface(material: &mut StandardMaterial, lighting: &LightingSettings) {
    material.metallic = lighting.metalness;
    material.perceptual_roughness = lighting.roughness;
    material.reflectance = lighting.reflectivity;
}

fn apply_surface_settings(
    viewer: Res<Viewer>,
    meshes: Query<&MeshMaterial3d<StandardMaterial>, With<ModelMesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    if !viewer.pending_changes().materials {
        return;
    }

    let handles: HashSet<AssetId<StandardMaterial>> = meshes.iter().map(|m| m.0.id()).collect();
    for id in handles {
        if let Some(material) = materials.get_mut(id) {
            apply_surface(material, &viewer.settings.lighting);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_surface() {
        let mut material = StandardMaterial::default();
        let lighting = LightingSettings {
            metalness: 0.7,
            roughness: 0.2,
            reflectivity: 0.9,
            ..default()
        };
        apply_surface(&mut material, &lighting);
        assert_eq!(material.metallic, 0.7);
        assert_eq!(material.perceptual_roughness, 0.2);
        assert_eq!(material.reflectance, 0.9);
    }
}
