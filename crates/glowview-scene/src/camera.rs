//! Camera controls and orbit navigation

use bevy::camera::Exposure;
use bevy::input::mouse::{AccumulatedMouseMotion, AccumulatedMouseScroll, MouseScrollUnit};
use bevy::prelude::*;
use bevy_egui::EguiContexts;
use glowview_core::config::CameraConfig;

use crate::{SceneConfig, Viewer, ViewerSet};

/// Camera controller settings
#[derive(Debug, Clone, Resource)]
pub struct CameraSettings {
    pub distance: f32,
    pub target_distance: f32,
    pub azimuth: f32,
    pub elevation: f32,
    pub target: Vec3,
    pub target_focus: Vec3,
    pub sensitivity: f32,
    pub zoom_speed: f32,
    pub smooth_factor: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            distance: 10.2,
            target_distance: 10.2,
            azimuth: 0.0,
            elevation: 0.2,
            target: Vec3::ZERO,
            target_focus: Vec3::ZERO,
            sensitivity: 0.005,
            zoom_speed: 0.1,
            smooth_factor: 0.15,
        }
    }
}

impl CameraSettings {
    /// Orbit that places the camera at `position` looking at `target`
    pub fn looking_from(position: Vec3, target: Vec3) -> Self {
        let offset = position - target;
        let distance = offset.length().max(MIN_DISTANCE);
        Self {
            distance,
            target_distance: distance,
            azimuth: offset.x.atan2(offset.z),
            elevation: (offset.y / distance).clamp(-1.0, 1.0).asin(),
            target,
            target_focus: target,
            ..default()
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        Self::looking_from(Vec3::from_array(config.position), Vec3::from_array(config.target))
    }

    /// Camera position for the current orbit (Y up)
    pub fn eye(&self) -> Vec3 {
        let horizontal = self.distance * self.elevation.cos();
        self.target
            + Vec3::new(
                horizontal * self.azimuth.sin(),
                self.distance * self.elevation.sin(),
                horizontal * self.azimuth.cos(),
            )
    }
}

const MIN_DISTANCE: f32 = 0.5;
const MAX_DISTANCE: f32 = 100.0;

/// Marker component for the camera that renders the base pass
#[derive(Component)]
pub struct MainCamera;

/// Exposure value for a tone-mapping exposure multiplier (1.0 is neutral)
pub fn exposure_ev100(exposure: f32) -> f32 {
    Exposure::EV100_BLENDER - exposure.max(f32::EPSILON).log2()
}

/// Plugin for camera controls
pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        let settings = app
            .world()
            .get_resource::<SceneConfig>()
            .map(|config| CameraSettings::from_config(&config.camera))
            .unwrap_or_default();

        app.insert_resource(settings)
            .add_systems(Update, update_camera.in_set(ViewerSet::Input))
            .add_systems(Update, apply_exposure.in_set(ViewerSet::ApplySettings));
    }
}

/// Orbit with left drag, pan with right drag, zoom with the wheel
fn update_camera(
    mut camera_query: Query<&mut Transform, With<MainCamera>>,
    mut settings: ResMut<CameraSettings>,
    mouse_motion: Res<AccumulatedMouseMotion>,
    mouse_scroll: Res<AccumulatedMouseScroll>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    time: Res<Time>,
    mut contexts: EguiContexts,
) {
    // Check if egui wants the mouse - if so, don't process camera controls
    let egui_wants_pointer = contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_pointer_input() || ctx.is_pointer_over_area())
        .unwrap_or(false);

    let motion = mouse_motion.delta;

    if !egui_wants_pointer {
        if mouse_button.pressed(MouseButton::Left) {
            settings.azimuth -= motion.x * settings.sensitivity;
            settings.elevation = (settings.elevation + motion.y * settings.sensitivity).clamp(-1.5, 1.5);
        }

        if mouse_button.pressed(MouseButton::Right) {
            let right = Vec3::new(settings.azimuth.cos(), 0.0, -settings.azimuth.sin());
            let pan_speed = settings.distance * 0.002;
            settings.target_focus -= right * motion.x * pan_speed;
            settings.target_focus += Vec3::Y * motion.y * pan_speed;
        }

        let scroll = match mouse_scroll.unit {
            MouseScrollUnit::Line => mouse_scroll.delta.y,
            MouseScrollUnit::Pixel => mouse_scroll.delta.y / 100.0,
        };
        if scroll != 0.0 {
            let zoom_factor = 1.0 - scroll * settings.zoom_speed;
            settings.target_distance = (settings.target_distance * zoom_factor).clamp(MIN_DISTANCE, MAX_DISTANCE);
        }
    }

    // Smooth interpolation for zoom and target
    let dt = time.delta_secs();
    let lerp_factor = 1.0 - (-settings.smooth_factor * 60.0 * dt).exp();
    settings.distance = settings.distance + (settings.target_distance - settings.distance) * lerp_factor;
    settings.target = settings.target + (settings.target_focus - settings.target) * lerp_factor;

    if let Ok(mut transform) = camera_query.single_mut() {
        transform.translation = settings.eye();
        transform.look_at(settings.target, Vec3::Y);
    }
}

/// Push the exposure setting into every camera that tone-maps
fn apply_exposure(viewer: Res<Viewer>, mut cameras: Query<&mut Exposure>) {
    if !viewer.pending_changes().exposure {
        return;
    }
    let ev100 = exposure_ev100(viewer.settings.renderer.exposure);
    for mut exposure in &mut cameras {
        exposure.ev100 = ev100;
    }
}
