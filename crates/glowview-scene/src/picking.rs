//! Click-to-toggle bloom on model meshes

use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use bevy_egui::EguiContexts;
use bevy_picking::mesh_picking::ray_cast::{MeshRayCast, MeshRayCastSettings, RayCastVisibility};
use glowview_core::{nearest_hit, pointer_to_ndc, ClickTracker, PickRay};

use crate::camera::MainCamera;
use crate::layers::{EntityLayers, ModelLayers};
use crate::{Viewer, ViewerSet};

/// Press/release tracking for the left mouse button
#[derive(Resource, Default, Deref, DerefMut)]
pub struct PickClicks(pub ClickTracker);

/// Plugin for picking model meshes with the pointer
pub struct PickingPlugin;

impl Plugin for PickingPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PickClicks>()
            .add_systems(Update, pick_bloom_meshes.in_set(ViewerSet::Input));
    }
}

/// World-space ray under a window position, as seen by `camera`
pub fn pick_ray(camera: &Camera, transform: &GlobalTransform, pointer: Vec2, window_size: Vec2) -> Option<Ray3d> {
    let ndc = pointer_to_ndc(pointer, window_size)?;
    let world_from_clip = transform.to_matrix() * camera.clip_from_view().inverse();
    let ray = PickRay::from_ndc(ndc, world_from_clip)?;
    let direction = Dir3::new(ray.direction).ok()?;
    Some(Ray3d::new(ray.origin, direction))
}

/// A left click that did not drag toggles bloom on the nearest model mesh
#[allow(clippy::too_many_arguments)]
fn pick_bloom_meshes(
    mouse_button: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&Camera, &GlobalTransform), With<MainCamera>>,
    mut clicks: ResMut<PickClicks>,
    mut contexts: EguiContexts,
    mut ray_cast: MeshRayCast,
    mut viewer: ResMut<Viewer>,
    mut layers: ModelLayers,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let Some(cursor) = window.cursor_position() else {
        clicks.cancel();
        return;
    };

    let egui_wants_pointer = contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_pointer_input() || ctx.is_pointer_over_area())
        .unwrap_or(false);

    if mouse_button.just_pressed(MouseButton::Left) {
        if egui_wants_pointer {
            clicks.cancel();
        } else {
            clicks.press(cursor);
        }
    }

    if !mouse_button.just_released(MouseButton::Left) {
        return;
    }
    let Some(position) = clicks.release(cursor) else {
        return;
    };

    let Ok((camera, transform)) = cameras.single() else {
        return;
    };
    let window_size = Vec2::new(window.width(), window.height());
    let Some(ray) = pick_ray(camera, transform, position, window_size) else {
        return;
    };

    let hit = {
        let registered = |entity: Entity| viewer.meshes.contains_handle(&entity);
        let settings = MeshRayCastSettings::default()
            .with_filter(&registered)
            .with_visibility(RayCastVisibility::Visible);
        nearest_hit(
            ray_cast
                .cast_ray(ray, &settings)
                .iter()
                .map(|(entity, hit)| (*entity, hit.distance)),
        )
        .map(|(entity, _)| entity)
    };

    let mut store = EntityLayers::new(&mut layers);
    if let Some((id, bloom)) = viewer.pick_toggle(hit.as_ref(), &mut store) {
        tracing::debug!(mesh = %id, bloom, "Picked mesh");
    }
}
