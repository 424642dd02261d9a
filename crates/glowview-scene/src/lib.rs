//! Glowview Scene - Selective-bloom 3D rendering and UI components
//!
//! This crate turns the renderer-independent state of `glowview-core` into a
//! Bevy scene: offscreen base and bloom cameras with a composite pass, lights,
//! glTF model loading, pick-to-toggle, animation playback, and egui widgets.

pub mod animation;
pub mod bloom;
pub mod camera;
pub mod layers;
pub mod models;
pub mod picking;
pub mod scene;
pub mod ui;

use bevy::prelude::*;
use glowview_core::{ViewerConfig, ViewerState};

/// Viewer state owned by the Bevy world. Mesh handles are entities.
#[derive(Resource, Deref, DerefMut)]
pub struct Viewer(pub ViewerState<Entity>);

/// Configuration the app was started with
#[derive(Resource, Clone, Deref)]
pub struct SceneConfig(pub ViewerConfig);

/// Ordering of the per-frame work
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewerSet {
    /// Pointer and keyboard handling
    Input,
    /// Model requests and scene spawning
    Load,
    /// Pushing changed settings into lights, materials, and cameras
    ApplySettings,
}

/// Plugin that sets up the shared 3D scene components
pub struct GlowviewScenePlugin {
    pub config: ViewerConfig,
}

impl Plugin for GlowviewScenePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(SceneConfig(self.config.clone()))
            .insert_resource(Viewer(ViewerState::new(self.config.settings.clone())))
            .configure_sets(
                Update,
                (ViewerSet::Input, ViewerSet::Load, ViewerSet::ApplySettings).chain(),
            )
            .add_systems(Update, finish_settings_apply.after(ViewerSet::ApplySettings))
            .add_plugins(camera::CameraPlugin)
            .add_plugins(scene::SceneSetupPlugin)
            .add_plugins(bloom::SelectiveBloomPlugin)
            .add_plugins(models::ModelsPlugin)
            .add_plugins(picking::PickingPlugin)
            .add_plugins(animation::AnimationControlPlugin);
    }
}

/// Every settings consumer has run for this frame
fn finish_settings_apply(mut viewer: ResMut<Viewer>) {
    if !viewer.pending_changes().is_empty() {
        viewer.take_changes();
    }
}

// Re-export commonly used types
pub use bloom::CompositeMaterial;
pub use layers::{COMPOSITE_LAYER, PROXY_LAYER};
pub use camera::{CameraSettings, MainCamera};
pub use models::{ModelMesh, ModelRequests};
