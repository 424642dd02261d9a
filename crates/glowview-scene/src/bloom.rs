//! Selective bloom
//!
//! Three cameras produce each frame:
//! - the base camera draws the model (layer 0) into the base image
//! - its child bloom camera draws the bloom proxies (proxy layer) through the
//!   HDR bloom chain into the bloom image, cleared to black
//! - the composite camera draws a full-screen quad that adds the bloom image
//!   onto the base image and applies FXAA, straight to the window
//!
//! Every model mesh has one proxy child on the proxy layer sharing its mesh.
//! The frame backend gives member proxies their mesh's material and all other
//! proxies the dark material, so the bloom image holds only member silhouettes.
//! Model materials themselves are never swapped, so the base pass always sees
//! them intact.

use std::collections::{HashMap, HashSet};

use bevy::asset::{embedded_asset, embedded_path, AssetPath};
use bevy::camera::visibility::RenderLayers;
use bevy::camera::{Exposure, RenderTarget, ScalingMode};
use bevy::core_pipeline::tonemapping::Tonemapping;
use bevy::light::NotShadowCaster;
use bevy::mesh::skinning::SkinnedMesh;
use bevy::pbr::{Material, MaterialPlugin};
use bevy::post_process::bloom::{Bloom, BloomCompositeMode, BloomPrefilter};
use bevy::prelude::*;
use bevy::render::render_resource::{AsBindGroup, Extent3d, TextureFormat};
use bevy::render::view::{Hdr, Msaa};
use bevy::shader::ShaderRef;
use bevy::window::PrimaryWindow;
use bevy_egui::PrimaryEguiContext;
use glowview_core::settings::BloomSettings;
use glowview_core::{
    render_selective_bloom, BloomFrameBackend, CompositeError, ResizeTracker, ViewportSize, MAIN_LAYER,
};

use crate::camera::{exposure_ev100, MainCamera};
use crate::layers::{COMPOSITE_LAYER, PROXY_LAYER};
use crate::models::ModelMesh;
use crate::{SceneConfig, Viewer, ViewerSet};

/// Bloom strength 1.0 maps to this `Bloom::intensity`
const BLOOM_INTENSITY_SCALE: f32 = 0.2;

/// Full-screen pass adding the bloom image to the base image
#[derive(Asset, TypePath, AsBindGroup, Debug, Clone)]
pub struct CompositeMaterial {
    /// x, y: inverse output resolution. z: bloom mix. w: 1.0 when FXAA is on.
    #[uniform(0)]
    pub params: Vec4,
    #[texture(1)]
    #[sampler(2)]
    pub base: Handle<Image>,
    #[texture(3)]
    #[sampler(4)]
    pub bloom: Handle<Image>,
}

impl Material for CompositeMaterial {
    fn fragment_shader() -> ShaderRef {
        let path = embedded_path!("shaders/composite.wgsl");
        ShaderRef::from(AssetPath::from_path_buf(path).with_source("embedded"))
    }
}

/// Offscreen images and materials of the bloom pipeline
#[derive(Resource)]
pub struct BloomTargets {
    pub base: Handle<Image>,
    pub bloom: Handle<Image>,
    pub composite: Handle<CompositeMaterial>,
    /// Unlit black, worn by non-member proxies
    pub dark: Handle<StandardMaterial>,
    tracker: ResizeTracker,
}

/// Camera that renders the bloom proxies
#[derive(Component)]
pub struct BloomCamera;

/// Camera that presents the composited frame
#[derive(Component)]
pub struct CompositeCamera;

/// Stand-in for a model mesh during the bloom pass
#[derive(Component)]
pub struct BloomProxy {
    pub source: Entity,
}

/// Set on model meshes once their proxy exists
#[derive(Component)]
pub struct HasBloomProxy;

/// Plugin for the selective bloom cameras and composite pass
pub struct SelectiveBloomPlugin;

impl Plugin for SelectiveBloomPlugin {
    fn build(&self, app: &mut App) {
        embedded_asset!(app, "shaders/composite.wgsl");

        app.add_plugins(MaterialPlugin::<CompositeMaterial>::default())
            .add_systems(Startup, setup_bloom_pipeline)
            .add_systems(
                Update,
                (
                    resize_render_targets,
                    apply_bloom_settings,
                    attach_bloom_proxies,
                )
                    .in_set(ViewerSet::ApplySettings),
            )
            .add_systems(PostUpdate, drive_bloom_frame);
    }
}

/// Bloom component for the current settings
pub fn bloom_from_settings(settings: &BloomSettings) -> Bloom {
    Bloom {
        intensity: settings.strength * BLOOM_INTENSITY_SCALE,
        low_frequency_boost: settings.radius,
        prefilter: BloomPrefilter {
            threshold: settings.threshold,
            threshold_softness: 0.1,
        },
        composite_mode: BloomCompositeMode::Additive,
        ..Bloom::NATURAL
    }
}

fn composite_params(inverse_resolution: [f32; 2], antialiasing: bool) -> Vec4 {
    Vec4::new(
        inverse_resolution[0],
        inverse_resolution[1],
        1.0,
        if antialiasing { 1.0 } else { 0.0 },
    )
}

fn setup_bloom_pipeline(
    mut commands: Commands,
    mut images: ResMut<Assets<Image>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut standard_materials: ResMut<Assets<StandardMaterial>>,
    mut composite_materials: ResMut<Assets<CompositeMaterial>>,
    config: Res<SceneConfig>,
    viewer: Res<Viewer>,
) {
    // Sized for real on the first resize pass
    let base = images.add(Image::new_target_texture(1, 1, TextureFormat::Rgba8UnormSrgb));
    let bloom = images.add(Image::new_target_texture(1, 1, TextureFormat::Rgba8UnormSrgb));

    let dark = standard_materials.add(StandardMaterial {
        base_color: Color::BLACK,
        unlit: true,
        ..default()
    });

    let settings = &viewer.settings;
    let composite = composite_materials.add(CompositeMaterial {
        params: composite_params([1.0, 1.0], settings.renderer.antialiasing),
        base: base.clone(),
        bloom: bloom.clone(),
    });

    // Composite camera, first so egui attaches to the window
    commands.spawn((
        Camera3d::default(),
        Camera {
            order: 2,
            clear_color: ClearColorConfig::Custom(Color::BLACK),
            ..default()
        },
        Projection::Orthographic(OrthographicProjection {
            scaling_mode: ScalingMode::Fixed {
                width: 2.0,
                height: 2.0,
            },
            ..OrthographicProjection::default_3d()
        }),
        Tonemapping::None,
        Msaa::Off,
        Transform::from_xyz(0.0, 0.0, 1.0).looking_at(Vec3::ZERO, Vec3::Y),
        RenderLayers::layer(COMPOSITE_LAYER),
        CompositeCamera,
        PrimaryEguiContext,
    ));

    commands.spawn((
        Mesh3d(meshes.add(Rectangle::new(2.0, 2.0))),
        MeshMaterial3d(composite.clone()),
        RenderLayers::layer(COMPOSITE_LAYER),
        NotShadowCaster,
    ));

    let camera = &config.camera;
    let projection = Projection::Perspective(PerspectiveProjection {
        fov: camera.fov_degrees.to_radians(),
        near: camera.near,
        ..default()
    });
    let exposure = Exposure {
        ev100: exposure_ev100(settings.renderer.exposure),
    };

    commands
        .spawn((
            Camera3d::default(),
            Camera {
                order: 0,
                target: RenderTarget::Image(base.clone().into()),
                ..default()
            },
            projection.clone(),
            Tonemapping::TonyMcMapface,
            exposure,
            Transform::from_translation(Vec3::from_array(camera.position))
                .looking_at(Vec3::from_array(camera.target), Vec3::Y),
            RenderLayers::layer(MAIN_LAYER),
            MainCamera,
        ))
        .with_children(|parent| {
            parent.spawn((
                Camera3d::default(),
                Camera {
                    order: 1,
                    target: RenderTarget::Image(bloom.clone().into()),
                    clear_color: ClearColorConfig::Custom(Color::BLACK),
                    ..default()
                },
                projection,
                Hdr,
                bloom_from_settings(&settings.bloom),
                Tonemapping::TonyMcMapface,
                exposure,
                Transform::default(),
                RenderLayers::layer(PROXY_LAYER),
                BloomCamera,
            ));
        });

    commands.insert_resource(BloomTargets {
        base,
        bloom,
        composite,
        dark,
        tracker: ResizeTracker::default(),
    });
}

/// Keep both offscreen images at window size times the resolution scale
fn resize_render_targets(
    windows: Query<&Window, With<PrimaryWindow>>,
    viewer: Res<Viewer>,
    targets: Option<ResMut<BloomTargets>>,
    mut images: ResMut<Assets<Image>>,
    mut composites: ResMut<Assets<CompositeMaterial>>,
) {
    let (Ok(window), Some(mut targets)) = (windows.single(), targets) else {
        return;
    };

    let viewport = ViewportSize::new(window.width(), window.height(), window.scale_factor());
    let Some(layout) = targets
        .tracker
        .update(viewport, viewer.settings.renderer.resolution_scale)
    else {
        return;
    };

    for (handle, extent) in [(&targets.base, layout.base), (&targets.bloom, layout.bloom)] {
        if let Some(image) = images.get_mut(handle) {
            image.resize(Extent3d {
                width: extent.width,
                height: extent.height,
                depth_or_array_layers: 1,
            });
        }
    }

    if let Some(material) = composites.get_mut(&targets.composite) {
        material.params = composite_params(layout.inverse_resolution, viewer.settings.renderer.antialiasing);
    }

    tracing::debug!(
        width = layout.base.width,
        height = layout.base.height,
        "Resized bloom render targets"
    );
}

fn apply_bloom_settings(
    viewer: Res<Viewer>,
    targets: Option<Res<BloomTargets>>,
    mut cameras: Query<&mut Bloom, With<BloomCamera>>,
    mut composites: ResMut<Assets<CompositeMaterial>>,
) {
    let changes = viewer.pending_changes();

    if changes.bloom {
        for mut bloom in &mut cameras {
            *bloom = bloom_from_settings(&viewer.settings.bloom);
        }
    }

    if changes.antialiasing {
        if let Some(material) = targets.and_then(|t| composites.get_mut(&t.composite)) {
            material.params.w = if viewer.settings.renderer.antialiasing { 1.0 } else { 0.0 };
        }
    }
}

/// Give every new model mesh its proxy child
fn attach_bloom_proxies(
    mut commands: Commands,
    targets: Option<Res<BloomTargets>>,
    meshes: Query<(Entity, &Mesh3d, Option<&SkinnedMesh>), (With<ModelMesh>, Without<HasBloomProxy>)>,
) {
    let Some(targets) = targets else {
        return;
    };

    for (entity, mesh, skinned) in &meshes {
        let mut proxy = commands.spawn((
            BloomProxy { source: entity },
            Mesh3d(mesh.0.clone()),
            MeshMaterial3d(targets.dark.clone()),
            Transform::default(),
            RenderLayers::layer(PROXY_LAYER),
            NotShadowCaster,
            ChildOf(entity),
        ));
        if let Some(skinned) = skinned {
            proxy.insert(skinned.clone());
        }
        commands.entity(entity).insert(HasBloomProxy);
    }
}

type ProxyMaterials<'w, 's> =
    Query<'w, 's, (&'static BloomProxy, &'static mut MeshMaterial3d<StandardMaterial>), Without<ModelMesh>>;

/// One frame of the bloom pipeline, driven through the ECS.
///
/// The working material map starts as each mesh's own material. Darkening
/// and restoring edit the map; the bloom step copies it onto the proxies.
struct ProxyFrame<'a, 'w, 's> {
    meshes: Vec<Entity>,
    members: HashSet<Entity>,
    materials: HashMap<Entity, Handle<StandardMaterial>>,
    dark: Handle<StandardMaterial>,
    proxies: &'a mut ProxyMaterials<'w, 's>,
    base_ready: bool,
    bloom_ready: bool,
    composite_ready: bool,
}

impl BloomFrameBackend for ProxyFrame<'_, '_, '_> {
    type Mesh = Entity;
    type Material = Handle<StandardMaterial>;

    fn meshes(&self) -> Vec<Entity> {
        self.meshes.clone()
    }

    fn is_bloom_member(&self, mesh: Entity) -> bool {
        self.members.contains(&mesh)
    }

    fn material(&self, mesh: Entity) -> Option<Handle<StandardMaterial>> {
        self.materials.get(&mesh).cloned()
    }

    fn set_material(&mut self, mesh: Entity, material: Handle<StandardMaterial>) {
        if let Some(slot) = self.materials.get_mut(&mesh) {
            *slot = material;
        }
    }

    fn dark_material(&self) -> Handle<StandardMaterial> {
        self.dark.clone()
    }

    fn render_bloom(&mut self) -> Result<(), CompositeError> {
        if !self.bloom_ready {
            return Err(CompositeError::MissingTarget("bloom"));
        }
        for (proxy, mut material) in self.proxies.iter_mut() {
            let wanted = self.materials.get(&proxy.source).unwrap_or(&self.dark);
            if material.0 != *wanted {
                material.0 = wanted.clone();
            }
        }
        Ok(())
    }

    // The base camera (order 0) draws this pass; only its target is checked here
    fn render_base(&mut self) -> Result<(), CompositeError> {
        if self.base_ready {
            Ok(())
        } else {
            Err(CompositeError::MissingTarget("base"))
        }
    }

    // The composite camera (order 2) draws this pass after the bloom camera (order 1)
    fn composite(&mut self) -> Result<(), CompositeError> {
        if self.composite_ready {
            Ok(())
        } else {
            Err(CompositeError::MissingTarget("composite"))
        }
    }
}

/// Prepare the bloom proxies for this frame's render
fn drive_bloom_frame(
    viewer: Res<Viewer>,
    targets: Option<Res<BloomTargets>>,
    images: Res<Assets<Image>>,
    composites: Res<Assets<CompositeMaterial>>,
    originals: Query<&MeshMaterial3d<StandardMaterial>, With<ModelMesh>>,
    mut proxies: ProxyMaterials,
    mut last_error: Local<Option<CompositeError>>,
) {
    let Some(targets) = targets else {
        return;
    };

    let meshes: Vec<Entity> = viewer.meshes.entries().iter().map(|entry| entry.handle).collect();
    let materials = meshes
        .iter()
        .filter_map(|entity| originals.get(*entity).ok().map(|m| (*entity, m.0.clone())))
        .collect();

    let mut frame = ProxyFrame {
        members: viewer.meshes.bloom_members().map(|entry| entry.handle).collect(),
        meshes,
        materials,
        dark: targets.dark.clone(),
        proxies: &mut proxies,
        base_ready: images.contains(&targets.base),
        bloom_ready: images.contains(&targets.bloom),
        composite_ready: composites.contains(&targets.composite),
    };

    match render_selective_bloom(&mut frame) {
        Ok(_) => *last_error = None,
        Err(e) => {
            if last_error.as_ref() != Some(&e) {
                tracing::warn!("Bloom frame skipped: {}", e);
            }
            *last_error = Some(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bloom_from_settings() {
        let bloom = bloom_from_settings(&BloomSettings {
            strength: 1.5,
            radius: 0.4,
            threshold: 0.85,
        });
        assert!((bloom.intensity - 0.3).abs() < 1e-6);
        assert_eq!(bloom.low_frequency_boost, 0.4);
        assert_eq!(bloom.prefilter.threshold, 0.85);
        assert_eq!(bloom.composite_mode, BloomCompositeMode::Additive);
    }

    #[test]
    fn test_composite_params() {
        let params = composite_params([1.0 / 3200.0, 1.0 / 1800.0], false);
        assert_eq!(params.x, 1.0 / 3200.0);
        assert_eq!(params.y, 1.0 / 1800.0);
        assert_eq!(params.z, 1.0);
        assert_eq!(params.w, 0.0);
    }

    #[test]
    fn test_proxy_frame_darkens_non_members() {
        let mut world = World::new();
        let lamp = world.spawn(ModelMesh).id();
        let body = world.spawn(ModelMesh).id();

        let mut materials = Assets::<StandardMaterial>::default();
        let lamp_material = materials.add(StandardMaterial::default());
        let body_material = materials.add(StandardMaterial::default());
        let dark = materials.add(StandardMaterial::default());

        let lamp_proxy = world
            .spawn((BloomProxy { source: lamp }, MeshMaterial3d(dark.clone())))
            .id();
        let body_proxy = world
            .spawn((BloomProxy { source: body }, MeshMaterial3d(lamp_material.clone())))
            .id();

        let mut state: bevy::ecs::system::SystemState<ProxyMaterials> =
            bevy::ecs::system::SystemState::new(&mut world);
        {
            let mut proxies = state.get_mut(&mut world);
            let mut frame = ProxyFrame {
                meshes: vec![lamp, body],
                members: HashSet::from([lamp]),
                materials: HashMap::from([(lamp, lamp_material.clone()), (body, body_material.clone())]),
                dark: dark.clone(),
                proxies: &mut proxies,
                base_ready: true,
                bloom_ready: true,
                composite_ready: true,
            };

            let stats = render_selective_bloom(&mut frame).unwrap();
            assert_eq!(stats.darkened, 1);
            assert_eq!(frame.materials[&body], body_material);
        }

        let proxy_material = |entity| {
            world
                .get::<MeshMaterial3d<StandardMaterial>>(entity)
                .map(|m| m.0.clone())
        };
        assert_eq!(proxy_material(lamp_proxy), Some(lamp_material));
        assert_eq!(proxy_material(body_proxy), Some(dark));
    }

    #[test]
    fn test_missing_target_is_reported() {
        let mut world = World::new();
        let mut state: bevy::ecs::system::SystemState<ProxyMaterials> =
            bevy::ecs::system::SystemState::new(&mut world);
        let mut proxies = state.get_mut(&mut world);

        let mut frame = ProxyFrame {
            meshes: Vec::new(),
            members: HashSet::new(),
            materials: HashMap::new(),
            dark: Handle::default(),
            proxies: &mut proxies,
            base_ready: false,
            bloom_ready: true,
            composite_ready: true,
        };

        assert_eq!(
            render_selective_bloom(&mut frame),
            Err(CompositeError::MissingTarget("base"))
        );
    }
}
