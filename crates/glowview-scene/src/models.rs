//! glTF model loading
//!
//! A load runs in three steps, one system each:
//! 1. a queued [`ModelSource`] starts an asset load under a new generation
//! 2. once the `Gltf` asset is in, its scene is spawned hidden
//! 3. once the scene instance is ready, its meshes are registered, the old
//!    model is despawned and the new one shown
//!
//! A request that arrives mid-load supersedes the one in flight; whatever the
//! older load produces is discarded.

use std::collections::HashSet;

use bevy::asset::LoadState;
use bevy::camera::visibility::RenderLayers;
use bevy::gltf::Gltf;
use bevy::platform::collections::HashMap;
use bevy::prelude::*;
use bevy::scene::{SceneInstance, SceneSpawner};
use glowview_core::state::LoadGeneration;
use glowview_core::{ClipInfo, ModelSnapshot, ModelSource, MAIN_LAYER};

use crate::{SceneConfig, Viewer, ViewerSet};

/// Marker component for the meshes of the loaded model
#[derive(Component)]
pub struct ModelMesh;

/// Root entity of a spawned model
#[derive(Component)]
pub struct ModelRoot {
    pub generation: LoadGeneration,
}

/// Queue of model sources to show. Only the latest request matters.
#[derive(Resource, Default)]
pub struct ModelRequests {
    pending: Option<ModelSource>,
}

impl ModelRequests {
    pub fn request(&mut self, source: ModelSource) {
        if let Some(previous) = self.pending.replace(source) {
            tracing::debug!("Superseded queued request for {}", previous);
        }
    }

    pub fn take(&mut self) -> Option<ModelSource> {
        self.pending.take()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }
}

/// Animation clips of the model on screen, for the animation plugin
#[derive(Resource, Default)]
pub struct ModelClips {
    pub root: Option<Entity>,
    pub clips: Vec<(String, Handle<AnimationClip>)>,
}

/// Scene spawned for a load but not yet published
struct SpawningScene {
    generation: LoadGeneration,
    root: Entity,
    clips: Vec<(String, Handle<AnimationClip>)>,
}

/// Progress of the model pipeline
#[derive(Resource, Default)]
struct ModelLoad {
    loading: Option<(LoadGeneration, Handle<Gltf>)>,
    spawning: Option<SpawningScene>,
    current: Option<Entity>,
}

/// Plugin for glTF model loading
pub struct ModelsPlugin;

impl Plugin for ModelsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ModelRequests>()
            .init_resource::<ModelClips>()
            .init_resource::<ModelLoad>()
            .add_systems(Startup, request_initial_model)
            .add_systems(
                Update,
                (start_model_loads, watch_model_load, publish_model).chain().in_set(ViewerSet::Load),
            );
    }
}

/// Source for a configured model path. Absolute http(s) addresses are remote.
pub fn source_for_path(path: &str) -> ModelSource {
    if path.starts_with("http://") || path.starts_with("https://") {
        ModelSource::Url(path.to_string())
    } else {
        ModelSource::Bundled(path.to_string())
    }
}

/// Name every clip of a glTF file, in file order.
///
/// Unnamed clips get "Animation N" so each checkbox has a label. Clips are
/// looked up by name, so a fallback never reuses a name already taken.
pub fn name_clips(
    animations: &[Handle<AnimationClip>],
    named: &HashMap<Box<str>, Handle<AnimationClip>>,
) -> Vec<(String, Handle<AnimationClip>)> {
    let mut taken: HashSet<String> = named.keys().map(|name| name.to_string()).collect();
    animations
        .iter()
        .enumerate()
        .map(|(index, handle)| {
            let name = match named.iter().find(|(_, named_handle)| *named_handle == handle) {
                Some((name, _)) => name.to_string(),
                None => {
                    let mut name = format!("Animation {}", index);
                    let mut suffix = 2;
                    while taken.contains(&name) {
                        name = format!("Animation {} ({})", index, suffix);
                        suffix += 1;
                    }
                    taken.insert(name.clone());
                    name
                }
            };
            (name, handle.clone())
        })
        .collect()
}

fn request_initial_model(config: Res<SceneConfig>, mut requests: ResMut<ModelRequests>) {
    // A request queued before startup (e.g. from the page URL) wins
    if requests.is_empty() && !config.model.path.is_empty() {
        requests.request(source_for_path(&config.model.path));
    }
}

fn start_model_loads(
    mut requests: ResMut<ModelRequests>,
    mut load: ResMut<ModelLoad>,
    mut viewer: ResMut<Viewer>,
    asset_server: Res<AssetServer>,
) {
    let Some(source) = requests.take() else {
        return;
    };

    let handle: Handle<Gltf> = asset_server.load(source.asset_path().to_string());
    let generation = viewer.begin_load(source);
    load.loading = Some((generation, handle));
}

/// Poll the glTF asset and spawn its scene once loaded
fn watch_model_load(
    mut commands: Commands,
    mut load: ResMut<ModelLoad>,
    mut viewer: ResMut<Viewer>,
    asset_server: Res<AssetServer>,
    gltf_assets: Res<Assets<Gltf>>,
    config: Res<SceneConfig>,
) {
    let Some((generation, handle)) = load.loading.as_ref() else {
        return;
    };
    let generation = *generation;

    match asset_server.get_load_state(handle.id()) {
        Some(LoadState::Loaded) => {
            let Some(gltf) = gltf_assets.get(handle) else {
                return;
            };
            let scene = gltf.default_scene.clone().or_else(|| gltf.scenes.first().cloned());
            let clips = name_clips(&gltf.animations, &gltf.named_animations);
            load.loading = None;

            let Some(scene) = scene else {
                viewer.fail(generation, "the file contains no scene");
                return;
            };

            // An unpublished scene from an older load is abandoned
            if let Some(stale) = load.spawning.take() {
                commands.entity(stale.root).despawn();
            }

            let model = &config.model;
            let root = commands
                .spawn((
                    SceneRoot(scene),
                    Transform::from_translation(Vec3::from_array(model.offset))
                        .with_scale(Vec3::splat(model.scale)),
                    Visibility::Hidden,
                    ModelRoot { generation },
                ))
                .id();
            tracing::debug!(generation, clips = clips.len(), "Spawning model scene");

            load.spawning = Some(SpawningScene {
                generation,
                root,
                clips,
            });
        }
        Some(LoadState::Failed(err)) => {
            viewer.fail(generation, err.to_string());
            load.loading = None;
        }
        _ => {
            // Still loading
        }
    }
}

/// Register the meshes of a ready scene and swap it in
#[allow(clippy::too_many_arguments)]
fn publish_model(
    mut commands: Commands,
    mut load: ResMut<ModelLoad>,
    mut viewer: ResMut<Viewer>,
    mut model_clips: ResMut<ModelClips>,
    scene_spawner: Res<SceneSpawner>,
    instances: Query<&SceneInstance>,
    children: Query<&Children>,
    parents: Query<&ChildOf>,
    candidates: Query<(Option<&Name>, Has<Mesh3d>, Has<MeshMaterial3d<StandardMaterial>>)>,
    clip_assets: Res<Assets<AnimationClip>>,
    config: Res<SceneConfig>,
) {
    let Some(spawning) = load.spawning.as_ref() else {
        return;
    };
    let Ok(instance) = instances.get(spawning.root) else {
        return;
    };
    if !scene_spawner.instance_is_ready(**instance) {
        return;
    }
    let Some(spawning) = load.spawning.take() else {
        return;
    };

    let mut snapshot = ModelSnapshot::default();
    for entity in children.iter_descendants(spawning.root) {
        let Ok((name, has_mesh, has_material)) = candidates.get(entity) else {
            continue;
        };
        if !(has_mesh && has_material) {
            continue;
        }

        // glTF primitives sit under their node, which carries the author's name
        let node_name = parents
            .get(entity)
            .ok()
            .and_then(|parent| candidates.get(parent.parent()).ok())
            .and_then(|(parent_name, _, _)| parent_name)
            .or(name)
            .map(|n| n.as_str().to_string());

        commands
            .entity(entity)
            .insert((ModelMesh, RenderLayers::layer(MAIN_LAYER)));
        snapshot.meshes.push((node_name, entity));
    }

    snapshot.clips = spawning
        .clips
        .iter()
        .map(|(name, handle)| ClipInfo {
            name: name.clone(),
            duration: clip_assets.get(handle).map(|clip| clip.duration()),
        })
        .collect();

    let accepted = viewer.publish(spawning.generation, snapshot, config.model.autoplay_first_clip);
    swap_model_root(&mut commands, &mut load.current, spawning.root, accepted);
    if !accepted {
        return;
    }

    *model_clips = ModelClips {
        root: Some(spawning.root),
        clips: spawning.clips,
    };
}

/// Show an accepted root in place of the current one, or drop a rejected one
fn swap_model_root(commands: &mut Commands, current: &mut Option<Entity>, root: Entity, accepted: bool) {
    if !accepted {
        commands.entity(root).despawn();
        return;
    }
    if let Some(previous) = current.replace(root) {
        commands.entity(previous).despawn();
    }
    commands.entity(root).insert(Visibility::Inherited);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::world::CommandQueue;

    #[test]
    fn test_source_for_path() {
        assert_eq!(
            source_for_path("models/scene.glb"),
            ModelSource::Bundled("models/scene.glb".to_string())
        );
        assert_eq!(
            source_for_path("https://example.com/car.glb"),
            ModelSource::Url("https://example.com/car.glb".to_string())
        );
    }

    #[test]
    fn test_name_clips_keeps_file_order() {
        let mut clips = Assets::<AnimationClip>::default();
        let walk = clips.add(AnimationClip::default());
        let unnamed = clips.add(AnimationClip::default());
        let run = clips.add(AnimationClip::default());

        let mut named = HashMap::default();
        named.insert(Box::from("Walk"), walk.clone());
        named.insert(Box::from("Run"), run.clone());

        let names: Vec<String> = name_clips(&[walk, unnamed, run], &named)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["Walk", "Animation 1", "Run"]);
    }

    #[test]
    fn test_fallback_clip_name_stays_unique() {
        let mut clips = Assets::<AnimationClip>::default();
        let unnamed = clips.add(AnimationClip::default());
        let authored = clips.add(AnimationClip::default());

        let mut named = HashMap::default();
        named.insert(Box::from("Animation 0"), authored.clone());

        let names: Vec<String> = name_clips(&[unnamed, authored], &named)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["Animation 0 (2)", "Animation 0"]);
    }

    fn swap(world: &mut World, current: &mut Option<Entity>, root: Entity, accepted: bool) {
        let mut queue = CommandQueue::default();
        {
            let mut commands = Commands::new(&mut queue, world);
            swap_model_root(&mut commands, current, root, accepted);
        }
        queue.apply(world);
    }

    #[test]
    fn test_new_model_replaces_old_root() {
        let mut world = World::new();
        let old = world.spawn(Visibility::Inherited).id();
        let new = world.spawn(Visibility::Hidden).id();
        let mut current = Some(old);

        swap(&mut world, &mut current, new, true);

        assert_eq!(current, Some(new));
        assert!(world.get_entity(old).is_err());
        assert_eq!(world.get::<Visibility>(new), Some(&Visibility::Inherited));
    }

    #[test]
    fn test_superseded_scene_is_despawned() {
        let mut world = World::new();
        let shown = world.spawn(Visibility::Inherited).id();
        let stale = world.spawn(Visibility::Hidden).id();
        let mut current = Some(shown);

        swap(&mut world, &mut current, stale, false);

        assert_eq!(current, Some(shown));
        assert!(world.get_entity(stale).is_err());
        assert!(world.get_entity(shown).is_ok());
    }

    #[test]
    fn test_latest_request_wins() {
        let mut requests = ModelRequests::default();
        requests.request(ModelSource::Bundled("a.glb".to_string()));
        requests.request(ModelSource::Bundled("b.glb".to_string()));
        assert_eq!(requests.take(), Some(ModelSource::Bundled("b.glb".to_string())));
        assert!(requests.is_empty());
    }
}
