//! Application state shared by the UI and the render loop
//!
//! All of it is written from one thread, one handler at a time, between
//! frames. Handlers take `&mut ViewerState` rather than reaching for
//! globals, so the borrow checker enforces a single writer per tick.

use crate::animation::{AnimationController, AnimationError};
use crate::layers::LayerStore;
use crate::meshes::{MeshError, MeshId, MeshRegistry};
use crate::model::{LoadStatus, ModelSnapshot, ModelSource};
use crate::settings::{RenderSettings, SettingsChanges, SettingsPatch};

/// Identifies one load request; snapshots from older requests are dropped
pub type LoadGeneration = u64;

#[derive(Debug, Clone)]
pub struct ViewerState<H> {
    pub settings: RenderSettings,
    pub meshes: MeshRegistry<H>,
    pub animations: AnimationController,
    pub status: LoadStatus,
    source: Option<ModelSource>,
    generation: LoadGeneration,
    pending: SettingsChanges,
}

impl<H: Clone + PartialEq> ViewerState<H> {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            meshes: MeshRegistry::new(),
            animations: AnimationController::new(),
            status: LoadStatus::Idle,
            source: None,
            generation: 0,
            pending: SettingsChanges::ALL,
        }
    }

    pub fn source(&self) -> Option<&ModelSource> {
        self.source.as_ref()
    }

    pub fn generation(&self) -> LoadGeneration {
        self.generation
    }

    /// Start loading a model. The current scene stays until the load publishes.
    pub fn begin_load(&mut self, source: ModelSource) -> LoadGeneration {
        self.generation += 1;
        self.status = LoadStatus::Loading(source.label().to_string());
        tracing::info!(generation = self.generation, "Loading {}", source);
        self.source = Some(source);
        self.generation
    }

    /// Replace meshes and clips with those of a finished load, starting the
    /// first clip when `autoplay` is set.
    ///
    /// Returns `false` and changes nothing when `generation` is stale.
    pub fn publish(&mut self, generation: LoadGeneration, snapshot: ModelSnapshot<H>, autoplay: bool) -> bool {
        if generation != self.generation {
            tracing::debug!(generation, current = self.generation, "Dropping stale model snapshot");
            return false;
        }

        self.meshes
            .replace_all(snapshot.meshes.iter().map(|(name, handle)| (name.as_deref(), handle.clone())));
        self.animations = AnimationController::from_clips(
            snapshot
                .clips
                .into_iter()
                .map(|clip| (clip.name, clip.duration)),
        );
        let first = self.animations.clips().first().map(|clip| clip.name.clone());
        if let (true, Some(first)) = (autoplay, first) {
            if let Err(e) = self.animations.start(&first) {
                tracing::warn!("Autoplay failed: {}", e);
            }
        }

        let label = self.source.as_ref().map(|s| s.label().to_string()).unwrap_or_default();
        self.status = LoadStatus::Ready(label);
        self.pending.merge(SettingsChanges {
            materials: true,
            ..Default::default()
        });
        tracing::info!(
            meshes = self.meshes.len(),
            clips = self.animations.clips().len(),
            "Model ready"
        );
        true
    }

    /// Record a failed load. Stale failures are ignored.
    pub fn fail(&mut self, generation: LoadGeneration, message: impl Into<String>) -> bool {
        if generation != self.generation {
            return false;
        }
        let message = message.into();
        tracing::error!("Model load failed: {}", message);
        self.status = LoadStatus::Failed(message);
        true
    }

    /// Merge a control's partial update
    pub fn apply_patch(&mut self, patch: &SettingsPatch) -> SettingsChanges {
        let changes = self.settings.apply(patch);
        self.pending.merge(changes);
        changes
    }

    /// Settings changes not yet applied to the scene
    pub fn pending_changes(&self) -> SettingsChanges {
        self.pending
    }

    /// Take the pending changes, leaving none
    pub fn take_changes(&mut self) -> SettingsChanges {
        std::mem::take(&mut self.pending)
    }

    /// Checkbox handler
    pub fn toggle_bloom<S: LayerStore<H>>(&mut self, id: MeshId, store: &mut S) -> Result<bool, MeshError> {
        self.meshes.toggle_bloom(id, store)
    }

    /// Pick handler. A pick that hit nothing registered is a no-op.
    pub fn pick_toggle<S: LayerStore<H>>(&mut self, hit: Option<&H>, store: &mut S) -> Option<(MeshId, bool)> {
        self.meshes.toggle_bloom_for_handle(hit?, store)
    }

    /// Animation checkbox handler
    pub fn set_clip_playing(&mut self, name: &str, playing: bool) -> Result<(), AnimationError> {
        self.animations.set_playing(name, playing)
    }
}

impl<H: Clone + PartialEq> Default for ViewerState<H> {
    fn default() -> Self {
        Self::new(RenderSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{LayerMask, BLOOM_LAYER};
    use crate::model::ClipInfo;
    use std::collections::HashMap;

    fn snapshot(meshes: &[(&str, u32)], clips: &[&str]) -> ModelSnapshot<u32> {
        ModelSnapshot {
            meshes: meshes.iter().map(|(n, h)| (Some(n.to_string()), *h)).collect(),
            clips: clips
                .iter()
                .map(|name| ClipInfo {
                    name: name.to_string(),
                    duration: Some(1.0),
                })
                .collect(),
        }
    }

    #[test]
    fn test_publish_replaces_scene_lists() {
        let mut state = ViewerState::default();
        let first = state.begin_load(ModelSource::Bundled("models/a.glb".to_string()));
        assert!(state.status.is_loading());
        assert!(state.publish(first, snapshot(&[("Body", 1), ("Lamp", 2)], &["Idle"]), false));
        state.animations.start("Idle").unwrap();

        let second = state.begin_load(ModelSource::Url("https://example.com/b.glb".to_string()));
        // previous content stays until the new snapshot arrives
        assert_eq!(state.meshes.len(), 2);

        assert!(state.publish(second, snapshot(&[("Car", 7)], &[]), true));
        assert_eq!(state.meshes.entries()[0].name, "Car");
        assert!(state.animations.is_empty());
        assert_eq!(state.status, LoadStatus::Ready("b.glb".to_string()));
    }

    #[test]
    fn test_stale_load_is_dropped() {
        let mut state = ViewerState::default();
        let slow = state.begin_load(ModelSource::Bundled("slow.glb".to_string()));
        let fast = state.begin_load(ModelSource::Bundled("fast.glb".to_string()));

        assert!(state.publish(fast, snapshot(&[("Fast", 1)], &[]), false));
        assert!(!state.publish(slow, snapshot(&[("Slow", 2)], &[]), false));
        assert!(!state.fail(slow, "timeout"));

        assert_eq!(state.meshes.entries()[0].name, "Fast");
        assert_eq!(state.status, LoadStatus::Ready("fast.glb".to_string()));
    }

    #[test]
    fn test_autoplay_starts_first_clip() {
        let mut state: ViewerState<u32> = ViewerState::default();
        let generation = state.begin_load(ModelSource::Bundled("a.glb".to_string()));
        assert!(state.publish(generation, snapshot(&[("Body", 1)], &["first", "second"]), true));
        assert_eq!(state.animations.active(), vec!["first"]);

        let generation = state.begin_load(ModelSource::Bundled("b.glb".to_string()));
        assert!(state.publish(generation, snapshot(&[("Body", 1)], &["first", "second"]), false));
        assert!(state.animations.active().is_empty());
    }

    #[test]
    fn test_autoplay_without_clips() {
        let mut state: ViewerState<u32> = ViewerState::default();
        let generation = state.begin_load(ModelSource::Bundled("static.glb".to_string()));
        assert!(state.publish(generation, snapshot(&[("Body", 1)], &[]), true));
        assert!(state.animations.active().is_empty());
        assert_eq!(state.animations.status_message(), Some(crate::animation::NO_ANIMATIONS));
        assert_eq!(state.status, LoadStatus::Ready("static.glb".to_string()));
    }

    #[test]
    fn test_failure_is_surfaced() {
        let mut state: ViewerState<u32> = ViewerState::default();
        let generation = state.begin_load(ModelSource::Bundled("broken.glb".to_string()));
        assert!(state.fail(generation, "invalid GLB header"));
        assert_eq!(state.status.error(), Some("invalid GLB header"));
    }

    #[test]
    fn test_pick_and_checkbox_share_invariant() {
        let mut state = ViewerState::default();
        let generation = state.begin_load(ModelSource::Bundled("a.glb".to_string()));
        state.publish(generation, snapshot(&[("Body", 1), ("Lamp", 2)], &[]), false);
        let mut store: HashMap<u32, LayerMask> = [(1, LayerMask::default()), (2, LayerMask::default())].into();

        assert_eq!(state.pick_toggle(None, &mut store), None);
        let (id, on) = state.pick_toggle(Some(&2), &mut store).unwrap();
        assert!(on);
        assert!(store[&2].contains(BLOOM_LAYER));

        assert_eq!(state.toggle_bloom(id, &mut store), Ok(false));
        assert!(!store[&2].contains(BLOOM_LAYER));
        assert!(state.meshes.is_consistent(&store));
    }

    #[test]
    fn test_pending_changes() {
        let mut state: ViewerState<u32> = ViewerState::default();
        assert_eq!(state.take_changes(), SettingsChanges::ALL);
        assert!(state.pending_changes().is_empty());

        state.apply_patch(&SettingsPatch {
            exposure: Some(1.0),
            ..Default::default()
        });
        let changes = state.take_changes();
        assert!(changes.exposure);
        assert!(!changes.bloom);
    }
}
