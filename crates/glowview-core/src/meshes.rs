//! Mesh registry with bloom membership
//!
//! One entry per mesh node of the loaded model. The bloom flag of an entry
//! and the bloom layer bit of its mesh are always written together, whether
//! the change comes from a checkbox or a pointer pick.

use crate::layers::{LayerStore, BLOOM_LAYER};
use std::fmt;
use thiserror::Error;

/// Display name for meshes without a node name
pub const UNNAMED_MESH: &str = "Unnamed object";

#[derive(Error, Debug, PartialEq)]
pub enum MeshError {
    #[error("unknown mesh {0}")]
    UnknownMesh(MeshId),
}

/// Stable identity of a registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u32);

impl fmt::Display for MeshId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A mesh of the loaded model and its bloom membership
#[derive(Debug, Clone, PartialEq)]
pub struct MeshEntry<H> {
    pub id: MeshId,
    pub name: String,
    /// Handle to the mesh object owned by the renderer
    pub handle: H,
    pub bloom: bool,
}

/// Registry of the meshes of the current model
#[derive(Debug, Clone)]
pub struct MeshRegistry<H> {
    entries: Vec<MeshEntry<H>>,
    next_id: u32,
}

impl<H> Default for MeshRegistry<H> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }
}

impl<H: Clone + PartialEq> MeshRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one mesh, not blooming. Ids are never reused within a session.
    pub fn register(&mut self, name: Option<&str>, handle: H) -> MeshId {
        let id = MeshId(self.next_id);
        self.next_id += 1;

        let name = match name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => UNNAMED_MESH.to_string(),
        };

        self.entries.push(MeshEntry {
            id,
            name,
            handle,
            bloom: false,
        });
        id
    }

    /// Drop every entry and register the meshes of a new model
    pub fn replace_all<'a>(&mut self, meshes: impl IntoIterator<Item = (Option<&'a str>, H)>) {
        self.entries.clear();
        for (name, handle) in meshes {
            self.register(name, handle);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[MeshEntry<H>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: MeshId) -> Option<&MeshEntry<H>> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn find_by_handle(&self, handle: &H) -> Option<MeshId> {
        self.entries
            .iter()
            .find(|entry| entry.handle == *handle)
            .map(|entry| entry.id)
    }

    pub fn contains_handle(&self, handle: &H) -> bool {
        self.find_by_handle(handle).is_some()
    }

    pub fn bloom_members(&self) -> impl Iterator<Item = &MeshEntry<H>> {
        self.entries.iter().filter(|entry| entry.bloom)
    }

    /// Set the bloom flag of a mesh and mirror it onto its layer bit
    pub fn set_bloom<S: LayerStore<H>>(
        &mut self,
        id: MeshId,
        bloom: bool,
        store: &mut S,
    ) -> Result<(), MeshError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or(MeshError::UnknownMesh(id))?;

        entry.bloom = bloom;
        let layers = store.layers(&entry.handle).unwrap_or_default();
        store.set_layers(&entry.handle, layers.set(BLOOM_LAYER, bloom));
        Ok(())
    }

    /// Checkbox path: flip the flag of an entry, returning the new state
    pub fn toggle_bloom<S: LayerStore<H>>(&mut self, id: MeshId, store: &mut S) -> Result<bool, MeshError> {
        let bloom = !self.get(id).ok_or(MeshError::UnknownMesh(id))?.bloom;
        self.set_bloom(id, bloom, store)?;
        Ok(bloom)
    }

    /// Pick path: flip the flag of the entry owning `handle`.
    ///
    /// Returns `None` when the handle is not a registered mesh.
    pub fn toggle_bloom_for_handle<S: LayerStore<H>>(&mut self, handle: &H, store: &mut S) -> Option<(MeshId, bool)> {
        let id = self.find_by_handle(handle)?;
        self.toggle_bloom(id, store).ok().map(|bloom| (id, bloom))
    }

    /// Entries whose flag disagrees with their bloom layer bit
    pub fn divergent<S: LayerStore<H>>(&self, store: &S) -> Vec<MeshId> {
        self.entries
            .iter()
            .filter(|entry| {
                let bit = store
                    .layers(&entry.handle)
                    .is_some_and(|layers| layers.contains(BLOOM_LAYER));
                bit != entry.bloom
            })
            .map(|entry| entry.id)
            .collect()
    }

    pub fn is_consistent<S: LayerStore<H>>(&self, store: &S) -> bool {
        self.divergent(store).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{LayerMask, MAIN_LAYER};
    use std::collections::HashMap;

    fn registry_with(names: &[&str]) -> (MeshRegistry<u32>, HashMap<u32, LayerMask>) {
        let mut registry = MeshRegistry::new();
        let mut store = HashMap::new();
        for (i, name) in names.iter().enumerate() {
            let handle = i as u32 + 100;
            registry.register(Some(name), handle);
            store.insert(handle, LayerMask::default());
        }
        (registry, store)
    }

    #[test]
    fn test_register_fallback_name() {
        let mut registry = MeshRegistry::new();
        registry.register(None, 1u32);
        registry.register(Some("  "), 2u32);
        registry.register(Some("Lamp"), 3u32);

        let names: Vec<_> = registry.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![UNNAMED_MESH, UNNAMED_MESH, "Lamp"]);
        assert!(registry.entries().iter().all(|e| !e.bloom));
    }

    #[test]
    fn test_checkbox_toggle_sets_layer_bit() {
        let (mut registry, mut store) = registry_with(&["Body", "Lamp"]);
        let lamp = registry.entries()[1].id;

        assert_eq!(registry.toggle_bloom(lamp, &mut store), Ok(true));
        assert!(store[&101].contains(BLOOM_LAYER));
        assert!(store[&101].contains(MAIN_LAYER));
        assert!(!store[&100].contains(BLOOM_LAYER));
        assert!(registry.is_consistent(&store));
    }

    #[test]
    fn test_pick_toggle_sets_layer_bit() {
        let (mut registry, mut store) = registry_with(&["Body", "Lamp"]);

        let (id, bloom) = registry.toggle_bloom_for_handle(&100, &mut store).unwrap();
        assert_eq!(id, registry.entries()[0].id);
        assert!(bloom);
        assert!(store[&100].contains(BLOOM_LAYER));
        assert!(registry.is_consistent(&store));

        assert_eq!(registry.toggle_bloom_for_handle(&999, &mut store), None);
    }

    #[test]
    fn test_toggle_twice_round_trips() {
        let (mut registry, mut store) = registry_with(&["Body", "Lamp", "Wheel"]);
        let before = store.clone();
        let id = registry.entries()[2].id;

        registry.toggle_bloom(id, &mut store).unwrap();
        registry.toggle_bloom(id, &mut store).unwrap();

        assert_eq!(store, before);
        assert!(registry.bloom_members().next().is_none());
    }

    #[test]
    fn test_interleaved_paths_stay_consistent() {
        let (mut registry, mut store) = registry_with(&["A", "B", "C", "D"]);
        let ids: Vec<_> = registry.entries().iter().map(|e| e.id).collect();

        for step in 0..12u32 {
            if step % 2 == 0 {
                registry.toggle_bloom(ids[(step as usize) % ids.len()], &mut store).unwrap();
            } else {
                registry.toggle_bloom_for_handle(&(100 + step % 4), &mut store);
            }
            assert!(registry.is_consistent(&store), "diverged after step {step}");
        }
    }

    #[test]
    fn test_divergence_is_reported() {
        let (registry, mut store) = registry_with(&["Body", "Lamp"]);
        store.insert(101, LayerMask::default().with(BLOOM_LAYER));

        assert_eq!(registry.divergent(&store), vec![registry.entries()[1].id]);
        assert!(!registry.is_consistent(&store));
    }

    #[test]
    fn test_unknown_id() {
        let (mut registry, mut store) = registry_with(&["Body"]);
        assert_eq!(
            registry.toggle_bloom(MeshId(42), &mut store),
            Err(MeshError::UnknownMesh(MeshId(42)))
        );
    }

    #[test]
    fn test_replace_all_drops_old_entries() {
        let (mut registry, _) = registry_with(&["Body", "Lamp"]);
        let old_ids: Vec<_> = registry.entries().iter().map(|e| e.id).collect();

        registry.replace_all([(Some("Robot"), 7u32)]);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.entries()[0].name, "Robot");
        assert!(!old_ids.contains(&registry.entries()[0].id));
        assert!(!registry.contains_handle(&100));
    }
}
