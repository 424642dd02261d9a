//! Selective bloom frame
//!
//! One frame is produced in a fixed order:
//! 1. every mesh outside the bloom set gets the dark material, its own
//!    material is saved in a [`MaterialStash`]
//! 2. the bloom pass renders into its offscreen target
//! 3. every saved material is put back
//! 4. the base pass renders the full scene normally
//! 5. base and bloom are composited (additive, then antialiasing)
//!
//! Step 3 always runs before step 4. The stash also restores on drop, so a
//! failing bloom pass cannot leave meshes dark.

use std::collections::HashMap;
use std::hash::Hash;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompositeError {
    #[error("render target `{0}` is not available")]
    MissingTarget(&'static str),
    #[error("{pass} pass failed: {reason}")]
    PassFailed { pass: &'static str, reason: String },
}

/// The renderer a frame is driven through
pub trait BloomFrameBackend {
    /// Identity of one mesh object
    type Mesh: Copy + Eq + Hash;
    /// Material handle that can be saved and put back
    type Material: Clone;

    fn meshes(&self) -> Vec<Self::Mesh>;
    fn is_bloom_member(&self, mesh: Self::Mesh) -> bool;
    /// Current material, `None` for meshes that have none
    fn material(&self, mesh: Self::Mesh) -> Option<Self::Material>;
    fn set_material(&mut self, mesh: Self::Mesh, material: Self::Material);
    /// Opaque black material for non-members during the bloom pass
    fn dark_material(&self) -> Self::Material;

    fn render_bloom(&mut self) -> Result<(), CompositeError>;
    fn render_base(&mut self) -> Result<(), CompositeError>;
    fn composite(&mut self) -> Result<(), CompositeError>;
}

/// Materials swapped out for the bloom pass, restored exactly once
pub struct MaterialStash<'a, B: BloomFrameBackend> {
    backend: &'a mut B,
    saved: HashMap<B::Mesh, B::Material>,
}

impl<'a, B: BloomFrameBackend> MaterialStash<'a, B> {
    /// Darken every non-member mesh that has a material
    pub fn darken_non_members(backend: &'a mut B) -> Self {
        let dark = backend.dark_material();
        let mut saved = HashMap::new();

        for mesh in backend.meshes() {
            if backend.is_bloom_member(mesh) || saved.contains_key(&mesh) {
                continue;
            }
            if let Some(material) = backend.material(mesh) {
                saved.insert(mesh, material);
                backend.set_material(mesh, dark.clone());
            }
        }

        Self { backend, saved }
    }

    /// Number of meshes currently darkened
    pub fn len(&self) -> usize {
        self.saved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }

    pub fn is_saved(&self, mesh: B::Mesh) -> bool {
        self.saved.contains_key(&mesh)
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut *self.backend
    }

    /// Put one mesh back. No-op for a mesh without a saved material.
    pub fn restore_one(&mut self, mesh: B::Mesh) -> bool {
        match self.saved.remove(&mesh) {
            Some(material) => {
                self.backend.set_material(mesh, material);
                true
            }
            None => false,
        }
    }

    fn restore_all(&mut self) -> usize {
        let restored = self.saved.len();
        for (mesh, material) in self.saved.drain() {
            self.backend.set_material(mesh, material);
        }
        restored
    }

    /// Put every saved material back and release the backend
    pub fn restore(mut self) -> usize {
        self.restore_all()
    }
}

impl<B: BloomFrameBackend> Drop for MaterialStash<'_, B> {
    fn drop(&mut self) {
        let restored = self.restore_all();
        if restored > 0 {
            tracing::debug!("Restored {} materials after an interrupted bloom pass", restored);
        }
    }
}

/// What happened while producing one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    pub darkened: usize,
    pub restored: usize,
}

/// Produce one frame: darken, bloom, restore, base, composite
pub fn render_selective_bloom<B: BloomFrameBackend>(backend: &mut B) -> Result<FrameStats, CompositeError> {
    let mut stash = MaterialStash::darken_non_members(backend);
    let darkened = stash.len();

    stash.backend_mut().render_bloom()?;
    let restored = stash.restore();

    backend.render_base()?;
    backend.composite()?;

    Ok(FrameStats { darkened, restored })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Bloom(HashMap<u32, &'static str>),
        Base(HashMap<u32, &'static str>),
        Composite,
    }

    struct FakeRenderer {
        materials: HashMap<u32, &'static str>,
        order: Vec<u32>,
        members: HashSet<u32>,
        events: Vec<Event>,
        fail_bloom: bool,
    }

    impl FakeRenderer {
        fn new(meshes: &[(u32, Option<&'static str>)], members: &[u32]) -> Self {
            Self {
                materials: meshes
                    .iter()
                    .filter_map(|(id, material)| material.map(|m| (*id, m)))
                    .collect(),
                order: meshes.iter().map(|(id, _)| *id).collect(),
                members: members.iter().copied().collect(),
                events: Vec::new(),
                fail_bloom: false,
            }
        }
    }

    impl BloomFrameBackend for FakeRenderer {
        type Mesh = u32;
        type Material = &'static str;

        fn meshes(&self) -> Vec<u32> {
            self.order.clone()
        }

        fn is_bloom_member(&self, mesh: u32) -> bool {
            self.members.contains(&mesh)
        }

        fn material(&self, mesh: u32) -> Option<&'static str> {
            self.materials.get(&mesh).copied()
        }

        fn set_material(&mut self, mesh: u32, material: &'static str) {
            self.materials.insert(mesh, material);
        }

        fn dark_material(&self) -> &'static str {
            "dark"
        }

        fn render_bloom(&mut self) -> Result<(), CompositeError> {
            if self.fail_bloom {
                return Err(CompositeError::PassFailed {
                    pass: "bloom",
                    reason: "device lost".to_string(),
                });
            }
            self.events.push(Event::Bloom(self.materials.clone()));
            Ok(())
        }

        fn render_base(&mut self) -> Result<(), CompositeError> {
            self.events.push(Event::Base(self.materials.clone()));
            Ok(())
        }

        fn composite(&mut self) -> Result<(), CompositeError> {
            self.events.push(Event::Composite);
            Ok(())
        }
    }

    fn scene() -> FakeRenderer {
        FakeRenderer::new(&[(1, Some("body")), (2, Some("lamp")), (3, Some("wheel"))], &[2])
    }

    #[test]
    fn test_pass_order_and_materials() {
        let mut renderer = scene();
        let stats = render_selective_bloom(&mut renderer).unwrap();

        assert_eq!(stats, FrameStats { darkened: 2, restored: 2 });
        assert_eq!(renderer.events.len(), 3);

        let Event::Bloom(bloom) = &renderer.events[0] else {
            panic!("bloom pass must run first");
        };
        assert_eq!(bloom[&1], "dark");
        assert_eq!(bloom[&2], "lamp");
        assert_eq!(bloom[&3], "dark");

        let Event::Base(base) = &renderer.events[1] else {
            panic!("base pass must run second");
        };
        assert_eq!(base[&1], "body");
        assert_eq!(base[&2], "lamp");
        assert_eq!(base[&3], "wheel");

        assert_eq!(renderer.events[2], Event::Composite);
    }

    #[test]
    fn test_failed_bloom_pass_restores() {
        let mut renderer = scene();
        renderer.fail_bloom = true;

        let err = render_selective_bloom(&mut renderer).unwrap_err();

        assert!(matches!(err, CompositeError::PassFailed { pass: "bloom", .. }));
        assert_eq!(renderer.materials[&1], "body");
        assert_eq!(renderer.materials[&3], "wheel");
        assert!(renderer.events.is_empty());
    }

    #[test]
    fn test_mesh_without_material_is_untouched() {
        let mut renderer = FakeRenderer::new(&[(1, None), (2, Some("lamp"))], &[]);

        let stats = render_selective_bloom(&mut renderer).unwrap();

        assert_eq!(stats.darkened, 1);
        assert!(!renderer.materials.contains_key(&1));
        assert_eq!(renderer.materials[&2], "lamp");
    }

    #[test]
    fn test_restore_one_without_saved_material_is_noop() {
        let mut renderer = scene();
        let mut stash = MaterialStash::darken_non_members(&mut renderer);

        assert!(!stash.is_saved(2));
        assert!(!stash.restore_one(2));
        assert!(stash.restore_one(1));
        assert!(!stash.restore_one(1));
        assert_eq!(stash.restore(), 1);

        assert_eq!(renderer.materials[&1], "body");
        assert_eq!(renderer.materials[&3], "wheel");
    }

    #[test]
    fn test_drop_restores() {
        let mut renderer = scene();
        {
            let stash = MaterialStash::darken_non_members(&mut renderer);
            assert_eq!(stash.len(), 2);
        }
        assert_eq!(renderer.materials[&1], "body");
        assert_eq!(renderer.materials[&3], "wheel");
    }

    #[test]
    fn test_all_members_darken_nothing() {
        let mut renderer = FakeRenderer::new(&[(1, Some("a")), (2, Some("b"))], &[1, 2]);
        let stats = render_selective_bloom(&mut renderer).unwrap();
        assert_eq!(stats, FrameStats::default());
    }
}
