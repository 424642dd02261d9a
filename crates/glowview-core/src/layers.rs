//! Render layer bits
//!
//! A mesh is drawn by a pass when their layer masks intersect. Layer 0 is the
//! main scene; layer 1 tags the meshes that glow.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Index of a single render layer
pub type Layer = usize;

/// Layer every renderable starts on
pub const MAIN_LAYER: Layer = 0;

/// Tag bit for bloom membership
pub const BLOOM_LAYER: Layer = 1;

const MAX_LAYERS: Layer = 32;

/// Set of render layers packed into a bit field
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerMask(u32);

impl LayerMask {
    /// Mask with no layers
    pub const NONE: LayerMask = LayerMask(0);

    /// Mask holding a single layer (layers past 31 are dropped)
    pub const fn layer(layer: Layer) -> Self {
        if layer < MAX_LAYERS {
            LayerMask(1 << layer)
        } else {
            LayerMask(0)
        }
    }

    pub const fn with(self, layer: Layer) -> Self {
        LayerMask(self.0 | Self::layer(layer).0)
    }

    pub const fn without(self, layer: Layer) -> Self {
        LayerMask(self.0 & !Self::layer(layer).0)
    }

    pub const fn contains(self, layer: Layer) -> bool {
        layer < MAX_LAYERS && self.0 & (1 << layer) != 0
    }

    pub const fn intersects(self, other: LayerMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Set or clear one layer
    pub const fn set(self, layer: Layer, enabled: bool) -> Self {
        if enabled {
            self.with(layer)
        } else {
            self.without(layer)
        }
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Iterate the enabled layers in ascending order
    pub fn iter(self) -> impl Iterator<Item = Layer> {
        (0..MAX_LAYERS).filter(move |layer| self.contains(*layer))
    }

    pub fn from_layers(layers: impl IntoIterator<Item = Layer>) -> Self {
        layers.into_iter().fold(LayerMask::NONE, LayerMask::with)
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        LayerMask::layer(MAIN_LAYER)
    }
}

impl fmt::Debug for LayerMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Access to the layer bits stored on the objects behind mesh handles.
///
/// The Bevy scene implements this over `RenderLayers` components; tests use
/// a plain map.
pub trait LayerStore<H> {
    /// Current layers of the object, `None` when the handle is gone
    fn layers(&self, handle: &H) -> Option<LayerMask>;

    /// Overwrite the layers of the object. Unknown handles are ignored.
    fn set_layers(&mut self, handle: &H, layers: LayerMask);
}

impl<H: Eq + Hash> LayerStore<H> for HashMap<H, LayerMask> {
    fn layers(&self, handle: &H) -> Option<LayerMask> {
        self.get(handle).copied()
    }

    fn set_layers(&mut self, handle: &H, layers: LayerMask) {
        if let Some(slot) = self.get_mut(handle) {
            *slot = layers;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_main_layer() {
        let mask = LayerMask::default();
        assert!(mask.contains(MAIN_LAYER));
        assert!(!mask.contains(BLOOM_LAYER));
        assert_eq!(mask.bits(), 1);
    }

    #[test]
    fn test_set_and_clear() {
        let mask = LayerMask::default().set(BLOOM_LAYER, true);
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![MAIN_LAYER, BLOOM_LAYER]);

        let mask = mask.set(BLOOM_LAYER, false);
        assert_eq!(mask, LayerMask::default());
    }

    #[test]
    fn test_out_of_range_layer_is_ignored() {
        let mask = LayerMask::NONE.with(40);
        assert_eq!(mask, LayerMask::NONE);
        assert!(!mask.contains(40));
    }

    #[test]
    fn test_intersects() {
        let bloom = LayerMask::layer(BLOOM_LAYER);
        assert!(LayerMask::from_layers([0, 1]).intersects(bloom));
        assert!(!LayerMask::default().intersects(bloom));
    }

    #[test]
    fn test_map_store_ignores_unknown_handles() {
        let mut store: HashMap<u32, LayerMask> = HashMap::new();
        store.insert(1, LayerMask::default());
        store.set_layers(&2, LayerMask::layer(BLOOM_LAYER));
        assert_eq!(store.layers(&2), None);
        assert_eq!(store.layers(&1), Some(LayerMask::default()));
    }
}
