//! Render layers of the three passes
//!
//! Layers 0 and 1 come from `glowview-core`: 0 is the main scene, 1 tags bloom
//! members. The bloom proxies live on their own layer, as does the
//! full-screen composite quad.

use bevy::camera::visibility::RenderLayers;
use bevy::prelude::*;
use glowview_core::{LayerMask, LayerStore};

use crate::models::ModelMesh;

/// Bloom proxies, seen only by the bloom camera
pub const PROXY_LAYER: usize = 2;

/// Full-screen composite quad, seen only by the composite camera
pub const COMPOSITE_LAYER: usize = 3;

pub fn to_layer_mask(layers: &RenderLayers) -> LayerMask {
    LayerMask::from_layers(layers.iter())
}

pub fn to_render_layers(mask: LayerMask) -> RenderLayers {
    mask.iter().collect()
}

/// Render layers of the meshes of the loaded model
pub type ModelLayers<'w, 's> = Query<'w, 's, &'static mut RenderLayers, With<ModelMesh>>;

/// [`LayerStore`] over the `RenderLayers` of model meshes
pub struct EntityLayers<'a, 'w, 's> {
    query: &'a mut ModelLayers<'w, 's>,
}

impl<'a, 'w, 's> EntityLayers<'a, 'w, 's> {
    pub fn new(query: &'a mut ModelLayers<'w, 's>) -> Self {
        Self { query }
    }
}

impl LayerStore<Entity> for EntityLayers<'_, '_, '_> {
    fn layers(&self, entity: &Entity) -> Option<LayerMask> {
        self.query.get(*entity).ok().map(to_layer_mask)
    }

    fn set_layers(&mut self, entity: &Entity, layers: LayerMask) {
        if let Ok(mut render_layers) = self.query.get_mut(*entity) {
            *render_layers = to_render_layers(layers);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::SystemState;
    use glowview_core::{MeshRegistry, BLOOM_LAYER, MAIN_LAYER};

    #[test]
    fn test_mask_conversion() {
        let layers = RenderLayers::from_layers(&[MAIN_LAYER, BLOOM_LAYER]);
        let mask = to_layer_mask(&layers);
        assert!(mask.contains(BLOOM_LAYER));
        assert_eq!(to_render_layers(mask), layers);
    }

    #[test]
    fn test_toggle_writes_render_layers() {
        let mut world = World::new();
        let lamp = world.spawn((ModelMesh, RenderLayers::layer(MAIN_LAYER))).id();
        let body = world.spawn((ModelMesh, RenderLayers::layer(MAIN_LAYER))).id();

        let mut registry = MeshRegistry::new();
        let lamp_id = registry.register(Some("Lamp"), lamp);
        registry.register(Some("Body"), body);

        let mut state: SystemState<ModelLayers> = SystemState::new(&mut world);
        {
            let mut query = state.get_mut(&mut world);
            let mut store = EntityLayers::new(&mut query);
            assert_eq!(registry.toggle_bloom(lamp_id, &mut store), Ok(true));
            assert!(registry.is_consistent(&store));
        }

        let layers = world.get::<RenderLayers>(lamp).unwrap();
        assert!(layers.intersects(&RenderLayers::layer(BLOOM_LAYER)));
        assert!(layers.intersects(&RenderLayers::layer(MAIN_LAYER)));
        assert_eq!(world.get::<RenderLayers>(body), Some(&RenderLayers::layer(MAIN_LAYER)));
    }
}
