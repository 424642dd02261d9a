//! Animation playback
//!
//! The core `AnimationController` owns clip state and time. Each frame it is
//! advanced, then every animation player of the model is seeked to match it.
//! Bevy never advances the clips on its own.

use std::collections::HashMap;

use bevy::animation::graph::{AnimationGraph, AnimationGraphHandle, AnimationNodeIndex};
use bevy::prelude::*;

use crate::models::ModelClips;
use crate::{Viewer, ViewerSet};

/// Animation graph built for the model on screen
#[derive(Resource, Default)]
pub struct ModelAnimations {
    pub graph: Option<Handle<AnimationGraph>>,
    pub nodes: HashMap<String, AnimationNodeIndex>,
}

/// Plugin for animation playback
pub struct AnimationControlPlugin;

impl Plugin for AnimationControlPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ModelAnimations>().add_systems(
            Update,
            (build_animation_graph, drive_animations)
                .chain()
                .after(ViewerSet::Load),
        );
    }
}

/// Rebuild the graph whenever a new model publishes its clips
fn build_animation_graph(
    mut commands: Commands,
    clips: Res<ModelClips>,
    mut animations: ResMut<ModelAnimations>,
    mut graphs: ResMut<Assets<AnimationGraph>>,
    children: Query<&Children>,
    players: Query<(), With<AnimationPlayer>>,
) {
    if !clips.is_changed() {
        return;
    }
    let Some(root) = clips.root else {
        return;
    };

    if let Some(old) = animations.graph.take() {
        graphs.remove(&old);
    }
    animations.nodes.clear();
    if clips.clips.is_empty() {
        return;
    }

    let (graph, nodes) = AnimationGraph::from_clips(clips.clips.iter().map(|(_, handle)| handle.clone()));
    let graph = graphs.add(graph);
    animations.nodes = clips
        .clips
        .iter()
        .map(|(name, _)| name.clone())
        .zip(nodes)
        .collect();

    let mut attached = 0;
    for entity in children.iter_descendants(root) {
        if players.contains(entity) {
            commands.entity(entity).insert(AnimationGraphHandle(graph.clone()));
            attached += 1;
        }
    }
    tracing::debug!(players = attached, clips = animations.nodes.len(), "Built animation graph");

    animations.graph = Some(graph);
}

/// Advance the controller and mirror its state onto the players
fn drive_animations(
    time: Res<Time>,
    mut viewer: ResMut<Viewer>,
    animations: Res<ModelAnimations>,
    mut players: Query<&mut AnimationPlayer, With<AnimationGraphHandle>>,
) {
    if viewer.animations.is_empty() {
        return;
    }
    viewer.animations.tick(time.delta_secs());

    for mut player in &mut players {
        for clip in viewer.animations.clips() {
            let Some(&node) = animations.nodes.get(&clip.name) else {
                continue;
            };
            if clip.playing {
                player.play(node).repeat().pause().seek_to(clip.time);
            } else if player.is_playing_animation(node) {
                player.stop(node);
            }
        }
    }
}
