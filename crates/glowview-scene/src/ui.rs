//! Shared UI components for the viewer panels

use bevy::prelude::*;
use bevy_egui::egui;
use glowview_core::controls::{MAX_SHADOW_MAP_SIZE, MIN_SHADOW_MAP_SIZE};
use glowview_core::{ControlId, ControlPanel, ControlValue, LoadStatus, MeshId, ViewerState};

use crate::layers::{EntityLayers, ModelLayers};

/// Displayed values of the rendering controls
#[derive(Resource, Deref, DerefMut)]
pub struct ControlsState(pub ControlPanel);

impl ControlsState {
    pub fn new(viewer: &ViewerState<Entity>) -> Self {
        Self(ControlPanel::new(&viewer.settings))
    }
}

/// One checkbox per mesh; ticking it toggles bloom like a pick would
pub fn render_mesh_list(ui: &mut egui::Ui, viewer: &mut ViewerState<Entity>, layers: &mut ModelLayers) {
    if viewer.meshes.is_empty() {
        ui.label(egui::RichText::new("No meshes").small().color(egui::Color32::GRAY));
        return;
    }

    // Collect first: toggling needs the registry mutably
    let rows: Vec<(MeshId, String, bool)> = viewer
        .meshes
        .entries()
        .iter()
        .map(|entry| (entry.id, entry.name.clone(), entry.bloom))
        .collect();

    let mut toggled = None;
    egui::ScrollArea::vertical()
        .id_salt("bloom_meshes")
        .max_height(300.0)
        .show(ui, |ui| {
            for (id, name, bloom) in &rows {
                let mut checked = *bloom;
                if ui.checkbox(&mut checked, name.as_str()).changed() {
                    toggled = Some(*id);
                }
            }
        });

    if let Some(id) = toggled {
        let mut store = EntityLayers::new(layers);
        if let Err(e) = viewer.toggle_bloom(id, &mut store) {
            tracing::warn!("Bloom toggle failed: {}", e);
        }
    }
}

/// One checkbox per clip, or a notice when the model has none
pub fn render_animation_list(ui: &mut egui::Ui, viewer: &mut ViewerState<Entity>) {
    if let Some(message) = viewer.animations.status_message() {
        ui.label(egui::RichText::new(message).small().color(egui::Color32::GRAY));
        return;
    }

    let rows: Vec<(String, bool)> = viewer
        .animations
        .clips()
        .iter()
        .map(|clip| (clip.name.clone(), clip.playing))
        .collect();

    for (name, playing) in rows {
        let mut checked = playing;
        if ui.checkbox(&mut checked, name.as_str()).changed() {
            if let Err(e) = viewer.set_clip_playing(&name, checked) {
                tracing::warn!("Animation toggle failed: {}", e);
            }
        }
    }
}

/// Sliders and checkboxes for every rendering setting
pub fn render_rendering_controls(ui: &mut egui::Ui, controls: &mut ControlsState, viewer: &mut ViewerState<Entity>) {
    for control in ControlId::ALL {
        let value = match control {
            ControlId::ShadowMapSize => shadow_size_selector(ui, controls),
            _ => match control.range() {
                Some(range) => {
                    let mut number = controls.number(control);
                    let slider = egui::Slider::new(&mut number, range.min..=range.max)
                        .step_by(range.step as f64)
                        .text(control.label());
                    ui.add(slider).changed().then_some(ControlValue::Number(number))
                }
                None => {
                    let mut enabled = controls.toggle(control);
                    ui.checkbox(&mut enabled, control.label())
                        .changed()
                        .then_some(ControlValue::Toggle(enabled))
                }
            },
        };

        if let Some(value) = value {
            // A rejected value leaves the previous one on screen
            if let Err(e) = controls.submit(control, value, |patch| {
                viewer.apply_patch(&patch);
            }) {
                tracing::debug!("Ignoring {}: {}", control, e);
            }
        }
    }
}

/// Power-of-two choices between the shadow map bounds
fn shadow_size_selector(ui: &mut egui::Ui, panel: &ControlPanel) -> Option<ControlValue> {
    let current = panel.number(ControlId::ShadowMapSize) as u32;
    let mut selected = current;
    ui.horizontal(|ui| {
        ui.label(ControlId::ShadowMapSize.label());
        let mut size = MIN_SHADOW_MAP_SIZE;
        while size <= MAX_SHADOW_MAP_SIZE {
            ui.selectable_value(&mut selected, size, size.to_string());
            size *= 2;
        }
    });
    (selected != current).then_some(ControlValue::Number(selected as f32))
}

/// Current load progress, in red when the load failed
pub fn render_load_status(ui: &mut egui::Ui, status: &LoadStatus) {
    let color = match status {
        LoadStatus::Failed(_) => egui::Color32::from_rgb(230, 80, 80),
        LoadStatus::Loading(_) => egui::Color32::from_rgb(255, 200, 50),
        LoadStatus::Ready(_) | LoadStatus::Idle => egui::Color32::GRAY,
    };
    ui.label(egui::RichText::new(status.to_string()).small().color(color));
}
