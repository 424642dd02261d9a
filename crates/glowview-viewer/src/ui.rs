//! UI overlays using bevy_egui

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use glowview_core::ViewerState;
use glowview_scene::layers::ModelLayers;
use glowview_scene::ui::{
    render_animation_list, render_load_status, render_mesh_list, render_rendering_controls, ControlsState,
};
use glowview_scene::Viewer;

use crate::file_loader::{open_file_picker, PendingUploads};

/// Grouped system parameters for the panel system
#[derive(SystemParam)]
pub struct UiParams<'w, 's> {
    pub contexts: EguiContexts<'w, 's>,
    pub viewer: ResMut<'w, Viewer>,
    pub controls: ResMut<'w, ControlsState>,
    pub layers: ModelLayers<'w, 's>,
    pub uploads: Res<'w, PendingUploads>,
}

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        let controls = match app.world().get_resource::<Viewer>() {
            Some(viewer) => ControlsState::new(viewer),
            None => ControlsState::new(&ViewerState::default()),
        };

        app.insert_resource(controls)
            // Main UI system runs in EguiPrimaryContextPass for proper input handling (bevy_egui 0.38+)
            .add_systems(EguiPrimaryContextPass, ui_system);
    }
}

fn ui_system(mut params: UiParams) {
    let Ok(ctx) = params.contexts.ctx_mut() else { return };

    egui::SidePanel::left("model_panel")
        .default_width(240.0)
        .show(ctx, |ui| {
            ui.heading("Model");
            render_load_status(ui, &params.viewer.status);
            if ui.button("Open .glb / .gltf...").clicked() {
                open_file_picker(&params.uploads);
            }

            ui.separator();
            ui.heading("Bloom");
            ui.label(
                egui::RichText::new("Click a mesh in the scene or tick it here")
                    .small()
                    .color(egui::Color32::GRAY),
            );
            render_mesh_list(ui, &mut params.viewer, &mut params.layers);
        });

    egui::SidePanel::right("settings_panel")
        .default_width(260.0)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.heading("Rendering");
                render_rendering_controls(ui, &mut params.controls, &mut params.viewer);

                ui.separator();
                ui.heading("Animations");
                render_animation_list(ui, &mut params.viewer);
            });
        });
}
