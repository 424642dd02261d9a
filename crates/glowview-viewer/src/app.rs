//! Bevy application setup

use anyhow::Context;
use bevy::asset::io::memory::MemoryAssetReader;
use bevy::asset::io::AssetSourceBuilder;
use bevy::prelude::*;
use bevy_egui::{EguiGlobalSettings, EguiPlugin};
use bevy_picking::DefaultPickingPlugins;
use glowview_core::ViewerConfig;
use glowview_scene::GlowviewScenePlugin;

use crate::file_loader::{url_overrides, FileLoaderPlugin, UploadDir, UPLOAD_SOURCE};
use crate::ui::UiPlugin;

/// Configuration compiled into the binary
const DEFAULT_CONFIG: &str = include_str!("../viewer.toml");

/// Built-in configuration with the page's URL overrides applied
pub fn load_config(overrides: &[(String, String)]) -> anyhow::Result<ViewerConfig> {
    let mut config = ViewerConfig::from_toml_str(DEFAULT_CONFIG).context("built-in viewer.toml is invalid")?;
    let applied = config.apply_overrides(overrides.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    if applied > 0 {
        tracing::info!(applied, "Applied URL overrides");
    }
    Ok(config)
}

pub fn run() {
    let config = load_config(&url_overrides()).unwrap_or_else(|e| {
        tracing::error!("{:#}", e);
        ViewerConfig::default()
    });

    // Uploaded files are written here and read back through `upload://`
    let uploads = UploadDir::default();
    let upload_root = uploads.0.clone();

    App::new()
        .insert_resource(ClearColor(Color::BLACK))
        .insert_resource(uploads)
        // Must be registered before AssetPlugin builds the sources
        .register_asset_source(
            UPLOAD_SOURCE,
            AssetSourceBuilder::default().with_reader(move || {
                Box::new(MemoryAssetReader {
                    root: upload_root.clone(),
                })
            }),
        )
        .add_plugins(DefaultPlugins
            .set(WindowPlugin {
                primary_window: Some(Window {
                    title: "Glowview".to_string(),
                    canvas: Some("#glowview-canvas".to_string()),
                    fit_canvas_to_parent: true,
                    prevent_default_event_handling: false,
                    ..default()
                }),
                ..default()
            })
            .set(AssetPlugin {
                // Models are served next to index.html
                file_path: "".to_string(),
                // Don't look for .meta files - the server doesn't have them
                meta_check: bevy::asset::AssetMetaCheck::Never,
                ..default()
            })
        )
        // Picking must be in place before EguiPlugin so it can detect it
        .add_plugins(DefaultPickingPlugins)
        .add_plugins(EguiPlugin::default())
        // The composite camera carries the primary egui context
        .insert_resource(EguiGlobalSettings {
            auto_create_primary_context: false,
            ..default()
        })
        .add_plugins(GlowviewScenePlugin { config })
        .add_plugins(FileLoaderPlugin)
        .add_plugins(UiPlugin)
        .run();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = load_config(&[]).unwrap();
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn test_url_overrides() {
        let overrides = vec![
            ("model".to_string(), "https://example.com/car.glb".to_string()),
            ("bloom".to_string(), "2.5".to_string()),
            ("exposure".to_string(), "9".to_string()),
        ];
        let config = load_config(&overrides).unwrap();
        assert_eq!(config.model.path, "https://example.com/car.glb");
        assert_eq!(config.settings.bloom.strength, 2.5);
        // out of range, kept at the default
        assert_eq!(config.settings.renderer.exposure, 1.5);
    }
}
