//! Model selection from the page URL or a local file upload

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use bevy::asset::io::memory::Dir;
use bevy::prelude::*;
use glowview_core::model::{check_upload, upload_path};
use glowview_core::{LoadStatus, ModelSource};
use glowview_scene::{ModelRequests, Viewer, ViewerSet};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{FileReader, HtmlInputElement};

/// Asset source that serves uploaded files from memory
pub const UPLOAD_SOURCE: &str = "upload";

/// URL query keys that override the built-in configuration
const OVERRIDE_KEYS: [&str; 4] = ["model", "bloom", "exposure", "aa"];

/// In-memory directory behind the upload asset source
#[derive(Resource, Clone, Default)]
pub struct UploadDir(pub Dir);

/// A file read by the browser, waiting to be handed to the asset server
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Results of file reads, filled from browser callbacks
#[derive(Resource, Default, Clone)]
pub struct PendingUploads {
    pub files: Arc<Mutex<VecDeque<UploadedFile>>>,
    pub errors: Arc<Mutex<Vec<String>>>,
}

/// Plugin for local file uploads
pub struct FileLoaderPlugin;

impl Plugin for FileLoaderPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PendingUploads>()
            .add_systems(Update, process_uploads.before(ViewerSet::Load));
    }
}

/// Override pairs from the page's query string
pub fn url_overrides() -> Vec<(String, String)> {
    let Some(window) = web_sys::window() else {
        return Vec::new();
    };
    let Ok(href) = window.location().href() else {
        return Vec::new();
    };
    let Ok(url) = web_sys::Url::new(&href) else {
        return Vec::new();
    };

    let params = url.search_params();
    OVERRIDE_KEYS
        .iter()
        .filter_map(|key| params.get(key).map(|value| (key.to_string(), value)))
        .collect()
}

/// Move finished uploads into the asset source and request them
fn process_uploads(
    pending: Res<PendingUploads>,
    dir: Res<UploadDir>,
    mut requests: ResMut<ModelRequests>,
    mut viewer: ResMut<Viewer>,
    mut serial: Local<u64>,
) {
    let files: Vec<UploadedFile> = match pending.files.try_lock() {
        Ok(mut queue) => queue.drain(..).collect(),
        Err(_) => return,
    };

    for file in files {
        if let Err(e) = check_upload(&file.name, file.bytes.len()) {
            tracing::warn!("Rejected upload: {}", e);
            viewer.status = LoadStatus::Failed(e.to_string());
            continue;
        }

        *serial += 1;
        let path = upload_path(*serial, &file.name);
        tracing::info!(bytes = file.bytes.len(), "Stored upload at {}", path);
        dir.0.insert_asset(Path::new(&path), file.bytes);

        requests.request(ModelSource::LocalFile {
            name: file.name,
            asset_path: format!("{}://{}", UPLOAD_SOURCE, path),
        });
    }

    if let Ok(mut errors) = pending.errors.try_lock() {
        if let Some(message) = errors.drain(..).last() {
            viewer.status = LoadStatus::Failed(message);
        }
    }
}

/// Open the browser's file dialog for a .glb or .gltf file
pub fn open_file_picker(pending: &PendingUploads) {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        tracing::error!("open_file_picker: no document");
        return;
    };

    let input: HtmlInputElement = match document.create_element("input").map(|el| el.dyn_into()) {
        Ok(Ok(input)) => input,
        _ => {
            tracing::error!("open_file_picker: failed to create input element");
            return;
        }
    };

    input.set_type("file");
    input.set_accept(".glb,.gltf");

    // Hide the input element but keep it in the DOM
    let _ = input.style().set_property("display", "none");

    // Append to body - required for click() to work in many browsers
    let Some(body) = document.body() else {
        tracing::error!("open_file_picker: no document body");
        return;
    };
    if let Err(e) = body.append_child(&input) {
        tracing::error!("open_file_picker: failed to append: {:?}", e);
        return;
    }

    let pending = pending.clone();
    let input_for_removal = input.clone();

    let closure = Closure::wrap(Box::new(move |_event: web_sys::Event| {
        if let Some(parent) = input_for_removal.parent_node() {
            let _ = parent.remove_child(&input_for_removal);
        }

        let Some(file) = input_for_removal.files().and_then(|files| files.get(0)) else {
            return;
        };
        let name = file.name();
        tracing::info!("File selected: {}", name);

        let reader = match FileReader::new() {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("Failed to create FileReader: {:?}", e);
                return;
            }
        };

        let pending = pending.clone();
        let onload = Closure::wrap(Box::new(move |event: web_sys::Event| {
            let Some(reader) = event.target().and_then(|t| t.dyn_into::<FileReader>().ok()) else {
                return;
            };

            match reader.result() {
                Ok(result) => {
                    let bytes = js_sys::Uint8Array::new(&result).to_vec();
                    if let Ok(mut files) = pending.files.lock() {
                        files.push_back(UploadedFile {
                            name: name.clone(),
                            bytes,
                        });
                    }
                }
                Err(e) => {
                    tracing::error!("File read error: {:?}", e);
                    if let Ok(mut errors) = pending.errors.lock() {
                        errors.push(format!("Could not read {}", name));
                    }
                }
            }
        }) as Box<dyn FnMut(_)>);

        reader.set_onload(Some(onload.as_ref().unchecked_ref()));
        onload.forget();

        if let Err(e) = reader.read_as_array_buffer(&file) {
            tracing::error!("Failed to start reading file: {:?}", e);
        }
    }) as Box<dyn FnMut(_)>);

    input.set_onchange(Some(closure.as_ref().unchecked_ref()));
    closure.forget();

    input.click();
}
