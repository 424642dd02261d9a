//! Model sources and load state

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ModelError {
    #[error("`{0}` is not a .glb or .gltf file")]
    UnsupportedExtension(String),
    #[error("`{0}` is empty")]
    EmptyFile(String),
}

/// Where a model comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    /// Asset path shipped with the viewer
    Bundled(String),
    /// Address given in the page URL
    Url(String),
    /// File picked by the user, already stored under `asset_path`
    LocalFile { name: String, asset_path: String },
}

impl ModelSource {
    /// Path handed to the asset loader
    pub fn asset_path(&self) -> &str {
        match self {
            ModelSource::Bundled(path) | ModelSource::Url(path) => path,
            ModelSource::LocalFile { asset_path, .. } => asset_path,
        }
    }

    /// Short name for status lines
    pub fn label(&self) -> &str {
        match self {
            ModelSource::Bundled(path) | ModelSource::Url(path) => {
                path.rsplit('/').next().unwrap_or(path)
            }
            ModelSource::LocalFile { name, .. } => name,
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Bundled(path) => write!(f, "bundled model {}", path),
            ModelSource::Url(url) => write!(f, "{}", url),
            ModelSource::LocalFile { name, .. } => write!(f, "local file {}", name),
        }
    }
}

/// Check that an uploaded file can be handed to the glTF loader
pub fn check_upload(name: &str, len: usize) -> Result<(), ModelError> {
    let lower = name.to_ascii_lowercase();
    if !(lower.ends_with(".glb") || lower.ends_with(".gltf")) {
        return Err(ModelError::UnsupportedExtension(name.to_string()));
    }
    if len == 0 {
        return Err(ModelError::EmptyFile(name.to_string()));
    }
    Ok(())
}

/// Unique in-memory path for the `serial`-th upload
pub fn upload_path(serial: u64, name: &str) -> String {
    let file_name: String = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("uploads/{}-{}", serial, file_name)
}

/// Progress of the current model load
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading(String),
    Ready(String),
    Failed(String),
}

impl LoadStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadStatus::Loading(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadStatus::Failed(message) => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStatus::Idle => write!(f, "No model loaded"),
            LoadStatus::Loading(label) => write!(f, "Loading {}...", label),
            LoadStatus::Ready(label) => write!(f, "Loaded {}", label),
            LoadStatus::Failed(message) => write!(f, "Load failed: {}", message),
        }
    }
}

/// Animation clip of a loaded model
#[derive(Debug, Clone, PartialEq)]
pub struct ClipInfo {
    pub name: String,
    pub duration: Option<f32>,
}

/// Meshes and clips of a model once its scene has spawned
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSnapshot<H> {
    /// Node name (if any) and handle of each mesh
    pub meshes: Vec<(Option<String>, H)>,
    pub clips: Vec<ClipInfo>,
}

impl<H> Default for ModelSnapshot<H> {
    fn default() -> Self {
        Self {
            meshes: Vec::new(),
            clips: Vec::new(),
        }
    }
}
