//! Glowview Core - Viewer state, render settings, and selective-bloom frame logic
//!
//! This crate provides the renderer-independent parts of the Glowview viewer:
//! - Render settings with partial updates and per-control validation
//! - Mesh registry keeping bloom flags and render layer bits in agreement
//! - Scoped material stash and pass ordering for the selective bloom frame
//! - Pointer picking math, animation clock, and render target layout
//! - Model load state and TOML configuration

pub mod animation;
pub mod compositor;
pub mod config;
pub mod controls;
pub mod layers;
pub mod meshes;
pub mod model;
pub mod picking;
pub mod settings;
pub mod state;
pub mod viewport;

pub use animation::{AnimationController, AnimationError, ClipState};
pub use compositor::{render_selective_bloom, BloomFrameBackend, CompositeError, FrameStats, MaterialStash};
pub use config::{ConfigError, ViewerConfig};
pub use controls::{ControlError, ControlId, ControlPanel, ControlValue};
pub use layers::{LayerMask, LayerStore, BLOOM_LAYER, MAIN_LAYER};
pub use meshes::{MeshEntry, MeshError, MeshId, MeshRegistry};
pub use model::{ClipInfo, LoadStatus, ModelError, ModelSnapshot, ModelSource};
pub use picking::{nearest_hit, pointer_to_ndc, ClickTracker, PickRay};
pub use settings::{RenderSettings, SettingsChanges, SettingsPatch};
pub use state::ViewerState;
pub use viewport::{RenderTargetLayout, ResizeTracker, TargetExtent, ViewportSize};
