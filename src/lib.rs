//! Skeletal mesh and animation exporter for the Unreal PSK/PSA interchange
//! formats.
//!
//! Takes a triangulated scene (mesh, armature, keyframed actions), builds
//! the deduplicated point/wedge/face tables, walks the bone hierarchy and
//! samples every action per frame, then writes the fixed-layout binary
//! files. See [`export_scene`] for the one-call entry point.

pub mod animation;
pub mod dedup;
pub mod error;
pub mod export;
pub mod formats;
pub mod mesh;
pub mod scene;
pub mod skeleton;
pub mod smoothing;

pub use error::{ExportError, Result};
pub use export::{export_scene, find_armature_and_mesh, ExportMode, ExportOptions, ExportSummary};
pub use formats::{PsaFile, PskFile};
pub use scene::{PoseProvider, Scene, ScenePoseProvider};
