//! meshml-export library
//!
//! Turns a host scene (per-face mesh tables, skinning systems, materials and
//! a node hierarchy) into renderer-ready MeshML: welded vertex buffers with
//! normals and tangent frames, a parent-first skeleton, capped and normalized
//! bone weights, deduplicated materials and per-joint key frames.

pub mod animation;
pub mod axis;
pub mod error;
pub mod formats;
pub mod material;
pub mod mesh;
pub mod partition;
pub mod scene;
pub mod session;
pub mod settings;
pub mod skeleton;
pub mod skin;

pub use error::ExportError;
pub use formats::{write_meshml, write_meshml_file};
pub use scene::{HostScene, SceneDocument};
pub use session::{export_scene, ExportSession, ExportedModel};
pub use settings::{ExportSettings, PartitionStrategy, VertexAttributes};
