//! Host scene contract
//!
//! The exporter never talks to a live host directly. Everything it needs is
//! reached through [`HostScene`], which hands out plain data: raw per-face mesh
//! tables, skin bindings and material descriptions. [`SceneDocument`] is the
//! file-backed implementation used by the CLI and the tests.

mod document;

pub use document::{DocumentNode, SceneDocument, Trs};

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Index of a node inside a host scene
pub type NodeId = usize;

/// Node classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Joint,
    Mesh,
    #[default]
    Other,
}

/// Read-only view of a host scene graph
pub trait HostScene {
    /// The designated export root; it becomes the root joint
    fn root(&self) -> NodeId;

    fn name(&self, node: NodeId) -> &str;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn children(&self, node: NodeId) -> &[NodeId];

    fn kind(&self, node: NodeId) -> NodeKind;

    /// Node transform (node space to world) at a frame
    fn world_transform(&self, node: NodeId, frame: i32) -> Mat4;

    /// Object-to-world transform at a frame. May have negative parity.
    fn object_transform(&self, node: NodeId, frame: i32) -> Mat4;

    fn mesh(&self, node: NodeId) -> Option<&RawMesh>;

    /// Skinning systems attached to a mesh node, in modifier-stack order
    fn skins(&self, node: NodeId) -> &[SkinSource];

    fn material(&self, node: NodeId) -> Option<&MaterialSource>;

    /// All nodes under the root (root included), parents before children
    fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(node) = stack.pop() {
            order.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        order
    }
}

/// Per-face mesh tables, exactly as the host stores them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMesh {
    pub positions: Vec<Vec3>,
    pub faces: Vec<RawFace>,
    /// UV channels keyed by host map channel
    #[serde(default)]
    pub uv_channels: BTreeMap<u32, UvChannel>,
}

/// One source triangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawFace {
    /// Position indices in source winding
    pub positions: [u32; 3],
    /// Smoothing-group bitmask; 0 means faceted
    #[serde(default)]
    pub smoothing_groups: u32,
    #[serde(default)]
    pub material_id: u32,
}

/// A UV channel with its own per-face index table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UvChannel {
    pub coords: Vec<Vec2>,
    /// One entry per mesh face, corners in the same order as [`RawFace::positions`]
    pub faces: Vec<[u32; 3]>,
}

/// A skinning system attached to a mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SkinSource {
    /// Rigid/blended binding system; answers bind-pose queries first
    Rigid(RigidSkin),
    /// Generic weighted skin
    Blended(BlendedSkin),
}

/// Per-vertex binding of a rigid skin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexBinding {
    /// Whole vertex follows one joint
    Fixed(String),
    /// Weighted list of joints
    Blended(Vec<(String, f32)>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RigidSkin {
    /// Indexed by mesh position; `None` leaves the vertex unbound
    pub vertices: Vec<Option<VertexBinding>>,
    /// Joint transforms at bind time, keyed by joint name
    #[serde(default)]
    pub bind_poses: BTreeMap<String, Mat4>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlendedSkin {
    /// Joint names referenced by index from `vertices`
    pub bones: Vec<String>,
    /// Indexed by mesh position: `(bone index, weight)` pairs
    pub vertices: Vec<Vec<(usize, f32)>>,
    #[serde(default)]
    pub bind_poses: BTreeMap<String, Mat4>,
}

impl SkinSource {
    /// Bind-pose transform of a joint, if this system knows it
    pub fn bind_pose(&self, joint: &str) -> Option<Mat4> {
        match self {
            SkinSource::Rigid(skin) => skin.bind_poses.get(joint).copied(),
            SkinSource::Blended(skin) => skin.bind_poses.get(joint).copied(),
        }
    }
}

/// Host material description before derivation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSource {
    #[serde(default)]
    pub ambient: Vec3,
    #[serde(default = "default_diffuse")]
    pub diffuse: Vec3,
    #[serde(default)]
    pub specular: Vec3,
    #[serde(default)]
    pub self_illumination: SelfIllumination,
    #[serde(default)]
    pub transparency: f32,
    #[serde(default)]
    pub shininess_strength: f32,
    /// Glossiness in `0..=1`
    #[serde(default)]
    pub glossiness: f32,
    #[serde(default)]
    pub textures: Vec<TextureMap>,
    /// Non-empty for multi-materials; leaf fields are then ignored
    #[serde(default)]
    pub sub_materials: Vec<MaterialSource>,
}

fn default_diffuse() -> Vec3 {
    Vec3::ONE
}

impl Default for MaterialSource {
    fn default() -> Self {
        Self {
            ambient: Vec3::ZERO,
            diffuse: default_diffuse(),
            specular: Vec3::ZERO,
            self_illumination: SelfIllumination::default(),
            transparency: 0.0,
            shininess_strength: 0.0,
            glossiness: 0.0,
            textures: Vec::new(),
            sub_materials: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfIllumination {
    /// Explicit emissive colour
    Color(Vec3),
    /// Fraction of the diffuse colour
    Amount(f32),
}

impl Default for SelfIllumination {
    fn default() -> Self {
        SelfIllumination::Amount(0.0)
    }
}

/// Which two UVW components a texture reads as `(u, v)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UvAxis {
    #[default]
    Uv,
    Vw,
    Wu,
}

impl UvAxis {
    /// Index of the UVW component read as `u`; `v` is the next one
    pub fn first(self) -> usize {
        match self {
            UvAxis::Uv => 0,
            UvAxis::Vw => 1,
            UvAxis::Wu => 2,
        }
    }
}

/// A bitmap bound to a named material slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureMap {
    pub slot: String,
    pub file: String,
    /// Host map channel the bitmap samples
    #[serde(default = "default_map_channel")]
    pub map_channel: u32,
    /// Affine UVW transform (tiling, offset, rotation)
    #[serde(default = "identity_transform")]
    pub uv_transform: Mat4,
    #[serde(default)]
    pub axis: UvAxis,
}

fn default_map_channel() -> u32 {
    1
}

fn identity_transform() -> Mat4 {
    Mat4::IDENTITY
}

impl TextureMap {
    pub fn new(slot: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            slot: slot.into(),
            file: file.into(),
            map_channel: default_map_channel(),
            uv_transform: identity_transform(),
            axis: UvAxis::default(),
        }
    }
}
