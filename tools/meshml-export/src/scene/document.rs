//! JSON scene description
//!
//! A flat node list with parent links. Transforms are local TRS, optionally
//! animated by one sample per frame (clamped to the last sample).

use anyhow::{bail, Context, Result};
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{HostScene, MaterialSource, NodeId, NodeKind, RawMesh, SkinSource};

/// Local translation/rotation/scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trs {
    #[serde(default)]
    pub translation: Vec3,
    #[serde(default = "identity_rotation")]
    pub rotation: Quat,
    #[serde(default = "unit_scale")]
    pub scale: Vec3,
}

fn identity_rotation() -> Quat {
    Quat::IDENTITY
}

fn unit_scale() -> Vec3 {
    Vec3::ONE
}

impl Default for Trs {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Trs {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentNode {
    pub name: String,
    #[serde(default)]
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub transform: Trs,
    /// Per-frame local transforms, frame 0 first
    #[serde(default)]
    pub frames: Vec<Trs>,
    /// Object offset relative to the node (pivot offset / mirroring)
    #[serde(default)]
    pub object_offset: Trs,
    #[serde(default)]
    pub mesh: Option<RawMesh>,
    #[serde(default)]
    pub skins: Vec<SkinSource>,
    #[serde(default)]
    pub material: Option<MaterialSource>,
}

impl DocumentNode {
    fn local_transform(&self, frame: i32) -> Mat4 {
        match self.frames.len() {
            0 => self.transform.matrix(),
            n => self.frames[(frame.max(0) as usize).min(n - 1)].matrix(),
        }
    }
}

/// A whole scene loaded from JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneDocument {
    /// Export root; defaults to node 0
    #[serde(default)]
    pub root: NodeId,
    pub nodes: Vec<DocumentNode>,
    #[serde(skip)]
    children: Vec<Vec<NodeId>>,
}

impl SceneDocument {
    /// Build a document from nodes, validating parent links
    pub fn new(root: NodeId, nodes: Vec<DocumentNode>) -> Result<Self> {
        let mut doc = Self {
            root,
            nodes,
            children: Vec::new(),
        };
        doc.link()?;
        Ok(doc)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let mut doc: SceneDocument =
            serde_json::from_str(json).context("Failed to parse scene document")?;
        doc.link()?;
        Ok(doc)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene: {:?}", path))?;
        Self::from_json(&content).with_context(|| format!("Invalid scene: {:?}", path))
    }

    fn link(&mut self) -> Result<()> {
        if self.root >= self.nodes.len() {
            bail!(
                "Root node {} out of range ({} nodes)",
                self.root,
                self.nodes.len()
            );
        }

        self.children = vec![Vec::new(); self.nodes.len()];
        for (index, node) in self.nodes.iter().enumerate() {
            if let Some(parent) = node.parent {
                if parent >= self.nodes.len() {
                    bail!("Node '{}' has out-of-range parent {}", node.name, parent);
                }
                if parent == index {
                    bail!("Node '{}' is its own parent", node.name);
                }
                self.children[parent].push(index);
            }
        }

        // Every node must reach a parentless ancestor
        for start in 0..self.nodes.len() {
            let mut current = start;
            let mut steps = 0;
            while let Some(parent) = self.nodes[current].parent {
                current = parent;
                steps += 1;
                if steps > self.nodes.len() {
                    bail!("Parent links of '{}' form a cycle", self.nodes[start].name);
                }
            }
        }

        Ok(())
    }
}

impl HostScene for SceneDocument {
    fn root(&self) -> NodeId {
        self.root
    }

    fn name(&self, node: NodeId) -> &str {
        &self.nodes[node].name
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].parent
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        &self.children[node]
    }

    fn kind(&self, node: NodeId) -> NodeKind {
        self.nodes[node].kind
    }

    fn world_transform(&self, node: NodeId, frame: i32) -> Mat4 {
        let local = self.nodes[node].local_transform(frame);
        match self.nodes[node].parent {
            Some(parent) => self.world_transform(parent, frame) * local,
            None => local,
        }
    }

    fn object_transform(&self, node: NodeId, frame: i32) -> Mat4 {
        self.world_transform(node, frame) * self.nodes[node].object_offset.matrix()
    }

    fn mesh(&self, node: NodeId) -> Option<&RawMesh> {
        self.nodes[node].mesh.as_ref()
    }

    fn skins(&self, node: NodeId) -> &[SkinSource] {
        &self.nodes[node].skins
    }

    fn material(&self, node: NodeId) -> Option<&MaterialSource> {
        self.nodes[node].material.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_document() {
        let json = r#"{
            "nodes": [
                { "name": "Scene Root" },
                { "name": "Bip01", "parent": 0, "kind": "joint",
                  "transform": { "translation": [0.0, 0.0, 2.0] } }
            ]
        }"#;
        let doc = SceneDocument::from_json(json).unwrap();
        assert_eq!(doc.root(), 0);
        assert_eq!(doc.children(0), &[1]);
        assert_eq!(doc.kind(1), NodeKind::Joint);
        let world = doc.world_transform(1, 0);
        assert_eq!(world.w_axis.truncate(), Vec3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn test_frames_are_clamped() {
        let node = DocumentNode {
            name: "a".into(),
            frames: vec![
                Trs {
                    translation: Vec3::X,
                    ..Default::default()
                },
                Trs {
                    translation: Vec3::Y,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let doc = SceneDocument::new(0, vec![node]).unwrap();
        assert_eq!(doc.world_transform(0, -3).w_axis.truncate(), Vec3::X);
        assert_eq!(doc.world_transform(0, 1).w_axis.truncate(), Vec3::Y);
        assert_eq!(doc.world_transform(0, 9).w_axis.truncate(), Vec3::Y);
    }

    #[test]
    fn test_rejects_parent_cycle() {
        let nodes = vec![
            DocumentNode {
                name: "a".into(),
                parent: Some(1),
                ..Default::default()
            },
            DocumentNode {
                name: "b".into(),
                parent: Some(0),
                ..Default::default()
            },
        ];
        assert!(SceneDocument::new(0, nodes).is_err());
    }

    #[test]
    fn test_object_offset_applies_after_node() {
        let node = DocumentNode {
            name: "mirrored".into(),
            kind: NodeKind::Mesh,
            object_offset: Trs {
                scale: Vec3::new(-1.0, 1.0, 1.0),
                ..Default::default()
            },
            ..Default::default()
        };
        let doc = SceneDocument::new(0, vec![node]).unwrap();
        assert!(doc.object_transform(0, 0).determinant() < 0.0);
        assert!(doc.world_transform(0, 0).determinant() > 0.0);
    }

    #[test]
    fn test_preorder_visits_parents_first() {
        let nodes = vec![
            DocumentNode {
                name: "root".into(),
                ..Default::default()
            },
            DocumentNode {
                name: "child".into(),
                parent: Some(2),
                ..Default::default()
            },
            DocumentNode {
                name: "mid".into(),
                parent: Some(0),
                ..Default::default()
            },
        ];
        let doc = SceneDocument::new(0, nodes).unwrap();
        assert_eq!(doc.preorder(), vec![0, 2, 1]);
    }
}
