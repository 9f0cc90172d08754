//! Scene builders shared by the integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;

use glam::{Vec2, Vec3};
use meshml_export::scene::{
    BlendedSkin, DocumentNode, MaterialSource, NodeKind, RawFace, RawMesh, SkinSource, Trs,
    UvChannel,
};
use meshml_export::SceneDocument;

pub fn root() -> DocumentNode {
    DocumentNode {
        name: "root".into(),
        ..Default::default()
    }
}

pub fn joint(name: &str, parent: usize) -> DocumentNode {
    DocumentNode {
        name: name.into(),
        parent: Some(parent),
        kind: NodeKind::Joint,
        ..Default::default()
    }
}

pub fn mesh_node(name: &str, parent: usize, mesh: RawMesh) -> DocumentNode {
    DocumentNode {
        name: name.into(),
        parent: Some(parent),
        kind: NodeKind::Mesh,
        mesh: Some(mesh),
        ..Default::default()
    }
}

pub fn face(positions: [u32; 3], smoothing_groups: u32) -> RawFace {
    RawFace {
        positions,
        smoothing_groups,
        material_id: 0,
    }
}

/// (0,0,0) (1,0,0) (0,1,0), wound counter-clockwise seen from +Z
pub fn triangle() -> RawMesh {
    RawMesh {
        positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
        faces: vec![face([0, 1, 2], 1)],
        ..Default::default()
    }
}

/// Same triangle with a proper UV channel on map channel 1
pub fn uv_triangle() -> RawMesh {
    let mut mesh = triangle();
    mesh.uv_channels = BTreeMap::from([(
        1,
        UvChannel {
            coords: vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)],
            faces: vec![[0, 1, 2]],
        },
    )]);
    mesh
}

/// Two triangles folded along the X axis: one in the XY plane, one in the XZ
/// plane, sharing positions 0 and 1
pub fn folded_pair(smoothing_groups: u32) -> RawMesh {
    RawMesh {
        positions: vec![
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
            Vec3::new(0.0, 0.0, -1.0),
        ],
        faces: vec![
            face([0, 1, 2], smoothing_groups),
            face([1, 0, 3], smoothing_groups),
        ],
        ..Default::default()
    }
}

/// Every position of `mesh` weighted by the same `(bone, weight)` list
pub fn uniform_skin(mesh: &RawMesh, bones: &[&str], weights: &[(usize, f32)]) -> SkinSource {
    SkinSource::Blended(BlendedSkin {
        bones: bones.iter().map(|b| b.to_string()).collect(),
        vertices: vec![weights.to_vec(); mesh.positions.len()],
        bind_poses: BTreeMap::new(),
    })
}

pub fn mirrored(mut node: DocumentNode) -> DocumentNode {
    node.object_offset = Trs {
        scale: Vec3::new(-1.0, 1.0, 1.0),
        ..Default::default()
    };
    node
}

pub fn with_material(mut node: DocumentNode, material: MaterialSource) -> DocumentNode {
    node.material = Some(material);
    node
}

pub fn scene(nodes: Vec<DocumentNode>) -> SceneDocument {
    SceneDocument::new(0, nodes).expect("Failed to build scene")
}
