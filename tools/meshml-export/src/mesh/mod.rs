//! Mesh canonicalization (host per-face tables -> welded partitions)

mod ingest;
mod tangent;
mod weld;

pub use ingest::{ingest, IngestedMesh, RawVertexRef};
pub use tangent::{face_frames, face_normal, face_tangent, vertex_frame, FaceFrame, TangentFrame};
pub use weld::{weld, winding, CornerRef, VertexKey, WeldedMesh, WeldedVertex};

use glam::Vec3;

use crate::axis::{flip_v, swap_yz};
use crate::error::ExportError;
use crate::material::{flatten_material, flatten_uv_transforms, Material};
use crate::partition::{split_by_material, vertex_format, MeshPartition, OutputVertex};
use crate::scene::{HostScene, NodeId};
use crate::settings::ExportSettings;
use crate::skeleton::JointGraph;
use crate::skin::{resolve_skin, Influences};

/// Canonicalize one mesh node.
///
/// The node's materials are appended to `materials`; returned partitions
/// reference them by index. Returns `Ok(None)` when the node has no geometry.
/// `joints` is `None` when skinning is disabled.
pub fn extract_mesh<S: HostScene + ?Sized>(
    scene: &S,
    node: NodeId,
    settings: &ExportSettings,
    joints: Option<&JointGraph>,
    materials: &mut Vec<Material>,
) -> Result<Option<Vec<MeshPartition>>, ExportError> {
    let name = scene.name(node);
    let Some(raw) = scene.mesh(node) else {
        return Ok(None);
    };

    let mut node_materials = Vec::new();
    let mut uv_transforms = Vec::new();
    if let Some(source) = scene.material(node) {
        flatten_material(source, &mut node_materials);
        flatten_uv_transforms(source, &mut uv_transforms);
    }
    if node_materials.is_empty() {
        node_materials.push(Material::default());
        uv_transforms.push(Default::default());
    }

    let Some(mesh) = ingest(name, raw, &uv_transforms)? else {
        return Ok(None);
    };

    let object_to_world = scene.object_transform(node, settings.reference_frame);
    let mirrored = object_to_world.determinant() < 0.0;

    let welded = weld(&mesh.corners, winding(mirrored));

    // Skinning works on source positions, before welding multiplies them
    let (positions, influences): (Vec<Vec3>, Vec<Influences>) = match joints {
        Some(joints) => {
            let skinned = resolve_skin(
                scene,
                node,
                &raw.positions,
                joints,
                settings.reference_frame,
                settings.joints_per_vertex,
            )?;
            (skinned.positions, skinned.influences)
        }
        None => (
            raw.positions
                .iter()
                .map(|&p| object_to_world.transform_point3(p))
                .collect(),
            Vec::new(),
        ),
    };

    let position_tris: Vec<[u32; 3]> = mesh
        .corners
        .chunks_exact(3)
        .map(|c| [c[0].position, c[1].position, c[2].position])
        .collect();
    let uv_tris: Vec<[u32; 3]> = mesh
        .corners
        .chunks_exact(3)
        .map(|c| [c[0].uvs[0], c[1].uvs[0], c[2].uvs[0]])
        .collect();
    let (faces, degenerate) = face_frames(&positions, &position_tris, &uv_tris, &mesh.uv_sets[0]);
    if degenerate > 0 {
        tracing::debug!(
            "Mesh '{}': {} triangle(s) with singular UVs use the fallback tangent",
            name,
            degenerate
        );
    }

    let vertices: Vec<OutputVertex> = welded
        .vertices
        .iter()
        .map(|v| {
            let key = &v.key;
            let frame = vertex_frame(&faces, mesh.cluster(key.position, key.cluster), mirrored);
            OutputVertex {
                position: swap_yz(positions[key.position as usize] * settings.unit_scale),
                normal: frame.normal,
                tangent: frame.tangent,
                binormal: frame.binormal,
                tex_coords: key
                    .uvs
                    .iter()
                    .zip(&mesh.uv_sets)
                    .map(|(&uv, set)| flip_v(set[uv as usize]))
                    .collect(),
                weights: influences
                    .get(key.position as usize)
                    .cloned()
                    .unwrap_or_default(),
            }
        })
        .collect();

    // Face material ids wrap around the node's own material list
    let base = materials.len();
    let count = node_materials.len();
    materials.extend(node_materials);
    let face_materials: Vec<usize> = mesh
        .face_materials
        .iter()
        .map(|&id| base + id as usize % count)
        .collect();

    let format = vertex_format(
        mesh.uv_sets.len(),
        joints.map_or(0, |_| settings.joints_per_vertex),
    );
    let partitions = split_by_material(
        name,
        &format,
        &vertices,
        &welded.triangles,
        &face_materials,
        base..materials.len(),
    );

    tracing::debug!(
        "Mesh '{}': {} triangles, {} welded vertices, {} partition(s){}",
        name,
        mesh.triangle_count(),
        vertices.len(),
        partitions.len(),
        if mirrored { ", mirrored" } else { "" }
    );

    Ok(Some(partitions))
}
