//! Mesh partitions
//!
//! A partition is one self-contained vertex/index buffer sharing a material
//! and a vertex layout. Objects are first split per material; the configured
//! [`PartitionStrategy`] then either merges compatible partitions across
//! objects or keeps them apart and sorts them by material.

use glam::{Vec2, Vec3};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use crate::settings::PartitionStrategy;
use crate::skin::BoneWeight;

/// Vertex element semantics, numbered as MeshML expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VertexUsage {
    Position = 0,
    Normal = 1,
    BlendWeight = 4,
    BlendIndex = 5,
    TextureCoord = 6,
    Tangent = 7,
    Binormal = 8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexElement {
    pub usage: VertexUsage,
    pub usage_index: u8,
    pub num_components: u8,
}

impl VertexElement {
    pub const fn new(usage: VertexUsage, usage_index: u8, num_components: u8) -> Self {
        Self {
            usage,
            usage_index,
            num_components,
        }
    }
}

/// Ordered element list describing one vertex
pub type VertexFormat = Vec<VertexElement>;

/// Layout of a welded object: Position → Normal → Tangent → Binormal →
/// one TextureCoord per UV set → BlendWeight/BlendIndex when skinned.
///
/// `influences` is the per-vertex joint budget; 0 means unskinned.
pub fn vertex_format(uv_sets: usize, influences: usize) -> VertexFormat {
    let mut format = vec![
        VertexElement::new(VertexUsage::Position, 0, 3),
        VertexElement::new(VertexUsage::Normal, 0, 3),
        VertexElement::new(VertexUsage::Tangent, 0, 3),
        VertexElement::new(VertexUsage::Binormal, 0, 3),
    ];
    format.extend((0..uv_sets).map(|i| VertexElement::new(VertexUsage::TextureCoord, i as u8, 2)));
    if influences > 0 {
        let components = influences as u8;
        format.push(VertexElement::new(VertexUsage::BlendWeight, 0, components));
        format.push(VertexElement::new(VertexUsage::BlendIndex, 0, components));
    }
    format
}

/// A renderer-ready vertex in target axes
#[derive(Debug, Clone, PartialEq)]
pub struct OutputVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub binormal: Vec3,
    pub tex_coords: SmallVec<[Vec2; 2]>,
    /// Empty when skinning is disabled
    pub weights: SmallVec<[BoneWeight; 4]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshPartition {
    pub name: String,
    pub material_id: usize,
    pub vertex_format: VertexFormat,
    pub vertices: Vec<OutputVertex>,
    /// Indices local to this partition
    pub triangles: Vec<[u32; 3]>,
}

/// Split one welded object into a partition per material in `materials`.
///
/// `face_materials` holds the global material id of every triangle. Vertices
/// keep their relative order; materials without triangles produce nothing.
pub fn split_by_material(
    name: &str,
    vertex_format: &VertexFormat,
    vertices: &[OutputVertex],
    triangles: &[[u32; 3]],
    face_materials: &[usize],
    materials: Range<usize>,
) -> Vec<MeshPartition> {
    let single = materials.len() <= 1;
    let mut partitions = Vec::new();

    for material in materials.clone() {
        let selected: Vec<[u32; 3]> = triangles
            .iter()
            .zip(face_materials)
            .filter(|(_, &m)| m == material)
            .map(|(tri, _)| *tri)
            .collect();
        if selected.is_empty() {
            continue;
        }

        let used: BTreeSet<u32> = selected.iter().flatten().copied().collect();
        let local: BTreeMap<u32, u32> = used
            .iter()
            .enumerate()
            .map(|(i, &v)| (v, i as u32))
            .collect();

        partitions.push(MeshPartition {
            name: if single {
                name.to_string()
            } else {
                format!("{}__mat_{}", name, material - materials.start)
            },
            material_id: material,
            vertex_format: vertex_format.clone(),
            vertices: used.iter().map(|&v| vertices[v as usize].clone()).collect(),
            triangles: selected.iter().map(|tri| tri.map(|v| local[&v])).collect(),
        });
    }

    partitions
}

/// Point every partition at its deduplicated material
pub fn remap_materials(partitions: &mut [MeshPartition], remap: &[usize]) {
    for partition in partitions {
        partition.material_id = remap[partition.material_id];
    }
}

/// Merge partitions sharing a material and vertex format, across objects
pub fn combine_by_material(
    partitions: Vec<MeshPartition>,
    material_count: usize,
) -> Vec<MeshPartition> {
    let mut combined = Vec::new();

    for material in 0..material_count {
        let mut formats: Vec<VertexFormat> = Vec::new();
        let mut groups: Vec<Vec<&MeshPartition>> = Vec::new();
        for partition in partitions.iter().filter(|p| p.material_id == material) {
            match formats.iter().position(|f| *f == partition.vertex_format) {
                Some(k) => groups[k].push(partition),
                None => {
                    formats.push(partition.vertex_format.clone());
                    groups.push(vec![partition]);
                }
            }
        }

        for (k, (format, group)) in formats.into_iter().zip(groups).enumerate() {
            let mut merged = MeshPartition {
                name: format!("mesh_for_mtl_{}_ve_{}", material, k),
                material_id: material,
                vertex_format: format,
                vertices: Vec::new(),
                triangles: Vec::new(),
            };
            for partition in group {
                let base = merged.vertices.len() as u32;
                merged.vertices.extend(partition.vertices.iter().cloned());
                merged
                    .triangles
                    .extend(partition.triangles.iter().map(|tri| tri.map(|v| v + base)));
            }
            combined.push(merged);
        }
    }

    combined
}

/// Keep partitions apart, ordered by material (stable within a material)
pub fn sort_by_material(mut partitions: Vec<MeshPartition>) -> Vec<MeshPartition> {
    partitions.sort_by_key(|p| p.material_id);
    partitions
}

/// Apply the configured grouping strategy
pub fn apply_strategy(
    strategy: PartitionStrategy,
    partitions: Vec<MeshPartition>,
    material_count: usize,
) -> Vec<MeshPartition> {
    match strategy {
        PartitionStrategy::Combine => combine_by_material(partitions, material_count),
        PartitionStrategy::Separate => sort_by_material(partitions),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f32) -> OutputVertex {
        OutputVertex {
            position: Vec3::new(x, 0.0, 0.0),
            normal: Vec3::Y,
            tangent: Vec3::X,
            binormal: Vec3::Z,
            tex_coords: SmallVec::new(),
            weights: SmallVec::new(),
        }
    }

    fn partition(name: &str, material_id: usize, format: VertexFormat) -> MeshPartition {
        MeshPartition {
            name: name.into(),
            material_id,
            vertex_format: format,
            vertices: (0..3).map(|i| vertex(i as f32)).collect(),
            triangles: vec![[0, 1, 2]],
        }
    }

    #[test]
    fn test_vertex_format_layout() {
        let format = vertex_format(2, 4);
        let usages: Vec<VertexUsage> = format.iter().map(|e| e.usage).collect();
        assert_eq!(
            usages,
            vec![
                VertexUsage::Position,
                VertexUsage::Normal,
                VertexUsage::Tangent,
                VertexUsage::Binormal,
                VertexUsage::TextureCoord,
                VertexUsage::TextureCoord,
                VertexUsage::BlendWeight,
                VertexUsage::BlendIndex,
            ]
        );
        assert_eq!(format[5].usage_index, 1);
        assert_eq!(format[6].num_components, 4);
    }

    #[test]
    fn test_blend_components_follow_joint_budget() {
        let format = vertex_format(1, 2);
        let blend: Vec<(VertexUsage, u8)> = format[5..]
            .iter()
            .map(|e| (e.usage, e.num_components))
            .collect();
        assert_eq!(
            blend,
            vec![(VertexUsage::BlendWeight, 2), (VertexUsage::BlendIndex, 2)]
        );
        assert_eq!(vertex_format(1, 0).len(), 5);
    }

    #[test]
    fn test_split_reindexes_locally() {
        let vertices: Vec<OutputVertex> = (0..5).map(|i| vertex(i as f32)).collect();
        let triangles = vec![[0, 1, 2], [2, 3, 4]];
        let format = vertex_format(1, 0);

        let parts = split_by_material("box", &format, &vertices, &triangles, &[3, 4], 3..5);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "box__mat_0");
        assert_eq!(parts[1].name, "box__mat_1");
        assert_eq!(parts[1].material_id, 4);
        assert_eq!(parts[1].triangles, vec![[0, 1, 2]]);
        assert_eq!(parts[1].vertices[0].position.x, 2.0);
    }

    #[test]
    fn test_single_material_keeps_object_name() {
        let vertices: Vec<OutputVertex> = (0..3).map(|i| vertex(i as f32)).collect();
        let parts = split_by_material(
            "box",
            &vertex_format(1, 0),
            &vertices,
            &[[2, 1, 0]],
            &[0],
            0..1,
        );
        assert_eq!(parts[0].name, "box");
        assert_eq!(parts[0].triangles, vec![[2, 1, 0]]);
    }

    #[test]
    fn test_combine_rebases_indices() {
        let plain = vertex_format(1, 0);
        let skinned = vertex_format(1, 4);
        let parts = vec![
            partition("a", 0, plain.clone()),
            partition("b", 1, plain.clone()),
            partition("c", 0, plain.clone()),
            partition("d", 0, skinned),
        ];

        let combined = combine_by_material(parts, 2);
        let names: Vec<&str> = combined.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["mesh_for_mtl_0_ve_0", "mesh_for_mtl_0_ve_1", "mesh_for_mtl_1_ve_0"]
        );
        assert_eq!(combined[0].vertices.len(), 6);
        assert_eq!(combined[0].triangles, vec![[0, 1, 2], [3, 4, 5]]);
        assert_eq!(combined[0].vertex_format, plain);
    }

    #[test]
    fn test_separate_sorts_stably() {
        let format = vertex_format(1, 0);
        let parts = vec![
            partition("x", 2, format.clone()),
            partition("y", 0, format.clone()),
            partition("z", 2, format.clone()),
            partition("w", 0, format),
        ];
        let sorted = apply_strategy(PartitionStrategy::Separate, parts, 3);
        let names: Vec<&str> = sorted.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["y", "w", "x", "z"]);
    }

    #[test]
    fn test_remap_materials() {
        let format = vertex_format(1, 0);
        let mut parts = vec![partition("a", 0, format.clone()), partition("b", 2, format)];
        remap_materials(&mut parts, &[0, 1, 0]);
        assert_eq!(parts[1].material_id, 0);
    }
}
