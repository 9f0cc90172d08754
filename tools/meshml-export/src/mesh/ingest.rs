//! Raw mesh ingestion
//!
//! Validates host tables and flattens them into a corner list, one entry per
//! triangle corner, plus the smoothing clusters of every position.

use glam::Vec2;
use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::error::ExportError;
use crate::material::{ChannelTransforms, UvTransform};
use crate::scene::{RawMesh, UvChannel};

/// One corner of one source triangle. Not unique per output vertex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawVertexRef {
    pub position: u32,
    /// UV index per channel, in ascending channel order
    pub uvs: SmallVec<[u32; 2]>,
    pub smoothing_groups: u32,
    /// Index into the position's cluster list
    pub cluster: u32,
}

/// Validated, corner-expanded mesh
#[derive(Debug, Clone)]
pub struct IngestedMesh {
    /// `3 * triangle_count` corners, in source winding
    pub corners: Vec<RawVertexRef>,
    /// Host material id per triangle
    pub face_materials: Vec<u32>,
    /// UV coordinates per channel, ascending channel order
    pub uv_sets: Vec<Vec<Vec2>>,
    /// Per position: disjoint sets of incident triangles that share a normal
    pub clusters: Vec<Vec<Vec<u32>>>,
}

impl IngestedMesh {
    pub fn triangle_count(&self) -> usize {
        self.face_materials.len()
    }

    pub fn position_count(&self) -> usize {
        self.clusters.len()
    }

    /// Triangles sharing a normal with corner `(position, cluster)`
    pub fn cluster(&self, position: u32, cluster: u32) -> &[u32] {
        &self.clusters[position as usize][cluster as usize]
    }
}

/// Flatten a host mesh. Returns `Ok(None)` for meshes without faces.
///
/// `transforms` holds the UV transforms of the node's materials; a face uses
/// the entry selected by its material id (wrapped). An empty slice leaves UVs
/// untransformed.
pub fn ingest(
    name: &str,
    mesh: &RawMesh,
    transforms: &[ChannelTransforms],
) -> Result<Option<IngestedMesh>, ExportError> {
    if mesh.faces.is_empty() || mesh.positions.is_empty() {
        return Ok(None);
    }

    let invalid = |reason: String| ExportError::InvalidMesh {
        mesh: name.to_string(),
        reason,
    };

    let position_count = mesh.positions.len();
    for (i, face) in mesh.faces.iter().enumerate() {
        if let Some(&p) = face.positions.iter().find(|&&p| p as usize >= position_count) {
            return Err(invalid(format!(
                "face {} references position {} of {}",
                i, p, position_count
            )));
        }
    }

    // A mesh without UVs still needs one channel for the tangent solve
    let synthesized;
    let channels: Vec<(u32, &UvChannel)> = if mesh.uv_channels.is_empty() {
        synthesized = UvChannel {
            coords: vec![Vec2::ZERO; position_count],
            faces: mesh.faces.iter().map(|f| f.positions).collect(),
        };
        vec![(1, &synthesized)]
    } else {
        mesh.uv_channels.iter().map(|(&id, c)| (id, c)).collect()
    };

    for (id, channel) in &channels {
        if channel.faces.len() != mesh.faces.len() {
            return Err(invalid(format!(
                "uv channel {} has {} faces, mesh has {}",
                id,
                channel.faces.len(),
                mesh.faces.len()
            )));
        }
        let coord_count = channel.coords.len();
        if let Some(bad) = channel
            .faces
            .iter()
            .flatten()
            .find(|&&t| t as usize >= coord_count)
        {
            return Err(invalid(format!(
                "uv channel {} references coordinate {} of {}",
                id, bad, coord_count
            )));
        }
    }

    let face_materials: Vec<u32> = mesh.faces.iter().map(|f| f.material_id).collect();
    let (uv_sets, uv_faces): (Vec<Vec<Vec2>>, Vec<Vec<[u32; 3]>>) = channels
        .iter()
        .map(|(id, channel)| {
            if mesh.uv_channels.is_empty() {
                (channel.coords.clone(), channel.faces.clone())
            } else {
                transform_channel(*id, channel, &face_materials, transforms)
            }
        })
        .unzip();

    let smoothing: Vec<u32> = mesh.faces.iter().map(|f| f.smoothing_groups).collect();
    let clusters = build_smoothing_clusters(mesh, &smoothing);

    let mut corners = Vec::with_capacity(mesh.faces.len() * 3);
    for (t, face) in mesh.faces.iter().enumerate() {
        for j in 0..3 {
            let position = face.positions[j];
            let cluster = clusters[position as usize]
                .iter()
                .position(|c| c.contains(&(t as u32)))
                .unwrap_or_default() as u32;
            corners.push(RawVertexRef {
                position,
                uvs: uv_faces.iter().map(|faces| faces[t][j]).collect(),
                smoothing_groups: face.smoothing_groups,
                cluster,
            });
        }
    }

    Ok(Some(IngestedMesh {
        corners,
        face_materials,
        uv_sets,
        clusters,
    }))
}

/// Apply the per-material transforms of channel `id`.
///
/// A coordinate shared by faces whose materials transform it differently is
/// split into one coordinate per distinct transform.
fn transform_channel(
    id: u32,
    channel: &UvChannel,
    face_materials: &[u32],
    transforms: &[ChannelTransforms],
) -> (Vec<Vec2>, Vec<[u32; 3]>) {
    let per_material: Vec<UvTransform> = transforms
        .iter()
        .map(|t| t.get(&id).copied().unwrap_or_default())
        .collect();
    if per_material.iter().all(UvTransform::is_identity) {
        return (channel.coords.clone(), channel.faces.clone());
    }

    let mut distinct: Vec<UvTransform> = Vec::new();
    let slots: Vec<usize> = per_material
        .iter()
        .map(|t| match distinct.iter().position(|d| d == t) {
            Some(slot) => slot,
            None => {
                distinct.push(*t);
                distinct.len() - 1
            }
        })
        .collect();

    let mut remap: HashMap<(u32, usize), u32> = HashMap::new();
    let mut coords: Vec<Vec2> = Vec::new();
    let mut faces: Vec<[u32; 3]> = Vec::with_capacity(channel.faces.len());
    for (tri, &material) in channel.faces.iter().zip(face_materials) {
        let slot = slots[material as usize % slots.len()];
        let mut out = [0u32; 3];
        for (dst, &uv) in out.iter_mut().zip(tri) {
            *dst = *remap.entry((uv, slot)).or_insert_with(|| {
                coords.push(distinct[slot].apply(channel.coords[uv as usize]));
                (coords.len() - 1) as u32
            });
        }
        faces.push(out);
    }

    (coords, faces)
}

/// Group the triangles around each position into smoothing clusters.
///
/// A triangle joins every cluster containing a triangle whose smoothing mask
/// intersects its own; clusters it bridges are merged. Triangles with mask 0
/// always stand alone.
fn build_smoothing_clusters(mesh: &RawMesh, smoothing: &[u32]) -> Vec<Vec<Vec<u32>>> {
    let mut clusters: Vec<Vec<Vec<u32>>> = vec![Vec::new(); mesh.positions.len()];

    for (t, face) in mesh.faces.iter().enumerate() {
        let mask = smoothing[t];
        for (j, &p) in face.positions.iter().enumerate() {
            // Degenerate faces can repeat a position
            if face.positions[..j].contains(&p) {
                continue;
            }

            let list = &mut clusters[p as usize];
            let hits: Vec<usize> = list
                .iter()
                .enumerate()
                .filter(|(_, c)| c.iter().any(|&other| smoothing[other as usize] & mask != 0))
                .map(|(k, _)| k)
                .collect();

            match hits.split_first() {
                None => list.push(vec![t as u32]),
                Some((&first, rest)) => {
                    for &k in rest.iter().rev() {
                        let merged = list.remove(k);
                        list[first].extend(merged);
                    }
                    list[first].push(t as u32);
                    list[first].sort_unstable();
                }
            }
        }
    }

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::RawFace;
    use glam::Vec3;

    fn face(positions: [u32; 3], smoothing_groups: u32) -> RawFace {
        RawFace {
            positions,
            smoothing_groups,
            material_id: 0,
        }
    }

    fn fan(groups: &[u32]) -> RawMesh {
        // Triangles fanned around position 0
        let n = groups.len() as u32;
        let mut positions = vec![Vec3::ZERO];
        positions.extend((0..=n).map(|i| Vec3::new(i as f32, 1.0, 0.0)));
        RawMesh {
            positions,
            faces: groups
                .iter()
                .enumerate()
                .map(|(i, &g)| face([0, i as u32 + 1, i as u32 + 2], g))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_mesh_is_skipped() {
        let mesh = RawMesh::default();
        assert!(ingest("empty", &mesh, &[]).unwrap().is_none());
    }

    #[test]
    fn test_out_of_range_position_is_rejected() {
        let mut mesh = fan(&[1]);
        mesh.faces[0].positions[2] = 99;
        let err = ingest("broken", &mesh, &[]).unwrap_err();
        assert!(matches!(err, ExportError::InvalidMesh { .. }));
    }

    #[test]
    fn test_missing_uvs_get_a_zero_channel() {
        let ingested = ingest("m", &fan(&[1]), &[]).unwrap().unwrap();
        assert_eq!(ingested.uv_sets.len(), 1);
        assert!(ingested.uv_sets[0].iter().all(|uv| *uv == Vec2::ZERO));
        assert_eq!(ingested.corners[1].uvs.as_slice(), &[1]);
    }

    #[test]
    fn test_material_transform_splits_shared_uv() {
        // Two faces share every UV; only material 1 tiles channel 1
        let mut mesh = fan(&[1, 1]);
        mesh.faces[1].material_id = 1;
        mesh.uv_channels.insert(
            1,
            UvChannel {
                coords: vec![Vec2::new(0.5, 0.5)],
                faces: vec![[0, 0, 0], [0, 0, 0]],
            },
        );
        let tiled = UvTransform {
            matrix: glam::Mat4::from_scale(Vec3::new(2.0, 2.0, 1.0)),
            ..Default::default()
        };
        let transforms = vec![ChannelTransforms::new(), ChannelTransforms::from([(1, tiled)])];

        let ingested = ingest("m", &mesh, &transforms).unwrap().unwrap();
        assert_eq!(ingested.uv_sets[0], vec![Vec2::new(0.5, 0.5), Vec2::ONE]);
        assert_eq!(ingested.corners[0].uvs.as_slice(), &[0]);
        assert_eq!(ingested.corners[3].uvs.as_slice(), &[1]);
    }

    #[test]
    fn test_shared_group_forms_one_cluster() {
        let ingested = ingest("m", &fan(&[1, 1, 1]), &[]).unwrap().unwrap();
        assert_eq!(ingested.clusters[0], vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_hard_edge_splits_clusters() {
        let ingested = ingest("m", &fan(&[1, 2]), &[]).unwrap().unwrap();
        assert_eq!(ingested.clusters[0], vec![vec![0], vec![1]]);
        assert_eq!(ingested.corners[0].cluster, 0);
        assert_eq!(ingested.corners[3].cluster, 1);
    }

    #[test]
    fn test_zero_mask_faces_never_share() {
        let ingested = ingest("m", &fan(&[0, 0]), &[]).unwrap().unwrap();
        assert_eq!(ingested.clusters[0].len(), 2);
    }

    #[test]
    fn test_bridging_face_merges_clusters() {
        // 0b01 and 0b10 are disjoint until 0b11 arrives
        let ingested = ingest("m", &fan(&[0b01, 0b10, 0b11]), &[]).unwrap().unwrap();
        assert_eq!(ingested.clusters[0], vec![vec![0, 1, 2]]);
        assert!(ingested.corners.iter().all(|c| c.position != 0 || c.cluster == 0));
    }

    #[test]
    fn test_clusters_partition_incident_triangles() {
        let ingested = ingest("m", &fan(&[1, 2, 1, 4, 6]), &[]).unwrap().unwrap();
        let mut seen: Vec<u32> = ingested.clusters[0].iter().flatten().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }
}
