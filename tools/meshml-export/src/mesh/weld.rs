//! Vertex welding
//!
//! Corners weld into one output vertex iff their [`VertexKey`]s are equal.
//! Output vertices are numbered in ascending key order (position, then UV
//! indices channel by channel, then smoothing cluster). That order is the
//! canonical output-vertex order and is stable across runs.

use smallvec::SmallVec;
use std::collections::BTreeMap;

use super::ingest::RawVertexRef;

/// Welding identity of a corner
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VertexKey {
    pub position: u32,
    pub uvs: SmallVec<[u32; 2]>,
    pub cluster: u32,
}

impl From<&RawVertexRef> for VertexKey {
    fn from(corner: &RawVertexRef) -> Self {
        Self {
            position: corner.position,
            uvs: corner.uvs.clone(),
            cluster: corner.cluster,
        }
    }
}

/// Where a corner landed in the emitted triangle list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CornerRef {
    pub triangle: u32,
    pub slot: u8,
}

#[derive(Debug, Clone)]
pub struct WeldedVertex {
    pub key: VertexKey,
    /// Every corner that collapsed into this vertex
    pub corners: Vec<CornerRef>,
}

#[derive(Debug, Clone, Default)]
pub struct WeldedMesh {
    pub vertices: Vec<WeldedVertex>,
    pub triangles: Vec<[u32; 3]>,
}

/// Corner order of emitted triangles.
///
/// The Y/Z swap mirrors the mesh, so emitted triangles run backwards. A source
/// transform with negative parity mirrors once more and cancels that.
pub fn winding(mirrored: bool) -> [usize; 3] {
    if mirrored {
        [0, 1, 2]
    } else {
        [2, 1, 0]
    }
}

/// Weld `corners` (three per triangle) into unique vertices
pub fn weld(corners: &[RawVertexRef], winding: [usize; 3]) -> WeldedMesh {
    let triangle_count = corners.len() / 3;

    // Append-only vertex list; the map only stores indices into it
    let mut slots: BTreeMap<VertexKey, usize> = BTreeMap::new();
    let mut discovered: Vec<WeldedVertex> = Vec::new();

    for t in 0..triangle_count {
        for (slot, &j) in winding.iter().enumerate() {
            let key = VertexKey::from(&corners[t * 3 + j]);
            let corner = CornerRef {
                triangle: t as u32,
                slot: slot as u8,
            };
            match slots.get(&key) {
                Some(&index) => discovered[index].corners.push(corner),
                None => {
                    slots.insert(key.clone(), discovered.len());
                    discovered.push(WeldedVertex {
                        key,
                        corners: vec![corner],
                    });
                }
            }
        }
    }

    // Renumber in key order
    let mut canonical: Vec<Option<WeldedVertex>> = discovered.into_iter().map(Some).collect();
    let mut vertices = Vec::with_capacity(canonical.len());
    let mut triangles = vec![[0u32; 3]; triangle_count];
    for (output_index, &index) in slots.values().enumerate() {
        let Some(vertex) = canonical[index].take() else {
            continue;
        };
        for corner in &vertex.corners {
            triangles[corner.triangle as usize][corner.slot as usize] = output_index as u32;
        }
        vertices.push(vertex);
    }

    WeldedMesh {
        vertices,
        triangles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn corner(position: u32, uv: u32, cluster: u32) -> RawVertexRef {
        RawVertexRef {
            position,
            uvs: smallvec![uv],
            smoothing_groups: 1,
            cluster,
        }
    }

    fn quad() -> Vec<RawVertexRef> {
        // Two triangles sharing edge 1-2, same cluster, flat UVs
        vec![
            corner(0, 0, 0),
            corner(1, 1, 0),
            corner(2, 2, 0),
            corner(2, 2, 0),
            corner(1, 1, 0),
            corner(3, 3, 0),
        ]
    }

    #[test]
    fn test_shared_edge_welds() {
        let welded = weld(&quad(), [0, 1, 2]);
        assert_eq!(welded.vertices.len(), 4);
        assert_eq!(welded.triangles, vec![[0, 1, 2], [2, 1, 3]]);
    }

    #[test]
    fn test_every_corner_is_recorded() {
        let welded = weld(&quad(), [0, 1, 2]);
        let total: usize = welded.vertices.iter().map(|v| v.corners.len()).sum();
        assert_eq!(total, 6);
        assert_eq!(welded.vertices[1].corners.len(), 2);
        assert_eq!(welded.vertices[2].corners.len(), 2);
    }

    #[test]
    fn test_uv_seam_splits_vertex() {
        let mut corners = quad();
        corners[3].uvs = smallvec![7];
        let welded = weld(&corners, [0, 1, 2]);
        assert_eq!(welded.vertices.len(), 5);
    }

    #[test]
    fn test_cluster_split_prevents_weld() {
        let mut corners = quad();
        corners[4].cluster = 1;
        let welded = weld(&corners, [0, 1, 2]);
        assert_eq!(welded.vertices.len(), 5);
    }

    #[test]
    fn test_reversed_winding() {
        let welded = weld(&quad(), winding(false));
        assert_eq!(welded.triangles, vec![[2, 1, 0], [3, 1, 2]]);
    }

    #[test]
    fn test_output_order_follows_keys() {
        // Discovery order 3, 1, 2 must not leak into numbering
        let corners = vec![corner(3, 0, 0), corner(1, 0, 0), corner(2, 0, 0)];
        let welded = weld(&corners, [0, 1, 2]);
        let positions: Vec<u32> = welded.vertices.iter().map(|v| v.key.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(welded.triangles, vec![[2, 0, 1]]);
    }

    #[test]
    fn test_welding_is_idempotent() {
        let mut corners = quad();
        corners.extend([corner(3, 3, 0), corner(1, 1, 0), corner(4, 4, 1)]);
        let first = weld(&corners, [0, 1, 2]);

        // Feed the output back in, each output vertex its own singleton
        let again: Vec<RawVertexRef> = first
            .triangles
            .iter()
            .flatten()
            .map(|&v| corner(v, v, 0))
            .collect();
        let second = weld(&again, [0, 1, 2]);

        assert_eq!(second.vertices.len(), first.vertices.len());
        assert_eq!(second.triangles, first.triangles);
    }
}
