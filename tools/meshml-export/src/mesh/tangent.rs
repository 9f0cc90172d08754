//! Normal and tangent solver
//!
//! Face normals and UV-derived tangents are computed in source axes from the
//! already transformed positions, summed per smoothing cluster and converted
//! to target axes only at the end.

use glam::{Vec2, Vec3};

use crate::axis::swap_yz;

/// Below this the UV parallelogram is treated as singular
const DET_EPSILON: f32 = f32::EPSILON;

/// Below this an accumulated direction is treated as zero
const LENGTH_EPSILON: f32 = 1e-12;

/// Fallback normal in source axes (target +Y)
const FALLBACK_NORMAL: Vec3 = Vec3::Z;

/// Fallback tangent in source axes
const FALLBACK_TANGENT: Vec3 = Vec3::X;

/// Fallback binormal in target axes
const FALLBACK_BINORMAL: Vec3 = Vec3::Z;

/// Per-triangle directions, unit length or zero
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FaceFrame {
    pub normal: Vec3,
    pub tangent: Vec3,
}

/// Final per-vertex basis in target axes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TangentFrame {
    pub normal: Vec3,
    pub tangent: Vec3,
    pub binormal: Vec3,
}

/// Geometric normal of a triangle in source winding
pub fn face_normal(p0: Vec3, p1: Vec3, p2: Vec3) -> Vec3 {
    (p1 - p0).cross(p2 - p0)
}

/// Tangent from the UV derivative solve, `None` when the UV mapping is singular
pub fn face_tangent(p: [Vec3; 3], uv: [Vec2; 3]) -> Option<Vec3> {
    let e1 = p[1] - p[0];
    let e2 = p[2] - p[0];

    let s1 = uv[1].x - uv[0].x;
    let t1 = uv[1].y - uv[0].y;
    let s2 = uv[2].x - uv[0].x;
    let t2 = uv[2].y - uv[0].y;

    let det = s1 * t2 - s2 * t1;
    if det.abs() < DET_EPSILON {
        return None;
    }

    Some((t2 * e1 - t1 * e2) / det)
}

/// Face frames for every triangle.
///
/// `triangles` hold position indices and UV indices in source winding. Returns
/// the frames plus how many triangles needed the fallback tangent.
pub fn face_frames(
    positions: &[Vec3],
    triangles: &[[u32; 3]],
    uv_triangles: &[[u32; 3]],
    uvs: &[Vec2],
) -> (Vec<FaceFrame>, usize) {
    let mut degenerate = 0;
    let frames = triangles
        .iter()
        .zip(uv_triangles)
        .map(|(tri, uv_tri)| {
            let p = tri.map(|i| positions[i as usize]);
            let uv = uv_tri.map(|i| uvs[i as usize]);

            let normal = face_normal(p[0], p[1], p[2]).normalize_or_zero();
            let tangent = match face_tangent(p, uv) {
                Some(t) => t.normalize_or_zero(),
                None => {
                    degenerate += 1;
                    FALLBACK_TANGENT
                }
            };
            FaceFrame { normal, tangent }
        })
        .collect();
    (frames, degenerate)
}

/// Vertex basis from the faces of one smoothing cluster.
///
/// `mirrored` negates the sums so normals of negative-parity instances still
/// face outwards; the caller reverses the winding to match.
pub fn vertex_frame(faces: &[FaceFrame], cluster: &[u32], mirrored: bool) -> TangentFrame {
    let (mut normal, mut tangent) = cluster
        .iter()
        .map(|&t| faces[t as usize])
        .fold((Vec3::ZERO, Vec3::ZERO), |(n, t), f| (n + f.normal, t + f.tangent));

    if mirrored {
        normal = -normal;
        tangent = -tangent;
    }

    let normal = swap_yz(unit_or(normal, FALLBACK_NORMAL));
    let tangent = swap_yz(unit_or(tangent, FALLBACK_TANGENT));
    let binormal = unit_or(normal.cross(tangent), FALLBACK_BINORMAL);

    TangentFrame {
        normal,
        tangent,
        binormal,
    }
}

fn unit_or(v: Vec3, fallback: Vec3) -> Vec3 {
    if v.length_squared() <= LENGTH_EPSILON {
        fallback
    } else {
        v.normalize()
    }
}
