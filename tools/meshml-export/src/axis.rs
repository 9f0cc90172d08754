//! Source (Z-up) to target (Y-up) coordinate conversion
//!
//! The host works in a right-handed Z-up frame. MeshML is Y-up, reached by
//! swapping Y and Z. The swap is a reflection, so it flips handedness: anything
//! with orientation (rotations, triangle winding) has to be re-expressed rather
//! than copied.

use glam::{Mat4, Quat, Vec2, Vec3};

/// Swap the Y and Z components of a vector
#[inline]
pub fn swap_yz(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.z, v.y)
}

/// Rotation `q` conjugated by the Y/Z reflection.
///
/// For every vector `v`: `swap_yz(q * v) == mirror_rotation(q) * swap_yz(v)`.
#[inline]
pub fn mirror_rotation(q: Quat) -> Quat {
    Quat::from_xyzw(-q.x, -q.z, -q.y, q.w)
}

/// Translation part of a transform, in target axes
pub fn position_from_matrix(m: &Mat4) -> Vec3 {
    swap_yz(m.w_axis.truncate())
}

/// Rotation part of a transform, in target axes
pub fn rotation_from_matrix(m: &Mat4) -> Quat {
    let (_, rotation, _) = m.to_scale_rotation_translation();
    mirror_rotation(rotation.normalize())
}

/// Texture coordinate with V flipped to the top-left origin
#[inline]
pub fn flip_v(uv: Vec2) -> Vec2 {
    Vec2::new(uv.x, 1.0 - uv.y)
}
