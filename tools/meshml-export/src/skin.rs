//! Skin resolver
//!
//! Gathers per-position joint influences from every skinning system on a
//! mesh, falls back to the nearest joint ancestor for unbound positions, caps
//! the influence count and moves positions into the bind pose.

use glam::{Mat4, Vec3};
use smallvec::SmallVec;

use crate::error::ExportError;
use crate::scene::{HostScene, NodeId, SkinSource, VertexBinding};
use crate::skeleton::{joint_ancestor, JointGraph};

/// One joint influence on a vertex
#[derive(Debug, Clone, PartialEq)]
pub struct BoneWeight {
    pub joint: String,
    pub weight: f32,
}

impl BoneWeight {
    pub fn new(joint: impl Into<String>, weight: f32) -> Self {
        Self {
            joint: joint.into(),
            weight,
        }
    }
}

/// Influences of one vertex
pub type Influences = SmallVec<[BoneWeight; 4]>;

/// Skinned positions (object space at bind time) with their influences
#[derive(Debug, Clone, Default)]
pub struct SkinnedPositions {
    pub positions: Vec<Vec3>,
    pub influences: Vec<Influences>,
}

/// Add `weight` to `joint`, summing with an existing entry of the same joint
pub fn add_weight(influences: &mut Influences, joint: &str, weight: f32) {
    if weight <= 0.0 {
        return;
    }
    match influences.iter_mut().find(|b| b.joint == joint) {
        Some(existing) => existing.weight += weight,
        None => influences.push(BoneWeight::new(joint, weight)),
    }
}

/// Merge the contributions of all skinning systems, per mesh position
pub fn gather_influences(
    mesh: &str,
    skins: &[SkinSource],
    position_count: usize,
) -> Result<Vec<Influences>, ExportError> {
    let mut influences = vec![Influences::new(); position_count];
    let invalid = |reason: String| ExportError::InvalidMesh {
        mesh: mesh.to_string(),
        reason,
    };

    for skin in skins {
        match skin {
            SkinSource::Rigid(rigid) => {
                if rigid.vertices.len() > position_count {
                    return Err(invalid(format!(
                        "rigid skin binds {} vertices, mesh has {}",
                        rigid.vertices.len(),
                        position_count
                    )));
                }
                for (i, binding) in rigid.vertices.iter().enumerate() {
                    match binding {
                        Some(VertexBinding::Fixed(joint)) => {
                            add_weight(&mut influences[i], joint, 1.0)
                        }
                        Some(VertexBinding::Blended(list)) => {
                            for (joint, weight) in list {
                                add_weight(&mut influences[i], joint, *weight);
                            }
                        }
                        None => {}
                    }
                }
            }
            SkinSource::Blended(blended) => {
                if blended.vertices.len() > position_count {
                    return Err(invalid(format!(
                        "skin binds {} vertices, mesh has {}",
                        blended.vertices.len(),
                        position_count
                    )));
                }
                for (i, list) in blended.vertices.iter().enumerate() {
                    for &(bone, weight) in list {
                        let joint = blended.bones.get(bone).ok_or_else(|| {
                            invalid(format!(
                                "vertex {} references bone {} of {}",
                                i,
                                bone,
                                blended.bones.len()
                            ))
                        })?;
                        add_weight(&mut influences[i], joint, weight);
                    }
                }
            }
        }
    }

    Ok(influences)
}

/// Keep the `max` largest influences, renormalize and pad to exactly `max`.
///
/// Ties keep input order. Padding entries reference `root` with zero weight.
/// Returns `false` when the kept weights sum to zero.
pub fn limit_influences(influences: &mut Influences, max: usize, root: &str) -> bool {
    // Stable sort: equal weights keep their input order
    influences.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    influences.truncate(max);

    let sum: f32 = influences.iter().map(|b| b.weight).sum();
    if sum <= 0.0 || !sum.is_finite() {
        return false;
    }
    for bone in influences.iter_mut() {
        bone.weight /= sum;
    }

    while influences.len() < max {
        influences.push(BoneWeight::new(root, 0.0));
    }
    true
}

/// Blend a reference-frame world position through each joint's bind correction
pub fn bind_position<F>(world: Vec3, influences: &[BoneWeight], correction: F) -> Vec3
where
    F: Fn(&str) -> Mat4,
{
    influences
        .iter()
        .filter(|b| b.weight > 0.0)
        .map(|b| b.weight * correction(&b.joint).transform_point3(world))
        .sum()
}

/// Resolve skinning for one mesh node.
///
/// Positions are read at `reference_frame` and come back in bind pose;
/// influences are capped at `max_influences` and sum to one.
pub fn resolve_skin<S: HostScene + ?Sized>(
    scene: &S,
    node: NodeId,
    positions: &[Vec3],
    joints: &JointGraph,
    reference_frame: i32,
    max_influences: usize,
) -> Result<SkinnedPositions, ExportError> {
    let mesh = scene.name(node);
    let mut influences = gather_influences(mesh, scene.skins(node), positions.len())?;

    let fallback = scene.name(joint_ancestor(scene, node)).to_string();
    let object_to_world = scene.object_transform(node, reference_frame);

    let mut unbound = 0;
    let mut skinned = Vec::with_capacity(positions.len());
    for (vertex, (position, bones)) in positions.iter().zip(influences.iter_mut()).enumerate() {
        if bones.is_empty() {
            unbound += 1;
            bones.push(BoneWeight::new(fallback.as_str(), 1.0));
        }

        if let Some(unknown) = bones.iter().find(|b| !joints.contains(&b.joint)) {
            return Err(ExportError::UnknownJoint {
                mesh: mesh.to_string(),
                joint: unknown.joint.clone(),
            });
        }

        if !limit_influences(bones, max_influences, joints.root()) {
            return Err(ExportError::ZeroWeight {
                mesh: mesh.to_string(),
                vertex,
            });
        }

        let world = object_to_world.transform_point3(*position);
        skinned.push(bind_position(world, bones, |joint| {
            joints
                .get(joint)
                .map(|j| j.mesh_bind_correction)
                .unwrap_or(Mat4::IDENTITY)
        }));
    }

    if unbound > 0 {
        tracing::debug!(
            "Mesh '{}': {} unbound vertices attached to '{}'",
            mesh,
            unbound,
            fallback
        );
    }

    Ok(SkinnedPositions {
        positions: skinned,
        influences,
    })
}
