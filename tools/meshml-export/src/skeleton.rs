//! Joint graph builder
//!
//! Joints move through four stages: discovered from the scene, bind poses
//! resolved, pruned to the set the skin actually uses, and finally ordered
//! parents-first into a [`Skeleton`]. Only the ordered skeleton hands out
//! integer joint ids.

use glam::{Mat4, Quat, Vec3};
use hashbrown::{HashMap, HashSet};
use std::collections::BTreeMap;

use crate::axis::{position_from_matrix, rotation_from_matrix};
use crate::error::ExportError;
use crate::scene::{HostScene, NodeId, NodeKind, SkinSource};

#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: String,
    /// `None` only for the root
    pub parent: Option<String>,
    pub node: NodeId,
    /// Bind translation, unit-scaled, target axes
    pub bind_position: Vec3,
    /// Bind rotation, target axes
    pub bind_rotation: Quat,
    /// Maps an object-space point at the reference frame into the bind pose
    pub mesh_bind_correction: Mat4,
    /// No skin knew this joint; bind pose is its reference-frame transform
    pub fake: bool,
}

impl Joint {
    fn unbound(name: String, parent: Option<String>, node: NodeId) -> Self {
        Self {
            name,
            parent,
            node,
            bind_position: Vec3::ZERO,
            bind_rotation: Quat::IDENTITY,
            mesh_bind_correction: Mat4::IDENTITY,
            fake: false,
        }
    }
}

/// Unordered joint set keyed by name
#[derive(Debug, Clone)]
pub struct JointGraph {
    root: String,
    joints: BTreeMap<String, Joint>,
}

impl JointGraph {
    /// Walk the scene from its root and collect every joint node.
    ///
    /// The root node itself always becomes the root joint. A joint's parent is
    /// its nearest joint ancestor, or the root.
    pub fn discover<S: HostScene + ?Sized>(scene: &S) -> Result<Self, ExportError> {
        let root_node = scene.root();
        let root = scene.name(root_node).to_string();

        let mut joints = BTreeMap::new();
        joints.insert(root.clone(), Joint::unbound(root.clone(), None, root_node));

        for node in scene.preorder() {
            if node == root_node || scene.kind(node) != NodeKind::Joint {
                continue;
            }
            let name = scene.name(node).to_string();
            if joints.contains_key(&name) {
                return Err(ExportError::DuplicateJoint(name));
            }
            let parent = joint_ancestor(scene, node);
            joints.insert(
                name.clone(),
                Joint::unbound(name, Some(scene.name(parent).to_string()), node),
            );
        }

        Ok(Self { root, joints })
    }

    /// Resolve bind poses against the attached skins.
    ///
    /// Rigid binding systems are asked before generic skins; the first answer
    /// wins. Joints nobody knows become fake bones bound at their
    /// transform at `reference_frame`.
    pub fn resolve_bind_poses<S: HostScene + ?Sized>(
        &mut self,
        scene: &S,
        reference_frame: i32,
        unit_scale: f32,
    ) {
        let mut skins: Vec<&SkinSource> = scene
            .preorder()
            .into_iter()
            .flat_map(|node| scene.skins(node).iter())
            .collect();
        skins.sort_by_key(|skin| match skin {
            SkinSource::Rigid(_) => 0,
            SkinSource::Blended(_) => 1,
        });

        let mut fake = 0;
        for joint in self.joints.values_mut() {
            if joint.parent.is_none() {
                continue;
            }
            let reference = scene.world_transform(joint.node, reference_frame);
            let bind = match skins.iter().find_map(|skin| skin.bind_pose(&joint.name)) {
                Some(bind) => bind,
                None => {
                    fake += 1;
                    joint.fake = true;
                    reference
                }
            };

            joint.mesh_bind_correction = bind * reference.inverse();
            joint.bind_position = position_from_matrix(&bind) * unit_scale;
            joint.bind_rotation = rotation_from_matrix(&bind);
        }

        if fake > 0 {
            tracing::debug!(
                "{} joint(s) have no bind pose, using frame {}",
                fake,
                reference_frame
            );
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn get(&self, name: &str) -> Option<&Joint> {
        self.joints.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.joints.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Keep referenced joints and their ancestors, drop everything else.
    ///
    /// The root always survives. Returns the number of joints removed.
    pub fn prune<'a, I>(&mut self, referenced: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut keep: HashSet<String> = HashSet::new();
        keep.insert(self.root.clone());

        for name in referenced {
            let mut current = self.joints.get(name);
            while let Some(joint) = current {
                if !keep.insert(joint.name.clone()) {
                    break;
                }
                current = joint.parent.as_deref().and_then(|p| self.joints.get(p));
            }
        }

        let before = self.joints.len();
        self.joints.retain(|name, _| keep.contains(name));
        before - self.joints.len()
    }

    /// Order joints so every parent precedes its children.
    ///
    /// Fails when a parent is missing from the set or the links loop.
    pub fn into_ordered(self) -> Result<Skeleton, ExportError> {
        let order = self.parent_first_order()?;

        let mut joints = self.joints;
        let joints: Vec<Joint> = order
            .iter()
            .filter_map(|name| joints.remove(name))
            .collect();
        let ids = joints
            .iter()
            .enumerate()
            .map(|(i, joint)| (joint.name.clone(), i as u32))
            .collect();

        Ok(Skeleton {
            root: self.root,
            joints,
            ids,
        })
    }

    /// Joint names with every parent ahead of its children
    fn parent_first_order(&self) -> Result<Vec<String>, ExportError> {
        let mut placed: HashSet<&str> = HashSet::with_capacity(self.joints.len());
        let mut order: Vec<&str> = Vec::with_capacity(self.joints.len());

        for start in self.joints.keys() {
            let mut chain: Vec<&str> = Vec::new();
            let mut current = start.as_str();
            loop {
                if placed.contains(current) {
                    break;
                }
                if chain.contains(&current) {
                    return Err(ExportError::JointCycle(current.to_string()));
                }
                chain.push(current);
                let Some(parent) = self.joints[current].parent.as_deref() else {
                    break;
                };
                if !self.joints.contains_key(parent) {
                    return Err(ExportError::MissingParent {
                        joint: current.to_string(),
                        parent: parent.to_string(),
                    });
                }
                current = parent;
            }
            for name in chain.into_iter().rev() {
                placed.insert(name);
                order.push(name);
            }
        }

        Ok(order.into_iter().map(str::to_string).collect())
    }

    #[cfg(test)]
    pub(crate) fn from_joints(root: &str, joints: Vec<Joint>) -> Self {
        Self {
            root: root.to_string(),
            joints: joints.into_iter().map(|j| (j.name.clone(), j)).collect(),
        }
    }
}

/// Nearest ancestor that is a joint, stopping at the scene root
pub fn joint_ancestor<S: HostScene + ?Sized>(scene: &S, node: NodeId) -> NodeId {
    let root = scene.root();
    let mut current = scene.parent(node);
    while let Some(parent) = current {
        if parent == root || scene.kind(parent) == NodeKind::Joint {
            return parent;
        }
        current = scene.parent(parent);
    }
    root
}

/// Joints in parent-first order with stable integer ids
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    root: String,
    joints: Vec<Joint>,
    ids: HashMap<String, u32>,
}

impl Skeleton {
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn id(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    /// Parent id of joint `index`, `None` for the root
    pub fn parent_id(&self, index: usize) -> Option<u32> {
        self.joints[index]
            .parent
            .as_deref()
            .and_then(|parent| self.id(parent))
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }
}
