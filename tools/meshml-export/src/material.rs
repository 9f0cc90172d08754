//! Material derivation and deduplication

use glam::{Mat4, Vec2, Vec3};
use std::collections::BTreeMap;

use crate::scene::{MaterialSource, SelfIllumination, UvAxis};

/// Shading parameters as written to MeshML
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub emit: Vec3,
    pub opacity: f32,
    pub specular_level: f32,
    pub shininess: f32,
    /// `(slot name, texture file)` in host slot order
    pub texture_slots: Vec<(String, String)>,
}

impl Default for Material {
    /// Plain white, used for meshes without any material
    fn default() -> Self {
        Self {
            ambient: Vec3::ZERO,
            diffuse: Vec3::ONE,
            specular: Vec3::ZERO,
            emit: Vec3::ZERO,
            opacity: 1.0,
            specular_level: 0.0,
            shininess: 0.0,
            texture_slots: Vec::new(),
        }
    }
}

impl Material {
    /// Derive from a leaf host material (sub-materials are ignored here)
    pub fn from_source(source: &MaterialSource) -> Self {
        let emit = match source.self_illumination {
            SelfIllumination::Color(color) => color,
            SelfIllumination::Amount(amount) => source.diffuse * amount,
        };

        Self {
            ambient: source.ambient,
            diffuse: source.diffuse,
            specular: source.specular,
            emit,
            opacity: 1.0 - source.transparency,
            specular_level: source.shininess_strength,
            shininess: source.glossiness * 100.0,
            texture_slots: source
                .textures
                .iter()
                .filter(|t| !t.file.is_empty())
                .map(|t| (t.slot.clone(), t.file.clone()))
                .collect(),
        }
    }
}

/// Append the leaves of a (multi-)material depth first
pub fn flatten_material(source: &MaterialSource, out: &mut Vec<Material>) {
    if source.sub_materials.is_empty() {
        out.push(Material::from_source(source));
    } else {
        for sub in &source.sub_materials {
            flatten_material(sub, out);
        }
    }
}

/// Texture-space transform a material applies to one UV channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvTransform {
    pub matrix: Mat4,
    pub axis: UvAxis,
}

impl Default for UvTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl UvTransform {
    pub const IDENTITY: Self = Self {
        matrix: Mat4::IDENTITY,
        axis: UvAxis::Uv,
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Transform `uv` as the UVW point `(u, v, 0)` and read back the
    /// selected pair of components
    pub fn apply(&self, uv: Vec2) -> Vec2 {
        let uvw = self.matrix.transform_point3(uv.extend(0.0));
        let u = self.axis.first();
        Vec2::new(uvw[u], uvw[(u + 1) % 3])
    }
}

/// UV transforms of one leaf material, keyed by host map channel.
/// Channels without an entry are untransformed.
pub type ChannelTransforms = BTreeMap<u32, UvTransform>;

/// Channel transforms of a leaf material; a later texture on the same
/// channel replaces an earlier one
pub fn channel_transforms(source: &MaterialSource) -> ChannelTransforms {
    source
        .textures
        .iter()
        .filter(|t| !t.file.is_empty())
        .map(|t| {
            (
                t.map_channel,
                UvTransform {
                    matrix: t.uv_transform,
                    axis: t.axis,
                },
            )
        })
        .collect()
}

/// Append the channel transforms of every leaf, in [`flatten_material`] order
pub fn flatten_uv_transforms(source: &MaterialSource, out: &mut Vec<ChannelTransforms>) {
    if source.sub_materials.is_empty() {
        out.push(channel_transforms(source));
    } else {
        for sub in &source.sub_materials {
            flatten_uv_transforms(sub, out);
        }
    }
}

/// Collapse structurally equal materials.
///
/// Returns the surviving materials (first occurrence order) and a table
/// mapping every original index to its surviving index.
pub fn dedup_materials(materials: Vec<Material>) -> (Vec<Material>, Vec<usize>) {
    let mut unique: Vec<Material> = Vec::new();
    let mut remap = Vec::with_capacity(materials.len());

    for material in materials {
        match unique.iter().position(|m| *m == material) {
            Some(existing) => remap.push(existing),
            None => {
                remap.push(unique.len());
                unique.push(material);
            }
        }
    }

    (unique, remap)
}
