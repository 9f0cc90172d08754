//! Export session
//!
//! Runs the whole pipeline over one scene and produces a finished
//! [`ExportedModel`]. Every export owns a fresh [`ExportSession`], so a failed
//! export leaves nothing behind for the next one.

use anyhow::{Context, Result};

use crate::animation::{sample_key_frames, KeyFrames};
use crate::material::{dedup_materials, Material};
use crate::mesh::extract_mesh;
use crate::partition::{apply_strategy, remap_materials, MeshPartition};
use crate::scene::{HostScene, NodeId, NodeKind};
use crate::settings::ExportSettings;
use crate::skeleton::{JointGraph, Skeleton};

/// Format-agnostic result handed to the serializer
#[derive(Debug, Clone)]
pub struct ExportedModel {
    /// `None` when skinning is disabled
    pub skeleton: Option<Skeleton>,
    pub materials: Vec<Material>,
    pub meshes: Vec<MeshPartition>,
    pub key_frames: Option<KeyFrames>,
}

impl ExportedModel {
    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.vertices.len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.triangles.len()).sum()
    }
}

/// Tables accumulated over one export.
///
/// Owns the joint graph, the material list and the partitions until
/// [`ExportSession::finish`] turns them into an [`ExportedModel`].
pub struct ExportSession<'a> {
    settings: &'a ExportSettings,
    joints: Option<JointGraph>,
    materials: Vec<Material>,
    partitions: Vec<MeshPartition>,
    skipped: usize,
}

impl<'a> ExportSession<'a> {
    /// Start a session; discovers joints and resolves bind poses when skinning
    pub fn new<S: HostScene + ?Sized>(scene: &S, settings: &'a ExportSettings) -> Result<Self> {
        settings.validate()?;

        let joints = if settings.skinning() {
            let mut graph = JointGraph::discover(scene)?;
            graph.resolve_bind_poses(scene, settings.reference_frame, settings.unit_scale);
            tracing::debug!("Discovered {} joints under '{}'", graph.len(), graph.root());
            Some(graph)
        } else {
            None
        };

        Ok(Self {
            settings,
            joints,
            materials: Vec::new(),
            partitions: Vec::new(),
            skipped: 0,
        })
    }

    /// Extract one mesh node into the session
    pub fn add_mesh<S: HostScene + ?Sized>(&mut self, scene: &S, node: NodeId) -> Result<()> {
        let name = scene.name(node);
        let extracted = extract_mesh(
            scene,
            node,
            self.settings,
            self.joints.as_ref(),
            &mut self.materials,
        )
        .with_context(|| format!("Failed to export mesh '{}'", name))?;

        match extracted {
            Some(parts) => self.partitions.extend(parts),
            None => {
                tracing::warn!("Skipping mesh '{}': no geometry", name);
                self.skipped += 1;
            }
        }
        Ok(())
    }

    /// Prune and order joints, sample key frames, merge materials and group
    /// partitions
    pub fn finish<S: HostScene + ?Sized>(self, scene: &S) -> Result<ExportedModel> {
        let Self {
            settings,
            joints,
            materials,
            mut partitions,
            skipped,
        } = self;

        let (skeleton, key_frames) = match joints {
            Some(mut graph) => {
                let referenced = partitions
                    .iter()
                    .flat_map(|p| &p.vertices)
                    .flat_map(|v| &v.weights)
                    .map(|b| b.joint.as_str());
                let removed = graph.prune(referenced);
                if removed > 0 {
                    tracing::debug!("Pruned {} unreferenced joint(s)", removed);
                }
                let skeleton = graph.into_ordered()?;
                let key_frames = sample_key_frames(scene, &skeleton, settings);
                (Some(skeleton), Some(key_frames))
            }
            None => (None, None),
        };

        let before = materials.len();
        let (materials, remap) = dedup_materials(materials);
        remap_materials(&mut partitions, &remap);
        if materials.len() < before {
            tracing::debug!("Merged {} duplicate material(s)", before - materials.len());
        }

        let meshes = apply_strategy(settings.partition, partitions, materials.len());

        let model = ExportedModel {
            skeleton,
            materials,
            meshes,
            key_frames,
        };
        tracing::info!(
            "Exported {} mesh(es), {} vertices, {} triangles, {} material(s), {} joint(s)",
            model.meshes.len(),
            model.vertex_count(),
            model.triangle_count(),
            model.materials.len(),
            model.skeleton.as_ref().map_or(0, Skeleton::len)
        );
        if skipped > 0 {
            tracing::info!("{} empty mesh node(s) skipped", skipped);
        }

        Ok(model)
    }
}

/// Export every mesh node of `scene`
pub fn export_scene<S: HostScene + ?Sized>(
    scene: &S,
    settings: &ExportSettings,
) -> Result<ExportedModel> {
    let mut session = ExportSession::new(scene, settings)?;
    for node in scene.preorder() {
        if scene.kind(node) == NodeKind::Mesh {
            session.add_mesh(scene, node)?;
        }
    }
    session.finish(scene)
}
