//! Key-frame sampling
//!
//! One track per joint, sampled once per frame over the export range. The
//! root track holds the root's world transform; every other track holds the
//! joint's transform relative to its parent joint.

use glam::{Quat, Vec3};

use crate::axis::{position_from_matrix, rotation_from_matrix};
use crate::scene::HostScene;
use crate::settings::ExportSettings;
use crate::skeleton::Skeleton;

#[derive(Debug, Clone, PartialEq)]
pub struct KeyFrameTrack {
    pub joint: String,
    /// Unit-scaled, target axes
    pub positions: Vec<Vec3>,
    pub rotations: Vec<Quat>,
}

impl KeyFrameTrack {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Clip metadata plus aligned tracks
#[derive(Debug, Clone, PartialEq)]
pub struct KeyFrames {
    pub start_frame: i32,
    pub end_frame: i32,
    pub frame_rate: u32,
    pub tracks: Vec<KeyFrameTrack>,
}

/// Sample every joint of `skeleton`, in skeleton order
pub fn sample_key_frames<S: HostScene + ?Sized>(
    scene: &S,
    skeleton: &Skeleton,
    settings: &ExportSettings,
) -> KeyFrames {
    let frames = settings.start_frame..settings.end_frame;

    let tracks = skeleton
        .joints()
        .iter()
        .enumerate()
        .map(|(index, joint)| {
            let parent = skeleton
                .parent_id(index)
                .map(|id| skeleton.joints()[id as usize].node);

            let mut track = KeyFrameTrack {
                joint: joint.name.clone(),
                positions: Vec::with_capacity(frames.len()),
                rotations: Vec::with_capacity(frames.len()),
            };
            for frame in frames.clone() {
                let world = scene.world_transform(joint.node, frame);
                let local = match parent {
                    Some(parent) => scene.world_transform(parent, frame).inverse() * world,
                    None => world,
                };
                track
                    .positions
                    .push(position_from_matrix(&local) * settings.unit_scale);
                track.rotations.push(rotation_from_matrix(&local));
            }
            track
        })
        .collect();

    KeyFrames {
        start_frame: settings.start_frame,
        end_frame: settings.end_frame,
        frame_rate: settings.frame_rate,
        tracks,
    }
}
