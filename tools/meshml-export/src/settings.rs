//! Export settings
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! file (or no file) is a valid configuration.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

/// How partitions from different objects are grouped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategy {
    /// Merge every partition sharing material and vertex format
    Combine,
    /// One partition per object and material, sorted by material
    #[default]
    Separate,
}

/// Optional vertex elements the writer emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VertexAttributes {
    pub normal: bool,
    pub tangent: bool,
    pub binormal: bool,
    pub tex_coord: bool,
}

impl Default for VertexAttributes {
    fn default() -> Self {
        Self {
            normal: true,
            tangent: true,
            binormal: true,
            tex_coord: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Host units to meters
    pub unit_scale: f32,
    pub frame_rate: u32,
    pub start_frame: i32,
    /// Exclusive
    pub end_frame: i32,
    /// Frame at which mesh geometry is evaluated
    pub reference_frame: i32,
    /// Influences per vertex; 0 disables skinning
    pub joints_per_vertex: usize,
    pub partition: PartitionStrategy,
    pub attributes: VertexAttributes,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            unit_scale: 1.0,
            frame_rate: 30,
            start_frame: 0,
            end_frame: 1,
            reference_frame: 0,
            joints_per_vertex: 4,
            partition: PartitionStrategy::default(),
            attributes: VertexAttributes::default(),
        }
    }
}

impl ExportSettings {
    pub fn parse(content: &str) -> Result<Self> {
        let settings: ExportSettings =
            toml::from_str(content).context("Failed to parse export settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Invalid settings: {:?}", path))
    }

    pub fn skinning(&self) -> bool {
        self.joints_per_vertex > 0
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.unit_scale.is_finite() && self.unit_scale > 0.0) {
            bail!("unit_scale must be positive, got {}", self.unit_scale);
        }
        if self.joints_per_vertex > u8::MAX as usize {
            bail!(
                "joints_per_vertex must be at most {}, got {}",
                u8::MAX,
                self.joints_per_vertex
            );
        }
        if self.frame_rate == 0 {
            bail!("frame_rate must be positive");
        }
        if self.end_frame < self.start_frame {
            bail!(
                "end_frame {} is before start_frame {}",
                self.end_frame,
                self.start_frame
            );
        }
        Ok(())
    }
}
