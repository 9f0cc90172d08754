//! MeshML writer
//!
//! Serializes an [`ExportedModel`] as MeshML version 4 XML. The writer makes
//! no decisions of its own: ordering, ids and values all come from the model.

use anyhow::{Context, Result};
use glam::{Quat, Vec3};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::partition::{MeshPartition, VertexUsage};
use crate::session::ExportedModel;
use crate::settings::VertexAttributes;
use crate::skeleton::Skeleton;

pub const MESHML_VERSION: u32 = 4;

/// Escape a string for use inside a double-quoted attribute
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn write_vec3<W: Write>(w: &mut W, indent: &str, tag: &str, v: Vec3) -> Result<()> {
    writeln!(
        w,
        "{}<{} x=\"{}\" y=\"{}\" z=\"{}\"/>",
        indent, tag, v.x, v.y, v.z
    )?;
    Ok(())
}

fn write_quat<W: Write>(w: &mut W, indent: &str, tag: &str, q: Quat) -> Result<()> {
    writeln!(
        w,
        "{}<{} x=\"{}\" y=\"{}\" z=\"{}\" w=\"{}\"/>",
        indent, tag, q.x, q.y, q.z, q.w
    )?;
    Ok(())
}

fn element_enabled(usage: VertexUsage, attributes: &VertexAttributes) -> bool {
    match usage {
        VertexUsage::Normal => attributes.normal,
        VertexUsage::Tangent => attributes.tangent,
        VertexUsage::Binormal => attributes.binormal,
        VertexUsage::TextureCoord => attributes.tex_coord,
        _ => true,
    }
}

fn write_bones<W: Write>(w: &mut W, skeleton: &Skeleton) -> Result<()> {
    writeln!(w, "\t<bones_chunk>")?;
    for (index, joint) in skeleton.joints().iter().enumerate() {
        let parent = skeleton.parent_id(index).map_or(-1, |id| id as i64);
        writeln!(
            w,
            "\t\t<bone name=\"{}\" parent=\"{}\">",
            escape_attr(&joint.name),
            parent
        )?;
        write_vec3(w, "\t\t\t", "bind_pos", joint.bind_position)?;
        write_quat(w, "\t\t\t", "bind_quat", joint.bind_rotation)?;
        writeln!(w, "\t\t</bone>")?;
    }
    writeln!(w, "\t</bones_chunk>")?;
    Ok(())
}

fn write_materials<W: Write>(w: &mut W, model: &ExportedModel) -> Result<()> {
    if model.materials.is_empty() {
        return Ok(());
    }

    writeln!(w, "\t<materials_chunk>")?;
    for m in &model.materials {
        writeln!(
            w,
            "\t\t<material ambient_r=\"{}\" ambient_g=\"{}\" ambient_b=\"{}\" \
             diffuse_r=\"{}\" diffuse_g=\"{}\" diffuse_b=\"{}\" \
             specular_r=\"{}\" specular_g=\"{}\" specular_b=\"{}\" \
             emit_r=\"{}\" emit_g=\"{}\" emit_b=\"{}\" \
             opacity=\"{}\" specular_level=\"{}\" shininess=\"{}\">",
            m.ambient.x,
            m.ambient.y,
            m.ambient.z,
            m.diffuse.x,
            m.diffuse.y,
            m.diffuse.z,
            m.specular.x,
            m.specular.y,
            m.specular.z,
            m.emit.x,
            m.emit.y,
            m.emit.z,
            m.opacity,
            m.specular_level,
            m.shininess
        )?;
        if !m.texture_slots.is_empty() {
            writeln!(w, "\t\t\t<textures_chunk>")?;
            for (slot, file) in &m.texture_slots {
                writeln!(
                    w,
                    "\t\t\t\t<texture type=\"{}\" name=\"{}\"/>",
                    escape_attr(slot),
                    escape_attr(file)
                )?;
            }
            writeln!(w, "\t\t\t</textures_chunk>")?;
        }
        writeln!(w, "\t\t</material>")?;
    }
    writeln!(w, "\t</materials_chunk>")?;
    Ok(())
}

fn write_mesh<W: Write>(
    w: &mut W,
    mesh: &MeshPartition,
    skeleton: Option<&Skeleton>,
    attributes: &VertexAttributes,
) -> Result<()> {
    writeln!(
        w,
        "\t\t<mesh name=\"{}\" mtl_id=\"{}\">",
        escape_attr(&mesh.name),
        mesh.material_id
    )?;

    writeln!(w, "\t\t\t<vertex_elements_chunk>")?;
    for element in mesh
        .vertex_format
        .iter()
        .filter(|e| element_enabled(e.usage, attributes))
    {
        writeln!(
            w,
            "\t\t\t\t<vertex_element usage=\"{}\" usage_index=\"{}\" num_components=\"{}\"/>",
            element.usage as u8, element.usage_index, element.num_components
        )?;
    }
    writeln!(w, "\t\t\t</vertex_elements_chunk>")?;

    writeln!(w, "\t\t\t<vertices_chunk>")?;
    for v in &mesh.vertices {
        writeln!(
            w,
            "\t\t\t\t<vertex x=\"{}\" y=\"{}\" z=\"{}\">",
            v.position.x, v.position.y, v.position.z
        )?;
        if attributes.normal {
            write_vec3(w, "\t\t\t\t\t", "normal", v.normal)?;
        }
        if attributes.tangent {
            write_vec3(w, "\t\t\t\t\t", "tangent", v.tangent)?;
        }
        if attributes.binormal {
            write_vec3(w, "\t\t\t\t\t", "binormal", v.binormal)?;
        }
        if attributes.tex_coord {
            for uv in &v.tex_coords {
                writeln!(w, "\t\t\t\t\t<tex_coord u=\"{}\" v=\"{}\"/>", uv.x, uv.y)?;
            }
        }
        if let Some(skeleton) = skeleton {
            for bone in &v.weights {
                let id = skeleton
                    .id(&bone.joint)
                    .with_context(|| format!("Weight references unknown joint '{}'", bone.joint))?;
                writeln!(
                    w,
                    "\t\t\t\t\t<weight bone_index=\"{}\" weight=\"{}\"/>",
                    id, bone.weight
                )?;
            }
        }
        writeln!(w, "\t\t\t\t</vertex>")?;
    }
    writeln!(w, "\t\t\t</vertices_chunk>")?;

    writeln!(w, "\t\t\t<triangles_chunk>")?;
    for [a, b, c] in &mesh.triangles {
        writeln!(w, "\t\t\t\t<triangle a=\"{}\" b=\"{}\" c=\"{}\"/>", a, b, c)?;
    }
    writeln!(w, "\t\t\t</triangles_chunk>")?;

    writeln!(w, "\t\t</mesh>")?;
    Ok(())
}

/// Write a complete MeshML document
pub fn write_meshml<W: Write>(
    w: &mut W,
    model: &ExportedModel,
    attributes: &VertexAttributes,
) -> Result<()> {
    writeln!(w, "<?xml version=\"1.0\"?>")?;
    writeln!(w)?;
    writeln!(w, "<model version=\"{}\">", MESHML_VERSION)?;

    if let Some(skeleton) = &model.skeleton {
        write_bones(w, skeleton)?;
    }

    write_materials(w, model)?;

    writeln!(w, "\t<meshes_chunk>")?;
    for mesh in &model.meshes {
        write_mesh(w, mesh, model.skeleton.as_ref(), attributes)?;
    }
    writeln!(w, "\t</meshes_chunk>")?;

    if let Some(key_frames) = &model.key_frames {
        writeln!(
            w,
            "\t<key_frames_chunk start_frame=\"{}\" end_frame=\"{}\" frame_rate=\"{}\">",
            key_frames.start_frame, key_frames.end_frame, key_frames.frame_rate
        )?;
        for track in &key_frames.tracks {
            writeln!(w, "\t\t<key_frame joint=\"{}\">", escape_attr(&track.joint))?;
            for (position, rotation) in track.positions.iter().zip(&track.rotations) {
                writeln!(w, "\t\t\t<key>")?;
                write_vec3(w, "\t\t\t\t", "pos", *position)?;
                write_quat(w, "\t\t\t\t", "quat", *rotation)?;
                writeln!(w, "\t\t\t</key>")?;
            }
            writeln!(w, "\t\t</key_frame>")?;
        }
        writeln!(w, "\t</key_frames_chunk>")?;
    }

    writeln!(w, "</model>")?;
    Ok(())
}

/// Write MeshML to `path`, replacing any existing file only once complete
pub fn write_meshml_file(
    path: &Path,
    model: &ExportedModel,
    attributes: &VertexAttributes,
) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {:?}", dir))?;

    {
        let mut w = BufWriter::new(file.as_file_mut());
        write_meshml(&mut w, model, attributes)?;
        w.flush()
            .with_context(|| format!("Failed to write MeshML: {:?}", path))?;
    }

    file.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to write MeshML: {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{KeyFrameTrack, KeyFrames};
    use crate::material::Material;
    use crate::partition::{vertex_format, OutputVertex};
    use crate::skeleton::{Joint, JointGraph};
    use crate::skin::BoneWeight;
    use glam::{Mat4, Vec2};
    use smallvec::smallvec;

    fn skeleton() -> Skeleton {
        let joint = |name: &str, parent: Option<&str>| Joint {
            name: name.into(),
            parent: parent.map(str::to_string),
            node: 0,
            bind_position: Vec3::new(0.0, 1.0, 0.0),
            bind_rotation: Quat::IDENTITY,
            mesh_bind_correction: Mat4::IDENTITY,
            fake: false,
        };
        JointGraph::from_joints("root", vec![joint("root", None), joint("arm", Some("root"))])
            .into_ordered()
            .unwrap()
    }

    fn model(skinned: bool) -> ExportedModel {
        let vertex = |x: f32| OutputVertex {
            position: Vec3::new(x, 0.0, 0.0),
            normal: Vec3::Y,
            tangent: Vec3::X,
            binormal: Vec3::Z,
            tex_coords: smallvec![Vec2::new(x, 1.0)],
            weights: if skinned {
                smallvec![BoneWeight::new("arm", 1.0)]
            } else {
                smallvec![]
            },
        };
        ExportedModel {
            skeleton: skinned.then(skeleton),
            materials: vec![Material {
                texture_slots: vec![("Diffuse Color".into(), "a&b.dds".into())],
                ..Default::default()
            }],
            meshes: vec![MeshPartition {
                name: "box".into(),
                material_id: 0,
                vertex_format: vertex_format(1, if skinned { 4 } else { 0 }),
                vertices: vec![vertex(0.0), vertex(1.0), vertex(2.0)],
                triangles: vec![[2, 1, 0]],
            }],
            key_frames: skinned.then(|| KeyFrames {
                start_frame: 0,
                end_frame: 2,
                frame_rate: 30,
                tracks: vec![KeyFrameTrack {
                    joint: "root".into(),
                    positions: vec![Vec3::ZERO, Vec3::ONE],
                    rotations: vec![Quat::IDENTITY, Quat::IDENTITY],
                }],
            }),
        }
    }

    fn render(model: &ExportedModel, attributes: &VertexAttributes) -> String {
        let mut out = Vec::new();
        write_meshml(&mut out, model, attributes).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_escape_attr() {
        assert_eq!(escape_attr("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }

    #[test]
    fn test_static_model_has_no_skeleton_chunks() {
        let xml = render(&model(false), &VertexAttributes::default());
        assert!(xml.starts_with("<?xml version=\"1.0\"?>"));
        assert!(xml.contains("<model version=\"4\">"));
        assert!(!xml.contains("<bones_chunk>"));
        assert!(!xml.contains("<key_frames_chunk"));
        assert!(!xml.contains("<weight "));
        assert!(xml.contains("<triangle a=\"2\" b=\"1\" c=\"0\"/>"));
        assert!(xml.contains("name=\"a&amp;b.dds\""));
        assert!(xml.trim_end().ends_with("</model>"));
    }

    #[test]
    fn test_skinned_model_writes_joint_ids() {
        let xml = render(&model(true), &VertexAttributes::default());
        assert!(xml.contains("<bone name=\"root\" parent=\"-1\">"));
        assert!(xml.contains("<bone name=\"arm\" parent=\"0\">"));
        assert!(xml.contains("<weight bone_index=\"1\" weight=\"1\"/>"));
        assert!(xml.contains(
            "<key_frames_chunk start_frame=\"0\" end_frame=\"2\" frame_rate=\"30\">"
        ));
        assert_eq!(xml.matches("<key>").count(), 2);
        assert!(xml.contains("<vertex_element usage=\"4\" usage_index=\"0\" num_components=\"4\"/>"));
    }

    #[test]
    fn test_disabled_attributes_are_omitted() {
        let attributes = VertexAttributes {
            tangent: false,
            binormal: false,
            ..Default::default()
        };
        let xml = render(&model(false), &attributes);
        assert!(!xml.contains("<tangent "));
        assert!(!xml.contains("<binormal "));
        assert!(!xml.contains("usage=\"7\""));
        assert!(!xml.contains("usage=\"8\""));
        assert!(xml.contains("<normal "));
        assert!(xml.contains("<tex_coord u=\"1\" v=\"1\"/>"));
    }

    #[test]
    fn test_file_write_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.meshml");
        std::fs::write(&path, "stale").unwrap();

        write_meshml_file(&path, &model(false), &VertexAttributes::default()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<meshes_chunk>"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
