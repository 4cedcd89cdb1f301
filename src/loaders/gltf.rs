use anyhow::{bail, Context, Result};
use glam::{Mat3, Mat4, Vec3};
use log::{debug, info, warn};
use std::path::Path;

use crate::mesh::{face_normal, Material, RenderableMesh, Vertex};

/// Loads a glTF file and flattens every mesh primitive into one
/// non-indexed triangle list with a single diffuse colour.
///
/// Node transforms are baked into positions and normals. Primitives without
/// normals get flat face normals. The colour is the base colour factor of the
/// first material encountered.
pub fn load_gltf_mesh(path: impl AsRef<Path>) -> Result<RenderableMesh> {
    let path = path.as_ref();
    info!("Loading glTF model: {:?}", path);

    let (gltf, buffers, _images) =
        gltf::import(path).context(format!("Failed to load glTF file: {:?}", path))?;

    debug!(
        "glTF contents: {} scenes, {} nodes, {} meshes",
        gltf.scenes().count(),
        gltf.nodes().count(),
        gltf.meshes().count()
    );

    let mut collected = Collected::default();

    for scene in gltf.scenes() {
        for node in scene.nodes() {
            process_node(&node, &buffers, &Mat4::IDENTITY, &mut collected)?;
        }
    }

    if collected.vertices.is_empty() {
        bail!("No triangle geometry found in {:?}", path);
    }

    let material = collected.material.unwrap_or_default();
    info!(
        "Model loaded: {} vertices, diffuse {:?}",
        collected.vertices.len(),
        material.diffuse
    );

    RenderableMesh::new(collected.vertices, material).map_err(anyhow::Error::from)
}

#[derive(Default)]
struct Collected {
    vertices: Vec<Vertex>,
    material: Option<Material>,
}

/// Recursively processes glTF nodes
fn process_node(
    node: &gltf::Node,
    buffers: &[gltf::buffer::Data],
    parent_transform: &Mat4,
    out: &mut Collected,
) -> Result<()> {
    let local_transform = Mat4::from_cols_array_2d(&node.transform().matrix());
    let global_transform = *parent_transform * local_transform;

    if let Some(mesh) = node.mesh() {
        process_mesh(&mesh, buffers, &global_transform, out)?;
    }

    for child in node.children() {
        process_node(&child, buffers, &global_transform, out)?;
    }

    Ok(())
}

/// Processes a glTF mesh
fn process_mesh(
    mesh: &gltf::Mesh,
    buffers: &[gltf::buffer::Data],
    transform: &Mat4,
    out: &mut Collected,
) -> Result<()> {
    debug!("  Processing mesh: {:?}", mesh.name());
    let normal_matrix = Mat3::from_mat4(*transform).inverse().transpose();

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            warn!("Skipping non-triangle primitive ({:?})", primitive.mode());
            continue;
        }

        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

        let positions: Vec<Vec3> = reader
            .read_positions()
            .context("Mesh primitive has no positions")?
            .map(|p| transform.transform_point3(Vec3::from_array(p)))
            .collect();

        if positions.is_empty() {
            continue;
        }

        let normals: Option<Vec<Vec3>> = reader.read_normals().map(|iter| {
            iter.map(|n| (normal_matrix * Vec3::from_array(n)).normalize_or_zero())
                .collect()
        });

        if out.material.is_none() {
            let base = primitive.material().pbr_metallic_roughness().base_color_factor();
            out.material = Some(Material {
                diffuse: [base[0], base[1], base[2]],
            });
        }

        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };

        for triangle in indices.chunks_exact(3) {
            let corners = [
                triangle[0] as usize,
                triangle[1] as usize,
                triangle[2] as usize,
            ];
            if corners.iter().any(|&i| i >= positions.len()) {
                bail!("Index out of range in mesh {:?}", mesh.name());
            }

            let flat = face_normal(
                positions[corners[0]],
                positions[corners[1]],
                positions[corners[2]],
            );

            for &i in &corners {
                let normal = normals
                    .as_ref()
                    .and_then(|n| n.get(i).copied())
                    .unwrap_or(flat);
                out.vertices
                    .push(Vertex::new(positions[i].to_array(), normal.to_array()));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_error() {
        let result = load_gltf_mesh("definitely/not/here.gltf");
        assert!(result.is_err());
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("Failed to load glTF file"));
    }

    #[test]
    fn loads_triangle_with_external_buffer() {
        // One triangle, positions only, stored next to the document
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let doc = r#"{
  "asset": {"version": "2.0"},
  "scene": 0,
  "scenes": [{"nodes": [0]}],
  "nodes": [{"mesh": 0}],
  "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "material": 0}]}],
  "materials": [{"pbrMetallicRoughness": {"baseColorFactor": [0.2, 0.6, 1.0, 1.0]}}],
  "accessors": [{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                 "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]}],
  "bufferViews": [{"buffer": 0, "byteLength": 36}],
  "buffers": [{"byteLength": 36, "uri": "triangle.bin"}]
}"#;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("triangle.bin"), bytemuck::cast_slice(&positions)).unwrap();
        let path = dir.path().join("triangle.gltf");
        std::fs::write(&path, doc).unwrap();

        let mesh = load_gltf_mesh(&path).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.material().diffuse, [0.2, 0.6, 1.0]);
        // No normals in the file: flat normal of a CCW triangle in the XY plane
        assert_eq!(mesh.vertices()[0].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn missing_buffer_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.gltf");
        std::fs::write(
            &path,
            r#"{"asset": {"version": "2.0"}, "buffers": [{"byteLength": 36, "uri": "gone.bin"}]}"#,
        )
        .unwrap();
        assert!(load_gltf_mesh(&path).is_err());
    }
}
