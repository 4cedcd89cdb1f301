use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{ArError, Result};

/// Floats per interleaved vertex: position xyz, normal xyz
pub const FLOATS_PER_VERTEX: usize = 6;

/// Vertex layout shared with the object shader
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    pub const fn new(position: [f32; 3], normal: [f32; 3]) -> Self {
        Self { position, normal }
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Single flat diffuse colour
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub diffuse: [f32; 3],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            diffuse: [0.8, 0.8, 0.8],
        }
    }
}

/// Non-indexed triangle list with one material; immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct RenderableMesh {
    vertices: Vec<Vertex>,
    material: Material,
}

impl RenderableMesh {
    pub fn new(vertices: Vec<Vertex>, material: Material) -> Result<Self> {
        if vertices.is_empty() {
            return Err(ArError::AssetLoad("mesh has no vertices".into()));
        }
        if vertices.len() % 3 != 0 {
            return Err(ArError::AssetLoad(format!(
                "vertex count {} is not a whole number of triangles",
                vertices.len()
            )));
        }
        Ok(Self { vertices, material })
    }

    /// Builds from interleaved `[px, py, pz, nx, ny, nz, ...]` floats
    pub fn from_interleaved(data: &[f32], material: Material) -> Result<Self> {
        if data.len() % FLOATS_PER_VERTEX != 0 {
            return Err(ArError::AssetLoad(format!(
                "{} floats is not a multiple of {}",
                data.len(),
                FLOATS_PER_VERTEX
            )));
        }
        let vertices = data
            .chunks_exact(FLOATS_PER_VERTEX)
            .map(|v| Vertex::new([v[0], v[1], v[2]], [v[3], v[4], v[5]]))
            .collect();
        Self::new(vertices, material)
    }

    /// Unit cube centred on the origin, flat-shaded, 36 vertices
    pub fn unit_cube(material: Material) -> Self {
        const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            // normal, u, v (u × v = normal)
            ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
        ];

        let mut vertices = Vec::with_capacity(36);
        for (n, u, v) in FACES {
            let (n, u, v) = (Vec3::from(n), Vec3::from(u), Vec3::from(v));
            let centre = n * 0.5;
            let corner = |su: f32, sv: f32| (centre + u * (0.5 * su) + v * (0.5 * sv)).to_array();
            let quad = [
                corner(-1.0, -1.0),
                corner(1.0, -1.0),
                corner(1.0, 1.0),
                corner(1.0, 1.0),
                corner(-1.0, 1.0),
                corner(-1.0, -1.0),
            ];
            vertices.extend(quad.into_iter().map(|p| Vertex::new(p, n.to_array())));
        }

        Self { vertices, material }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn material(&self) -> Material {
        self.material
    }
}

/// Normal of a counter-clockwise triangle, zero for degenerate ones
pub fn face_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a).normalize_or_zero()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleaved_length_must_divide_by_six() {
        let err = RenderableMesh::from_interleaved(&[0.0; 17], Material::default()).unwrap_err();
        assert!(matches!(err, ArError::AssetLoad(_)));
    }

    #[test]
    fn interleaved_splits_position_and_normal() {
        let data = [
            0.0, 0.0, 0.0, 0.0, 0.0, 1.0, //
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, //
            0.0, 1.0, 0.0, 0.0, 0.0, 1.0,
        ];
        let mesh = RenderableMesh::from_interleaved(&data, Material::default()).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.vertices()[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices()[2].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn empty_mesh_is_rejected() {
        assert!(RenderableMesh::from_interleaved(&[], Material::default()).is_err());
    }

    #[test]
    fn cube_has_36_unit_normal_vertices() {
        let cube = RenderableMesh::unit_cube(Material::default());
        assert_eq!(cube.vertex_count(), 36);
        for v in cube.vertices() {
            assert!((Vec3::from(v.normal).length() - 1.0).abs() < 1e-6);
            assert!(v.position.iter().all(|c| c.abs() <= 0.5 + 1e-6));
        }
    }

    #[test]
    fn cube_winding_matches_normals() {
        let cube = RenderableMesh::unit_cube(Material::default());
        for tri in cube.vertices().chunks_exact(3) {
            let n = face_normal(
                Vec3::from(tri[0].position),
                Vec3::from(tri[1].position),
                Vec3::from(tri[2].position),
            );
            assert!(n.abs_diff_eq(Vec3::from(tri[0].normal), 1e-6));
        }
    }

    #[test]
    fn vertex_is_24_bytes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
    }
}
