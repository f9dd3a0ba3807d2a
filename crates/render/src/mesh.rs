//! Built-in mesh geometry.
//!
//! Faces wind clockwise seen from outside, which is the front face in the
//! left-handed convention the pipeline uses.

use crate::program::{Semantic, VertexElement, VertexFormat};
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use shadowcast_scene::Primitive;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const STRIDE: u32 = std::mem::size_of::<Vertex>() as u32;

    pub fn layout() -> Vec<VertexElement> {
        vec![
            VertexElement {
                semantic: Semantic::Position,
                format: VertexFormat::Float32x3,
                offset: 0,
            },
            VertexElement {
                semantic: Semantic::Normal,
                format: VertexFormat::Float32x3,
                offset: 12,
            },
            VertexElement {
                semantic: Semantic::TexCoord,
                format: VertexFormat::Float32x2,
                offset: 24,
            },
        ]
    }
}

/// CPU-side geometry handed to the device.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub label: &'static str,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn for_primitive(primitive: Primitive) -> Self {
        match primitive {
            Primitive::Cube => Self::cube(),
            Primitive::Plane => Self::plane(),
        }
    }

    /// Unit cube centred on the origin, 24 vertices so each face has its
    /// own normals and UVs.
    pub fn cube() -> Self {
        let faces = [
            (Vec3::Z, Vec3::Y),
            (Vec3::NEG_Z, Vec3::Y),
            (Vec3::X, Vec3::Y),
            (Vec3::NEG_X, Vec3::Y),
            (Vec3::Y, Vec3::Z),
            (Vec3::NEG_Y, Vec3::Z),
        ];
        let mut mesh = Self {
            label: "cube",
            vertices: Vec::with_capacity(24),
            indices: Vec::with_capacity(36),
        };
        for (normal, up) in faces {
            mesh.push_face(normal, up, normal * 0.5);
        }
        mesh
    }

    /// Unit quad in the XZ plane facing +Y.
    pub fn plane() -> Self {
        let mut mesh = Self {
            label: "plane",
            vertices: Vec::with_capacity(4),
            indices: Vec::with_capacity(6),
        };
        mesh.push_face(Vec3::Y, Vec3::Z, Vec3::ZERO);
        mesh
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    fn push_face(&mut self, normal: Vec3, up: Vec3, center: Vec3) {
        let side = normal.cross(up);
        let base = self.vertices.len() as u32;
        let corners = [
            (-side - up, [0.0, 1.0]),
            (-side + up, [0.0, 0.0]),
            (side + up, [1.0, 0.0]),
            (side - up, [1.0, 1.0]),
        ];
        for (offset, uv) in corners {
            self.vertices.push(Vertex {
                position: (center + offset * 0.5).to_array(),
                normal: normal.to_array(),
                uv,
            });
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}
