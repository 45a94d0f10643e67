//! Vertex format, CPU-side geometry and GPU-resident meshes

use std::f32::consts::PI;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use crate::error::{Error, Result};
use crate::renderer::{
    Buffer, BufferUsage, CommandList, GraphicsDevice, IndexType,
    VertexAttribute, VertexBinding, VertexFormat, VertexInputRate, VertexLayout,
    create_buffer_with_data,
};

/// Interleaved vertex (binding 0, locations 0..3)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub color: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
}

impl Vertex {
    pub const fn new(position: Vec3, color: Vec3, normal: Vec3, tex_coord: Vec2) -> Self {
        Self { position, color, normal, tex_coord }
    }

    /// Vertex input layout matching this struct
    pub fn layout() -> VertexLayout {
        let attribute = |location, format, offset| VertexAttribute {
            location,
            binding: 0,
            format,
            offset,
        };
        VertexLayout {
            bindings: vec![VertexBinding {
                binding: 0,
                stride: std::mem::size_of::<Vertex>() as u32,
                input_rate: VertexInputRate::Vertex,
            }],
            attributes: vec![
                attribute(0, VertexFormat::R32G32B32_SFLOAT, 0),
                attribute(1, VertexFormat::R32G32B32_SFLOAT, 12),
                attribute(2, VertexFormat::R32G32B32_SFLOAT, 24),
                attribute(3, VertexFormat::R32G32_SFLOAT, 36),
            ],
        }
    }
}

// ===== CPU GEOMETRY =====

/// Indexed triangle list kept on the CPU
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Unit cube centered on the origin, one color per face
    pub fn cube() -> Self {
        // (normal, color, four corners counter-clockwise seen from outside)
        let faces: [(Vec3, Vec3, [Vec3; 4]); 6] = [
            (Vec3::Z, Vec3::new(1.0, 0.0, 0.0), [
                Vec3::new(-0.5, -0.5, 0.5), Vec3::new(0.5, -0.5, 0.5),
                Vec3::new(0.5, 0.5, 0.5), Vec3::new(-0.5, 0.5, 0.5),
            ]),
            (Vec3::NEG_Z, Vec3::new(0.0, 1.0, 0.0), [
                Vec3::new(0.5, -0.5, -0.5), Vec3::new(-0.5, -0.5, -0.5),
                Vec3::new(-0.5, 0.5, -0.5), Vec3::new(0.5, 0.5, -0.5),
            ]),
            (Vec3::Y, Vec3::new(0.0, 0.0, 1.0), [
                Vec3::new(-0.5, 0.5, 0.5), Vec3::new(0.5, 0.5, 0.5),
                Vec3::new(0.5, 0.5, -0.5), Vec3::new(-0.5, 0.5, -0.5),
            ]),
            (Vec3::NEG_Y, Vec3::new(1.0, 1.0, 0.0), [
                Vec3::new(-0.5, -0.5, -0.5), Vec3::new(0.5, -0.5, -0.5),
                Vec3::new(0.5, -0.5, 0.5), Vec3::new(-0.5, -0.5, 0.5),
            ]),
            (Vec3::X, Vec3::new(1.0, 0.0, 1.0), [
                Vec3::new(0.5, -0.5, 0.5), Vec3::new(0.5, -0.5, -0.5),
                Vec3::new(0.5, 0.5, -0.5), Vec3::new(0.5, 0.5, 0.5),
            ]),
            (Vec3::NEG_X, Vec3::new(0.0, 1.0, 1.0), [
                Vec3::new(-0.5, -0.5, -0.5), Vec3::new(-0.5, -0.5, 0.5),
                Vec3::new(-0.5, 0.5, 0.5), Vec3::new(-0.5, 0.5, -0.5),
            ]),
        ];
        let uvs = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)];

        let mut data = MeshData::default();
        for (normal, color, corners) in faces {
            let base = data.vertices.len() as u32;
            for (corner, uv) in corners.into_iter().zip(uvs) {
                data.vertices.push(Vertex::new(corner, color, normal, uv));
            }
            data.indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        data
    }

    /// Square in the XZ plane, facing +Y
    pub fn plane(size: f32) -> Self {
        let h = size * 0.5;
        let white = Vec3::ONE;
        MeshData {
            vertices: vec![
                Vertex::new(Vec3::new(-h, 0.0, -h), white, Vec3::Y, Vec2::new(0.0, 0.0)),
                Vertex::new(Vec3::new(h, 0.0, -h), white, Vec3::Y, Vec2::new(1.0, 0.0)),
                Vertex::new(Vec3::new(h, 0.0, h), white, Vec3::Y, Vec2::new(1.0, 1.0)),
                Vertex::new(Vec3::new(-h, 0.0, h), white, Vec3::Y, Vec2::new(0.0, 1.0)),
            ],
            indices: vec![0, 1, 2, 2, 3, 0],
        }
    }

    /// UV sphere with `segments` latitude bands and `segments` longitude slices
    pub fn sphere(radius: f32, segments: u32) -> Self {
        let segments = segments.max(3);
        let mut data = MeshData::default();

        for lat in 0..=segments {
            let theta = lat as f32 * PI / segments as f32;
            for lon in 0..=segments {
                let phi = lon as f32 * 2.0 * PI / segments as f32;
                let direction = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
                data.vertices.push(Vertex::new(
                    direction * radius,
                    Vec3::splat(0.8),
                    direction.normalize_or_zero(),
                    Vec2::new(lon as f32 / segments as f32, lat as f32 / segments as f32),
                ));
            }
        }

        for lat in 0..segments {
            for lon in 0..segments {
                let first = lat * (segments + 1) + lon;
                let second = first + segments + 1;
                data.indices.extend_from_slice(&[
                    first, second, first + 1,
                    second, second + 1, first + 1,
                ]);
            }
        }
        data
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

// ===== GPU MESH =====

/// Vertex + index buffer pair in device-only memory
pub struct Mesh {
    vertex_buffer: Box<dyn Buffer>,
    index_buffer: Box<dyn Buffer>,
    vertex_count: u32,
    index_count: u32,
}

impl Mesh {
    /// Upload `data` through the staged-upload protocol
    pub fn new(device: &dyn GraphicsDevice, data: &MeshData) -> Result<Self> {
        if data.vertices.is_empty() || data.indices.is_empty() {
            return Err(Error::InvalidResource("Mesh has no vertices or no indices".to_string()));
        }
        if let Some(bad) = data.indices.iter().find(|&&i| i as usize >= data.vertices.len()) {
            return Err(Error::InvalidResource(format!(
                "Index {} out of range for {} vertices",
                bad, data.vertices.len()
            )));
        }

        let vertex_buffer = create_buffer_with_data(
            device,
            bytemuck::cast_slice(&data.vertices),
            BufferUsage::VERTEX,
        )?;
        let index_buffer = create_buffer_with_data(
            device,
            bytemuck::cast_slice(&data.indices),
            BufferUsage::INDEX,
        )?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_count: data.vertices.len() as u32,
            index_count: data.indices.len() as u32,
        })
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn vertex_buffer(&self) -> &dyn Buffer {
        self.vertex_buffer.as_ref()
    }

    pub fn index_buffer(&self) -> &dyn Buffer {
        self.index_buffer.as_ref()
    }

    /// Bind both buffers and issue one indexed draw
    pub fn draw(&self, cmd: &mut dyn CommandList) -> Result<()> {
        cmd.bind_vertex_buffer(self.vertex_buffer.as_ref(), 0)?;
        cmd.bind_index_buffer(self.index_buffer.as_ref(), 0, IndexType::U32)?;
        cmd.draw_indexed(self.index_count, 0, 0)
    }
}

#[cfg(test)]
#[path = "mesh_tests.rs"]
mod tests;
