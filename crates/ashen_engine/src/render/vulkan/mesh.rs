//! Vertex formats and GPU mesh storage
//!
//! [`MeshData`] is the CPU-side staging form with validation; [`Mesh`] holds
//! the device-local vertex and optional index buffers.

use std::sync::Arc;

use ash::vk;
use bytemuck::{Pod, Zeroable};

use crate::render::vulkan::{Buffer, Device, VulkanResult};

/// Interleaved vertex: position, normal, texture coordinates
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    /// Per-vertex input binding at slot 0
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Attribute locations 0..=2: position, normal, uv
    pub fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::size_of::<[f32; 3]>() as u32,
            },
            vk::VertexInputAttributeDescription {
                location: 2,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: std::mem::size_of::<[f32; 6]>() as u32,
            },
        ]
    }
}

/// CPU-side mesh geometry
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl MeshData {
    /// Build validated mesh data
    ///
    /// Returns `None` for degenerate geometry: fewer than 3 vertices, or a
    /// nonempty index list with fewer than 3 indices, or an index out of
    /// range.
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Option<Self> {
        if vertices.len() < 3 {
            return None;
        }
        if !indices.is_empty() {
            if indices.len() < 3 {
                return None;
            }
            let limit = vertices.len() as u32;
            if indices.iter().any(|&i| i >= limit) {
                return None;
            }
        }
        Some(Self { vertices, indices })
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Load the first model from a Wavefront OBJ file
    #[cfg(feature = "obj")]
    pub fn from_obj(path: &std::path::Path) -> Option<Self> {
        let (models, _) = match tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS) {
            Ok(loaded) => loaded,
            Err(e) => {
                log::warn!("failed to load OBJ {path:?}: {e}");
                return None;
            }
        };
        let mesh = &models.first()?.mesh;
        let vertex_count = mesh.positions.len() / 3;
        let mut vertices = Vec::with_capacity(vertex_count);
        for i in 0..vertex_count {
            let position = [
                mesh.positions[i * 3],
                mesh.positions[i * 3 + 1],
                mesh.positions[i * 3 + 2],
            ];
            let normal = if mesh.normals.len() >= (i + 1) * 3 {
                [
                    mesh.normals[i * 3],
                    mesh.normals[i * 3 + 1],
                    mesh.normals[i * 3 + 2],
                ]
            } else {
                [0.0, 1.0, 0.0]
            };
            let uv = if mesh.texcoords.len() >= (i + 1) * 2 {
                [mesh.texcoords[i * 2], 1.0 - mesh.texcoords[i * 2 + 1]]
            } else {
                [0.0, 0.0]
            };
            vertices.push(Vertex {
                position,
                normal,
                uv,
            });
        }
        Self::new(vertices, mesh.indices.clone())
    }
}

/// Device-local mesh ready for drawing
pub struct Mesh {
    vertex_buffer: Buffer,
    index_buffer: Option<Buffer>,
    vertex_count: u32,
    index_count: u32,
}

impl Mesh {
    /// Upload mesh data to device-local buffers
    pub fn new(device: Arc<Device>, data: &MeshData) -> VulkanResult<Self> {
        let vertex_buffer = Buffer::device_local_with_data(
            device.clone(),
            vk::BufferUsageFlags::VERTEX_BUFFER,
            bytemuck::cast_slice(data.vertices()),
        )?;
        let index_buffer = if data.indices().is_empty() {
            None
        } else {
            Some(Buffer::device_local_with_data(
                device,
                vk::BufferUsageFlags::INDEX_BUFFER,
                bytemuck::cast_slice(data.indices()),
            )?)
        };
        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_count: data.vertices().len() as u32,
            index_count: data.indices().len() as u32,
        })
    }

    /// Bind vertex (and index) buffers
    pub fn bind(&self, device: &Device, command_buffer: vk::CommandBuffer) {
        unsafe {
            device.handle().cmd_bind_vertex_buffers(
                command_buffer,
                0,
                &[self.vertex_buffer.handle()],
                &[0],
            );
            if let Some(index_buffer) = &self.index_buffer {
                device.handle().cmd_bind_index_buffer(
                    command_buffer,
                    index_buffer.handle(),
                    0,
                    vk::IndexType::UINT32,
                );
            }
        }
    }

    /// Draw `instance_count` instances starting at `first_instance`
    pub fn draw_instanced(
        &self,
        device: &Device,
        command_buffer: vk::CommandBuffer,
        instance_count: u32,
        first_instance: u32,
    ) {
        unsafe {
            if self.index_buffer.is_some() {
                device.handle().cmd_draw_indexed(
                    command_buffer,
                    self.index_count,
                    instance_count,
                    0,
                    0,
                    first_instance,
                );
            } else {
                device.handle().cmd_draw(
                    command_buffer,
                    self.vertex_count,
                    instance_count,
                    0,
                    first_instance,
                );
            }
        }
    }

    /// Draw a single instance
    pub fn draw(&self, device: &Device, command_buffer: vk::CommandBuffer) {
        self.draw_instanced(device, command_buffer, 1, 0);
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(position: [f32; 3]) -> Vertex {
        Vertex {
            position,
            normal: [0.0, 1.0, 0.0],
            uv: [0.0, 0.0],
        }
    }

    #[test]
    fn mesh_data_requires_three_vertices() {
        let two = vec![vertex([0.0, 0.0, 0.0]), vertex([1.0, 0.0, 0.0])];
        assert!(MeshData::new(two, Vec::new()).is_none());

        let three = vec![
            vertex([0.0, 0.0, 0.0]),
            vertex([1.0, 0.0, 0.0]),
            vertex([0.0, 1.0, 0.0]),
        ];
        assert!(MeshData::new(three, Vec::new()).is_some());
    }

    #[test]
    fn mesh_data_rejects_short_index_list() {
        let vertices = vec![
            vertex([0.0, 0.0, 0.0]),
            vertex([1.0, 0.0, 0.0]),
            vertex([0.0, 1.0, 0.0]),
        ];
        assert!(MeshData::new(vertices.clone(), vec![0, 1]).is_none());
        assert!(MeshData::new(vertices, vec![0, 1, 2]).is_some());
    }

    #[test]
    fn mesh_data_rejects_out_of_range_index() {
        let vertices = vec![
            vertex([0.0, 0.0, 0.0]),
            vertex([1.0, 0.0, 0.0]),
            vertex([0.0, 1.0, 0.0]),
        ];
        assert!(MeshData::new(vertices, vec![0, 1, 3]).is_none());
    }

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
        let attributes = Vertex::attribute_descriptions();
        assert_eq!(attributes[1].offset, 12);
        assert_eq!(attributes[2].offset, 24);
    }
}
