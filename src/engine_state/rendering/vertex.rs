//! Vertex data structures and layouts for voxel rendering.
//!
//! This module defines the vertex format produced by the chunk mesher and the matching
//! vertex buffer layout for whoever builds the render pipeline.

/// A vertex in the voxel rendering pipeline.
///
/// # Memory Layout
/// - Position: [f32; 3] (12 bytes, world space)
/// - Normal: [f32; 3] (12 bytes)
/// - Color: [f32; 4] (16 bytes, RGBA)
///
/// Total size: 40 bytes. The size is a multiple of 8, so index data appended directly
/// after any number of vertices stays aligned for buffer mapping and copies.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Position in world space
    pub pos: [f32; 3],
    /// Outward normal of the face this vertex belongs to
    pub nor: [f32; 3],
    /// Colour of the block this vertex belongs to
    pub color: [f32; 4],
}

impl Vertex {
    /// Creates a new vertex.
    pub fn new(pos: [f32; 3], nor: [f32; 3], color: [f32; 4]) -> Self {
        Vertex { pos, nor, color }
    }

    /// Returns the vertex buffer layout description for the shader pipeline.
    ///
    /// # Shader Attributes
    /// - `location = 0`: position (vec3<f32>)
    /// - `location = 1`: normal (vec3<f32>)
    /// - `location = 2`: color (vec4<f32>)
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}
