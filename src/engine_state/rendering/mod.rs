//! Rendering interface of the terrain.
//!
//! The terrain does not own a pipeline, a surface or a frame loop. Each frame the
//! external renderer passes a [`DrawSubmitter`] into the terrain's draw entry points and
//! receives one [`ChunkDraw`] per chunk that has geometry in device memory. The submitter
//! is expected to have bound a pipeline built with [`Vertex::desc`].

use crate::engine_state::gpu::{BufferHandle, WgpuBackend};
use crate::engine_state::voxels::spatial_key::SpatialKey;

pub(crate) mod tasks;
pub mod vertex;

// Re-export commonly used types
pub use vertex::Vertex;

/// Everything needed to record the draw of one chunk.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChunkDraw {
    /// The chunk being drawn
    pub key: SpatialKey,
    /// Buffer holding the vertices at offset 0 and the indices at `index_offset`
    pub buffer: BufferHandle,
    /// Byte offset of the `u32` index data
    pub index_offset: u64,
    /// Number of indices to draw
    pub index_count: u32,
}

/// Receives the draws of ready chunks.
pub trait DrawSubmitter {
    /// Records the draw of one chunk.
    fn submit(&mut self, draw: ChunkDraw);
}

/// Collects draws into a list; useful for batching and inspection.
impl DrawSubmitter for Vec<ChunkDraw> {
    fn submit(&mut self, draw: ChunkDraw) {
        self.push(draw);
    }
}

/// Records chunk draws into a `wgpu` render pass.
pub struct WgpuChunkDrawer<'a, 'pass> {
    backend: &'a WgpuBackend,
    render_pass: &'a mut wgpu::RenderPass<'pass>,
    /// Draws skipped because their buffer was released in the meantime
    pub skipped: usize,
}

impl<'a, 'pass> WgpuChunkDrawer<'a, 'pass> {
    /// Creates a drawer recording into `render_pass`.
    pub fn new(backend: &'a WgpuBackend, render_pass: &'a mut wgpu::RenderPass<'pass>) -> Self {
        Self {
            backend,
            render_pass,
            skipped: 0,
        }
    }
}

impl DrawSubmitter for WgpuChunkDrawer<'_, '_> {
    fn submit(&mut self, draw: ChunkDraw) {
        let Some(buffer) = self.backend.buffer(draw.buffer) else {
            self.skipped += 1;
            return;
        };

        self.render_pass
            .set_vertex_buffer(0, buffer.slice(..draw.index_offset));
        self.render_pass.set_index_buffer(
            buffer.slice(draw.index_offset..),
            wgpu::IndexFormat::Uint32,
        );
        self.render_pass.draw_indexed(0..draw.index_count, 0, 0..1);
    }
}
