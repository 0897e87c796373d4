//! # Chunk Upload
//!
//! Moves a chunk's mesh into device-local memory:
//!
//! 1. allocate a host-visible staging buffer large enough for vertices and indices;
//! 2. write the vertex bytes, then the index bytes directly after them;
//! 3. allocate a device-local buffer of the same size;
//! 4. record and submit a copy on the caller's command pool and wait for it;
//! 5. destroy the staging buffer.
//!
//! The chunk only learns about the new buffer once every step has succeeded. Any failure
//! releases whatever the attempt allocated and leaves the chunk's previous buffer (if any)
//! in place, so a chunk never refers to a buffer that is not fully written.

use super::{Chunk, ChunkStage};
use crate::engine_state::error::{TerrainError, TerrainResult};
use crate::engine_state::gpu::{BufferHandle, BufferUsage, GraphicsBackend, MemoryKind};

/// A chunk's geometry in device memory: vertices at offset 0, indices at `index_offset`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChunkBuffer {
    /// Device-local buffer holding vertices followed by indices.
    pub handle: BufferHandle,
    /// Number of vertices.
    pub vertex_count: u32,
    /// Number of `u32` indices.
    pub index_count: u32,
    /// Byte offset at which the index data starts.
    pub index_offset: u64,
}

impl Chunk {
    /// Uploads the pending mesh and advances the chunk to [`ChunkStage::Uploaded`].
    ///
    /// An empty mesh needs no buffer: the chunk is marked uploaded with nothing to draw.
    /// A buffer from an earlier upload is destroyed only once its replacement is valid.
    ///
    /// # Arguments
    ///
    /// * `backend` - Graphics backend that owns the buffers
    /// * `pool` - Command pool the copy is recorded into; the caller holds its slot
    ///
    /// # Returns
    ///
    /// `Ok(())` on success. On failure the chunk stays [`ChunkStage::Meshed`] with its
    /// mesh intact and [`upload_attempts`](Chunk::upload_attempts) incremented.
    pub fn upload_to_device<B: GraphicsBackend>(
        &mut self,
        backend: &B,
        pool: &mut B::CommandPool,
    ) -> TerrainResult<()> {
        let Some(mesh) = self.mesh.as_ref() else {
            return Err(TerrainError::BufferAccess(format!(
                "chunk ({}, {}) has no mesh to upload",
                self.min_x, self.min_z
            )));
        };

        let uploaded = if mesh.is_empty() {
            None
        } else {
            let label = format!("Chunk ({}, {})", self.min_x, self.min_z);
            match transfer(backend, pool, &label, mesh.vertex_bytes(), mesh.index_bytes()) {
                Ok(handle) => Some(ChunkBuffer {
                    handle,
                    vertex_count: mesh.vertices.len() as u32,
                    index_count: mesh.indices.len() as u32,
                    index_offset: mesh.vertex_bytes().len() as u64,
                }),
                Err(err) => {
                    self.upload_attempts += 1;
                    return Err(err);
                }
            }
        };

        if let Some(previous) = std::mem::replace(&mut self.buffer, uploaded) {
            backend.destroy_buffer(previous.handle);
        }
        self.mesh = None;
        self.stage = ChunkStage::Uploaded;
        self.upload_attempts = 0;
        Ok(())
    }
}

/// Stages `vertices ++ indices` and copies them into a new device-local buffer.
fn transfer<B: GraphicsBackend>(
    backend: &B,
    pool: &mut B::CommandPool,
    label: &str,
    vertices: &[u8],
    indices: &[u8],
) -> TerrainResult<BufferHandle> {
    let size = (vertices.len() + indices.len()) as u64;

    let staging = backend.create_buffer(
        &format!("{label} Staging"),
        size,
        BufferUsage::TransferSource,
        MemoryKind::HostVisibleCoherent,
    )?;

    let result = copy_through(backend, pool, label, staging, vertices, indices, size);
    backend.destroy_buffer(staging);
    result
}

fn copy_through<B: GraphicsBackend>(
    backend: &B,
    pool: &mut B::CommandPool,
    label: &str,
    staging: BufferHandle,
    vertices: &[u8],
    indices: &[u8],
    size: u64,
) -> TerrainResult<BufferHandle> {
    backend.write_mapped(staging, 0, vertices)?;
    backend.write_mapped(staging, vertices.len() as u64, indices)?;
    backend.unmap(staging)?;

    let device = backend.create_buffer(label, size, BufferUsage::Geometry, MemoryKind::DeviceLocal)?;
    if let Err(err) = backend.copy_buffer(pool, staging, device, size) {
        backend.destroy_buffer(device);
        return Err(err);
    }
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::gpu::HeadlessBackend;
    use crate::engine_state::voxels::block::BlockType;

    fn meshed_chunk() -> Chunk {
        let mut chunk = Chunk::new(16, 0).unwrap();
        chunk.set_block(0, 0, 0, BlockType::STONE).unwrap();
        chunk.regenerate_mesh();
        chunk
    }

    #[test]
    fn upload_leaves_only_the_device_buffer() {
        let backend = HeadlessBackend::new();
        let mut pool = backend.create_command_pool("test").unwrap();
        let mut chunk = meshed_chunk();
        let expected = chunk.mesh().unwrap().clone();

        chunk.upload_to_device(&backend, &mut pool).unwrap();

        let buffer = *chunk.buffer().unwrap();
        assert_eq!(chunk.stage(), ChunkStage::Uploaded);
        assert_eq!(backend.live_buffers(), 1);
        assert_eq!(backend.memory_kind(buffer.handle), Some(MemoryKind::DeviceLocal));
        assert_eq!((buffer.vertex_count, buffer.index_count), (24, 36));

        let bytes = backend.read_buffer(buffer.handle).unwrap();
        let (vertex_part, index_part) = bytes.split_at(buffer.index_offset as usize);
        assert_eq!(vertex_part, expected.vertex_bytes());
        assert_eq!(index_part, expected.index_bytes());
    }

    #[test]
    fn empty_mesh_uploads_nothing() {
        let backend = HeadlessBackend::new();
        let mut pool = backend.create_command_pool("test").unwrap();
        let mut chunk = Chunk::new(0, 0).unwrap();
        chunk.regenerate_mesh();

        chunk.upload_to_device(&backend, &mut pool).unwrap();
        assert_eq!(chunk.stage(), ChunkStage::Uploaded);
        assert!(chunk.buffer().is_none());
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn reupload_replaces_and_frees_the_previous_buffer() {
        let backend = HeadlessBackend::new();
        let mut pool = backend.create_command_pool("test").unwrap();
        let mut chunk = meshed_chunk();
        chunk.upload_to_device(&backend, &mut pool).unwrap();
        let first = chunk.buffer().unwrap().handle;

        chunk.set_block(1, 0, 0, BlockType::STONE).unwrap();
        assert!(chunk.mark_modified());
        assert_eq!(chunk.buffer().map(|b| b.handle), Some(first));
        chunk.regenerate_mesh();
        chunk.upload_to_device(&backend, &mut pool).unwrap();

        let second = chunk.buffer().unwrap();
        assert_ne!(second.handle, first);
        assert_eq!(second.index_count, 60);
        assert!(backend.read_buffer(first).is_none());
        assert_eq!(backend.live_buffers(), 1);
    }

    #[test]
    fn uploading_without_a_mesh_fails() {
        let backend = HeadlessBackend::new();
        let mut pool = backend.create_command_pool("test").unwrap();
        let mut chunk = Chunk::new(0, 0).unwrap();
        assert!(chunk.upload_to_device(&backend, &mut pool).is_err());
        assert_eq!(chunk.stage(), ChunkStage::BlockData);
    }
}
