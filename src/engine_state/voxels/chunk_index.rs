//! # Chunk Index
//!
//! The terrain's map from [`SpatialKey`] to chunk. Chunks are shared as
//! [`MtResource<Chunk>`] so a worker can hold one chunk's lock without holding the index.
//!
//! ## Lock Order
//!
//! Index before chunk. Instantiation takes the index write lock and then the locks of the
//! neighbours it links; nothing takes the index lock while holding a chunk lock.

use super::block::BlockSide;
use super::chunk::Chunk;
use super::spatial_key::{chunk_key_at, SpatialKey};
use crate::core::{ConcurrentMap, MtResource};
use crate::engine_state::error::{TerrainError, TerrainResult};

/// Concurrent map of every chunk in the terrain.
#[derive(Default)]
pub struct ChunkIndex {
    chunks: ConcurrentMap<SpatialKey, MtResource<Chunk>>,
}

impl ChunkIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty chunk at `(min_x, min_z)` and links it with every lateral neighbour
    /// already present. Creation, insertion and linking happen under one write lock, so a
    /// concurrently created neighbour sees either none or all of it.
    ///
    /// # Returns
    ///
    /// The new chunk, [`TerrainError::MisalignedOrigin`] for a non-chunk-aligned origin, or
    /// [`TerrainError::ChunkAlreadyExists`] if the origin is taken.
    pub fn instantiate_chunk_at(&self, min_x: i32, min_z: i32) -> TerrainResult<MtResource<Chunk>> {
        let mut chunk = Chunk::new(min_x, min_z)?;
        let key = chunk.key();

        let mut chunks = self.chunks.write();
        if chunks.contains_key(&key) {
            return Err(TerrainError::ChunkAlreadyExists { x: min_x, z: min_z });
        }

        for side in BlockSide::lateral() {
            let offset = side.offset();
            let Some(neighbor_key) = key.offset_by_chunks(offset.x, offset.z) else {
                continue;
            };
            if let Some(neighbor) = chunks.get(&neighbor_key) {
                chunk.link_neighbor(Some(&mut *neighbor.get_mut()), side)?;
            }
        }

        let chunk = MtResource::new(chunk);
        chunks.insert(key, chunk.clone());
        log::trace!("Instantiated chunk {:?}", key);
        Ok(chunk)
    }

    /// The chunk stored under `key`.
    pub fn get(&self, key: SpatialKey) -> Option<MtResource<Chunk>> {
        self.chunks.get(&key)
    }

    /// The chunk containing world column `(x, z)`.
    pub fn get_chunk_at(&self, x: i32, z: i32) -> TerrainResult<MtResource<Chunk>> {
        let key = chunk_key_at(x, z);
        self.get(key).ok_or_else(|| {
            let (x, z) = key.decode();
            TerrainError::ChunkNotFound { x, z }
        })
    }

    /// Returns `true` if a chunk contains world column `(x, z)`.
    pub fn has_chunk_at(&self, x: i32, z: i32) -> bool {
        self.chunks.contains_key(&chunk_key_at(x, z))
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns `true` if no chunk has been created.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Snapshot of every chunk.
    pub fn chunks(&self) -> Vec<MtResource<Chunk>> {
        self.chunks.values()
    }
}
