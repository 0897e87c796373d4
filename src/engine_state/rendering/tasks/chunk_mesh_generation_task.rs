//! Task for generating mesh data for chunks in a background thread.
//!
//! The task resolves its chunk through the chunk index, builds the mesh while holding the
//! chunk's write lock and passes the key on to the drawable queue, where the orchestrating
//! thread picks it up for upload. No GPU resource is touched here.

use std::sync::Arc;

use crate::engine_state::{
    task_management::task::Task,
    voxels::{chunk::ChunkStage, spatial_key::SpatialKey, terrain::TerrainShared},
};

/// A task that meshes one chunk.
pub(crate) struct ChunkMeshGenerationTask {
    /// Terrain state shared with the orchestrating thread
    shared: Arc<TerrainShared>,
    /// The chunk to mesh
    key: SpatialKey,
}

impl ChunkMeshGenerationTask {
    /// Creates a new chunk mesh generation task.
    pub(crate) fn new(shared: Arc<TerrainShared>, key: SpatialKey) -> Self {
        ChunkMeshGenerationTask { shared, key }
    }
}

impl Task for ChunkMeshGenerationTask {
    fn process(self: Box<Self>) {
        let Some(chunk) = self.shared.index.get(self.key) else {
            log::warn!("Chunk {:?} vanished before meshing", self.key);
            return;
        };

        {
            let mut chunk = chunk.get_mut();
            // Already meshed through an earlier queue entry.
            if chunk.stage() != ChunkStage::BlockData {
                return;
            }
            let faces = chunk.regenerate_mesh();
            log::trace!("Meshed chunk {:?} ({faces} faces)", self.key);
        }

        self.shared.push_drawable(self.key);
    }

    fn name(&self) -> &str {
        "chunk meshing"
    }
}
