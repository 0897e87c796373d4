//! # Chunk Generation Task
//!
//! Generates one zone: the 4 × 4 chunks whose origins lie inside it. Each chunk is
//! created through the chunk index (which links it to its existing neighbours), filled by
//! the terrain generator, and then handed to the meshing stage through the pending queue.

use std::sync::Arc;

use crate::engine_state::{
    task_management::task::Task,
    voxels::{
        chunk::CHUNK_WIDTH,
        spatial_key::{SpatialKey, ZONE_WIDTH},
        terrain::TerrainShared,
    },
};

/// Chunks per zone along each horizontal axis.
const CHUNKS_PER_ZONE_SIDE: i32 = ZONE_WIDTH / CHUNK_WIDTH;

/// A task that creates and fills every chunk of one zone.
pub(crate) struct ChunkGenerationTask {
    /// Terrain state shared with the orchestrating thread
    shared: Arc<TerrainShared>,
    /// Origin of the zone to generate
    zone: SpatialKey,
}

impl ChunkGenerationTask {
    /// Creates a new chunk generation task.
    ///
    /// # Arguments
    /// * `shared` - Terrain state the chunks are created in
    /// * `zone` - Key of the zone's minimum corner
    pub(crate) fn new(shared: Arc<TerrainShared>, zone: SpatialKey) -> Self {
        ChunkGenerationTask { shared, zone }
    }
}

impl Task for ChunkGenerationTask {
    fn process(self: Box<Self>) {
        let (zone_x, zone_z) = self.zone.decode();
        let mut generated = 0;

        for dz in 0..CHUNKS_PER_ZONE_SIDE {
            for dx in 0..CHUNKS_PER_ZONE_SIDE {
                let min_x = zone_x + dx * CHUNK_WIDTH;
                let min_z = zone_z + dz * CHUNK_WIDTH;

                let chunk = match self.shared.index.instantiate_chunk_at(min_x, min_z) {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        log::warn!("Skipping chunk ({min_x}, {min_z}): {err}");
                        continue;
                    }
                };

                let key = {
                    let mut chunk = chunk.get_mut();
                    if let Err(err) = self.shared.generator.populate(&mut chunk) {
                        log::error!("Failed to generate chunk ({min_x}, {min_z}): {err}");
                        continue;
                    }
                    chunk.key()
                };

                self.shared.push_pending(key);
                generated += 1;
            }
        }

        log::trace!("Generated {generated} chunks in zone {:?}", self.zone);
    }

    fn name(&self) -> &str {
        "chunk generation"
    }
}
