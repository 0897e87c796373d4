//! # Terrain Generation
//!
//! Fills freshly created chunks with block data. Generators run on worker threads, one
//! chunk at a time, and only ever see the chunk they are filling.

use super::block::BlockType;
use super::chunk::{Chunk, CHUNK_WIDTH};
use super::spatial_key::ZONE_WIDTH;
use crate::engine_state::error::TerrainResult;

/// Produces the block data of a chunk.
pub trait TerrainGenerator: Send + Sync {
    /// Writes the blocks of `chunk`, which is empty when passed in.
    fn populate(&self, chunk: &mut Chunk) -> TerrainResult<()>;
}

/// Placeholder terrain: one flat layer of grass at `surface_height`, crossed by stone
/// stripes along every zone boundary.
#[derive(Debug, Clone, Copy)]
pub struct StripedGenerator {
    surface_height: i32,
}

impl StripedGenerator {
    /// Creates a generator that places its layer at `surface_height`.
    pub fn new(surface_height: usize) -> Self {
        Self {
            surface_height: surface_height as i32,
        }
    }

    /// Block placed in world column `(x, z)`.
    pub fn block_for_column(x: i32, z: i32) -> BlockType {
        let stripe = ZONE_WIDTH as u32;
        if x.unsigned_abs() % stripe == 0 || z.unsigned_abs() % stripe == 0 {
            BlockType::STONE
        } else {
            BlockType::GRASS
        }
    }
}

impl TerrainGenerator for StripedGenerator {
    fn populate(&self, chunk: &mut Chunk) -> TerrainResult<()> {
        for z in 0..CHUNK_WIDTH {
            for x in 0..CHUNK_WIDTH {
                let block = Self::block_for_column(chunk.min_x() + x, chunk.min_z() + z);
                chunk.set_block(x, self.surface_height, z, block)?;
            }
        }
        Ok(())
    }
}
