//! # Chunk Module
//!
//! This module provides the `Chunk` struct: a 16 × 256 × 16 column of blocks, the unit in
//! which the terrain is generated, meshed, uploaded and drawn.
//!
//! ## Storage
//!
//! Blocks are stored densely, one [`BlockType`] per cell, at index `x + 16·y + 16·256·z`.
//! A fresh chunk is entirely [`BlockType::EMPTY`]. Dense storage keeps both lookups and
//! edits O(1), which matters because generators and world edits write single cells.
//!
//! ## Lifecycle
//!
//! A chunk moves through [`ChunkStage::BlockData`] → [`ChunkStage::Meshed`] →
//! [`ChunkStage::Uploaded`]. Editing a meshed or uploaded chunk moves it back to
//! `BlockData`; its previous device buffer stays drawable until a new upload replaces it.
//!
//! ## Neighbours
//!
//! The four lateral neighbours are recorded by [`SpatialKey`] and resolved through the
//! terrain's chunk index, so a chunk never holds a reference into another chunk.

use super::block::{BlockSide, BlockType};
use super::spatial_key::SpatialKey;
use crate::engine_state::error::{TerrainError, TerrainResult};

pub mod meshing;
pub mod upload;

pub use meshing::ChunkMesh;
pub use upload::ChunkBuffer;

/// Width of a chunk along X and Z, in blocks.
pub const CHUNK_WIDTH: i32 = 16;
/// Height of a chunk along Y, in blocks.
pub const CHUNK_HEIGHT: usize = 256;
/// Number of cells in one horizontal layer.
pub const CHUNK_LAYER: usize = (CHUNK_WIDTH * CHUNK_WIDTH) as usize;
/// Distance in cells between consecutive Z slices of the storage.
const CHUNK_COLUMN_STRIDE: usize = CHUNK_WIDTH as usize * CHUNK_HEIGHT;
/// Number of cells in a chunk.
pub const CHUNK_VOLUME: usize = CHUNK_LAYER * CHUNK_HEIGHT;

/// Where a chunk is in the generate → mesh → upload pipeline.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChunkStage {
    /// Block data is present (or being written); no current mesh.
    BlockData,
    /// A mesh has been built and is waiting for upload.
    Meshed,
    /// The current mesh lives in device memory (or the chunk has nothing to draw).
    Uploaded,
}

/// A 16 × 256 × 16 column of blocks.
#[derive(Debug)]
pub struct Chunk {
    min_x: i32,
    min_z: i32,
    blocks: Box<[BlockType]>,
    neighbors: [Option<SpatialKey>; 4],
    stage: ChunkStage,
    mesh: Option<ChunkMesh>,
    buffer: Option<ChunkBuffer>,
    upload_attempts: u32,
}

impl Chunk {
    /// Creates an all-empty chunk with its minimum corner at `(min_x, min_z)`.
    ///
    /// # Returns
    ///
    /// [`TerrainError::MisalignedOrigin`] unless both coordinates are multiples of
    /// [`CHUNK_WIDTH`].
    pub fn new(min_x: i32, min_z: i32) -> TerrainResult<Self> {
        if min_x.rem_euclid(CHUNK_WIDTH) != 0 || min_z.rem_euclid(CHUNK_WIDTH) != 0 {
            return Err(TerrainError::MisalignedOrigin {
                x: min_x,
                z: min_z,
                alignment: CHUNK_WIDTH,
            });
        }

        Ok(Self {
            min_x,
            min_z,
            blocks: vec![BlockType::EMPTY; CHUNK_VOLUME].into_boxed_slice(),
            neighbors: [None; 4],
            stage: ChunkStage::BlockData,
            mesh: None,
            buffer: None,
            upload_attempts: 0,
        })
    }

    /// World X of the chunk's minimum corner.
    pub fn min_x(&self) -> i32 {
        self.min_x
    }

    /// World Z of the chunk's minimum corner.
    pub fn min_z(&self) -> i32 {
        self.min_z
    }

    /// Key of this chunk in the terrain index.
    pub fn key(&self) -> SpatialKey {
        SpatialKey::encode(self.min_x, self.min_z)
    }

    /// Storage index of an in-range cell: `x + 16·y + 16·256·z`.
    pub(super) const fn cell_index(x: i32, y: i32, z: i32) -> usize {
        x as usize + CHUNK_WIDTH as usize * y as usize + CHUNK_COLUMN_STRIDE * z as usize
    }

    fn index(x: i32, y: i32, z: i32) -> TerrainResult<usize> {
        let in_range = (0..CHUNK_WIDTH).contains(&x)
            && (0..CHUNK_HEIGHT as i32).contains(&y)
            && (0..CHUNK_WIDTH).contains(&z);
        if !in_range {
            return Err(TerrainError::BlockOutOfRange { x, y, z });
        }
        Ok(Self::cell_index(x, y, z))
    }

    /// Gets the block at chunk-local coordinates.
    ///
    /// # Arguments
    /// * `x` - X coordinate within the chunk (0..16)
    /// * `y` - Y coordinate within the chunk (0..256)
    /// * `z` - Z coordinate within the chunk (0..16)
    ///
    /// # Returns
    /// The block, or [`TerrainError::BlockOutOfRange`] if any coordinate is outside the chunk.
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> TerrainResult<BlockType> {
        Ok(self.blocks[Self::index(x, y, z)?])
    }

    /// Sets the block at chunk-local coordinates. Out-of-range coordinates are an error;
    /// nothing is clamped.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, block_type: BlockType) -> TerrainResult<()> {
        let index = Self::index(x, y, z)?;
        self.blocks[index] = block_type;
        Ok(())
    }

    /// Number of non-empty cells.
    pub fn solid_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_solid()).count()
    }

    /// Links this chunk and `other` as neighbours across `side` (as seen from `self`).
    ///
    /// The link is recorded on both chunks: `other` gets `self` on the opposite side.
    /// Linking to an absent chunk does nothing.
    ///
    /// # Returns
    /// [`TerrainError::NotLateral`] for [`BlockSide::TOP`] and [`BlockSide::BOTTOM`].
    pub fn link_neighbor(&mut self, other: Option<&mut Chunk>, side: BlockSide) -> TerrainResult<()> {
        let (Some(here), Some(there)) = (side.lateral_index(), side.opposite().lateral_index())
        else {
            return Err(TerrainError::NotLateral(side));
        };
        let Some(other) = other else {
            return Ok(());
        };

        debug_assert_eq!(
            Some(other.key()),
            self.key()
                .offset_by_chunks(side.offset().x, side.offset().z),
            "linked chunks must be adjacent"
        );

        self.neighbors[here] = Some(other.key());
        other.neighbors[there] = Some(self.key());
        Ok(())
    }

    /// Key of the neighbour across `side`, if one has been linked.
    pub fn neighbor(&self, side: BlockSide) -> Option<SpatialKey> {
        side.lateral_index().and_then(|i| self.neighbors[i])
    }

    /// Number of linked neighbours.
    pub fn neighbor_count(&self) -> usize {
        self.neighbors.iter().flatten().count()
    }

    /// Current pipeline stage.
    pub fn stage(&self) -> ChunkStage {
        self.stage
    }

    /// Moves a meshed or uploaded chunk back to [`ChunkStage::BlockData`] after an edit.
    ///
    /// # Returns
    /// `true` if the chunk needs to be queued for meshing again. A chunk that is still in
    /// `BlockData` is already on its way to the mesher.
    pub fn mark_modified(&mut self) -> bool {
        if self.stage == ChunkStage::BlockData {
            return false;
        }
        self.stage = ChunkStage::BlockData;
        self.mesh = None;
        true
    }

    /// The mesh waiting for upload, if any.
    pub fn mesh(&self) -> Option<&ChunkMesh> {
        self.mesh.as_ref()
    }

    /// The device buffer currently holding this chunk's geometry, if any.
    pub fn buffer(&self) -> Option<&ChunkBuffer> {
        self.buffer.as_ref()
    }

    /// Failed uploads of the current mesh.
    pub fn upload_attempts(&self) -> u32 {
        self.upload_attempts
    }

    /// Removes the device buffer without destroying it. Used at teardown, where the caller
    /// owns the backend.
    pub fn take_buffer(&mut self) -> Option<ChunkBuffer> {
        self.buffer.take()
    }
}
