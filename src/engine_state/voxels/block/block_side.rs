//! # Block Side Module
//!
//! This module defines the six faces of a voxel block. A side doubles as the direction in
//! which a neighbouring cell (or neighbouring chunk, for the four lateral sides) is found.

use cgmath::Vector3;

/// Represents the six possible faces of a voxel block.
///
/// The order is the order in which the mesher tests a block's neighbours and therefore
/// the order in which its faces are emitted: [RIGHT, LEFT, TOP, BOTTOM, FRONT, BACK]
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum BlockSide {
    /// The right face (facing positive X)
    RIGHT = 0,

    /// The left face (facing negative X)
    LEFT = 1,

    /// The top face (facing positive Y)
    TOP = 2,

    /// The bottom face (facing negative Y)
    BOTTOM = 3,

    /// The front face (facing positive Z)
    FRONT = 4,

    /// The back face (facing negative Z)
    BACK = 5,
}

impl BlockSide {
    /// Returns all six block faces in emission order.
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::RIGHT,
            BlockSide::LEFT,
            BlockSide::TOP,
            BlockSide::BOTTOM,
            BlockSide::FRONT,
            BlockSide::BACK,
        ]
    }

    /// The four sides across which chunks are adjacent.
    pub fn lateral() -> [BlockSide; 4] {
        [
            BlockSide::RIGHT,
            BlockSide::LEFT,
            BlockSide::FRONT,
            BlockSide::BACK,
        ]
    }

    /// Unit offset to the neighbouring cell on this side.
    pub fn offset(self) -> Vector3<i32> {
        match self {
            BlockSide::RIGHT => Vector3::new(1, 0, 0),
            BlockSide::LEFT => Vector3::new(-1, 0, 0),
            BlockSide::TOP => Vector3::new(0, 1, 0),
            BlockSide::BOTTOM => Vector3::new(0, -1, 0),
            BlockSide::FRONT => Vector3::new(0, 0, 1),
            BlockSide::BACK => Vector3::new(0, 0, -1),
        }
    }

    /// Outward unit normal of the face.
    pub fn normal(self) -> [f32; 3] {
        let offset = self.offset();
        [offset.x as f32, offset.y as f32, offset.z as f32]
    }

    /// The side facing the other way.
    pub fn opposite(self) -> BlockSide {
        match self {
            BlockSide::RIGHT => BlockSide::LEFT,
            BlockSide::LEFT => BlockSide::RIGHT,
            BlockSide::TOP => BlockSide::BOTTOM,
            BlockSide::BOTTOM => BlockSide::TOP,
            BlockSide::FRONT => BlockSide::BACK,
            BlockSide::BACK => BlockSide::FRONT,
        }
    }

    /// Slot of this side in a chunk's neighbour table, or `None` for TOP and BOTTOM.
    pub fn lateral_index(self) -> Option<usize> {
        match self {
            BlockSide::RIGHT => Some(0),
            BlockSide::LEFT => Some(1),
            BlockSide::FRONT => Some(2),
            BlockSide::BACK => Some(3),
            BlockSide::TOP | BlockSide::BOTTOM => None,
        }
    }
}
