//! # Block Type Module
//!
//! This module defines the different types of blocks in the voxel world and the
//! fixed colour each one is drawn with.

/// Enumerates all possible block types in the voxel world.
///
/// `EMPTY` is the sentinel for "no geometry": empty cells never emit faces and every
/// neighbouring face against them is visible.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlockType {
    /// No block. Every chunk cell starts out as `EMPTY`.
    #[default]
    EMPTY,

    /// Grass-topped surface block.
    GRASS,

    /// Plain dirt.
    DIRT,

    /// Stone, used by the placeholder generator for zone boundary stripes.
    STONE,

    /// Water.
    WATER,
}

impl BlockType {
    /// Every block type, `EMPTY` first.
    pub const ALL: [BlockType; 5] = [
        BlockType::EMPTY,
        BlockType::GRASS,
        BlockType::DIRT,
        BlockType::STONE,
        BlockType::WATER,
    ];

    /// Returns `true` for every type except `EMPTY`.
    #[inline]
    pub fn is_solid(self) -> bool {
        self != BlockType::EMPTY
    }

    /// The RGBA colour written into every vertex of a face of this block.
    pub fn color(self) -> [f32; 4] {
        match self {
            BlockType::GRASS => [0.0431, 0.51373, 0.23137, 1.0],
            BlockType::DIRT => [0.5373, 0.3176, 0.0392, 1.0],
            BlockType::STONE => [0.27, 0.3568, 0.3804, 1.0],
            BlockType::WATER => [0.04706, 0.3647, 0.5216, 1.0],
            BlockType::EMPTY => [1.0, 1.0, 1.0, 1.0],
        }
    }
}

#[cfg(test)]
impl BlockType {
    /// Picks a random solid block type.
    pub(crate) fn get_random_solid() -> Self {
        Self::ALL[fastrand::usize(1..Self::ALL.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_empty_is_not_solid() {
        for block_type in BlockType::ALL {
            assert_eq!(block_type.is_solid(), block_type != BlockType::EMPTY);
        }
    }

    #[test]
    fn random_solid_is_never_empty() {
        for _ in 0..100 {
            assert!(BlockType::get_random_solid().is_solid());
        }
    }

    #[test]
    fn solid_colors_are_opaque_and_distinct() {
        let solids = &BlockType::ALL[1..];
        for (i, a) in solids.iter().enumerate() {
            assert_eq!(a.color()[3], 1.0);
            for b in &solids[i + 1..] {
                assert_ne!(a.color(), b.color());
            }
        }
    }
}
