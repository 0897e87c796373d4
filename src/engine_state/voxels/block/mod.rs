//! # Block Module
//!
//! Block type definitions and the six block faces used by the mesher and by chunk
//! adjacency.

pub mod block_side;
pub mod block_type;

pub use block_side::BlockSide;
pub use block_type::BlockType;
