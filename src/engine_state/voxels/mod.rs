//! # Voxel Terrain Core
//!
//! Representation and streaming of the voxel world.
//!
//! ## Architecture
//!
//! * **Block**: Block types and the six block faces
//! * **Chunk**: 16 × 256 × 16 block storage, meshing and upload
//! * **SpatialKey**: Packed `(x, z)` keys for chunks and zones
//! * **ChunkIndex**: Concurrent map of all chunks, with neighbour linking
//! * **Generator**: Fills new chunks with blocks
//! * **Terrain**: Drives generation, meshing and upload around an observer
//! * **Tasks**: Background generation work
//!
//! ## Data Flow
//!
//! 1. The terrain dispatches generation for zones (4 × 4 chunks) near the observer
//! 2. Generated chunks are meshed on workers
//! 3. Meshes are uploaded on the orchestrating thread and become drawable
//!
//! ## Thread Safety
//!
//! * Chunks are shared as `MtResource<Chunk>` and locked individually
//! * The chunk index is only locked before, never while holding, a chunk lock

pub mod block;
pub mod chunk;
pub mod chunk_index;
pub mod generator;
pub mod spatial_key;
pub(crate) mod tasks;
pub mod terrain;
