//! Background tasks for the rendering system.
//!
//! # Available Tasks
//! - `ChunkMeshGenerationTask`: Builds the face-culled mesh of a chunk off the render thread

pub(crate) mod chunk_mesh_generation_task;
