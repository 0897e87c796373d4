//! # Engine State Module
//!
//! Everything the terrain streaming pipeline is made of.
//!
//! ## Key Components
//!
//! * `config` - Tunables, loadable from JSON
//! * `error` - The crate-wide error type
//! * `gpu` - Graphics backend interface, command pools and the shipped backends
//! * `rendering` - Vertex format, draw submission and the meshing task
//! * `task_management` - Worker pool executing generation and meshing
//! * `voxels` - Blocks, chunks, the chunk index and the terrain itself
//!
//! ## Architecture
//!
//! One orchestrating thread calls [`Terrain::update`](voxels::terrain::Terrain::update)
//! once per frame. Generation and meshing run on the worker pool and never touch GPU
//! resources; uploads happen on the orchestrating thread, each holding a command pool
//! slot for the length of its transfer.

pub mod config;
pub mod error;
pub mod gpu;
pub mod rendering;
pub mod task_management;
pub mod voxels;
