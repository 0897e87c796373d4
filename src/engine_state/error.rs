//! # Error Module
//!
//! The single error type of the crate and its result alias.
//!
//! ## Groups
//!
//! * **Contract errors**: bad coordinates, unknown or duplicate chunks, misaligned origins.
//!   Returned to the caller, never retried.
//! * **Resource errors**: allocation, mapping and submission failures from the graphics
//!   backend. They abort the upload in progress, which releases what it allocated.
//! * **Setup errors**: configuration, worker spawn and device acquisition.

use thiserror::Error;

use super::gpu::BufferHandle;
use super::voxels::block::block_side::BlockSide;

/// Errors produced by the terrain streaming core.
///
/// The variants fall into three groups:
/// - contract errors (bad coordinates, unknown chunks) that indicate a logic bug in the
///   caller and are never recovered internally;
/// - resource failures reported by the graphics backend, which abort the operation in
///   progress;
/// - configuration and setup failures.
#[derive(Debug, Error)]
pub enum TerrainError {
    /// Local block coordinates outside `[0,16) × [0,256) × [0,16)`.
    #[error("block coordinates ({x}, {y}, {z}) are outside the chunk bounds")]
    BlockOutOfRange { x: i32, y: i32, z: i32 },

    /// No chunk is stored at the origin.
    #[error("no chunk exists at origin ({x}, {z})")]
    ChunkNotFound { x: i32, z: i32 },

    /// The origin is already occupied.
    #[error("a chunk already exists at origin ({x}, {z})")]
    ChunkAlreadyExists { x: i32, z: i32 },

    /// A chunk origin that is not a multiple of the chunk width.
    #[error("origin ({x}, {z}) is not aligned to a multiple of {alignment}")]
    MisalignedOrigin { x: i32, z: i32, alignment: i32 },

    /// `TOP` or `BOTTOM` passed where only lateral sides are allowed.
    #[error("{0:?} is not a lateral direction")]
    NotLateral(BlockSide),

    /// Work submitted after shutdown began.
    #[error("task queue has been stopped")]
    TaskQueueStopped,

    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// No adapter or device could be obtained.
    #[error("graphics device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The backend could not create a buffer.
    #[error("buffer allocation failed: {0}")]
    Allocation(String),

    /// A handle that was never created or is already destroyed.
    #[error("buffer {0:?} is not known to the backend")]
    UnknownBuffer(BufferHandle),

    /// A host write into unmapped, device-local or too small memory.
    #[error("buffer access failed: {0}")]
    BufferAccess(String),

    /// Recording or submitting a copy failed.
    #[error("transfer submission failed: {0}")]
    Submission(String),

    /// A configuration value out of its allowed range.
    #[error("invalid terrain configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// The configuration file is not valid JSON for [`TerrainConfig`](super::config::TerrainConfig).
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

/// Convenience alias used by every fallible terrain operation.
pub type TerrainResult<T> = Result<T, TerrainError>;
