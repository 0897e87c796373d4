//! # GPU Module
//!
//! The narrow interface between the terrain core and the graphics API.
//!
//! ## Key Components
//!
//! * `GraphicsBackend` - Buffer allocation, host writes, transfer submission, destruction
//! * `CommandPoolManager` - Bounded set of transfer-command resources for concurrent uploaders
//! * `WgpuBackend` - Backend over a `wgpu` device and queue
//! * `HeadlessBackend` - Backend over host memory, for headless runs and tests
//!
//! ## Buffer Handles
//!
//! Backends keep the real buffer objects in a registry and hand out opaque
//! [`BufferHandle`]s. Chunks store only handles, so chunk data stays independent of the
//! graphics API and can move freely between worker threads.

use std::fmt::Debug;

use super::error::TerrainResult;

pub mod command_pool;
pub mod headless_backend;
pub mod wgpu_backend;

pub use command_pool::{CommandPoolGuard, CommandPoolManager};
pub use headless_backend::HeadlessBackend;
pub use wgpu_backend::WgpuBackend;

/// Opaque identifier of a buffer owned by a [`GraphicsBackend`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u64);

/// What a buffer is used for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Source of a transfer; written by the host.
    TransferSource,
    /// Destination of a transfer, then bound as vertex and index data.
    Geometry,
}

/// Where a buffer's memory lives.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemoryKind {
    /// Host-visible and coherent; mappable without explicit flushes.
    HostVisibleCoherent,
    /// Device-local; not accessible from the host.
    DeviceLocal,
}

/// Operations the terrain needs from a graphics API.
///
/// Implementations must be usable from several threads at once: uploads may run on any
/// thread that holds a command pool slot.
pub trait GraphicsBackend: Send + Sync {
    /// A resource that transfer commands are recorded into.
    type CommandPool: Send + Debug;

    /// Creates one command-recording resource.
    fn create_command_pool(&self, label: &str) -> TerrainResult<Self::CommandPool>;

    /// Releases a command-recording resource.
    fn destroy_command_pool(&self, pool: Self::CommandPool);

    /// Allocates a buffer. Host-visible buffers start out mapped for writing.
    fn create_buffer(
        &self,
        label: &str,
        size: u64,
        usage: BufferUsage,
        memory: MemoryKind,
    ) -> TerrainResult<BufferHandle>;

    /// Copies `data` into a mapped host-visible buffer at `offset`.
    fn write_mapped(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> TerrainResult<()>;

    /// Unmaps a host-visible buffer so it can be used as a transfer source.
    fn unmap(&self, buffer: BufferHandle) -> TerrainResult<()>;

    /// Records `size` bytes of `src` → `dst` into `pool`, submits it and waits for completion.
    fn copy_buffer(
        &self,
        pool: &mut Self::CommandPool,
        src: BufferHandle,
        dst: BufferHandle,
        size: u64,
    ) -> TerrainResult<()>;

    /// Destroys a buffer. Unknown handles are ignored.
    fn destroy_buffer(&self, buffer: BufferHandle);
}
