//! # Headless Backend
//!
//! A [`GraphicsBackend`] that keeps every buffer in host memory. It enforces the same
//! rules a real device would (host writes only into mapped host-visible memory, copies
//! only from unmapped transfer sources into geometry buffers, no zero-sized buffers), so
//! the streaming pipeline can run and be verified without a GPU.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
};

use super::{BufferHandle, BufferUsage, GraphicsBackend, MemoryKind};
use crate::engine_state::error::{TerrainError, TerrainResult};

#[derive(Debug)]
struct HostBuffer {
    label: String,
    bytes: Vec<u8>,
    usage: BufferUsage,
    memory: MemoryKind,
    mapped: bool,
}

/// Command pool of the headless backend. Counts the copies recorded into it.
#[derive(Debug)]
pub struct HeadlessCommandPool {
    label: String,
    recorded_copies: u64,
}

impl HeadlessCommandPool {
    /// Label given at creation.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of copies recorded into this pool so far.
    pub fn recorded_copies(&self) -> u64 {
        self.recorded_copies
    }
}

/// Host-memory graphics backend.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    buffers: Mutex<HashMap<BufferHandle, HostBuffer>>,
    next_handle: AtomicU64,
    live_pools: AtomicUsize,
    submitted_copies: AtomicU64,
}

impl HeadlessBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn buffers(&self) -> MutexGuard<'_, HashMap<BufferHandle, HostBuffer>> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of buffers currently alive.
    pub fn live_buffers(&self) -> usize {
        self.buffers().len()
    }

    /// Number of command pools created and not yet destroyed.
    pub fn live_command_pools(&self) -> usize {
        self.live_pools.load(Ordering::SeqCst)
    }

    /// Total copies submitted across every command pool.
    pub fn submitted_copies(&self) -> u64 {
        self.submitted_copies.load(Ordering::SeqCst)
    }

    /// Contents of a buffer, if it exists.
    pub fn read_buffer(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        self.buffers().get(&buffer).map(|b| b.bytes.clone())
    }

    /// Memory kind of a buffer, if it exists.
    pub fn memory_kind(&self, buffer: BufferHandle) -> Option<MemoryKind> {
        self.buffers().get(&buffer).map(|b| b.memory)
    }

    /// Label of a buffer, if it exists.
    pub fn label(&self, buffer: BufferHandle) -> Option<String> {
        self.buffers().get(&buffer).map(|b| b.label.clone())
    }
}

impl GraphicsBackend for HeadlessBackend {
    type CommandPool = HeadlessCommandPool;

    fn create_command_pool(&self, label: &str) -> TerrainResult<HeadlessCommandPool> {
        self.live_pools.fetch_add(1, Ordering::SeqCst);
        Ok(HeadlessCommandPool {
            label: label.to_owned(),
            recorded_copies: 0,
        })
    }

    fn destroy_command_pool(&self, pool: HeadlessCommandPool) {
        log::trace!(
            "Destroying {} after {} copies",
            pool.label,
            pool.recorded_copies
        );
        self.live_pools.fetch_sub(1, Ordering::SeqCst);
    }

    fn create_buffer(
        &self,
        label: &str,
        size: u64,
        usage: BufferUsage,
        memory: MemoryKind,
    ) -> TerrainResult<BufferHandle> {
        if size == 0 {
            return Err(TerrainError::Allocation(format!(
                "'{label}' requested a zero-sized buffer"
            )));
        }

        let handle = BufferHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.buffers().insert(
            handle,
            HostBuffer {
                label: label.to_owned(),
                bytes: vec![0; size as usize],
                usage,
                memory,
                mapped: memory == MemoryKind::HostVisibleCoherent,
            },
        );
        Ok(handle)
    }

    fn write_mapped(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> TerrainResult<()> {
        let mut buffers = self.buffers();
        let target = buffers
            .get_mut(&buffer)
            .ok_or(TerrainError::UnknownBuffer(buffer))?;

        if target.memory != MemoryKind::HostVisibleCoherent || !target.mapped {
            return Err(TerrainError::BufferAccess(format!(
                "'{}' is not mapped host-visible memory",
                target.label
            )));
        }

        let start = offset as usize;
        let end = start + data.len();
        if end > target.bytes.len() {
            return Err(TerrainError::BufferAccess(format!(
                "write of {} bytes at {} overflows '{}' ({} bytes)",
                data.len(),
                offset,
                target.label,
                target.bytes.len()
            )));
        }

        target.bytes[start..end].copy_from_slice(data);
        Ok(())
    }

    fn unmap(&self, buffer: BufferHandle) -> TerrainResult<()> {
        let mut buffers = self.buffers();
        let target = buffers
            .get_mut(&buffer)
            .ok_or(TerrainError::UnknownBuffer(buffer))?;
        target.mapped = false;
        Ok(())
    }

    fn copy_buffer(
        &self,
        pool: &mut HeadlessCommandPool,
        src: BufferHandle,
        dst: BufferHandle,
        size: u64,
    ) -> TerrainResult<()> {
        let mut buffers = self.buffers();

        let source = buffers.get(&src).ok_or(TerrainError::UnknownBuffer(src))?;
        if source.usage != BufferUsage::TransferSource || source.mapped {
            return Err(TerrainError::Submission(format!(
                "'{}' is not an unmapped transfer source",
                source.label
            )));
        }
        if size as usize > source.bytes.len() {
            return Err(TerrainError::Submission(format!(
                "copy of {size} bytes overreads '{}'",
                source.label
            )));
        }
        let data = source.bytes[..size as usize].to_vec();

        let destination = buffers
            .get_mut(&dst)
            .ok_or(TerrainError::UnknownBuffer(dst))?;
        if destination.usage != BufferUsage::Geometry {
            return Err(TerrainError::Submission(format!(
                "'{}' is not a transfer destination",
                destination.label
            )));
        }
        if data.len() > destination.bytes.len() {
            return Err(TerrainError::Submission(format!(
                "copy of {size} bytes overflows '{}'",
                destination.label
            )));
        }

        destination.bytes[..data.len()].copy_from_slice(&data);
        pool.recorded_copies += 1;
        self.submitted_copies.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        self.buffers().remove(&buffer);
    }
}
