//! # Wgpu Backend
//!
//! [`GraphicsBackend`] over a `wgpu` device and queue.
//!
//! ## Buffer Registry
//!
//! Every buffer lives in a registry keyed by [`BufferHandle`], next to a small analytics
//! record (allocated bytes, bytes written, write count). The registry is the only owner of
//! the `wgpu::Buffer`; destroying a handle drops the buffer and frees its memory.
//!
//! ## Memory Mapping
//!
//! `wgpu` has no explicit memory heaps. Host-visible coherent memory is expressed as a
//! buffer created with `MAP_WRITE | COPY_SRC` and `mapped_at_creation`; device-local
//! memory as `VERTEX | INDEX | COPY_DST` with no mapping usage.
//!
//! ## Error Handling
//!
//! Allocation and submission are wrapped in error scopes so out-of-memory and validation
//! failures surface as [`TerrainError`] values instead of reaching the device's uncaptured
//! error handler.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
};

use super::{BufferHandle, BufferUsage, GraphicsBackend, MemoryKind};
use crate::engine_state::error::{TerrainError, TerrainResult};

/// Analytics data for a registered buffer
#[derive(Debug, Default, Clone, Copy)]
struct BufferAnalytics {
    /// Total memory allocated for the buffer in bytes
    allocated_memory: u64,
    /// Highest byte written by the host
    used_memory: u64,
    /// Number of host writes
    times_written: u64,
}

#[derive(Debug)]
struct TrackedBuffer {
    buffer: wgpu::Buffer,
    analytics: BufferAnalytics,
    /// Mapped at creation and not yet unmapped
    mapped: bool,
}

/// Transfer command pool. `wgpu` records into short-lived encoders, so the pool only
/// carries a label for those encoders and a submission counter.
#[derive(Debug)]
pub struct WgpuTransferPool {
    label: String,
    submissions: u64,
}

impl WgpuTransferPool {
    /// Number of transfers submitted through this pool.
    pub fn submissions(&self) -> u64 {
        self.submissions
    }
}

/// Graphics backend over a `wgpu` device and queue.
#[derive(Debug)]
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    buffers: Mutex<HashMap<BufferHandle, TrackedBuffer>>,
    next_handle: AtomicU64,
}

impl WgpuBackend {
    /// Wraps an existing device and queue.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            buffers: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(0),
        }
    }

    /// Requests an adapter and device without a presentation surface.
    ///
    /// # Returns
    ///
    /// The backend, or [`TerrainError::DeviceUnavailable`] if no adapter or device could be
    /// obtained.
    pub async fn new_headless() -> TerrainResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::empty(),
            backend_options: wgpu::BackendOptions::from_env_or_default(),
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|err| TerrainError::DeviceUnavailable(err.to_string()))?;

        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Terrain Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::MemoryUsage,
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|err| TerrainError::DeviceUnavailable(err.to_string()))?;

        Ok(Self::new(device, queue))
    }

    /// The underlying device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// The underlying queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<BufferHandle, TrackedBuffer>> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A clone of the `wgpu` buffer behind `handle`, for binding during draws.
    pub fn buffer(&self, handle: BufferHandle) -> Option<wgpu::Buffer> {
        self.registry().get(&handle).map(|t| t.buffer.clone())
    }

    /// Gets the total allocated memory across all live buffers
    pub fn total_allocated_memory(&self) -> u64 {
        self.registry()
            .values()
            .fold(0, |acc, tracked| acc + tracked.analytics.allocated_memory)
    }

    /// Gets the total host-written memory across all live buffers
    pub fn total_used_memory(&self) -> u64 {
        self.registry()
            .values()
            .fold(0, |acc, tracked| acc + tracked.analytics.used_memory)
    }

    fn lookup(&self, handle: BufferHandle) -> TerrainResult<wgpu::Buffer> {
        self.buffer(handle)
            .ok_or(TerrainError::UnknownBuffer(handle))
    }
}

impl GraphicsBackend for WgpuBackend {
    type CommandPool = WgpuTransferPool;

    fn create_command_pool(&self, label: &str) -> TerrainResult<WgpuTransferPool> {
        Ok(WgpuTransferPool {
            label: label.to_owned(),
            submissions: 0,
        })
    }

    fn destroy_command_pool(&self, pool: WgpuTransferPool) {
        log::trace!("Releasing {} after {} submissions", pool.label, pool.submissions);
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

        let usage = match usage {
            BufferUsage::TransferSource => wgpu::BufferUsages::COPY_SRC,
            BufferUsage::Geometry => {
                wgpu::BufferUsages::VERTEX
                    | wgpu::BufferUsages::INDEX
                    | wgpu::BufferUsages::COPY_DST
            }
        };
        let (usage, mapped_at_creation) = match memory {
            MemoryKind::HostVisibleCoherent => (usage | wgpu::BufferUsages::MAP_WRITE, true),
            MemoryKind::DeviceLocal => (usage, false),
        };

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT),
            usage,
            mapped_at_creation,
        });
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        if let Some(err) = out_of_memory.or(validation) {
            buffer.destroy();
            return Err(TerrainError::Allocation(format!("'{label}': {err}")));
        }

        let handle = BufferHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.registry().insert(
            handle,
            TrackedBuffer {
                buffer,
                analytics: BufferAnalytics {
                    allocated_memory: size,
                    ..Default::default()
                },
                mapped: mapped_at_creation,
            },
        );
        Ok(handle)
    }

    fn write_mapped(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> TerrainResult<()> {
        let mut registry = self.registry();
        let tracked = registry
            .get_mut(&buffer)
            .ok_or(TerrainError::UnknownBuffer(buffer))?;

        let end = offset + data.len() as u64;
        if end > tracked.analytics.allocated_memory {
            return Err(TerrainError::BufferAccess(format!(
                "write of {} bytes at {} overflows a {} byte buffer",
                data.len(),
                offset,
                tracked.analytics.allocated_memory
            )));
        }
        if !tracked.mapped {
            return Err(TerrainError::BufferAccess(format!("{buffer:?} is not mapped")));
        }

        tracked
            .buffer
            .slice(offset..end)
            .get_mapped_range_mut()
            .copy_from_slice(data);

        tracked.analytics.used_memory = tracked.analytics.used_memory.max(end);
        tracked.analytics.times_written += 1;
        Ok(())
    }

    fn unmap(&self, buffer: BufferHandle) -> TerrainResult<()> {
        let mut registry = self.registry();
        let tracked = registry
            .get_mut(&buffer)
            .ok_or(TerrainError::UnknownBuffer(buffer))?;
        if tracked.mapped {
            tracked.buffer.unmap();
            tracked.mapped = false;
        }
        Ok(())
    }

    fn copy_buffer(
        &self,
        pool: &mut WgpuTransferPool,
        src: BufferHandle,
        dst: BufferHandle,
        size: u64,
    ) -> TerrainResult<()> {
        let source = self.lookup(src)?;
        let destination = self.lookup(dst)?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(pool.label.as_str()),
            });
        encoder.copy_buffer_to_buffer(&source, 0, &destination, 0, size);
        let index = self.queue.submit(Some(encoder.finish()));
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(TerrainError::Submission(err.to_string()));
        }

        self.device
            .poll(wgpu::PollType::WaitForSubmissionIndex(index))
            .map_err(|err| TerrainError::Submission(err.to_string()))?;

        pool.submissions += 1;
        Ok(())
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        // Dropping rather than calling `destroy()`: a replaced chunk buffer may still be
        // referenced by a render pass that has not been submitted yet.
        if let Some(tracked) = self.registry().remove(&buffer) {
            log::trace!(
                "Releasing {:?} ({} bytes, {} writes)",
                buffer,
                tracked.analytics.allocated_memory,
                tracked.analytics.times_written
            );
        }
    }
}
