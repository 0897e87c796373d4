//! # Terrain Module
//!
//! `Terrain` streams the world around a moving observer. It owns the chunk index, the set
//! of zones whose generation has been dispatched, the hand-off queues between pipeline
//! stages, the worker pool and the transfer command pools.
//!
//! ## Pipeline
//!
//! ```text
//! update(observer)
//!   ├─ zones in create radius ──► ChunkGenerationTask (worker) ──► pending queue
//!   ├─ pending queue ───────────► ChunkMeshGenerationTask (worker) ──► drawable queue
//!   └─ drawable queue ──────────► upload on the calling thread ──► drawable by draw()
//! ```
//!
//! A zone is dispatched at most once: the generated-zone set is updated with an atomic
//! insert-if-absent. The pending and drawable queues carry chunk keys and are drained by
//! swapping out the whole list, so producers on worker threads only ever wait for a
//! single append.
//!
//! ## Uploads
//!
//! Uploads run on the thread calling [`Terrain::update`], one command pool slot per chunk.
//! When no slot is free the chunk simply waits for the next step. A failing upload is
//! logged and retried on later steps until `max_upload_attempts` is reached; it never
//! holds up the other chunks of the step.
//!
//! ## Teardown
//!
//! [`Terrain::shutdown`] (also run on drop) joins the workers first, then releases every
//! chunk buffer, then the command pools.

use std::{
    mem,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use cgmath::Point3;
use web_time::Instant;

use super::block::BlockType;
use super::chunk::{Chunk, ChunkStage, CHUNK_HEIGHT, CHUNK_WIDTH};
use super::chunk_index::ChunkIndex;
use super::generator::{StripedGenerator, TerrainGenerator};
use super::spatial_key::{chunk_origin, floor_align, zone_origin, SpatialKey, ZONE_WIDTH};
use super::tasks::chunk_generation_task::ChunkGenerationTask;
use crate::core::{ConcurrentMap, MtResource};
use crate::engine_state::{
    config::TerrainConfig,
    error::{TerrainError, TerrainResult},
    gpu::{CommandPoolManager, GraphicsBackend},
    rendering::{tasks::chunk_mesh_generation_task::ChunkMeshGenerationTask, ChunkDraw, DrawSubmitter},
    task_management::TaskQueue,
};

/// State shared between the orchestrating thread and the workers.
pub(crate) struct TerrainShared {
    pub(crate) index: ChunkIndex,
    pub(crate) generated_zones: ConcurrentMap<SpatialKey, ()>,
    pending: Mutex<Vec<SpatialKey>>,
    drawable: Mutex<Vec<SpatialKey>>,
    pub(crate) generator: Box<dyn TerrainGenerator>,
}

fn lock_queue(queue: &Mutex<Vec<SpatialKey>>) -> MutexGuard<'_, Vec<SpatialKey>> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TerrainShared {
    /// Queues a chunk for meshing.
    pub(crate) fn push_pending(&self, key: SpatialKey) {
        lock_queue(&self.pending).push(key);
    }

    /// Queues a chunk for upload.
    pub(crate) fn push_drawable(&self, key: SpatialKey) {
        lock_queue(&self.drawable).push(key);
    }

    fn take_pending(&self) -> Vec<SpatialKey> {
        mem::take(&mut *lock_queue(&self.pending))
    }

    fn take_drawable(&self) -> Vec<SpatialKey> {
        mem::take(&mut *lock_queue(&self.drawable))
    }
}

/// What one call to [`Terrain::update`] did.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct StreamingReport {
    /// Zones whose generation was dispatched
    pub zones_dispatched: usize,
    /// Chunks sent to the mesher
    pub meshes_dispatched: usize,
    /// Chunks whose geometry became drawable
    pub chunks_uploaded: usize,
    /// Chunks postponed because every command pool slot was busy
    pub uploads_deferred: usize,
    /// Failed uploads that will be retried
    pub uploads_retried: usize,
    /// Failed uploads that were abandoned
    pub uploads_failed: usize,
    /// Wall time spent in the step
    pub elapsed: Duration,
}

impl StreamingReport {
    /// Returns `true` if the step changed nothing.
    pub fn is_idle(&self) -> bool {
        self.zones_dispatched == 0
            && self.meshes_dispatched == 0
            && self.chunks_uploaded == 0
            && self.uploads_deferred == 0
            && self.uploads_retried == 0
            && self.uploads_failed == 0
    }
}

/// Snapshot of the terrain's size and pipeline backlog.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TerrainStats {
    /// Chunks in the index
    pub chunks: usize,
    /// Zones whose generation has been dispatched
    pub generated_zones: usize,
    /// Chunks waiting for the mesher
    pub pending: usize,
    /// Chunks waiting for upload
    pub drawable: usize,
    /// Chunks in the `Uploaded` stage
    pub uploaded: usize,
    /// Jobs waiting in the task queue
    pub queued_jobs: usize,
}

/// A streamed voxel world.
pub struct Terrain<B: GraphicsBackend> {
    backend: Arc<B>,
    config: TerrainConfig,
    shared: Arc<TerrainShared>,
    tasks: TaskQueue,
    command_pools: Option<CommandPoolManager<B::CommandPool>>,
}

impl<B: GraphicsBackend> Terrain<B> {
    /// Creates a terrain using the striped placeholder generator.
    pub fn new(backend: Arc<B>, config: TerrainConfig) -> TerrainResult<Self> {
        let generator = StripedGenerator::new(config.surface_height);
        Self::with_generator(backend, config, Box::new(generator))
    }

    /// Creates a terrain filled by `generator`.
    ///
    /// # Arguments
    ///
    /// * `backend` - Graphics backend the chunk geometry is uploaded to
    /// * `config` - Validated before anything is created
    /// * `generator` - Fills each new chunk with blocks
    ///
    /// # Returns
    ///
    /// The terrain, or the first configuration, command pool or worker spawn error.
    pub fn with_generator(
        backend: Arc<B>,
        config: TerrainConfig,
        generator: Box<dyn TerrainGenerator>,
    ) -> TerrainResult<Self> {
        config.validate()?;

        let command_pools = CommandPoolManager::new(&*backend, config.command_pool_slots)?;
        let tasks = match TaskQueue::new(config.worker_threads) {
            Ok(tasks) => tasks,
            Err(err) => {
                command_pools.destroy(&*backend);
                return Err(err);
            }
        };

        let shared = Arc::new(TerrainShared {
            index: ChunkIndex::new(),
            generated_zones: ConcurrentMap::new(),
            pending: Mutex::new(Vec::new()),
            drawable: Mutex::new(Vec::new()),
            generator,
        });

        log::info!(
            "Terrain ready: {} workers, {} command pools, create radius {}, draw radius {}",
            config.worker_threads,
            config.command_pool_slots,
            config.create_radius,
            config.draw_radius
        );

        Ok(Self {
            backend,
            config,
            shared,
            tasks,
            command_pools: Some(command_pools),
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// The graphics backend.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Advances the streaming pipeline by one step.
    ///
    /// Dispatches generation for every not-yet-generated zone within `create_radius` of
    /// the observer's zone, sends every pending chunk to the mesher and uploads every
    /// meshed chunk on the calling thread.
    ///
    /// # Returns
    ///
    /// A report of the step, or [`TerrainError::TaskQueueStopped`] after shutdown.
    pub fn update(&self, observer: Point3<f32>) -> TerrainResult<StreamingReport> {
        let Some(command_pools) = self.command_pools.as_ref() else {
            return Err(TerrainError::TaskQueueStopped);
        };

        let start = Instant::now();
        let mut report = StreamingReport::default();

        // Both hand-off lists are swapped out before any work is dispatched, so one step
        // advances a chunk by at most one stage.
        let pending = self.shared.take_pending();
        let drawable = self.shared.take_drawable();

        for zone in self.zones_around(observer, self.config.create_radius) {
            if self.shared.generated_zones.insert_if_absent(zone, ()) {
                self.tasks.enqueue(Box::new(ChunkGenerationTask::new(
                    self.shared.clone(),
                    zone,
                )))?;
                report.zones_dispatched += 1;
            }
        }

        for key in pending {
            self.tasks.enqueue(Box::new(ChunkMeshGenerationTask::new(
                self.shared.clone(),
                key,
            )))?;
            report.meshes_dispatched += 1;
        }

        let mut requeue = Vec::new();
        for key in drawable {
            let Some(chunk) = self.shared.index.get(key) else {
                continue;
            };

            let Some(mut pool) = command_pools.acquire() else {
                requeue.push(key);
                report.uploads_deferred += 1;
                continue;
            };

            let mut chunk = chunk.get_mut();
            // Edited since it was meshed; the mesher will send it back.
            if chunk.stage() != ChunkStage::Meshed {
                continue;
            }

            match chunk.upload_to_device(&*self.backend, &mut *pool) {
                Ok(()) => {
                    log::trace!("Uploaded chunk {:?}", key);
                    report.chunks_uploaded += 1;
                }
                Err(err) if chunk.upload_attempts() < self.config.max_upload_attempts => {
                    log::warn!(
                        "Upload of chunk {:?} failed (attempt {}): {err}",
                        key,
                        chunk.upload_attempts()
                    );
                    requeue.push(key);
                    report.uploads_retried += 1;
                }
                Err(err) => {
                    log::error!(
                        "Giving up on chunk {:?} after {} failed uploads: {err}",
                        key,
                        chunk.upload_attempts()
                    );
                    report.uploads_failed += 1;
                }
            }
        }
        for key in requeue {
            self.shared.push_drawable(key);
        }

        report.elapsed = start.elapsed();
        if !report.is_idle() {
            log::debug!("Streaming step: {:?}", report);
        }
        Ok(report)
    }

    /// Origins of the zones within `radius` (Chebyshev, zone units) of the observer's zone.
    /// Zones whose origin falls outside the `i32` range are left out.
    fn zones_around(&self, observer: Point3<f32>, radius: i32) -> Vec<SpatialKey> {
        let (center_x, center_z) =
            zone_origin(observer.x.floor() as i32, observer.z.floor() as i32);
        let radius = i64::from(radius.max(0));
        let side = (2 * radius + 1) as usize;

        let mut zones = Vec::with_capacity(side * side);
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                let x = i32::try_from(i64::from(center_x) + dx * i64::from(ZONE_WIDTH));
                let z = i32::try_from(i64::from(center_z) + dz * i64::from(ZONE_WIDTH));
                if let (Ok(x), Ok(z)) = (x, z) {
                    zones.push(SpatialKey::encode(x, z));
                }
            }
        }
        zones
    }

    /// Submits every ready chunk within `draw_radius` zones of the observer.
    ///
    /// # Returns
    ///
    /// The number of chunks submitted.
    pub fn draw(&self, observer: Point3<f32>, submitter: &mut dyn DrawSubmitter) -> usize {
        self.zones_around(observer, self.config.draw_radius)
            .into_iter()
            .map(|zone| {
                let (x, z) = zone.decode();
                self.draw_zone(x, z, submitter)
            })
            .sum()
    }

    /// Submits the ready chunks of the zone containing world column `(x, z)`.
    pub fn draw_zone(&self, x: i32, z: i32, submitter: &mut dyn DrawSubmitter) -> usize {
        let (zone_x, zone_z) = zone_origin(x, z);
        self.draw_bounds(
            (zone_x, zone_z),
            (zone_x + ZONE_WIDTH - 1, zone_z + ZONE_WIDTH - 1),
            submitter,
        )
    }

    /// Submits the ready chunks whose origin lies in the inclusive box `min..=max`,
    /// after aligning `min` down to a chunk origin.
    pub fn draw_bounds(
        &self,
        min: (i32, i32),
        max: (i32, i32),
        submitter: &mut dyn DrawSubmitter,
    ) -> usize {
        let (start_x, start_z) = chunk_origin(min.0, min.1);
        let mut submitted = 0;

        let mut z = start_z;
        while z <= max.1 {
            let mut x = start_x;
            while x <= max.0 {
                if self.draw_chunk(SpatialKey::encode(x, z), submitter) {
                    submitted += 1;
                }
                match x.checked_add(CHUNK_WIDTH) {
                    Some(next) => x = next,
                    None => break,
                }
            }
            match z.checked_add(CHUNK_WIDTH) {
                Some(next) => z = next,
                None => break,
            }
        }
        submitted
    }

    fn draw_chunk(&self, key: SpatialKey, submitter: &mut dyn DrawSubmitter) -> bool {
        let Some(chunk) = self.shared.index.get(key) else {
            return false;
        };
        let Some(buffer) = chunk.get().buffer().copied() else {
            return false;
        };
        if buffer.index_count == 0 {
            return false;
        }

        submitter.submit(ChunkDraw {
            key,
            buffer: buffer.handle,
            index_offset: buffer.index_offset,
            index_count: buffer.index_count,
        });
        true
    }

    /// Creates an empty chunk at a chunk-aligned origin and links it with its existing
    /// lateral neighbours. The chunk is not queued for meshing.
    pub fn instantiate_chunk_at(&self, min_x: i32, min_z: i32) -> TerrainResult<MtResource<Chunk>> {
        self.shared.index.instantiate_chunk_at(min_x, min_z)
    }

    /// Returns `true` if a chunk contains world column `(x, z)`.
    pub fn has_chunk_at(&self, x: i32, z: i32) -> bool {
        self.shared.index.has_chunk_at(x, z)
    }

    /// The chunk containing world column `(x, z)`.
    pub fn get_chunk_at(&self, x: i32, z: i32) -> TerrainResult<MtResource<Chunk>> {
        self.shared.index.get_chunk_at(x, z)
    }

    /// The block at world coordinates. Heights outside the world read as
    /// [`BlockType::EMPTY`]; a missing chunk is an error.
    pub fn get_block_at(&self, x: i32, y: i32, z: i32) -> TerrainResult<BlockType> {
        let chunk = self.get_chunk_at(x, z)?;
        if !(0..CHUNK_HEIGHT as i32).contains(&y) {
            return Ok(BlockType::EMPTY);
        }
        let chunk = chunk.get();
        chunk.get_block(x - chunk.min_x(), y, z - chunk.min_z())
    }

    /// Sets the block at world coordinates. An already meshed chunk is queued for
    /// re-meshing; it keeps drawing its previous geometry until the new upload lands.
    pub fn set_block_at(&self, x: i32, y: i32, z: i32, block_type: BlockType) -> TerrainResult<()> {
        if !(0..CHUNK_HEIGHT as i32).contains(&y) {
            return Err(TerrainError::BlockOutOfRange { x, y, z });
        }
        let chunk = self.get_chunk_at(x, z)?;

        let requeue = {
            let mut chunk = chunk.get_mut();
            let (local_x, local_z) = (x - chunk.min_x(), z - chunk.min_z());
            chunk.set_block(local_x, y, local_z, block_type)?;
            chunk.mark_modified()
        };
        if requeue {
            self.shared.push_pending(SpatialKey::encode(
                floor_align(x, CHUNK_WIDTH),
                floor_align(z, CHUNK_WIDTH),
            ));
        }
        Ok(())
    }

    /// Blocks until the workers have finished every queued job.
    pub fn wait_for_workers(&self) {
        self.tasks.wait_idle();
    }

    /// Current size and backlog of the pipeline.
    pub fn stats(&self) -> TerrainStats {
        let chunks = self.shared.index.chunks();
        TerrainStats {
            chunks: chunks.len(),
            generated_zones: self.shared.generated_zones.len(),
            pending: lock_queue(&self.shared.pending).len(),
            drawable: lock_queue(&self.shared.drawable).len(),
            uploaded: chunks
                .iter()
                .filter(|chunk| chunk.get().stage() == ChunkStage::Uploaded)
                .count(),
            queued_jobs: self.tasks.queued(),
        }
    }

    /// Stops the workers and releases every GPU resource the terrain owns.
    ///
    /// Calling this more than once is harmless; later calls to [`update`](Self::update)
    /// fail with [`TerrainError::TaskQueueStopped`].
    pub fn shutdown(&mut self) {
        let Some(command_pools) = self.command_pools.take() else {
            return;
        };

        self.tasks.shutdown();

        let mut released = 0;
        for chunk in self.shared.index.chunks() {
            if let Some(buffer) = chunk.get_mut().take_buffer() {
                self.backend.destroy_buffer(buffer.handle);
                released += 1;
            }
        }
        command_pools.destroy(&*self.backend);

        log::info!(
            "Terrain shut down: released {released} chunk buffers across {} chunks",
            self.shared.index.len()
        );
    }
}

impl<B: GraphicsBackend> Drop for Terrain<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
