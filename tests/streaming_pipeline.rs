//! End-to-end behaviour of the streaming pipeline against the host-memory backend.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use cgmath::Point3;
use voxel_terrain::engine_state::{
    config::TerrainConfig,
    error::{TerrainError, TerrainResult},
    gpu::{
        headless_backend::HeadlessCommandPool, BufferHandle, BufferUsage, GraphicsBackend,
        HeadlessBackend, MemoryKind,
    },
    rendering::ChunkDraw,
    task_management::TaskQueue,
    voxels::{
        block::{BlockSide, BlockType},
        chunk::ChunkStage,
        spatial_key::SpatialKey,
        terrain::{StreamingReport, Terrain},
    },
};

fn config(create_radius: i32, draw_radius: i32) -> TerrainConfig {
    TerrainConfig {
        worker_threads: 4,
        command_pool_slots: 2,
        create_radius,
        draw_radius,
        ..TerrainConfig::default()
    }
}

/// Runs update steps until the pipeline has nothing left to do, summing the reports.
fn settle<B: GraphicsBackend>(terrain: &Terrain<B>, observer: Point3<f32>) -> StreamingReport {
    let mut total = StreamingReport::default();
    for _ in 0..16 {
        let report = terrain.update(observer).unwrap();
        terrain.wait_for_workers();
        total.zones_dispatched += report.zones_dispatched;
        total.meshes_dispatched += report.meshes_dispatched;
        total.chunks_uploaded += report.chunks_uploaded;
        total.uploads_deferred += report.uploads_deferred;
        total.uploads_retried += report.uploads_retried;
        total.uploads_failed += report.uploads_failed;
        if report.is_idle() && terrain.stats().pending == 0 && terrain.stats().drawable == 0 {
            break;
        }
    }
    total
}

/// Delegates to a [`HeadlessBackend`] but fails on demand.
struct FailingBackend {
    inner: HeadlessBackend,
    /// Device buffers whose label contains this text cannot be allocated.
    refuse_label: Option<&'static str>,
    /// Number of copies that fail before copies start succeeding.
    failing_copies: AtomicUsize,
}

impl FailingBackend {
    fn refusing(label: &'static str) -> Self {
        Self {
            inner: HeadlessBackend::new(),
            refuse_label: Some(label),
            failing_copies: AtomicUsize::new(0),
        }
    }

    fn flaky_copies(count: usize) -> Self {
        Self {
            inner: HeadlessBackend::new(),
            refuse_label: None,
            failing_copies: AtomicUsize::new(count),
        }
    }
}

impl GraphicsBackend for FailingBackend {
    type CommandPool = HeadlessCommandPool;

    fn create_command_pool(&self, label: &str) -> TerrainResult<HeadlessCommandPool> {
        self.inner.create_command_pool(label)
    }

    fn destroy_command_pool(&self, pool: HeadlessCommandPool) {
        self.inner.destroy_command_pool(pool)
    }

    fn create_buffer(
        &self,
        label: &str,
        size: u64,
        usage: BufferUsage,
        memory: MemoryKind,
    ) -> TerrainResult<BufferHandle> {
        if memory == MemoryKind::DeviceLocal
            && self.refuse_label.is_some_and(|refused| label.contains(refused))
        {
            return Err(TerrainError::Allocation(format!("{label}: out of device memory")));
        }
        self.inner.create_buffer(label, size, usage, memory)
    }

    fn write_mapped(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> TerrainResult<()> {
        self.inner.write_mapped(buffer, offset, data)
    }

    fn unmap(&self, buffer: BufferHandle) -> TerrainResult<()> {
        self.inner.unmap(buffer)
    }

    fn copy_buffer(
        &self,
        pool: &mut HeadlessCommandPool,
        src: BufferHandle,
        dst: BufferHandle,
        size: u64,
    ) -> TerrainResult<()> {
        let failing = self
            .failing_copies
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TerrainError::Submission("device lost".into()));
        }
        self.inner.copy_buffer(pool, src, dst, size)
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        self.inner.destroy_buffer(buffer)
    }
}

#[test]
fn two_by_two_chunks_link_laterally_only() {
    let terrain = Terrain::new(Arc::new(HeadlessBackend::new()), config(0, 0)).unwrap();
    for (x, z) in [(0, 0), (16, 0), (0, 16), (16, 16)] {
        terrain.instantiate_chunk_at(x, z).unwrap();
    }

    for (x, z) in [(0, 0), (16, 0), (0, 16), (16, 16)] {
        let chunk = terrain.get_chunk_at(x, z).unwrap();
        let chunk = chunk.get();
        assert_eq!(chunk.neighbor_count(), 2, "chunk ({x}, {z})");
        for side in BlockSide::lateral() {
            if let Some(neighbor) = chunk.neighbor(side) {
                let (nx, nz) = neighbor.decode();
                assert_eq!((nx - x).abs() + (nz - z).abs(), 16, "no diagonal links");
            }
        }
    }
}

#[test]
fn zones_are_dispatched_once() {
    let terrain = Terrain::new(Arc::new(HeadlessBackend::new()), config(1, 1)).unwrap();
    let observer = Point3::new(5.0, 130.0, 5.0);

    assert_eq!(terrain.update(observer).unwrap().zones_dispatched, 9);
    assert_eq!(terrain.update(observer).unwrap().zones_dispatched, 0);
    // Still inside the same zone.
    assert_eq!(
        terrain
            .update(Point3::new(60.0, 130.0, 1.0))
            .unwrap()
            .zones_dispatched,
        0
    );
    // One zone east: only the new column of three zones.
    assert_eq!(
        terrain
            .update(Point3::new(70.0, 130.0, 1.0))
            .unwrap()
            .zones_dispatched,
        3
    );

    terrain.wait_for_workers();
    assert_eq!(terrain.stats().generated_zones, 12);
    assert_eq!(terrain.stats().chunks, 12 * 16);
}

#[test]
fn streamed_chunks_are_uploaded_and_drawn() {
    let backend = Arc::new(HeadlessBackend::new());
    let terrain = Terrain::new(backend.clone(), config(1, 1)).unwrap();
    let observer = Point3::new(-10.0, 130.0, 20.0);

    let report = settle(&terrain, observer);
    assert_eq!(report.zones_dispatched, 9);
    assert_eq!(report.meshes_dispatched, 144);
    assert_eq!(report.chunks_uploaded, 144);
    assert_eq!(report.uploads_failed, 0);

    let stats = terrain.stats();
    assert_eq!(stats.uploaded, 144);
    assert_eq!(backend.live_buffers(), 144);

    let mut draws: Vec<ChunkDraw> = Vec::new();
    assert_eq!(terrain.draw(observer, &mut draws), 144);

    for draw in &draws {
        let bytes = backend.read_buffer(draw.buffer).unwrap();
        assert_eq!(bytes.len() as u64, draw.index_offset + 4 * draw.index_count as u64);
        assert_eq!(backend.memory_kind(draw.buffer), Some(MemoryKind::DeviceLocal));
    }

    // Every chunk is a single 16 × 16 layer: top, bottom and the four outer walls.
    let draw = draws
        .iter()
        .find(|d| d.key == SpatialKey::encode(-64, 0))
        .unwrap();
    let faces = 2 * 256 + 4 * 16;
    assert_eq!(draw.index_count as usize, faces * 6);

    // Zone boundaries are stone stripes, on both sides of the origin.
    assert_eq!(terrain.get_block_at(-64, 128, 5).unwrap(), BlockType::STONE);
    assert_eq!(terrain.get_block_at(-63, 128, -64).unwrap(), BlockType::STONE);
    assert_eq!(terrain.get_block_at(-63, 128, 5).unwrap(), BlockType::GRASS);
}

#[test]
fn draw_skips_chunks_that_are_not_ready() {
    let backend = Arc::new(HeadlessBackend::new());
    let terrain = Terrain::new(backend.clone(), config(0, 0)).unwrap();
    let observer = Point3::new(1.0, 130.0, 1.0);
    let mut draws: Vec<ChunkDraw> = Vec::new();

    // Generated but not meshed.
    terrain.update(observer).unwrap();
    terrain.wait_for_workers();
    assert_eq!(terrain.stats().chunks, 16);
    assert_eq!(terrain.draw(observer, &mut draws), 0);

    // Meshed but not uploaded.
    terrain.update(observer).unwrap();
    terrain.wait_for_workers();
    assert_eq!(terrain.draw(observer, &mut draws), 0);
    assert_eq!(backend.live_buffers(), 0);

    terrain.update(observer).unwrap();
    assert_eq!(terrain.draw(observer, &mut draws), 16);

    // Absent chunks are skipped, not errors.
    draws.clear();
    assert_eq!(terrain.draw_bounds((1000, 1000), (1100, 1100), &mut draws), 0);
    assert_eq!(terrain.draw_zone(-1, -1, &mut draws), 0);
    assert_eq!(terrain.draw_bounds((-5, -5), (20, 20), &mut draws), 4);
    assert!(draws.iter().all(|d| d.index_count > 0));
}

#[test]
fn an_all_empty_chunk_is_never_drawn() {
    let backend = Arc::new(HeadlessBackend::new());
    let terrain = Terrain::new(backend.clone(), config(0, 0)).unwrap();
    let observer = Point3::new(1.0, 130.0, 1.0);
    settle(&terrain, observer);

    // Clear one chunk's layer entirely.
    for x in 16..32 {
        for z in 0..16 {
            terrain.set_block_at(x, 128, z, BlockType::EMPTY).unwrap();
        }
    }
    settle(&terrain, observer);

    let chunk = terrain.get_chunk_at(16, 0).unwrap();
    assert_eq!(chunk.get().stage(), ChunkStage::Uploaded);
    assert!(chunk.get().buffer().is_none());
    assert_eq!(backend.live_buffers(), 15);

    let mut draws: Vec<ChunkDraw> = Vec::new();
    assert_eq!(terrain.draw(observer, &mut draws), 15);
}

#[test]
fn a_failing_chunk_does_not_block_the_others() {
    let backend = Arc::new(FailingBackend::refusing("Chunk (16, 16)"));
    let config = TerrainConfig {
        max_upload_attempts: 2,
        ..config(0, 0)
    };
    let terrain = Terrain::new(backend.clone(), config).unwrap();
    let observer = Point3::new(1.0, 130.0, 1.0);

    let report = settle(&terrain, observer);
    assert_eq!(report.chunks_uploaded, 15);
    assert_eq!(report.uploads_retried, 1);
    assert_eq!(report.uploads_failed, 1);

    let failed = terrain.get_chunk_at(16, 16).unwrap();
    assert_eq!(failed.get().stage(), ChunkStage::Meshed);
    assert!(failed.get().buffer().is_none());
    assert!(failed.get().mesh().is_some());

    // No staging buffer leaked from the failed attempts.
    assert_eq!(backend.inner.live_buffers(), 15);

    let mut draws: Vec<ChunkDraw> = Vec::new();
    assert_eq!(terrain.draw(observer, &mut draws), 15);
    assert!(draws.iter().all(|d| d.key != SpatialKey::encode(16, 16)));
}

#[test]
fn transient_submission_failures_are_retried() {
    let backend = Arc::new(FailingBackend::flaky_copies(3));
    let terrain = Terrain::new(backend.clone(), config(0, 0)).unwrap();

    let report = settle(&terrain, Point3::new(1.0, 130.0, 1.0));
    assert_eq!(report.uploads_retried, 3);
    assert_eq!(report.uploads_failed, 0);
    assert_eq!(report.chunks_uploaded, 16);
    assert_eq!(backend.inner.live_buffers(), 16);
}

#[test]
fn shutdown_joins_workers_before_releasing_buffers() {
    let backend = Arc::new(HeadlessBackend::new());
    let mut terrain = Terrain::new(backend.clone(), config(1, 1)).unwrap();
    settle(&terrain, Point3::new(0.0, 130.0, 0.0));
    // Leave generation in flight for a second batch of zones.
    terrain.update(Point3::new(300.0, 130.0, 0.0)).unwrap();

    terrain.shutdown();
    assert_eq!(backend.live_buffers(), 0);
    assert_eq!(backend.live_command_pools(), 0);
    assert_eq!(terrain.stats().queued_jobs, 0);
}

#[test]
fn dropping_the_terrain_releases_resources() {
    let backend = Arc::new(HeadlessBackend::new());
    {
        let terrain = Terrain::new(backend.clone(), config(0, 0)).unwrap();
        settle(&terrain, Point3::new(0.0, 130.0, 0.0));
        assert_eq!(backend.live_buffers(), 16);
    }
    assert_eq!(backend.live_buffers(), 0);
    assert_eq!(backend.live_command_pools(), 0);
}

#[test]
fn concurrently_enqueued_jobs_each_run_once() {
    let queue = Arc::new(TaskQueue::new(8).unwrap());
    let runs = Arc::new(AtomicUsize::new(0));

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let queue = queue.clone();
            let runs = runs.clone();
            std::thread::spawn(move || {
                for _ in 0..250 {
                    let runs = runs.clone();
                    queue
                        .execute("increment", move || {
                            runs.fetch_add(1, Ordering::SeqCst);
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    queue.shutdown();
    assert_eq!(runs.load(Ordering::SeqCst), 1000);
}

#[test]
fn invalid_configuration_creates_nothing() {
    let backend = Arc::new(HeadlessBackend::new());
    let result = Terrain::new(backend.clone(), config(0, 1));
    assert!(matches!(result, Err(TerrainError::InvalidConfig(_))));
    assert_eq!(backend.live_command_pools(), 0);
}
