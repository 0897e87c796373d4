//! # Voxel Terrain
//!
//! Streaming core for an effectively infinite voxel world: chunk storage, face-culled
//! meshing, a worker pool for generation and meshing, and a staging → device upload
//! path that never blocks the render loop on another thread's work.
//!
//! ## Key Modules
//!
//! * `core` - Concurrency primitives shared by the pipeline
//! * `engine_state` - Terrain, chunks, tasks, GPU backends and configuration
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cgmath::Point3;
//! use voxel_terrain::engine_state::{
//!     config::TerrainConfig, gpu::HeadlessBackend, rendering::ChunkDraw, voxels::terrain::Terrain,
//! };
//!
//! let terrain = Terrain::new(Arc::new(HeadlessBackend::new()), TerrainConfig::default())?;
//! let observer = Point3::new(0.0, 130.0, 0.0);
//! let mut draws: Vec<ChunkDraw> = Vec::new();
//! terrain.update(observer)?;
//! terrain.draw(observer, &mut draws);
//! # Ok::<(), voxel_terrain::engine_state::error::TerrainError>(())
//! ```

use std::sync::Arc;

use cgmath::Point3;
use log::info;

use engine_state::{
    config::TerrainConfig,
    error::TerrainResult,
    gpu::{GraphicsBackend, HeadlessBackend, WgpuBackend},
    rendering::ChunkDraw,
    voxels::terrain::Terrain,
};

pub mod core;
pub mod engine_state;

/// Number of simulated frames the demo walks the observer for.
const DEMO_FRAMES: usize = 240;
/// Distance the observer moves along +X per frame.
const DEMO_SPEED: f32 = 1.5;

/// Runs the headless streaming demo.
///
/// The first command line argument, if present, names a JSON configuration file. The
/// demo prefers a real `wgpu` device and falls back to host memory when none is
/// available.
pub fn run() -> TerrainResult<()> {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized");

    let config = match std::env::args().nth(1) {
        Some(path) => TerrainConfig::from_file(path)?,
        None => TerrainConfig::default(),
    };
    log::debug!("Configuration: {}", serde_json::to_string(&config)?);

    match pollster::block_on(WgpuBackend::new_headless()) {
        Ok(backend) => stream(Arc::new(backend), config),
        Err(err) => {
            log::warn!("{err}; streaming into host memory instead");
            stream(Arc::new(HeadlessBackend::new()), config)
        }
    }
}

fn stream<B: GraphicsBackend>(backend: Arc<B>, config: TerrainConfig) -> TerrainResult<()> {
    let mut terrain = Terrain::new(backend, config)?;
    let mut draws: Vec<ChunkDraw> = Vec::new();
    let mut observer = Point3::new(0.5, 130.0, 0.5);

    for frame in 0..DEMO_FRAMES {
        observer.x += DEMO_SPEED;
        let report = terrain.update(observer)?;

        draws.clear();
        let drawn = terrain.draw(observer, &mut draws);

        if frame % 60 == 0 {
            info!(
                "Frame {frame}: observer x {:.1}, {drawn} chunks drawn, {:?}",
                observer.x, report
            );
        }
    }

    // Let the backlog drain so the final numbers are complete.
    loop {
        terrain.wait_for_workers();
        if terrain.update(observer)?.is_idle() {
            break;
        }
    }

    info!("Final terrain state: {:?}", terrain.stats());
    terrain.shutdown();
    Ok(())
}
