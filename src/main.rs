//! # Voxel Terrain Demo Entry Point
//!
//! Streams terrain around a moving observer without a window and logs progress.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- [config.json]
//! ```

fn main() {
    if let Err(err) = voxel_terrain::run() {
        log::error!("{err}");
        std::process::exit(1);
    }
}
