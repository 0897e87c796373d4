//! # Terrain Configuration
//!
//! Tunables for the streaming pipeline, loadable from JSON. Every field has a default, so a
//! configuration file only needs to name the values it changes:
//!
//! ```json
//! { "worker_threads": 8, "create_radius": 2 }
//! ```

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use super::error::{TerrainError, TerrainResult};
use super::voxels::chunk::CHUNK_HEIGHT;

/// Largest accepted `create_radius`/`draw_radius`, in zones. A radius of 64 already
/// covers 129 × 129 zones, over four million chunks.
pub const MAX_RADIUS: i32 = 64;

/// Configuration for [`Terrain`](super::voxels::terrain::Terrain).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Number of worker threads generating block data and meshes.
    pub worker_threads: usize,
    /// Number of transfer-command resources available to concurrent uploaders.
    pub command_pool_slots: usize,
    /// Zones (Chebyshev distance, zone units) around the observer that get block data.
    pub create_radius: i32,
    /// Zones around the observer that are drawn. Must not exceed `create_radius`.
    pub draw_radius: i32,
    /// How many times a chunk upload is attempted before the chunk is abandoned.
    pub max_upload_attempts: u32,
    /// Layer at which the placeholder generator places its surface blocks.
    pub surface_height: usize,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            worker_threads: 16,
            command_pool_slots: 16,
            create_radius: 1,
            draw_radius: 1,
            max_upload_attempts: 3,
            surface_height: 128,
        }
    }
}

impl TerrainConfig {
    /// Parses and validates a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> TerrainResult<Self> {
        let config: TerrainConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> TerrainResult<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        log::info!("Loading terrain configuration from {}", path.as_ref().display());
        Self::from_json_str(&contents)
    }

    /// Checks the invariants the streaming pipeline relies on.
    pub fn validate(&self) -> TerrainResult<()> {
        if self.worker_threads == 0 {
            return Err(TerrainError::InvalidConfig(
                "worker_threads must be at least 1".into(),
            ));
        }
        if self.command_pool_slots == 0 {
            return Err(TerrainError::InvalidConfig(
                "command_pool_slots must be at least 1".into(),
            ));
        }
        if self.create_radius < 0 || self.draw_radius < 0 {
            return Err(TerrainError::InvalidConfig(
                "radii must not be negative".into(),
            ));
        }
        if self.create_radius > MAX_RADIUS {
            return Err(TerrainError::InvalidConfig(format!(
                "create_radius ({}) exceeds the maximum of {MAX_RADIUS}",
                self.create_radius
            )));
        }
        if self.draw_radius > self.create_radius {
            return Err(TerrainError::InvalidConfig(format!(
                "draw_radius ({}) exceeds create_radius ({})",
                self.draw_radius, self.create_radius
            )));
        }
        if self.max_upload_attempts == 0 {
            return Err(TerrainError::InvalidConfig(
                "max_upload_attempts must be at least 1".into(),
            ));
        }
        if self.surface_height >= CHUNK_HEIGHT {
            return Err(TerrainError::InvalidConfig(format!(
                "surface_height must be below {CHUNK_HEIGHT}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = TerrainConfig::from_json_str(r#"{ "worker_threads": 4 }"#).unwrap();
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.command_pool_slots, 16);
        assert_eq!(config.surface_height, 128);
    }

    #[test]
    fn draw_radius_cannot_exceed_create_radius() {
        let result = TerrainConfig::from_json_str(r#"{ "create_radius": 1, "draw_radius": 2 }"#);
        assert!(matches!(result, Err(TerrainError::InvalidConfig(_))));
    }

    #[test]
    fn radii_are_capped() {
        let at_cap = TerrainConfig {
            create_radius: MAX_RADIUS,
            draw_radius: MAX_RADIUS,
            ..TerrainConfig::default()
        };
        assert!(at_cap.validate().is_ok());

        let result = TerrainConfig::from_json_str(r#"{ "create_radius": 40000 }"#);
        assert!(matches!(result, Err(TerrainError::InvalidConfig(_))));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let config = TerrainConfig {
            worker_threads: 0,
            ..TerrainConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let result = TerrainConfig::from_json_str("{ worker_threads: }");
        assert!(matches!(result, Err(TerrainError::ConfigParse(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = TerrainConfig::from_file("/nonexistent/terrain.json");
        assert!(matches!(result, Err(TerrainError::ConfigIo(_))));
    }
}
