//! # Core Module
//!
//! Concurrency primitives shared by the terrain pipeline.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource with read-write locking
//! - `ConcurrentMap`: Lock-protected hash map with atomic insert-if-absent
//!
//! ## Usage
//! ```rust
//! use voxel_terrain::core::{ConcurrentMap, MtResource};
//!
//! let counter = MtResource::new(0);
//! *counter.get_mut() += 1;
//! assert_eq!(*counter.get(), 1);
//!
//! let zones: ConcurrentMap<i64, ()> = ConcurrentMap::new();
//! assert!(zones.insert_if_absent(0, ()));
//! assert!(!zones.insert_if_absent(0, ()));
//! ```

pub mod concurrent_map;
pub mod mt_resource;

pub use concurrent_map::ConcurrentMap;
pub use mt_resource::MtResource;
