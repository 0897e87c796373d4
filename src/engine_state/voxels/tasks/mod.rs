//! # Voxel Task System
//!
//! Background work on voxel data. Block generation runs on the task queue's workers so
//! the orchestrating thread only dispatches it.

pub(crate) mod chunk_generation_task;
