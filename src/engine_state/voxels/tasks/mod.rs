//! # Voxel Task System
//!
//! This module contains the worker side of terrain generation: the messages
//! exchanged with terrain workers and the pool strategy that runs them.

pub mod terrain_task;

pub use terrain_task::{TerrainRequest, TerrainResponse, TerrainStrategy, TerrainWorker};
