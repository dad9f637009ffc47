//! Background tasks for the rendering system.
//!
//! Mesh generation is the expensive part of getting a chunk on screen, so it
//! runs on mesh workers fed by a buffer pool.
//!
//! # Available Tasks
//! - `MeshWorker`: Builds chunk geometry from a serialized grid

pub mod mesh_task;

pub use mesh_task::{ChunkData, MeshRequest, MeshResponse, MeshStrategy, MeshWorker};
