//! Mesh generation for voxel chunks.
//!
//! This module converts a chunk's voxel grid into flat, renderer-agnostic
//! vertex buffers. It implements greedy meshing to reduce the number of quads
//! by combining coplanar faces of the same block.
//!
//! # Architecture
//! - [`Face`]: A merged rectangle of voxel faces on one slice
//! - [`MeshData`]: Flat position/normal/uv/index buffers of one batch
//! - [`ChunkGeometry`]: Every terrain batch of a chunk plus its water surface
//! - Greedy meshing: Algorithm that produces the faces
//!
//! # Usage
//! ```ignore
//! let geometry = build_chunk_geometry(&grid, &water_blocks, coord, &block_table);
//! for (key, batch) in &geometry.terrain {
//!     scene.upload(key, batch);
//! }
//! ```

mod face;
mod greedy;
mod mesh;

pub use face::Face;
pub use greedy::{build_chunk_geometry, create_greedy_mesh, face_visible, greedy_faces, material_for};
pub use mesh::*;
