//! # Meshing
//!
//! Turns voxel grids into geometry batches. See [`mesh`] for the greedy mesher.

pub mod mesh;
