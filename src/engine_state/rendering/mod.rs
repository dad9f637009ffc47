//! Rendering side of the voxel engine.
//!
//! This module turns chunk grids into renderer-agnostic geometry and hands it
//! to a scene graph. It does not draw anything itself.
//!
//! - [`meshing`]: The greedy mesher and the geometry types it produces
//! - [`tasks`]: Mesh workers and the pool strategy that runs them
//! - [`scene`]: The attach points a host renderer implements

pub mod meshing;
pub mod scene;
pub mod tasks;

pub use scene::{HeadlessScene, SceneGraph};
