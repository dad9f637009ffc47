//! # Camera State Management
//!
//! This module handles the camera-related functionality the chunk pipeline
//! needs:
//! - Camera position and orientation tracking
//! - View and projection matrix calculations
//! - Chunk visibility determination from the view volume
//!
//! ## Core Components
//! - `Camera`: Represents the camera's position and orientation in 3D space
//! - `Projection`: Manages the camera's projection matrix
//! - `Frustum`: Clipping planes used to cull chunks outside the view
//! - `Aabb`: World-space bounds of a chunk column

pub mod camera;
pub mod frustum;

pub use camera::{view_projection, Camera, Projection};
pub use frustum::{Aabb, Frustum};
