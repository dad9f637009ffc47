//! # Voxel World Core
//!
//! This module contains the voxel side of the engine: what blocks are, how
//! chunks store them, how terrain is generated, and how the world streams
//! chunks around the player.
//!
//! ## Architecture
//!
//! * **Block**: Block ids, the static registry and the immutable block table
//! * **Chunk**: Sparse per-column voxel grids and the chunk lifecycle
//! * **Terrain**: Seeded height field and grid decoration (trees, lakes)
//! * **Tasks**: The terrain worker protocol
//! * **World**: The chunk manager coordinating everything above
//!
//! ## Data Flow
//!
//! 1. The world decides which chunks must exist around the player
//! 2. Terrain workers generate their grids
//! 3. Grids are stored into chunks and handed to mesh workers
//! 4. Finished geometry is attached to the scene graph

pub mod block;
pub mod chunk;
pub mod tasks;
pub mod terrain;
pub mod world;
