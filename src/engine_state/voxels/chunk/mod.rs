//! # Chunk Module
//!
//! This module provides the `Chunk` entity: one `(x, z)` column of the world
//! holding its realized voxel grid, its water cells and the geometry derived
//! from them.
//!
//! ## Lifecycle
//!
//! ```text
//! created (empty) ──▶ is_generating ──▶ is_generated ──▶ is_building_mesh ──▶ mesh current
//!                                            ▲                                     │
//!                                            └──────────── grid edited ◀───────────┘
//! ```
//!
//! A chunk only ever changes on the chunk manager's thread, either when a
//! worker result is applied or through a direct edit.
//!
//! ## Revisions
//!
//! Every grid change bumps a revision counter. A mesh request records the
//! revision it was built from; the chunk is mesh current only while that
//! revision is still the latest. An edit that lands while a mesh is in flight
//! therefore leaves the chunk dirty once the stale mesh arrives.

use serde::{Deserialize, Serialize};

use crate::engine_state::camera_state::frustum::Aabb;
use crate::engine_state::rendering::meshing::mesh::ChunkGeometry;

use super::block::{BlockId, BlockTable, AIR};

pub mod coords;
pub mod voxel_grid;

pub use coords::{world_to_chunk, ChunkCoord, LocalKey};
pub use voxel_grid::{GridEntry, VoxelGrid};

/// Number of random columns tried by [`Chunk::find_spawn_location`].
pub const SPAWN_ATTEMPTS: usize = 100;

/// A water cell of a chunk, tagged with whether it is the surface of its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterBlock {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub is_top_water: bool,
}

/// One column of the voxel world.
pub struct Chunk {
    /// Position of this chunk in chunk coordinates.
    pub coord: ChunkCoord,
    grid: VoxelGrid,
    water_blocks: Vec<WaterBlock>,
    geometry: Option<ChunkGeometry>,
    /// A terrain request for this chunk is in flight.
    pub is_generating: bool,
    /// The grid holds generated terrain.
    pub is_generated: bool,
    /// A mesh request for this chunk is in flight.
    pub is_building_mesh: bool,
    /// Whether the chunk's geometry is currently shown in the scene.
    pub is_visible: bool,
    revision: u64,
    meshed_revision: Option<u64>,
}

impl Chunk {
    /// Creates an empty, ungenerated chunk.
    pub fn new(coord: ChunkCoord, size: i32, height: i32) -> Self {
        Chunk {
            coord,
            grid: VoxelGrid::new(size, height),
            water_blocks: Vec::new(),
            geometry: None,
            is_generating: false,
            is_generated: false,
            is_building_mesh: false,
            is_visible: false,
            revision: 0,
            meshed_revision: None,
        }
    }

    pub fn size(&self) -> i32 {
        self.grid.size()
    }

    pub fn height(&self) -> i32 {
        self.grid.height()
    }

    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    pub fn water_blocks(&self) -> &[WaterBlock] {
        &self.water_blocks
    }

    pub fn geometry(&self) -> Option<&ChunkGeometry> {
        self.geometry.as_ref()
    }

    /// A generation or mesh request is outstanding; the chunk must not be unloaded.
    pub fn is_busy(&self) -> bool {
        self.is_generating || self.is_building_mesh
    }

    /// The grid changed since the last applied mesh.
    pub fn is_dirty(&self) -> bool {
        self.is_generated && self.meshed_revision != Some(self.revision)
    }

    /// The chunk has terrain and no mesh request in flight, but its mesh is missing or stale.
    pub fn needs_mesh(&self) -> bool {
        !self.is_building_mesh && self.is_dirty()
    }

    /// Whether the applied geometry matches the current grid.
    pub fn is_mesh_current(&self) -> bool {
        self.is_generated && self.meshed_revision == Some(self.revision)
    }

    /// Forces a remesh on the next dispatch pass.
    pub fn mark_dirty(&mut self) {
        self.revision += 1;
    }

    /// Stores a generated grid received from a terrain worker.
    pub fn apply_terrain(&mut self, grid: VoxelGrid, water_blocks: Vec<WaterBlock>) {
        self.grid = grid;
        self.water_blocks = water_blocks;
        self.is_generating = false;
        self.is_generated = true;
        self.revision += 1;
    }

    /// Marks a mesh request as dispatched and returns the revision it captures.
    pub fn begin_mesh(&mut self) -> u64 {
        self.is_building_mesh = true;
        self.revision
    }

    /// Stores geometry received from a mesh worker.
    ///
    /// # Arguments
    /// * `geometry` - The built geometry
    /// * `revision` - The revision captured when the request was dispatched
    ///
    /// # Returns
    /// `true` if the geometry matches the current grid; `false` if the grid was
    /// edited while the mesh was being built (the chunk stays dirty).
    pub fn apply_mesh(&mut self, geometry: ChunkGeometry, revision: u64) -> bool {
        self.is_building_mesh = false;
        self.geometry = Some(geometry);
        self.meshed_revision = Some(revision);
        revision == self.revision
    }

    pub fn get_block(&self, x: i32, y: i32, z: i32) -> BlockId {
        self.grid.get(x, y, z)
    }

    /// Writes a block in local coordinates, applying the grass rule.
    ///
    /// # Returns
    /// `false` if the coordinate lies outside the chunk.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, id: BlockId, table: &BlockTable) -> bool {
        if !self.grid.place(x, y, z, id, table) {
            return false;
        }
        self.revision += 1;
        true
    }

    /// Replaces the water cells after lakes were reclassified.
    pub fn set_water(&mut self, grid: VoxelGrid, water_blocks: Vec<WaterBlock>) {
        self.grid = grid;
        self.water_blocks = water_blocks;
        self.revision += 1;
    }

    /// The y of the topmost block in column `(x, z)`.
    pub fn get_highest_block(&self, x: i32, z: i32) -> Option<i32> {
        self.grid.highest_block(x, z)
    }

    /// World-space bounding box of the chunk column.
    pub fn bounds(&self) -> Aabb {
        let size = self.size() as f32;
        let min_x = self.coord.x as f32 * size;
        let min_z = self.coord.z as f32 * size;
        Aabb::new(
            [min_x, 0.0, min_z],
            [min_x + size, self.height() as f32, min_z + size],
        )
    }

    /// Picks a world-space position where an object `clearance` blocks tall can stand.
    ///
    /// Tries random interior columns whose top block is solid and has
    /// `clearance` air cells above it. Falls back to the centre of the chunk at
    /// half height when no column qualifies.
    pub fn find_spawn_location(
        &self,
        rng: &mut fastrand::Rng,
        clearance: i32,
        table: &BlockTable,
    ) -> [f64; 3] {
        let size = self.size();
        let origin_x = (self.coord.x * size) as f64;
        let origin_z = (self.coord.z * size) as f64;

        if size > 2 {
            for _ in 0..SPAWN_ATTEMPTS {
                let x = rng.i32(1..size - 1);
                let z = rng.i32(1..size - 1);
                let Some(y) = self.get_highest_block(x, z) else {
                    continue;
                };
                if table.is_transparent(self.get_block(x, y, z)) {
                    continue;
                }
                if (1..=clearance).all(|dy| self.get_block(x, y + dy, z) == AIR) {
                    return [
                        origin_x + x as f64 + 0.5,
                        y as f64 + clearance as f64 / 2.0,
                        origin_z + z as f64 + 0.5,
                    ];
                }
            }
        }

        [
            origin_x + size as f64 / 2.0,
            self.height() as f64 / 2.0,
            origin_z + size as f64 / 2.0,
        ]
    }
}
