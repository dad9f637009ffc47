//! # World Module
//!
//! This module provides the [`ChunkManager`], the single-threaded coordinator
//! of chunk streaming. It decides which chunks must exist around the player,
//! feeds the terrain and mesh pools, applies their results, and keeps the
//! scene graph in sync.
//!
//! ## Architecture
//!
//! The world uses a sparse storage approach: chunks live in a
//! `HashMap<ChunkCoord, Chunk>` and are created lazily the first time they
//! enter the active set. Workers never see a `Chunk`; they receive grids as
//! coordinate/id pairs and send new pairs back, and every grid is mutated on
//! the manager's thread only.
//!
//! ## Update Pass
//!
//! Each call to [`ChunkManager::update_chunks`] runs, in order:
//! 1. Drain worker results (terrain applied, geometry attached)
//! 2. Recompute the circular active set around the player
//! 3. Evict idle inactive chunks over the loaded-chunk cap (least recently used first)
//! 4. Re-queue dirty chunks, then clear the dirty set
//! 5. Dispatch terrain and mesh requests and pump both pools
//! 6. Frustum-cull the active chunks
//!
//! ## Unloading
//!
//! A chunk is never unloaded while a generation or mesh request for it is
//! outstanding. Deactivating a busy chunk defers detaching its geometry until
//! the request completes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use cgmath::Matrix4;
use log::{debug, error, info, warn};
use lru::LruCache;
use serde::Serialize;

use crate::config::{ConfigError, WorldConfig};
use crate::engine_state::{
    camera_state::Frustum,
    rendering::{
        scene::SceneGraph,
        tasks::{MeshRequest, MeshResponse, MeshStrategy},
    },
    task_management::BufferPool,
    voxels::{
        block::{block_side::BlockSide, BlockId, BlockTable, AIR},
        chunk::{world_to_chunk, Chunk, ChunkCoord, VoxelGrid},
        tasks::{TerrainRequest, TerrainResponse, TerrainStrategy},
        terrain::{fill_lakes, TerrainParams},
    },
};

/// Result of the last frustum pass.
///
/// # Fields
/// - `total`: Active chunks
/// - `visible`: Meshed active chunks inside the frustum
/// - `culled`: Meshed active chunks outside the frustum
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CullingStats {
    pub total: usize,
    pub visible: usize,
    pub culled: usize,
}

/// Coordinates chunk streaming, generation, meshing and culling.
pub struct ChunkManager<S: SceneGraph> {
    config: Arc<WorldConfig>,
    block_table: Arc<BlockTable>,
    chunks: HashMap<ChunkCoord, Chunk>,
    active: HashSet<ChunkCoord>,
    dirty: HashSet<ChunkCoord>,
    /// Deactivated while busy; geometry is detached once the chunk goes idle.
    deferred_detach: HashSet<ChunkCoord>,
    /// Access order of every loaded chunk, most recent first.
    access: LruCache<ChunkCoord, ()>,
    /// Revision each in-flight mesh request was built from.
    mesh_revisions: HashMap<ChunkCoord, u64>,
    terrain_pool: BufferPool<TerrainStrategy>,
    mesh_pool: BufferPool<MeshStrategy>,
    scene: S,
    center: Option<ChunkCoord>,
    view_projection: Option<Matrix4<f32>>,
    culling_stats: CullingStats,
    rng: fastrand::Rng,
}

impl<S: SceneGraph> ChunkManager<S> {
    /// Creates a manager with no chunks loaded. Workers are started lazily,
    /// the first time each pool has work.
    ///
    /// # Arguments
    /// * `config` - World parameters; validated here
    /// * `block_table` - Shared block table handed to every worker
    /// * `scene` - Receives chunk geometry
    pub fn new(config: Arc<WorldConfig>, block_table: Arc<BlockTable>, scene: S) -> Result<Self, ConfigError> {
        config.validate()?;

        let params = TerrainParams::new(&config, Arc::clone(&block_table));
        let terrain_pool = BufferPool::new(TerrainStrategy::new(params), config.terrain_workers);
        let mesh_pool = BufferPool::new(MeshStrategy::new(Arc::clone(&block_table)), config.mesh_workers);

        info!(
            "Chunk manager ready: seed {}, {}x{} chunks, render distance {}, cap {}",
            config.seed,
            config.chunk_size,
            config.chunk_height,
            config.render_distance,
            config.loaded_chunk_limit()
        );

        Ok(ChunkManager {
            rng: fastrand::Rng::with_seed(config.seed as u64),
            config,
            block_table,
            chunks: HashMap::new(),
            active: HashSet::new(),
            dirty: HashSet::new(),
            deferred_detach: HashSet::new(),
            access: LruCache::unbounded(),
            mesh_revisions: HashMap::new(),
            terrain_pool,
            mesh_pool,
            scene,
            center: None,
            view_projection: None,
            culling_stats: CullingStats::default(),
        })
    }

    /// Runs one full update pass for a player at world position `(player_x, player_z)`.
    pub fn update_chunks(&mut self, player_x: f64, player_z: f64) {
        self.process_results();

        let center = ChunkCoord::containing(player_x, player_z, self.config.chunk_size);
        if self.center != Some(center) {
            debug!("Player entered chunk {}", center);
        }
        self.center = Some(center);

        self.stream_around(center);
        self.enforce_chunk_limit();
        self.update_dirty_chunks();
        self.dispatch();

        if self.view_projection.is_some() {
            self.perform_frustum_culling();
        }
    }

    /// Recomputes the active set and attaches or detaches geometry accordingly.
    fn stream_around(&mut self, center: ChunkCoord) {
        let radius = self.config.render_distance;
        let max_dist_sq = i64::from(radius) * i64::from(radius);
        let mut next_active = HashSet::new();

        for dx in -radius..=radius {
            for dz in -radius..=radius {
                let coord = center.offset(dx, dz);
                if coord.distance_squared(center) > max_dist_sq {
                    continue;
                }
                self.ensure_chunk(coord);
                next_active.insert(coord);
                if !self.active.contains(&coord) {
                    self.activate_chunk(coord);
                }
            }
        }

        let leaving: Vec<ChunkCoord> = self.active.difference(&next_active).copied().collect();
        self.active = next_active;
        for coord in leaving {
            self.deactivate_chunk(coord);
        }

        let settled: Vec<ChunkCoord> = self
            .deferred_detach
            .iter()
            .copied()
            .filter(|coord| self.active.contains(coord) || !self.chunks.get(coord).is_some_and(Chunk::is_busy))
            .collect();
        for coord in settled {
            self.deferred_detach.remove(&coord);
            if !self.active.contains(&coord) {
                self.scene.detach(coord);
            }
        }
    }

    fn ensure_chunk(&mut self, coord: ChunkCoord) -> &mut Chunk {
        self.access.put(coord, ());
        let (size, height) = (self.config.chunk_size, self.config.chunk_height);
        self.chunks
            .entry(coord)
            .or_insert_with(|| Chunk::new(coord, size, height))
    }

    fn activate_chunk(&mut self, coord: ChunkCoord) {
        self.deferred_detach.remove(&coord);
        if let Some(geometry) = self.chunks.get(&coord).and_then(Chunk::geometry) {
            self.scene.attach(coord, geometry);
        }
    }

    fn deactivate_chunk(&mut self, coord: ChunkCoord) {
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return;
        };
        let was_visible = std::mem::replace(&mut chunk.is_visible, false);
        if chunk.is_busy() {
            // Hidden now, detached once the outstanding request settles.
            if was_visible {
                self.scene.set_visible(coord, false);
            }
            self.deferred_detach.insert(coord);
            return;
        }
        if chunk.geometry().is_some() {
            self.scene.detach(coord);
        }
    }

    /// Re-queues dirty chunks for meshing, then clears the dirty set.
    fn update_dirty_chunks(&mut self) {
        for coord in self.dirty.drain() {
            if let Some(chunk) = self.chunks.get_mut(&coord) {
                if chunk.is_generated {
                    chunk.mark_dirty();
                }
            }
        }
    }

    /// Queues terrain for active chunks without it (nearest first, up to the
    /// in-flight cap) and meshes for active chunks whose mesh is stale, then
    /// pumps both pools.
    fn dispatch(&mut self) {
        let center = self.center.unwrap_or(ChunkCoord::new(0, 0));
        let mut in_flight = self.chunks.values().filter(|chunk| chunk.is_generating).count();

        let mut missing: Vec<ChunkCoord> = self
            .active
            .iter()
            .copied()
            .filter(|coord| {
                self.chunks
                    .get(coord)
                    .is_some_and(|chunk| !chunk.is_generated && !chunk.is_generating)
            })
            .collect();
        missing.sort_unstable_by_key(|coord| (coord.distance_squared(center), *coord));

        for coord in missing {
            if in_flight >= self.config.max_generations_in_flight {
                break;
            }
            if let Some(chunk) = self.chunks.get_mut(&coord) {
                chunk.is_generating = true;
                self.terrain_pool.add(coord, TerrainRequest::generate(coord));
                in_flight += 1;
            }
        }

        let stale: Vec<ChunkCoord> = self
            .active
            .iter()
            .copied()
            .filter(|coord| self.chunks.get(coord).is_some_and(Chunk::needs_mesh))
            .collect();
        for coord in stale {
            self.request_mesh(coord);
        }

        self.terrain_pool.update_workers();
        self.mesh_pool.update_workers();
    }

    fn request_mesh(&mut self, coord: ChunkCoord) -> bool {
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return false;
        };
        if !chunk.needs_mesh() {
            return false;
        }
        let revision = chunk.begin_mesh();
        self.mesh_revisions.insert(coord, revision);
        self.mesh_pool.add(coord, MeshRequest::build(chunk));
        true
    }

    /// Drains both pools and applies every result, then pumps them again.
    ///
    /// # Returns
    /// The number of results applied.
    pub fn process_results(&mut self) -> usize {
        let mut terrain = Vec::new();
        self.terrain_pool
            .process_completed(|coord, response| terrain.push((coord, response)));
        let mut meshes = Vec::new();
        self.mesh_pool
            .process_completed(|coord, response| meshes.push((coord, response)));

        let handled = terrain.len() + meshes.len();
        for (coord, response) in terrain {
            self.on_terrain(coord, response);
        }
        for (coord, response) in meshes {
            self.on_mesh(coord, response);
        }

        if handled > 0 {
            self.terrain_pool.update_workers();
            self.mesh_pool.update_workers();
        }
        handled
    }

    fn on_terrain(&mut self, coord: ChunkCoord, response: TerrainResponse) {
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            warn!("Received terrain for unknown chunk {}", coord);
            return;
        };

        match response {
            TerrainResponse::ChunkGenerated {
                chunk_id,
                grid,
                water_blocks,
                size,
                height,
                ..
            } => {
                if chunk_id != coord {
                    warn!("Terrain for chunk {} arrived on the slot of chunk {}", chunk_id, coord);
                }
                chunk.apply_terrain(VoxelGrid::from_pairs(size, height, &grid), water_blocks);
                debug!("Chunk {} generated with {} blocks", coord, chunk.grid().len());
                if self.active.contains(&coord) {
                    self.request_mesh(coord);
                }
            }
            TerrainResponse::ChunkUpdated {
                grid, water_blocks, ..
            } => {
                let grid = VoxelGrid::from_pairs(chunk.size(), chunk.height(), &grid);
                chunk.set_water(grid, water_blocks);
            }
            TerrainResponse::Error { error, .. } => {
                error!("Terrain generation failed for chunk {}: {}", coord, error);
                chunk.is_generating = false;
            }
            TerrainResponse::Initialized | TerrainResponse::ChunkUnloaded { .. } => {}
        }
    }

    fn on_mesh(&mut self, coord: ChunkCoord, response: MeshResponse) {
        let revision = self.mesh_revisions.remove(&coord);
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            warn!("Received mesh for unknown chunk {}", coord);
            return;
        };

        if let MeshResponse::Error { error, .. } = &response {
            error!("Meshing failed for chunk {}: {}", coord, error);
            chunk.is_building_mesh = false;
            return;
        }
        let (Some(revision), Some(geometry)) = (revision, response.into_geometry()) else {
            chunk.is_building_mesh = false;
            return;
        };

        if !chunk.apply_mesh(geometry, revision) {
            debug!("Chunk {} was edited while meshing; it stays dirty", coord);
        }

        if self.active.contains(&coord) {
            if let Some(geometry) = chunk.geometry() {
                self.scene.attach(coord, geometry);
            }
            if let Some(view_projection) = self.view_projection {
                let visible = Frustum::from_matrix(view_projection).intersects_aabb(&chunk.bounds());
                chunk.is_visible = visible;
                self.scene.set_visible(coord, visible);
            }
        } else if self.deferred_detach.remove(&coord) {
            self.scene.detach(coord);
        }
    }

    /// Reads the block at a world position. Unloaded chunks read as air.
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> BlockId {
        let (coord, local_x, local_z) = world_to_chunk(x, z, self.config.chunk_size);
        self.chunks
            .get(&coord)
            .map_or(AIR, |chunk| chunk.get_block(local_x, y, local_z))
    }

    /// Writes the block at a world position.
    ///
    /// The edit is applied to the chunk's grid immediately. Lakes are
    /// reclassified when the edit touches or borders water, chunks owning
    /// bordering water cells are marked dirty, and so is the neighbour across
    /// a chunk boundary face.
    ///
    /// # Returns
    /// `false` if the chunk has no terrain yet or `y` is outside the world.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, block: BlockId) -> bool {
        let size = self.config.chunk_size;
        let (coord, local_x, local_z) = world_to_chunk(x, z, size);
        if !self.chunks.get(&coord).is_some_and(|chunk| chunk.is_generated) {
            return false;
        }
        self.access.promote(&coord);

        let water = self.block_table.water_id();
        let mut water_chunks = HashSet::new();
        for side in BlockSide::all() {
            let offset = side.offset();
            let (nx, ny, nz) = (x + offset.x, y + offset.y, z + offset.z);
            if water.is_some_and(|water| self.get_block(nx, ny, nz) == water) {
                let (neighbour, _, _) = world_to_chunk(nx, nz, size);
                if self.chunks.contains_key(&neighbour) {
                    water_chunks.insert(neighbour);
                }
            }
        }

        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return false;
        };
        let previous = chunk.get_block(local_x, y, local_z);
        if !chunk.set_block(local_x, y, local_z, block, &self.block_table) {
            return false;
        }

        if let Some(water) = water {
            if !water_chunks.is_empty() || previous == water || block == water {
                let mut grid = chunk.grid().clone();
                let water_blocks = fill_lakes(&mut grid, water, self.config.water_level);
                chunk.set_water(grid, water_blocks);
            }
        }

        water_chunks.remove(&coord);
        self.dirty.extend(water_chunks);

        let boundary = [
            (local_x == 0, coord.offset(-1, 0)),
            (local_x == size - 1, coord.offset(1, 0)),
            (local_z == 0, coord.offset(0, -1)),
            (local_z == size - 1, coord.offset(0, 1)),
        ];
        for (on_face, neighbour) in boundary {
            if on_face && self.chunks.contains_key(&neighbour) {
                self.dirty.insert(neighbour);
            }
        }

        true
    }

    /// Picks a spawn position in chunk `(0, 0)`.
    ///
    /// Before that chunk has terrain the centre of the chunk at half height
    /// is returned.
    pub fn find_spawn_location(&mut self) -> [f64; 3] {
        let origin = ChunkCoord::new(0, 0);
        let (size, height) = (self.config.chunk_size, self.config.chunk_height);
        let clearance = self.config.spawn_clearance;
        let chunk = self.ensure_chunk(origin);
        if !chunk.is_generated {
            return [size as f64 / 2.0, height as f64 / 2.0, size as f64 / 2.0];
        }
        let chunk = &self.chunks[&origin];
        chunk.find_spawn_location(&mut self.rng, clearance, &self.block_table)
    }

    /// Whether every chunk in the square of radius `min(2, render_distance)`
    /// around the player is generated and has geometry.
    ///
    /// Corners of the square outside the render distance are never streamed
    /// in, so they are skipped.
    pub fn is_spawn_area_loaded(&self, player_x: f64, player_z: f64) -> bool {
        let center = ChunkCoord::containing(player_x, player_z, self.config.chunk_size);
        let render_distance = self.config.render_distance;
        let max_dist_sq = i64::from(render_distance) * i64::from(render_distance);
        let radius = render_distance.min(2);
        (-radius..=radius).all(|dx| {
            (-radius..=radius).all(|dz| {
                let coord = center.offset(dx, dz);
                coord.distance_squared(center) > max_dist_sq
                    || self
                        .chunks
                        .get(&coord)
                        .is_some_and(|chunk| chunk.is_generated && chunk.geometry().is_some())
            })
        })
    }

    /// Sets the combined `projection × view` matrix used for culling.
    pub fn set_view_projection(&mut self, view_projection: Matrix4<f32>) {
        self.view_projection = Some(view_projection);
    }

    /// Toggles the visibility of every meshed active chunk against the frustum.
    pub fn perform_frustum_culling(&mut self) -> CullingStats {
        let Some(view_projection) = self.view_projection else {
            return self.culling_stats;
        };
        let frustum = Frustum::from_matrix(view_projection);
        let mut stats = CullingStats {
            total: self.active.len(),
            ..CullingStats::default()
        };

        for coord in &self.active {
            let Some(chunk) = self.chunks.get_mut(coord) else {
                continue;
            };
            if chunk.geometry().is_none() {
                continue;
            }
            let visible = frustum.intersects_aabb(&chunk.bounds());
            chunk.is_visible = visible;
            self.scene.set_visible(*coord, visible);
            if visible {
                stats.visible += 1;
            } else {
                stats.culled += 1;
            }
        }

        self.culling_stats = stats;
        stats
    }

    /// Unloads inactive idle chunks, least recently accessed first, until the
    /// loaded count is back within the cap.
    ///
    /// # Returns
    /// The number of chunks unloaded.
    pub fn enforce_chunk_limit(&mut self) -> usize {
        let limit = self.config.loaded_chunk_limit();
        if self.chunks.len() <= limit {
            return 0;
        }
        let excess = self.chunks.len() - limit;

        let victims: Vec<ChunkCoord> = self
            .access
            .iter()
            .rev()
            .map(|(coord, _)| *coord)
            .filter(|coord| {
                !self.active.contains(coord) && self.chunks.get(coord).is_some_and(|chunk| !chunk.is_busy())
            })
            .take(excess)
            .collect();

        let evicted = victims
            .into_iter()
            .filter(|coord| self.unload_chunk(*coord))
            .count();
        if evicted > 0 {
            debug!("Evicted {} chunks, {} loaded", evicted, self.chunks.len());
        }
        evicted
    }

    /// Unloads a chunk and tells every terrain worker to forget it.
    ///
    /// # Returns
    /// `false` if the chunk is not loaded or a request for it is outstanding.
    pub fn unload_chunk(&mut self, coord: ChunkCoord) -> bool {
        let Some(chunk) = self.chunks.get(&coord) else {
            return false;
        };
        if chunk.is_busy() {
            return false;
        }
        let had_geometry = chunk.geometry().is_some();

        self.terrain_pool.cancel_pending(coord);
        self.mesh_pool.cancel_pending(coord);
        self.terrain_pool
            .broadcast(|| TerrainRequest::UnloadChunk { chunk_id: coord });
        if had_geometry {
            self.scene.detach(coord);
        }

        self.chunks.remove(&coord);
        self.active.remove(&coord);
        self.dirty.remove(&coord);
        self.deferred_detach.remove(&coord);
        self.mesh_revisions.remove(&coord);
        self.access.pop(&coord);
        true
    }

    /// Detaches every chunk, drops all state and stops the workers.
    pub fn dispose(&mut self) {
        for (coord, chunk) in &self.chunks {
            if chunk.geometry().is_some() {
                self.scene.detach(*coord);
            }
        }
        self.chunks.clear();
        self.active.clear();
        self.dirty.clear();
        self.deferred_detach.clear();
        self.mesh_revisions.clear();
        self.access.clear();
        self.terrain_pool.shutdown();
        self.mesh_pool.shutdown();
        info!("Chunk manager disposed");
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    pub fn loaded_chunks(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.chunks.keys().copied()
    }

    pub fn loaded_len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_active(&self, coord: ChunkCoord) -> bool {
        self.active.contains(&coord)
    }

    pub fn active_chunks(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.active.iter().copied()
    }

    pub fn is_dirty(&self, coord: ChunkCoord) -> bool {
        self.dirty.contains(&coord) || self.chunks.get(&coord).is_some_and(Chunk::is_dirty)
    }

    /// Whether any request is queued or in flight.
    pub fn has_pending_work(&self) -> bool {
        self.chunks.values().any(Chunk::is_busy)
            || self.terrain_pool.pending_len() > 0
            || self.mesh_pool.pending_len() > 0
    }

    pub fn culling_stats(&self) -> CullingStats {
        self.culling_stats
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn block_table(&self) -> &BlockTable {
        &self.block_table
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }

    pub fn terrain_pool(&self) -> &BufferPool<TerrainStrategy> {
        &self.terrain_pool
    }

    pub fn mesh_pool(&self) -> &BufferPool<MeshStrategy> {
        &self.mesh_pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::rendering::HeadlessScene;

    fn manager(render_distance: i32) -> ChunkManager<HeadlessScene> {
        let config = WorldConfig {
            seed: 7,
            chunk_size: 8,
            chunk_height: 32,
            amplitude: 12.0,
            render_distance,
            ..WorldConfig::default()
        };
        ChunkManager::new(Arc::new(config), Arc::new(BlockTable::standard()), HeadlessScene::new()).unwrap()
    }

    #[test]
    fn active_set_is_a_disc() {
        let mut world = manager(2);
        world.update_chunks(4.0, 4.0);
        assert_eq!(world.active_chunks().count(), 13);
        assert!(world.is_active(ChunkCoord::new(2, 0)));
        assert!(!world.is_active(ChunkCoord::new(2, 1)));
        world.dispose();
    }

    #[test]
    fn unloaded_chunks_read_as_air_and_reject_edits() {
        let mut world = manager(1);
        assert_eq!(world.get_block(100, 5, -100), AIR);
        assert!(!world.set_block(100, 5, -100, 1));
        world.dispose();
    }

    #[test]
    fn busy_chunks_are_never_unloaded() {
        let mut world = manager(1);
        world.update_chunks(0.0, 0.0);
        let origin = ChunkCoord::new(0, 0);
        assert!(world.chunk(origin).unwrap().is_busy());
        assert!(!world.unload_chunk(origin));
        assert!(world.chunk(origin).is_some());
        world.dispose();
    }

    #[test]
    fn deactivating_a_busy_chunk_hides_it_immediately() {
        let mut world = manager(1);
        world.update_chunks(4.0, 4.0);
        let origin = ChunkCoord::new(0, 0);
        {
            let chunk = world.chunks.get_mut(&origin).unwrap();
            chunk.is_building_mesh = true;
            chunk.is_visible = true;
        }

        world.update_chunks(1000.0, 1000.0);
        assert!(!world.is_active(origin));
        let chunk = world.chunk(origin).unwrap();
        assert!(chunk.is_busy());
        assert!(!chunk.is_visible);
        assert!(world.deferred_detach.contains(&origin));
        assert!(!world.scene().is_visible(origin));
        world.dispose();
    }

    #[test]
    fn spawn_falls_back_to_chunk_centre() {
        let mut world = manager(1);
        assert_eq!(world.find_spawn_location(), [4.0, 16.0, 4.0]);
        world.dispose();
    }
}
