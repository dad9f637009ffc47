//! # Engine State Module
//!
//! The core engine module that ties the chunk pipeline to a camera.
//!
//! ## Key Components
//!
//! * `EngineState` - Owns the world and the camera and advances them frame by frame
//! * `camera_state` - Camera, projection and frustum culling
//! * `rendering` - Meshing, mesh workers and the scene graph attach points
//! * `task_management` - Buffer pools and worker threads
//! * `voxels` - Blocks, chunks, terrain generation and the chunk manager
//!
//! ## Architecture
//!
//! Every subsystem is responsible for one aspect of the pipeline. The
//! `EngineState` struct is the coordinator the host drives: each frame it
//! moves the camera, hands the new view volume to the chunk manager and lets
//! the manager stream, dispatch and cull.

use std::sync::Arc;

use cgmath::{Deg, Point3, Vector3};
use log::info;
use web_time::Duration;

use crate::config::{ConfigError, WorldConfig};

use camera_state::{view_projection, Camera, Projection};
use rendering::scene::SceneGraph;
use voxels::{block::BlockTable, world::ChunkManager};

pub mod camera_state;
pub mod rendering;
pub mod task_management;
pub mod voxels;

/// Height of the camera above the block it stands on
const EYE_HEIGHT: f64 = 1.6;

/// Default walking speed of the simulated player, in blocks per second
const WALK_SPEED: f32 = 8.0;

/// Flags controlling engine behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineFlags {
    /// Whether the camera walks forward on every update
    pub auto_walk: bool,
    /// Whether active chunks are culled against the camera frustum
    pub frustum_culling: bool,
}

impl Default for EngineFlags {
    fn default() -> Self {
        EngineFlags {
            auto_walk: true,
            frustum_culling: true,
        }
    }
}

/// The main state container of the engine.
///
/// # Fields
/// - `world`: The chunk manager
/// - `camera`: The player's camera
/// - `projection`: The camera's perspective projection
/// - `flags`: Behavior toggles
/// - `frame`: Number of updates run so far
/// - `spawned`: Whether the camera was moved to a spawn location
pub struct EngineState<S: SceneGraph> {
    pub world: ChunkManager<S>,
    pub camera: Camera,
    pub projection: Projection,
    pub flags: EngineFlags,
    frame: u64,
    spawned: bool,
}

impl<S: SceneGraph> EngineState<S> {
    /// Creates the engine with the camera hovering over the world origin.
    ///
    /// # Arguments
    /// * `config` - World parameters
    /// * `scene` - The scene graph receiving chunk geometry
    pub fn new(config: WorldConfig, scene: S) -> Result<Self, ConfigError> {
        let config = Arc::new(config);
        let block_table = Arc::new(BlockTable::standard());
        let eye = config.chunk_height as f32 / 2.0;
        let far = (config.render_distance.max(1) * config.chunk_size) as f32 * 1.5;
        let world = ChunkManager::new(config, block_table, scene)?;

        Ok(EngineState {
            world,
            camera: Camera::new((0.0, eye, 0.0), Deg(0.0), Deg(-20.0)),
            projection: Projection::new(1280, 720, Deg(75.0), 0.1, far),
            flags: EngineFlags::default(),
            frame: 0,
            spawned: false,
        })
    }

    /// Advances the engine by one frame.
    ///
    /// # Arguments
    /// * `dt` - Time elapsed since the previous update
    pub fn update(&mut self, dt: Duration) {
        if !self.spawned {
            self.try_spawn();
        } else if self.flags.auto_walk {
            let forward = self.camera.forward();
            let step = Vector3::new(forward.x, 0.0, forward.z) * WALK_SPEED * dt.as_secs_f32();
            self.camera.position += step;
        }

        if self.flags.frustum_culling {
            self.world
                .set_view_projection(view_projection(&self.camera, &self.projection));
        }
        let Point3 { x, z, .. } = self.camera.position;
        self.world.update_chunks(f64::from(x), f64::from(z));
        self.frame += 1;
    }

    /// Moves the camera to a spawn location once the area around it is loaded.
    fn try_spawn(&mut self) -> bool {
        let Point3 { x, z, .. } = self.camera.position;
        if !self.world.is_spawn_area_loaded(f64::from(x), f64::from(z)) {
            return false;
        }
        let [sx, sy, sz] = self.world.find_spawn_location();
        self.camera.position = Point3::new(sx as f32, (sy + EYE_HEIGHT) as f32, sz as f32);
        self.spawned = true;
        info!("Spawned at ({:.1}, {:.1}, {:.1}) after {} frames", sx, sy, sz, self.frame);
        true
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn has_spawned(&self) -> bool {
        self.spawned
    }

    /// Stops the workers and detaches every chunk.
    pub fn shutdown(&mut self) {
        self.world.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::rendering::HeadlessScene;

    #[test]
    fn camera_spawns_once_the_area_is_loaded() {
        let config = WorldConfig {
            seed: 3,
            chunk_size: 8,
            chunk_height: 32,
            amplitude: 12.0,
            render_distance: 1,
            ..WorldConfig::default()
        };
        let mut engine = EngineState::new(config, HeadlessScene::new()).unwrap();
        engine.flags.auto_walk = false;

        for _ in 0..3000 {
            engine.update(Duration::from_millis(16));
            if engine.has_spawned() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        assert!(engine.has_spawned());
        let position = engine.camera.position;
        assert!((0.0..8.0).contains(&position.x) && (0.0..8.0).contains(&position.z));
        assert!(engine.frame() > 0);
        engine.shutdown();
        assert_eq!(engine.world.loaded_len(), 0);
    }
}
