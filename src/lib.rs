#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel World
//!
//! The core of a voxel world: procedural terrain generation, chunk streaming,
//! greedy meshing, and the worker pools that keep generation and meshing off
//! the main thread.
//!
//! The crate never talks to a GPU. Finished geometry is handed to a
//! [`SceneGraph`] implemented by the host renderer; [`HeadlessScene`] records
//! it instead, which is what the native driver and the tests use.
//!
//! ## Key Modules
//!
//! * `config` - World parameters, loaded from JSON
//! * `engine_state` - Blocks, chunks, terrain, meshing, worker pools and the chunk manager
//!
//! ## Architecture
//!
//! ```text
//! ChunkManager ──generateChunk──▶ terrain pool ──chunkGenerated──▶ Chunk
//!      │                                                            │
//!      └──────────buildMesh──▶ mesh pool ──meshCompleted──▶ SceneGraph
//! ```
//!
//! Each pool is a fixed set of frame slots, each owning one long-lived worker
//! thread (a Web Worker on wasm) and serving at most one chunk at a time.
//!
//! ## Usage
//!
//! ```rust,ignore
//! // Native application initialization
//! fn main() {
//!     voxel_world::run();
//! }
//! ```
//!
//! Embedding the pipeline directly:
//!
//! ```rust,ignore
//! let mut world = ChunkManager::new(config, block_table, HeadlessScene::new())?;
//! loop {
//!     world.update_chunks(player_x, player_z);
//! }
//! ```

#[cfg(target_family = "wasm")]
use wasm_bindgen::prelude::*;

#[cfg(not(target_family = "wasm"))]
use log::{info, warn};

pub mod config;
pub mod engine_state;

pub use config::{ConfigError, WorldConfig};
pub use engine_state::{
    rendering::{
        meshing::mesh::{build_chunk_geometry, create_greedy_mesh, ChunkGeometry, GeometryKey, MeshData},
        scene::{HeadlessScene, SceneGraph},
    },
    task_management::{BufferPool, PoolStrategy, WorkerHandle, WorkerService},
    voxels::{
        block::{BlockId, BlockTable, AIR},
        chunk::{world_to_chunk, Chunk, ChunkCoord, VoxelGrid, WaterBlock},
        terrain::{TerrainGenerator, TerrainParams},
        world::{ChunkManager, CullingStats},
    },
    EngineState,
};

/// Environment variable naming a JSON world configuration file
pub const CONFIG_ENV_VAR: &str = "VOXEL_WORLD_CONFIG";

/// Frames simulated by the native driver
#[cfg(not(target_family = "wasm"))]
const HEADLESS_FRAMES: u64 = 900;

#[cfg(not(target_family = "wasm"))]
fn load_config() -> Result<WorldConfig, ConfigError> {
    match std::env::var(CONFIG_ENV_VAR) {
        Ok(path) => {
            info!("Loading world configuration from {}", path);
            WorldConfig::from_json_file(path)
        }
        Err(_) => Ok(WorldConfig::default()),
    }
}

/// Runs the headless driver: a simulated player walks through the world while
/// the pipeline streams, generates, meshes and culls chunks around it.
#[cfg(not(target_family = "wasm"))]
pub fn run() {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized");

    let config = match load_config() {
        Ok(config) => config,
        Err(error) => {
            warn!("{}; falling back to the default world", error);
            WorldConfig::default()
        }
    };

    let mut engine = match EngineState::new(config, HeadlessScene::new()) {
        Ok(engine) => engine,
        Err(error) => {
            log::error!("Could not start the engine: {}", error);
            return;
        }
    };

    let frame_time = web_time::Duration::from_millis(16);
    let start = web_time::Instant::now();
    for _ in 0..HEADLESS_FRAMES {
        engine.update(frame_time);
        if engine.frame() % 120 == 0 {
            let stats = engine.world.culling_stats();
            info!(
                "frame {}: {} chunks loaded, {} attached ({} triangles), {} visible / {} culled",
                engine.frame(),
                engine.world.loaded_len(),
                engine.world.scene().attached_len(),
                engine.world.scene().triangle_count(),
                stats.visible,
                stats.culled
            );
        }
        std::thread::sleep(frame_time);
    }

    info!("Simulated {} frames in {:?}", engine.frame(), start.elapsed());
    engine.shutdown();
}

/// Installs the browser logger and panic hook.
#[cfg(target_family = "wasm")]
#[wasm_bindgen(start)]
pub fn run_web() {
    std::panic::set_hook(Box::new(console_error_panic_hook::hook));
    if console_log::init_with_level(log::Level::Info).is_err() {
        return;
    }
    log::info!("Voxel world module loaded");
}

/// A headless world driven from JavaScript.
#[cfg(target_family = "wasm")]
#[wasm_bindgen]
pub struct WebWorld {
    engine: EngineState<HeadlessScene>,
}

#[cfg(target_family = "wasm")]
#[wasm_bindgen]
impl WebWorld {
    /// Creates a world from a JSON configuration document.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<WebWorld, JsValue> {
        let config = WorldConfig::from_json_str(config_json).map_err(|error| JsValue::from_str(&error.to_string()))?;
        let engine =
            EngineState::new(config, HeadlessScene::new()).map_err(|error| JsValue::from_str(&error.to_string()))?;
        Ok(WebWorld { engine })
    }

    /// Advances the world by `dt_ms` milliseconds.
    pub fn update(&mut self, dt_ms: f64) {
        self.engine
            .update(web_time::Duration::from_secs_f64(dt_ms.max(0.0) / 1000.0));
    }

    pub fn get_block(&self, x: i32, y: i32, z: i32) -> i16 {
        self.engine.world.get_block(x, y, z)
    }

    pub fn set_block(&mut self, x: i32, y: i32, z: i32, block: i16) -> bool {
        self.engine.world.set_block(x, y, z, block)
    }

    pub fn loaded_chunks(&self) -> usize {
        self.engine.world.loaded_len()
    }

    pub fn triangle_count(&self) -> usize {
        self.engine.world.scene().triangle_count()
    }

    pub fn dispose(&mut self) {
        self.engine.shutdown();
    }
}
