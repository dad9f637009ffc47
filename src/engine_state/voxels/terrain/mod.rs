//! # Terrain Generation
//!
//! Procedural generation of chunk grids, run inside terrain workers.
//!
//! ## Pipeline
//!
//! 1. [`HeightGenerator`] turns the world seed into a surface height per column
//! 2. [`WorkerChunk::generate_terrain`] fills columns by depth and slope
//! 3. [`WorkerChunk::create_trees`] decorates grass columns
//! 4. [`WorkerChunk::build_lakes`] fills low ground with water
//!
//! Every step is deterministic for a given seed and chunk coordinate. Tree
//! placement draws from a `fastrand::Rng` seeded from both.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::WorldConfig;

use super::block::block_type::BlockType;
use super::block::{BlockId, BlockTable};
use super::chunk::ChunkCoord;

pub mod height;
pub mod noise;
pub mod worker_chunk;

pub use height::HeightGenerator;
pub use worker_chunk::{classify_water, fill_lakes, WorkerChunk};

/// Static configuration sent to a terrain worker in its `initialize` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerrainParams {
    pub seed: u32,
    pub chunk_size: i32,
    pub chunk_height: i32,
    pub amplitude: f64,
    pub water_level: i32,
    pub tree_chance: f64,
    pub block_table: Arc<BlockTable>,
}

impl TerrainParams {
    pub fn new(config: &WorldConfig, block_table: Arc<BlockTable>) -> Self {
        TerrainParams {
            seed: config.seed,
            chunk_size: config.chunk_size,
            chunk_height: config.chunk_height,
            amplitude: config.amplitude,
            water_level: config.water_level,
            tree_chance: config.tree_chance,
            block_table,
        }
    }
}

/// Block ids used by terrain generation, resolved from the block table by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrainPalette {
    pub dirt: BlockId,
    pub stone: BlockId,
    pub grass: BlockId,
    pub sand: BlockId,
    pub log: BlockId,
    pub leaf: BlockId,
    pub water: BlockId,
}

impl TerrainPalette {
    /// Looks every terrain block up in `table`, falling back to the built-in id
    /// when a name is missing.
    pub fn resolve(table: &BlockTable) -> Self {
        let id = |block: BlockType| table.id_of(block.registry_name()).unwrap_or(block.id());
        TerrainPalette {
            dirt: id(BlockType::DIRT),
            stone: id(BlockType::STONE),
            grass: id(BlockType::GRASS),
            sand: id(BlockType::SAND),
            log: id(BlockType::OAK_LOG),
            leaf: id(BlockType::LEAF),
            water: table.water_id().unwrap_or(BlockType::WATER.id()),
        }
    }
}

/// Everything a terrain worker needs to generate chunks for one world.
pub struct TerrainGenerator {
    params: TerrainParams,
    heights: HeightGenerator,
    palette: TerrainPalette,
}

impl TerrainGenerator {
    pub fn new(params: TerrainParams) -> Self {
        TerrainGenerator {
            heights: HeightGenerator::new(params.seed, params.amplitude, params.chunk_height),
            palette: TerrainPalette::resolve(&params.block_table),
            params,
        }
    }

    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    pub fn blocks(&self) -> &BlockTable {
        &self.params.block_table
    }

    pub fn palette(&self) -> TerrainPalette {
        self.palette
    }

    pub fn water_level(&self) -> i32 {
        self.params.water_level
    }

    pub fn tree_chance(&self) -> f64 {
        self.params.tree_chance
    }

    /// Surface height of a world column.
    pub fn height_at(&self, world_x: i32, world_z: i32) -> i32 {
        self.heights.height_at(world_x, world_z)
    }

    /// Runs the full generation pipeline for one chunk.
    pub fn generate_chunk(&self, coord: ChunkCoord) -> WorkerChunk {
        let mut chunk = WorkerChunk::new(coord, self.params.chunk_size, self.params.chunk_height);
        let mut rng = fastrand::Rng::with_seed(chunk_seed(self.params.seed, coord));
        chunk.generate_terrain(self);
        chunk.create_trees(self, &mut rng);
        chunk.build_lakes(self);
        chunk
    }
}

/// Seed of the per-chunk random stream.
pub fn chunk_seed(seed: u32, coord: ChunkCoord) -> u64 {
    let x = coord.x as u32 as u64;
    let z = coord.z as u32 as u64;
    ((seed as u64) << 32)
        ^ x.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ z.wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
}
