//! # Terrain Generation Tests
//!
//! Determinism of the height field and of full chunk generation, plus
//! structural properties of a fixed world (seed 42, amplitude 48).

use std::sync::Arc;

use voxel_world::engine_state::voxels::terrain::HeightGenerator;
use voxel_world::{BlockTable, ChunkCoord, TerrainGenerator, TerrainParams, VoxelGrid, WorldConfig, AIR};

fn generator(seed: u32) -> TerrainGenerator {
    let config = WorldConfig {
        seed,
        amplitude: 48.0,
        ..WorldConfig::default()
    };
    TerrainGenerator::new(TerrainParams::new(&config, Arc::new(BlockTable::standard())))
}

/// Test: The height field is a pure function of seed and column.
#[test]
fn test_height_is_deterministic() {
    let a = HeightGenerator::new(42, 48.0, 128);
    let b = HeightGenerator::new(42, 48.0, 128);
    for x in (-300..300).step_by(7) {
        for z in (-300..300).step_by(11) {
            assert_eq!(a.height_at(x, z), b.height_at(x, z));
        }
    }
}

/// Test: Different seeds give different worlds.
#[test]
fn test_seeds_change_the_terrain() {
    let a = HeightGenerator::new(42, 48.0, 128);
    let b = HeightGenerator::new(43, 48.0, 128);
    let differing = (0..200)
        .filter(|i| a.height_at(i * 13, i * 5) != b.height_at(i * 13, i * 5))
        .count();
    assert!(differing > 0);
}

/// Test: Generating the same chunk twice yields identical grids and water.
#[test]
fn test_chunk_generation_is_deterministic() {
    let first = generator(42);
    let second = generator(42);
    for coord in [ChunkCoord::new(0, 0), ChunkCoord::new(-3, 5), ChunkCoord::new(17, -9)] {
        let a = first.generate_chunk(coord);
        let b = second.generate_chunk(coord);
        assert_eq!(a.grid.to_pairs(), b.grid.to_pairs());
        assert_eq!(a.water_blocks, b.water_blocks);
    }
}

/// Test: A grid survives the pair encoding used on the worker channels.
#[test]
fn test_grid_pairs_round_trip() {
    let chunk = generator(42).generate_chunk(ChunkCoord::new(1, 1));
    let pairs = chunk.grid.to_pairs();
    let rebuilt = VoxelGrid::from_pairs(chunk.grid.size(), chunk.grid.height(), &pairs);
    assert_eq!(rebuilt, chunk.grid);
}

/// Test: Seed 42 / amplitude 48 produces a well-formed chunk at the origin.
#[test]
fn test_seed_42_origin_chunk() {
    let generator = generator(42);
    let table = BlockTable::standard();
    let chunk = generator.generate_chunk(ChunkCoord::new(0, 0));
    let water = table.water_id().unwrap();

    for x in 0..16 {
        for z in 0..16 {
            let surface = generator.height_at(x, z);
            assert!((0..=128).contains(&surface));

            let top = chunk
                .get_highest_block(x, z)
                .unwrap_or_else(|| panic!("column ({x}, {z}) is empty"));
            assert!(top + 1 >= surface.min(127));

            // The ground below the surface is solid all the way down.
            for y in 0..surface.min(128) {
                let block = chunk.get_block(x, y, z);
                assert_ne!(block, AIR, "hole at ({x}, {y}, {z})");
                assert_ne!(block, water, "water inside the ground at ({x}, {y}, {z})");
            }
        }
    }

    // Recorded surface heights.
    assert_eq!(generator.height_at(0, 0), 16);
    assert_eq!(generator.height_at(8, 8), 13);
    assert_eq!(generator.height_at(15, 15), 13);
    assert_eq!(generator.height_at(0, 8), 14);

    // No tree can reach the corner column: the only trunk in range would
    // stand at (2, 2), and the canopy skips its diagonal corners.
    let grass = table.id_of("grass").unwrap();
    let dirt = table.id_of("dirt").unwrap();
    let stone = table.id_of("stone").unwrap();
    assert_eq!(chunk.get_highest_block(0, 0), Some(15));
    assert_eq!(chunk.get_block(0, 15, 0), grass);
    assert_eq!(grass, 2);

    // A flat inland column: stone, then three layers of dirt under the grass.
    assert_eq!(chunk.get_block(8, 8, 8), stone);
    assert_eq!(chunk.get_block(8, 9, 8), dirt);
    assert_eq!(chunk.get_block(8, 11, 8), dirt);

    // Every water surface cell is water with no water directly above it.
    for cell in chunk.water_blocks.iter().filter(|cell| cell.is_top_water) {
        assert_eq!(chunk.get_block(cell.x, cell.y, cell.z), water);
        assert_ne!(chunk.get_block(cell.x, cell.y + 1, cell.z), water);
    }
}
