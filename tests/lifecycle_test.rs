//! # Chunk Lifecycle Tests
//!
//! Random interleavings of player movement, update passes, edits and unload
//! attempts. Whatever the order, a chunk with an outstanding request is never
//! unloaded and the active set is always resident.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use voxel_world::{BlockTable, ChunkCoord, ChunkManager, HeadlessScene, WorldConfig};

fn manager(max_loaded_chunks: Option<usize>) -> ChunkManager<HeadlessScene> {
    let config = WorldConfig {
        seed: 1234,
        chunk_size: 8,
        chunk_height: 32,
        amplitude: 12.0,
        water_level: 4,
        render_distance: 2,
        max_loaded_chunks,
        ..WorldConfig::default()
    };
    ChunkManager::new(Arc::new(config), Arc::new(BlockTable::standard()), HeadlessScene::new())
        .expect("valid test configuration")
}

fn assert_active_chunks_loaded(world: &ChunkManager<HeadlessScene>) {
    for coord in world.active_chunks() {
        assert!(world.chunk(coord).is_some(), "active chunk {coord} is not loaded");
    }
}

/// Test: Unloading a busy chunk is refused and leaves the chunk in place.
#[test]
fn test_random_unloads_never_drop_busy_chunks() {
    let mut world = manager(None);
    let mut rng = fastrand::Rng::with_seed(99);
    let (mut player_x, mut player_z) = (4.0, 4.0);
    let mut refused = 0;

    for _ in 0..400 {
        match rng.u8(..10) {
            0..=1 => {
                player_x += rng.i32(-12..=12) as f64;
                player_z += rng.i32(-12..=12) as f64;
                world.update_chunks(player_x, player_z);
            }
            2..=5 => world.update_chunks(player_x, player_z),
            6..=8 => {
                let loaded: Vec<ChunkCoord> = world.loaded_chunks().collect();
                if loaded.is_empty() {
                    continue;
                }
                let coord = loaded[rng.usize(..loaded.len())];
                let busy = world.chunk(coord).is_some_and(|chunk| chunk.is_busy());
                let unloaded = world.unload_chunk(coord);
                if busy {
                    assert!(!unloaded, "busy chunk {coord} was unloaded");
                    assert!(world.chunk(coord).is_some());
                    refused += 1;
                } else {
                    assert!(unloaded);
                    assert!(world.chunk(coord).is_none());
                    assert!(!world.scene().is_attached(coord));
                }
            }
            _ => thread::sleep(Duration::from_millis(1)),
        }
        assert_active_chunks_loaded(&world);
    }

    assert!(refused > 0, "no unload ever raced an outstanding request");
    world.dispose();
    assert_eq!(world.loaded_len(), 0);
}

/// Test: Edits interleaved with movement and eviction keep the world consistent.
#[test]
fn test_random_edits_and_eviction() {
    let mut world = manager(Some(20));
    let mut rng = fastrand::Rng::with_seed(5);
    let (mut player_x, mut player_z) = (4.0, 4.0);

    for _ in 0..400 {
        match rng.u8(..8) {
            0 => {
                player_x += rng.i32(-16..=16) as f64;
                player_z += rng.i32(-16..=16) as f64;
            }
            1..=2 => {
                let x = player_x as i32 + rng.i32(-8..8);
                let z = player_z as i32 + rng.i32(-8..8);
                // Above the water level, so removed blocks stay air.
                let y = rng.i32(5..32);
                let block = if rng.bool() { 1 } else { voxel_world::AIR };
                if world.set_block(x, y, z, block) {
                    assert_eq!(world.get_block(x, y, z), block);
                }
            }
            _ => thread::sleep(Duration::from_millis(1)),
        }
        world.update_chunks(player_x, player_z);
        assert_active_chunks_loaded(&world);

        let busy_inactive = world
            .loaded_chunks()
            .filter(|coord| !world.is_active(*coord))
            .filter(|coord| world.chunk(*coord).is_some_and(|chunk| chunk.is_busy()))
            .count();
        let active = world.active_chunks().count();
        assert!(world.loaded_len() <= 20usize.max(active) + busy_inactive);
    }

    world.dispose();
    assert_eq!(world.scene().attached_len(), 0);
}
