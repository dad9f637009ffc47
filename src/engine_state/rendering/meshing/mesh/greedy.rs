//! Greedy meshing implementation for voxel rendering.
//!
//! This module implements the greedy meshing algorithm which combines adjacent coplanar
//! faces with the same block into larger quads, significantly reducing the number of
//! vertices compared to emitting one quad per exposed voxel face.
//!
//! ## Algorithm
//!
//! For each of the six sides and each slice along the side's axis:
//! 1. Build a 2D mask where a cell holds `block + 1` if that voxel shows a face
//!    on this side, or `0` otherwise
//! 2. Scan the mask row by row; on a non-empty cell grow a rectangle right while
//!    the row matches, then down while the full width matches
//! 3. Zero the consumed cells and record the rectangle as a [`Face`]

use std::collections::BTreeMap;

use log::debug;
use web_time::Instant;

use crate::engine_state::voxels::{
    block::{block_side::BlockSide, BlockId, BlockTable, AIR},
    chunk::{ChunkCoord, VoxelGrid, WaterBlock},
};

use super::face::Face;
use super::mesh::{build_water_mesh, ChunkGeometry, GeometryKey, MeshData};

/// Whether the voxel at `voxel` shows its face on `side`.
///
/// A face is shown when the voxel is solid, not a liquid, and its neighbour on
/// that side is transparent and of a different block. Neighbours outside the
/// grid read as air.
pub fn face_visible(grid: &VoxelGrid, table: &BlockTable, voxel: [i32; 3], side: BlockSide) -> bool {
    let [x, y, z] = voxel;
    let block = grid.get(x, y, z);
    if block == AIR || table.is_liquid(block) {
        return false;
    }
    let offset = side.offset();
    let neighbour = grid.get(x + offset.x, y + offset.y, z + offset.z);
    table.is_transparent(neighbour) && neighbour != block
}

/// Mask dimensions `(layers, rows, columns)` for a side.
fn slice_dimensions(grid: &VoxelGrid, side: BlockSide) -> (i32, i32, i32) {
    let (size, height) = (grid.size(), grid.height());
    match side.axis() {
        0 => (size, height, size),
        1 => (height, size, size),
        _ => (size, height, size),
    }
}

fn voxel_at(side: BlockSide, layer: i32, row: i32, col: i32) -> [i32; 3] {
    match side.axis() {
        0 => [layer, row, col],
        1 => [row, layer, col],
        _ => [col, row, layer],
    }
}

/// Merges one slice mask into rectangles, consuming the mask.
fn greedy_slice(mask: &mut [i32], rows: i32, cols: i32, side: BlockSide, layer: i32, out: &mut Vec<Face>) {
    let at = |row: i32, col: i32| (row * cols + col) as usize;

    for row in 0..rows {
        for col in 0..cols {
            let value = mask[at(row, col)];
            if value == 0 {
                continue;
            }

            let mut col1 = col + 1;
            while col1 < cols && mask[at(row, col1)] == value {
                col1 += 1;
            }

            let mut row1 = row + 1;
            while row1 < rows && (col..col1).all(|c| mask[at(row1, c)] == value) {
                row1 += 1;
            }

            for r in row..row1 {
                for c in col..col1 {
                    mask[at(r, c)] = 0;
                }
            }

            out.push(Face {
                side,
                layer,
                row0: row,
                row1,
                col0: col,
                col1,
                block: (value - 1) as BlockId,
            });
        }
    }
}

/// Runs the greedy merge over every slice of every side.
///
/// # Returns
/// The merged rectangles in chunk-local coordinates, grouped by side.
pub fn greedy_faces(grid: &VoxelGrid, table: &BlockTable) -> Vec<Face> {
    let mut faces = Vec::new();
    if grid.is_empty() {
        return faces;
    }

    for side in BlockSide::all() {
        let (layers, rows, cols) = slice_dimensions(grid, side);
        let mut mask = vec![0i32; (rows * cols) as usize];

        for layer in 0..layers {
            let mut any = false;
            for row in 0..rows {
                for col in 0..cols {
                    let voxel = voxel_at(side, layer, row, col);
                    if face_visible(grid, table, voxel, side) {
                        let [x, y, z] = voxel;
                        mask[(row * cols + col) as usize] = grid.get(x, y, z) as i32 + 1;
                        any = true;
                    }
                }
            }
            if any {
                greedy_slice(&mut mask, rows, cols, side, layer, &mut faces);
            }
        }
    }

    faces
}

/// The block whose material a face uses.
///
/// Blocks with distinct caps show their `<name>_top` block on top faces and
/// dirt on bottom faces.
pub fn material_for(table: &BlockTable, block: BlockId, side: BlockSide) -> BlockId {
    if side.axis() != 1 || !table.has_distinct_caps(block) {
        return block;
    }
    let relabelled = match side {
        BlockSide::TOP => table
            .name_of(block)
            .and_then(|name| table.id_of(&format!("{name}_top"))),
        _ => table.id_of("dirt"),
    };
    relabelled.unwrap_or(block)
}

/// Builds the terrain batches of a chunk.
///
/// # Arguments
/// * `grid` - The chunk's voxels
/// * `coord` - Chunk position, used for the world offset of every vertex
/// * `table` - Block table providing transparency and cap relabelling
///
/// # Returns
/// One [`MeshData`] per `(material block, side)` pair that has at least one face.
pub fn create_greedy_mesh(
    grid: &VoxelGrid,
    coord: ChunkCoord,
    table: &BlockTable,
) -> BTreeMap<GeometryKey, MeshData> {
    let offset_x = (coord.x * grid.size()) as f32;
    let offset_z = (coord.z * grid.size()) as f32;
    let mut batches: BTreeMap<GeometryKey, MeshData> = BTreeMap::new();

    for face in greedy_faces(grid, table) {
        let key = GeometryKey::new(material_for(table, face.block, face.side), face.side);
        batches
            .entry(key)
            .or_default()
            .push_face(&face, offset_x, offset_z);
    }

    batches
}

/// Builds terrain and water geometry for a chunk.
pub fn build_chunk_geometry(
    grid: &VoxelGrid,
    water_blocks: &[WaterBlock],
    coord: ChunkCoord,
    table: &BlockTable,
) -> ChunkGeometry {
    let start = Instant::now();
    let geometry = ChunkGeometry {
        terrain: create_greedy_mesh(grid, coord, table),
        water: build_water_mesh(water_blocks, coord, grid.size()),
    };
    debug!(
        "Meshed chunk {} into {} triangles in {:?}",
        coord,
        geometry.triangle_count(),
        start.elapsed()
    );
    geometry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> BlockTable {
        BlockTable::standard()
    }

    #[test]
    fn single_block_has_six_unit_quads() {
        let mut grid = VoxelGrid::new(4, 4);
        grid.set(1, 1, 1, 1);
        let faces = greedy_faces(&grid, &table());
        assert_eq!(faces.len(), 6);
        assert!(faces.iter().all(|f| f.width() == 1 && f.height() == 1));
    }

    #[test]
    fn flat_layer_merges_into_one_top_quad() {
        let mut grid = VoxelGrid::new(8, 4);
        for x in 0..8 {
            for z in 0..8 {
                grid.set(x, 0, z, 1);
            }
        }
        let faces = greedy_faces(&grid, &table());
        let tops: Vec<_> = faces.iter().filter(|f| f.side == BlockSide::TOP).collect();
        assert_eq!(tops.len(), 1);
        assert_eq!((tops[0].width(), tops[0].height()), (8, 8));
        assert_eq!(faces.len(), 6);
    }

    #[test]
    fn water_and_same_type_neighbours_hide_nothing_extra() {
        let table = table();
        let mut grid = VoxelGrid::new(4, 4);
        grid.set(0, 0, 0, 5);
        grid.set(1, 0, 0, 5);
        assert!(greedy_faces(&grid, &table).is_empty());

        // Leaves next to leaves share no face; leaves next to stone show the stone.
        grid.set(0, 2, 0, 4);
        grid.set(1, 2, 0, 4);
        grid.set(2, 2, 0, 1);
        assert!(!face_visible(&grid, &table, [0, 2, 0], BlockSide::RIGHT));
        assert!(face_visible(&grid, &table, [2, 2, 0], BlockSide::LEFT));
        assert!(!face_visible(&grid, &table, [1, 2, 0], BlockSide::RIGHT));
    }

    #[test]
    fn grass_caps_are_relabelled() {
        let table = table();
        let mut grid = VoxelGrid::new(2, 4);
        grid.set(0, 1, 0, 2);
        let batches = create_greedy_mesh(&grid, ChunkCoord::new(0, 0), &table);
        assert!(batches.contains_key(&GeometryKey::new(7, BlockSide::TOP)));
        assert!(batches.contains_key(&GeometryKey::new(0, BlockSide::BOTTOM)));
        assert!(batches.contains_key(&GeometryKey::new(2, BlockSide::FRONT)));
        assert!(!batches.contains_key(&GeometryKey::new(2, BlockSide::TOP)));
        assert_eq!(batches.values().map(MeshData::quad_count).sum::<usize>(), 6);
    }

    #[test]
    fn vertices_carry_the_world_offset() {
        let mut grid = VoxelGrid::new(16, 4);
        grid.set(0, 0, 0, 1);
        let batches = create_greedy_mesh(&grid, ChunkCoord::new(-1, 2), &table());
        for mesh in batches.values() {
            for position in mesh.positions.chunks(3) {
                assert!((-16.0..=-15.0).contains(&position[0]));
                assert!((32.0..=33.0).contains(&position[2]));
            }
        }
    }
}
