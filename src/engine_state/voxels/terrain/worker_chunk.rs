//! # Worker Chunk
//!
//! The terrain worker's view of a chunk: a voxel grid populated from the
//! height field, decorated with trees, and filled with lake water.

use crate::engine_state::voxels::block::{BlockId, BlockTable, AIR};
use crate::engine_state::voxels::chunk::{ChunkCoord, VoxelGrid, WaterBlock};

use super::TerrainGenerator;

/// Lowest y that lake filling reaches.
pub const LAKE_FLOOR: i32 = 3;
/// Columns steeper than this get stone below the surface.
const DIRT_SLOPE: f64 = 2.0;
/// Columns steeper than this get a stone surface.
const STONE_SLOPE: f64 = 3.0;
/// Layers of sand laid on columns close to the water level.
const SAND_DEPTH: i32 = 3;
/// Trees keep this many columns away from the chunk border.
const TREE_MARGIN: i32 = 2;

/// A chunk under construction inside a terrain worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerChunk {
    pub coord: ChunkCoord,
    pub grid: VoxelGrid,
    pub water_blocks: Vec<WaterBlock>,
}

impl WorkerChunk {
    pub fn new(coord: ChunkCoord, size: i32, height: i32) -> Self {
        WorkerChunk {
            coord,
            grid: VoxelGrid::new(size, height),
            water_blocks: Vec::new(),
        }
    }

    /// Fills every column up to its surface height.
    ///
    /// The block of each cell depends on its depth below the surface and on the
    /// central-difference slope of the column's neighbours, which may belong to
    /// adjacent chunks.
    pub fn generate_terrain(&mut self, generator: &TerrainGenerator) {
        let size = self.grid.size();
        let origin_x = self.coord.x * size;
        let origin_z = self.coord.z * size;
        let palette = generator.palette();
        let water_level = generator.water_level();

        // Heights of the chunk plus a one column border.
        let stride = (size + 2) as usize;
        let mut heights = vec![0i32; stride * stride];
        for lx in -1..=size {
            for lz in -1..=size {
                heights[(lx + 1) as usize * stride + (lz + 1) as usize] =
                    generator.height_at(origin_x + lx, origin_z + lz);
            }
        }
        let height_of = |lx: i32, lz: i32| heights[(lx + 1) as usize * stride + (lz + 1) as usize];

        for x in 0..size {
            for z in 0..size {
                let height = height_of(x, z);
                let gradient_x = (height_of(x + 1, z) - height_of(x - 1, z)) as f64 / 2.0;
                let gradient_z = (height_of(x, z + 1) - height_of(x, z - 1)) as f64 / 2.0;
                let slope = (gradient_x * gradient_x + gradient_z * gradient_z).sqrt();
                let beach = height <= water_level + 2;

                for y in 0..height {
                    let block = if y < height - 4 {
                        palette.stone
                    } else if beach && y >= height - SAND_DEPTH && slope <= STONE_SLOPE {
                        palette.sand
                    } else if y < height - 1 {
                        if slope > DIRT_SLOPE {
                            palette.stone
                        } else {
                            palette.dirt
                        }
                    } else if slope > STONE_SLOPE {
                        palette.stone
                    } else {
                        palette.grass
                    };
                    self.set_block(x, y, z, block, generator.blocks());
                }
            }
        }
    }

    /// Grows trees on eligible grass columns.
    ///
    /// A column is eligible when it is at least two columns away from the chunk
    /// border, its surface lies above the water level and its top block is grass.
    pub fn create_trees(&mut self, generator: &TerrainGenerator, rng: &mut fastrand::Rng) {
        let size = self.grid.size();
        let palette = generator.palette();
        for x in TREE_MARGIN..size - TREE_MARGIN {
            for z in TREE_MARGIN..size - TREE_MARGIN {
                let Some(y) = self.get_highest_block(x, z) else {
                    continue;
                };
                if y <= generator.water_level() || self.get_block(x, y, z) != palette.grass {
                    continue;
                }
                if rng.f64() < generator.tree_chance() {
                    self.build_tree(x, y, z, generator, rng);
                }
            }
        }
    }

    fn build_tree(&mut self, x: i32, y: i32, z: i32, generator: &TerrainGenerator, rng: &mut fastrand::Rng) {
        let palette = generator.palette();
        let chunk_height = self.grid.height();
        let tree_height = 5 + rng.i32(0..4);

        for i in 1..=tree_height {
            if y + i >= chunk_height {
                break;
            }
            self.set_block(x, y + i, z, palette.log, generator.blocks());
        }

        let leaf_start = (tree_height - 3).max(3);
        let leaf_top = tree_height + 1;
        for ly in leaf_start..=leaf_top {
            let radius: i32 = if ly == leaf_top { 1 } else { 2 };
            for lx in -radius..=radius {
                for lz in -radius..=radius {
                    if lx.abs() == 2 && lz.abs() == 2 {
                        continue;
                    }
                    if lx == 0 && lz == 0 && ly != leaf_top {
                        continue;
                    }
                    let (cx, cy, cz) = (x + lx, y + ly, z + lz);
                    if self.grid.in_bounds(cx, cy, cz) && self.get_block(cx, cy, cz) == AIR {
                        self.set_block(cx, cy, cz, palette.leaf, generator.blocks());
                    }
                }
            }
        }
    }

    /// Fills lakes and reclassifies the water surface of every column.
    pub fn build_lakes(&mut self, generator: &TerrainGenerator) {
        self.water_blocks = fill_lakes(&mut self.grid, generator.palette().water, generator.water_level());
    }

    /// Writes a block, applying the grass rule.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, id: BlockId, table: &BlockTable) -> bool {
        self.grid.place(x, y, z, id, table)
    }

    pub fn get_block(&self, x: i32, y: i32, z: i32) -> BlockId {
        self.grid.get(x, y, z)
    }

    pub fn get_highest_block(&self, x: i32, z: i32) -> Option<i32> {
        self.grid.highest_block(x, z)
    }
}

/// Fills every air cell with `LAKE_FLOOR <= y <= water_level` with water, then
/// lists every water cell of the grid. A water cell is the top surface when the
/// cell above it is not water.
///
/// Cells are listed column by column (`x`, then `z`), bottom to top.
pub fn fill_lakes(grid: &mut VoxelGrid, water: BlockId, water_level: i32) -> Vec<WaterBlock> {
    let top = water_level.min(grid.height() - 1);
    let mut water_blocks = Vec::new();

    for x in 0..grid.size() {
        for z in 0..grid.size() {
            for y in LAKE_FLOOR..=top {
                if grid.get(x, y, z) == AIR {
                    grid.set(x, y, z, water);
                }
            }
            for y in 0..grid.height() {
                if grid.get(x, y, z) == water {
                    water_blocks.push(WaterBlock {
                        x,
                        y,
                        z,
                        is_top_water: grid.get(x, y + 1, z) != water,
                    });
                }
            }
        }
    }

    water_blocks
}

/// Lists the water cells of a grid without filling anything.
pub fn classify_water(grid: &VoxelGrid, water: BlockId) -> Vec<WaterBlock> {
    let mut cells: Vec<WaterBlock> = grid
        .iter()
        .filter(|(_, id)| *id == water)
        .map(|([x, y, z], _)| WaterBlock {
            x,
            y,
            z,
            is_top_water: grid.get(x, y + 1, z) != water,
        })
        .collect();
    cells.sort_unstable_by_key(|cell| (cell.x, cell.z, cell.y));
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lakes_fill_between_floor_and_water_level() {
        let mut grid = VoxelGrid::new(2, 16);
        grid.set(0, 0, 0, 1);
        grid.set(0, 1, 0, 1);
        for y in 0..10 {
            grid.set(1, y, 1, 1);
        }
        let cells = fill_lakes(&mut grid, 5, 6);

        assert_eq!(grid.get(0, 2, 0), AIR);
        assert_eq!(grid.get(0, 3, 0), 5);
        assert_eq!(grid.get(0, 6, 0), 5);
        assert_eq!(grid.get(0, 7, 0), AIR);
        assert_eq!(grid.get(1, 6, 1), 1);

        let column: Vec<_> = cells.iter().filter(|c| c.x == 0 && c.z == 0).collect();
        assert_eq!(column.len(), 4);
        assert!(column.iter().all(|c| c.is_top_water == (c.y == 6)));
        assert_eq!(classify_water(&grid, 5), cells);
    }

    #[test]
    fn overhang_caps_water_surface() {
        let mut grid = VoxelGrid::new(1, 16);
        grid.set(0, 5, 0, 1);
        let cells = fill_lakes(&mut grid, 5, 6);
        let tops: Vec<i32> = cells.iter().filter(|c| c.is_top_water).map(|c| c.y).collect();
        assert_eq!(tops, vec![4, 6]);
    }
}
