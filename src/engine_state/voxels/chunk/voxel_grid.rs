//! # Voxel Grid
//!
//! Sparse storage of one chunk's blocks. Only non-air cells are stored; a
//! missing key reads as air. Grids cross worker boundaries as a list of
//! `([x, y, z], id)` pairs, see [`VoxelGrid::to_pairs`].

use std::collections::HashMap;

use crate::engine_state::voxels::block::{BlockId, BlockTable, AIR};

use super::coords::LocalKey;

/// One serialized grid cell: local coordinate and block id.
pub type GridEntry = ([i32; 3], BlockId);

/// Sparse map from local coordinate to block id for a single chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid {
    size: i32,
    height: i32,
    cells: HashMap<LocalKey, BlockId>,
}

impl VoxelGrid {
    /// Creates an all-air grid of `size × height × size` cells.
    pub fn new(size: i32, height: i32) -> Self {
        VoxelGrid {
            size,
            height,
            cells: HashMap::new(),
        }
    }

    /// Rebuilds a grid from serialized pairs.
    ///
    /// Pairs outside the grid bounds or holding air are skipped; a later pair
    /// for the same cell overwrites an earlier one.
    pub fn from_pairs(size: i32, height: i32, pairs: &[GridEntry]) -> Self {
        let mut grid = VoxelGrid::new(size, height);
        for &([x, y, z], id) in pairs {
            grid.set(x, y, z, id);
        }
        grid
    }

    /// Serializes the grid as pairs sorted by `(y, z, x)`, so equal grids
    /// always produce identical output.
    pub fn to_pairs(&self) -> Vec<GridEntry> {
        let mut keyed: Vec<(LocalKey, BlockId)> =
            self.cells.iter().map(|(key, id)| (*key, *id)).collect();
        keyed.sort_unstable_by_key(|(key, _)| *key);
        keyed
            .into_iter()
            .map(|(key, id)| {
                let (x, y, z) = key.unpack();
                ([x, y, z], id)
            })
            .collect()
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Number of non-air cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Whether `(x, y, z)` lies inside the grid.
    pub fn in_bounds(&self, x: i32, y: i32, z: i32) -> bool {
        (0..self.size).contains(&x) && (0..self.size).contains(&z) && (0..self.height).contains(&y)
    }

    /// Reads a cell. Out-of-bounds coordinates read as air.
    pub fn get(&self, x: i32, y: i32, z: i32) -> BlockId {
        if !self.in_bounds(x, y, z) {
            return AIR;
        }
        LocalKey::pack(x, y, z)
            .and_then(|key| self.cells.get(&key).copied())
            .unwrap_or(AIR)
    }

    /// Writes a cell; writing air removes it.
    ///
    /// # Returns
    /// `false` if the coordinate is out of bounds and nothing was written.
    pub fn set(&mut self, x: i32, y: i32, z: i32, id: BlockId) -> bool {
        if !self.in_bounds(x, y, z) {
            return false;
        }
        let Some(key) = LocalKey::pack(x, y, z) else {
            return false;
        };
        if id == AIR {
            self.cells.remove(&key);
        } else {
            self.cells.insert(key, id);
        }
        true
    }

    /// Writes a cell and applies the surface rule: a non-transparent block
    /// placed directly above grass turns that grass into dirt.
    pub fn place(&mut self, x: i32, y: i32, z: i32, id: BlockId, table: &BlockTable) -> bool {
        if !self.set(x, y, z, id) {
            return false;
        }
        if id != AIR && !table.is_transparent(id) {
            if let (Some(grass), Some(dirt)) = (table.id_of("grass"), table.id_of("dirt")) {
                if self.get(x, y - 1, z) == grass {
                    self.set(x, y - 1, z, dirt);
                }
            }
        }
        true
    }

    /// The y of the topmost non-air cell of column `(x, z)`.
    pub fn highest_block(&self, x: i32, z: i32) -> Option<i32> {
        (0..self.height).rev().find(|&y| self.get(x, y, z) != AIR)
    }

    /// Iterates over every non-air cell in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = GridEntry> + '_ {
        self.cells.iter().map(|(key, id)| {
            let (x, y, z) = key.unpack();
            ([x, y, z], *id)
        })
    }
}
