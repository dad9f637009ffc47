//! # Block Module
//!
//! This module provides the block vocabulary shared by every stage of the chunk
//! pipeline: raw block ids, the built-in block registry, and the immutable
//! [`BlockTable`] consulted by terrain generation and meshing.
//!
//! ## Block ids
//!
//! Blocks are identified by a small signed integer. The value [`AIR`] (`-1`) is
//! never stored in a voxel grid; an absent key means air.
//!
//! ## Transparency
//!
//! Transparency is a set-membership test. The set is stored as a `BitVec`
//! indexed by `id + 1`, so air occupies bit 0 and is always transparent.

use std::collections::HashMap;

use bitvec::prelude::BitVec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use block_type::{MaterialKind, BLOCK_REGISTRY};

pub mod block_side;
pub mod block_type;

/// The integer type used to represent block ids in grids and on the wire.
pub type BlockId = i16;

/// The id of empty space.
pub const AIR: BlockId = -1;

/// One row of a [`BlockTable`].
///
/// # Fields
/// - `name`: Registry key, e.g. `"grass"`
/// - `guid`: Block id stored in grids
/// - `transparent`: Whether faces behind this block stay visible
/// - `liquid`: Whether the block is meshed as water instead of terrain
/// - `distinct_caps`: Whether vertical faces get their own top/bottom batches
/// - `display_name`: Human readable name
/// - `material`: Material family for the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEntry {
    pub name: String,
    pub guid: BlockId,
    pub transparent: bool,
    #[serde(default)]
    pub liquid: bool,
    #[serde(default)]
    pub distinct_caps: bool,
    pub display_name: String,
    pub material: MaterialKind,
}

/// Errors produced while building a [`BlockTable`] from rows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockTableError {
    /// Stored ids start at zero; negative ids are reserved for air.
    #[error("block `{name}` has reserved id {guid}")]
    ReservedId { name: String, guid: BlockId },

    #[error("blocks `{first}` and `{second}` share id {guid}")]
    DuplicateId {
        first: String,
        second: String,
        guid: BlockId,
    },
}

/// Immutable lookup table of every known block.
///
/// The table is built once and shared as an `Arc<BlockTable>` between the chunk
/// manager and all workers. It serializes as a plain list of [`BlockEntry`] rows,
/// which is also the payload of the workers' `initialize` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<BlockEntry>", into = "Vec<BlockEntry>")]
pub struct BlockTable {
    entries: Vec<BlockEntry>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<BlockId, usize>,
    transparent: BitVec,
}

/// Position of `id` in the transparency set, `None` below air.
fn transparency_bit(id: BlockId) -> Option<usize> {
    usize::try_from(i32::from(id) - i32::from(AIR)).ok()
}

impl TryFrom<Vec<BlockEntry>> for BlockTable {
    type Error = BlockTableError;

    fn try_from(mut entries: Vec<BlockEntry>) -> Result<Self, Self::Error> {
        entries.sort_by_key(|entry| entry.guid);

        if let Some(entry) = entries.iter().find(|entry| entry.guid <= AIR) {
            return Err(BlockTableError::ReservedId {
                name: entry.name.clone(),
                guid: entry.guid,
            });
        }
        if let Some(pair) = entries.windows(2).find(|pair| pair[0].guid == pair[1].guid) {
            return Err(BlockTableError::DuplicateId {
                first: pair[0].name.clone(),
                second: pair[1].name.clone(),
                guid: pair[0].guid,
            });
        }

        Ok(Self::from_sorted(entries))
    }
}

impl From<BlockTable> for Vec<BlockEntry> {
    fn from(table: BlockTable) -> Self {
        table.entries
    }
}

impl BlockTable {
    /// Builds the table of built-in blocks from [`BLOCK_REGISTRY`].
    pub fn standard() -> Self {
        let mut entries: Vec<BlockEntry> = BLOCK_REGISTRY
            .entries()
            .map(|(name, definition)| BlockEntry {
                name: (*name).to_string(),
                guid: definition.guid,
                transparent: definition.transparent,
                liquid: definition.liquid,
                distinct_caps: definition.distinct_caps,
                display_name: definition.display_name.to_string(),
                material: definition.material,
            })
            .collect();
        entries.sort_by_key(|entry| entry.guid);
        Self::from_sorted(entries)
    }

    /// Indexes rows already sorted by id, every id above air and unique.
    fn from_sorted(entries: Vec<BlockEntry>) -> Self {
        let len = entries
            .last()
            .and_then(|entry| transparency_bit(entry.guid))
            .unwrap_or(0)
            + 1;
        let mut transparent = BitVec::repeat(false, len);
        transparent.set(0, true);

        let mut by_name = HashMap::with_capacity(entries.len());
        let mut by_id = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            by_name.insert(entry.name.clone(), index);
            by_id.insert(entry.guid, index);
            if let Some(bit) = transparency_bit(entry.guid).filter(|_| entry.transparent) {
                transparent.set(bit, true);
            }
        }

        BlockTable {
            entries,
            by_name,
            by_id,
            transparent,
        }
    }

    /// Returns the id registered under `name`.
    pub fn id_of(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).map(|&index| self.entries[index].guid)
    }

    /// Returns the row describing block `id`.
    pub fn get(&self, id: BlockId) -> Option<&BlockEntry> {
        self.by_id.get(&id).map(|&index| &self.entries[index])
    }

    /// Returns the registry name of block `id`.
    pub fn name_of(&self, id: BlockId) -> Option<&str> {
        self.get(id).map(|entry| entry.name.as_str())
    }

    /// Whether block `id` lets neighbouring faces show through.
    ///
    /// Air is always transparent; unknown ids are treated as opaque.
    pub fn is_transparent(&self, id: BlockId) -> bool {
        transparency_bit(id)
            .and_then(|bit| self.transparent.get(bit).map(|bit| *bit))
            .unwrap_or(false)
    }

    /// Whether block `id` is a fluid.
    pub fn is_liquid(&self, id: BlockId) -> bool {
        self.get(id).map_or(false, |entry| entry.liquid)
    }

    /// Whether block `id` uses separate batches for its top and bottom faces.
    pub fn has_distinct_caps(&self, id: BlockId) -> bool {
        self.get(id).map_or(false, |entry| entry.distinct_caps)
    }

    /// The id of the first liquid block, used for lake filling.
    pub fn water_id(&self) -> Option<BlockId> {
        self.entries
            .iter()
            .find(|entry| entry.liquid)
            .map(|entry| entry.guid)
    }

    /// Every transparent id, air included, in ascending order.
    pub fn transparent_ids(&self) -> Vec<BlockId> {
        self.transparent
            .iter_ones()
            .filter_map(|bit| BlockId::try_from(bit as i32 + i32::from(AIR)).ok())
            .collect()
    }

    /// Iterates over all rows in id order.
    pub fn entries(&self) -> impl Iterator<Item = &BlockEntry> {
        self.entries.iter()
    }

    /// Number of registered blocks, air excluded.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no blocks.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for BlockTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_transparency_set() {
        let table = BlockTable::standard();
        assert_eq!(table.transparent_ids(), vec![AIR, 4, 5]);
        assert!(table.is_transparent(AIR));
        assert!(!table.is_transparent(table.id_of("stone").unwrap()));
        assert!(!table.is_transparent(1000));
        assert!(!table.is_transparent(-7));
    }

    #[test]
    fn lookups_agree() {
        let table = BlockTable::standard();
        assert_eq!(table.len(), BLOCK_REGISTRY.len());
        assert_eq!(table.id_of("grass"), Some(2));
        assert_eq!(table.name_of(3), Some("oak_log"));
        assert_eq!(table.water_id(), Some(5));
        assert!(table.is_liquid(5));
        assert!(table.has_distinct_caps(2));
        assert!(!table.has_distinct_caps(0));
        assert_eq!(table.get(AIR), None);
    }

    #[test]
    fn survives_json_round_trip() {
        let table = BlockTable::standard();
        let json = serde_json::to_string(&table).unwrap();
        let back: BlockTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back.transparent_ids(), table.transparent_ids());
        assert_eq!(back.entries().count(), table.len());
        assert_eq!(back.id_of("sand"), Some(8));
    }

    #[test]
    fn custom_rows_extend_transparency() {
        let table: BlockTable = serde_json::from_str(
            r#"[{"name":"glass","guid":12,"transparent":true,"displayName":"Glass","material":"standard"}]"#,
        )
        .unwrap();
        assert_eq!(table.transparent_ids(), vec![AIR, 12]);
        assert_eq!(table.water_id(), None);
    }

    fn row(name: &str, guid: BlockId) -> String {
        format!(
            r#"{{"name":"{name}","guid":{guid},"transparent":true,"displayName":"{name}","material":"standard"}}"#
        )
    }

    #[test]
    fn largest_id_is_accepted() {
        let json = format!("[{}]", row("big", BlockId::MAX));
        let table: BlockTable = serde_json::from_str(&json).unwrap();
        assert!(table.is_transparent(BlockId::MAX));
        assert_eq!(table.transparent_ids(), vec![AIR, BlockId::MAX]);
        assert!(!table.is_transparent(BlockId::MIN));
    }

    #[test]
    fn reserved_and_duplicate_ids_are_rejected() {
        let negative = format!("[{}]", row("void", -5));
        assert!(serde_json::from_str::<BlockTable>(&negative).is_err());

        let air = format!("[{}]", row("air", AIR));
        assert!(serde_json::from_str::<BlockTable>(&air).is_err());

        let rows = vec![
            serde_json::from_str::<BlockEntry>(&row("a", 3)).unwrap(),
            serde_json::from_str::<BlockEntry>(&row("b", 3)).unwrap(),
        ];
        assert!(matches!(
            BlockTable::try_from(rows),
            Err(BlockTableError::DuplicateId { guid: 3, .. })
        ));
    }

    #[test]
    fn empty_table_keeps_air_transparent() {
        let table = BlockTable::try_from(Vec::new()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.transparent_ids(), vec![AIR]);
    }
}
