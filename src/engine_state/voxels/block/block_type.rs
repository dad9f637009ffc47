//! # Block Type Module
//!
//! This module defines the built-in block types of the voxel world and the static
//! registry describing them. The registry is a compile-time `phf` map keyed by
//! block name; it is the single source the runtime [`BlockTable`](super::BlockTable)
//! is built from.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use super::BlockId;

/// Enumerates the built-in block types.
///
/// The discriminants are the block ids (`guid`s) used on the wire and inside
/// voxel grids. The `FromPrimitive` derive allows conversion from raw ids.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive)]
#[allow(non_camel_case_types)]
#[repr(i16)]
pub enum BlockType {
    /// Empty space. Never stored in a grid.
    AIR = -1,
    /// Soil found just below the surface.
    DIRT = 0,
    /// Bedrock of the terrain and steep slopes.
    STONE = 1,
    /// Surface block of gentle slopes. Its top and bottom faces use their own materials.
    GRASS = 2,
    /// Tree trunk.
    OAK_LOG = 3,
    /// Tree canopy, transparent.
    LEAF = 4,
    /// Lake water, transparent and meshed separately.
    WATER = 5,
    /// Decorative block.
    SLIME = 6,
    /// Material-only entry used by grass top faces.
    GRASS_TOP = 7,
    /// Beach band around lakes.
    SAND = 8,
}

impl BlockType {
    /// Converts a raw block id into a built-in `BlockType`.
    ///
    /// # Returns
    /// `None` for ids that are not part of the built-in registry.
    pub fn from_id(id: BlockId) -> Option<Self> {
        FromPrimitive::from_i16(id)
    }

    /// Returns the raw id of this block type.
    pub fn id(self) -> BlockId {
        self as BlockId
    }

    /// Returns the registry key of this block type.
    pub fn registry_name(self) -> &'static str {
        match self {
            BlockType::AIR => "air",
            BlockType::DIRT => "dirt",
            BlockType::STONE => "stone",
            BlockType::GRASS => "grass",
            BlockType::OAK_LOG => "oak_log",
            BlockType::LEAF => "leaf",
            BlockType::WATER => "water",
            BlockType::SLIME => "slime",
            BlockType::GRASS_TOP => "grass_top",
            BlockType::SAND => "sand",
        }
    }

    /// Looks a built-in block type up by its registry key.
    pub fn from_registry_name(name: &str) -> Option<Self> {
        if name == "air" {
            return Some(BlockType::AIR);
        }
        BLOCK_REGISTRY
            .get(name)
            .and_then(|definition| Self::from_id(definition.guid))
    }
}

/// Renderer-facing material family of a block.
///
/// The core never interprets this value; it is carried through so the
/// rendering collaborator can pick shaders.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MaterialKind {
    /// Opaque atlas material.
    Standard,
    /// Alpha-tested foliage material.
    Leaf,
    /// Animated translucent water material.
    Water,
}

/// Static description of a block type, as stored in [`BLOCK_REGISTRY`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockDefinition {
    /// Block id.
    pub guid: BlockId,
    /// Whether neighbouring faces stay visible through this block.
    pub transparent: bool,
    /// Whether this block is a fluid (water). Fluids never produce terrain faces.
    pub liquid: bool,
    /// Whether top and bottom faces use different materials than the sides.
    pub distinct_caps: bool,
    /// Human readable name.
    pub display_name: &'static str,
    /// Material family handed to the renderer.
    pub material: MaterialKind,
}

/// The built-in block registry, keyed by block name.
pub static BLOCK_REGISTRY: phf::Map<&'static str, BlockDefinition> = phf::phf_map! {
    "dirt" => BlockDefinition {
        guid: 0,
        transparent: false,
        liquid: false,
        distinct_caps: false,
        display_name: "Dirt",
        material: MaterialKind::Standard,
    },
    "stone" => BlockDefinition {
        guid: 1,
        transparent: false,
        liquid: false,
        distinct_caps: false,
        display_name: "Stone",
        material: MaterialKind::Standard,
    },
    "grass" => BlockDefinition {
        guid: 2,
        transparent: false,
        liquid: false,
        distinct_caps: true,
        display_name: "Grass",
        material: MaterialKind::Standard,
    },
    "oak_log" => BlockDefinition {
        guid: 3,
        transparent: false,
        liquid: false,
        distinct_caps: false,
        display_name: "Oak_Log",
        material: MaterialKind::Standard,
    },
    "leaf" => BlockDefinition {
        guid: 4,
        transparent: true,
        liquid: false,
        distinct_caps: false,
        display_name: "Leaf",
        material: MaterialKind::Leaf,
    },
    "water" => BlockDefinition {
        guid: 5,
        transparent: true,
        liquid: true,
        distinct_caps: false,
        display_name: "Water",
        material: MaterialKind::Water,
    },
    "slime" => BlockDefinition {
        guid: 6,
        transparent: false,
        liquid: false,
        distinct_caps: false,
        display_name: "Slime",
        material: MaterialKind::Leaf,
    },
    "grass_top" => BlockDefinition {
        guid: 7,
        transparent: false,
        liquid: false,
        distinct_caps: false,
        display_name: "Grass",
        material: MaterialKind::Standard,
    },
    "sand" => BlockDefinition {
        guid: 8,
        transparent: false,
        liquid: false,
        distinct_caps: false,
        display_name: "Sand",
        material: MaterialKind::Standard,
    },
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_guids_match_enum() {
        for (name, definition) in BLOCK_REGISTRY.entries() {
            let block_type = BlockType::from_id(definition.guid).unwrap();
            assert_eq!(block_type.registry_name(), *name);
        }
    }

    #[test]
    fn unknown_ids_have_no_type() {
        assert_eq!(BlockType::from_id(42), None);
        assert_eq!(BlockType::from_id(-1), Some(BlockType::AIR));
        assert_eq!(BlockType::from_registry_name("air"), Some(BlockType::AIR));
        assert_eq!(BlockType::from_registry_name("lava"), None);
    }
}
