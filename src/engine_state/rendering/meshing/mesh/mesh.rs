//! Mesh data structures handed to the rendering collaborator.
//!
//! Terrain geometry is batched per [`GeometryKey`], one flat buffer set per
//! `(block, side)` pair. Water is a single extra batch of the same shape.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine_state::voxels::block::{block_side::BlockSide, BlockId};
use crate::engine_state::voxels::chunk::{ChunkCoord, WaterBlock};

use super::face::Face;

/// Height of the water surface above the bottom of its cell.
pub const WATER_SURFACE_OFFSET: f32 = 0.925;

/// Flat vertex buffers of one batch.
///
/// # Fields
/// - `positions`: 3 floats per vertex
/// - `normals`: 3 floats per vertex
/// - `uvs`: 2 floats per vertex
/// - `indices`: 6 per quad, pattern `0, 1, 2, 0, 2, 3`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub uvs: Vec<f32>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Appends one quad.
    pub fn push_quad(&mut self, corners: [[f32; 3]; 4], normal: [f32; 3], uvs: [[f32; 2]; 4]) {
        let base = self.vertex_count() as u32;
        for corner in corners {
            self.positions.extend_from_slice(&corner);
            self.normals.extend_from_slice(&normal);
        }
        for uv in uvs {
            self.uvs.extend_from_slice(&uv);
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Appends the quad of a merged face.
    pub fn push_face(&mut self, face: &Face, offset_x: f32, offset_z: f32) {
        let normal = face.side.normal();
        self.push_quad(
            face.vertices(offset_x, offset_z),
            [normal.x, normal.y, normal.z],
            face.uvs(),
        );
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn quad_count(&self) -> usize {
        self.indices.len() / 6
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Batch key of terrain geometry: the block whose material is used and the side.
///
/// Serializes as `"<block id>:<side>"`, e.g. `"7:top"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GeometryKey {
    pub block: BlockId,
    pub side: BlockSide,
}

/// Error returned when a geometry key string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed geometry key {0:?}")]
pub struct ParseGeometryKeyError(pub String);

impl GeometryKey {
    pub fn new(block: BlockId, side: BlockSide) -> Self {
        GeometryKey { block, side }
    }
}

fn side_name(side: BlockSide) -> &'static str {
    match side {
        BlockSide::RIGHT => "right",
        BlockSide::LEFT => "left",
        BlockSide::TOP => "top",
        BlockSide::BOTTOM => "bottom",
        BlockSide::FRONT => "front",
        BlockSide::BACK => "back",
    }
}

impl fmt::Display for GeometryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block, side_name(self.side))
    }
}

impl FromStr for GeometryKey {
    type Err = ParseGeometryKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseGeometryKeyError(s.to_string());
        let (block, side) = s.split_once(':').ok_or_else(malformed)?;
        let block = block.parse().map_err(|_| malformed())?;
        let side = BlockSide::all()
            .into_iter()
            .find(|candidate| side_name(*candidate) == side)
            .ok_or_else(malformed)?;
        Ok(GeometryKey { block, side })
    }
}

impl TryFrom<String> for GeometryKey {
    type Error = ParseGeometryKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GeometryKey> for String {
    fn from(key: GeometryKey) -> Self {
        key.to_string()
    }
}

/// All geometry derived from one chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkGeometry {
    pub terrain: BTreeMap<GeometryKey, MeshData>,
    pub water: Option<MeshData>,
}

impl ChunkGeometry {
    /// Total triangles over all terrain batches and water.
    pub fn triangle_count(&self) -> usize {
        self.terrain.values().map(MeshData::triangle_count).sum::<usize>()
            + self.water.as_ref().map_or(0, MeshData::triangle_count)
    }

    pub fn is_empty(&self) -> bool {
        self.terrain.is_empty() && self.water.is_none()
    }
}

/// Builds the water surface: one unmerged horizontal quad per top water cell.
///
/// # Returns
/// `None` when the chunk has no water surface.
pub fn build_water_mesh(water_blocks: &[WaterBlock], coord: ChunkCoord, size: i32) -> Option<MeshData> {
    let offset_x = (coord.x * size) as f32;
    let offset_z = (coord.z * size) as f32;
    let mut mesh = MeshData::default();

    for block in water_blocks.iter().filter(|block| block.is_top_water) {
        let x0 = offset_x + block.x as f32;
        let z0 = offset_z + block.z as f32;
        let y = block.y as f32 + WATER_SURFACE_OFFSET;
        mesh.push_quad(
            [
                [x0, y, z0],
                [x0 + 1.0, y, z0],
                [x0 + 1.0, y, z0 + 1.0],
                [x0, y, z0 + 1.0],
            ],
            [0.0, 1.0, 0.0],
            [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
        );
    }

    (!mesh.is_empty()).then_some(mesh)
}
