//! # Chunk Coordinates
//!
//! Chunk addressing and the packed local key used by voxel grids.
//!
//! Chunks form an unbounded 2D lattice on the XZ plane. A chunk id is written
//! `"x,z"` on the wire, which is how [`ChunkCoord`] serializes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Position of a chunk column in chunk units.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

/// Error returned when a chunk id string is not of the form `"x,z"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed chunk id {0:?}, expected \"x,z\"")]
pub struct ParseChunkCoordError(pub String);

impl ChunkCoord {
    pub const fn new(x: i32, z: i32) -> Self {
        ChunkCoord { x, z }
    }

    /// Returns the coordinate shifted by `(dx, dz)` chunks.
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        ChunkCoord::new(self.x + dx, self.z + dz)
    }

    /// Squared distance to `other`, in chunks.
    pub fn distance_squared(self, other: ChunkCoord) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dz * dz
    }

    /// The chunk containing the world-space point `(world_x, world_z)`.
    pub fn containing(world_x: f64, world_z: f64, chunk_size: i32) -> Self {
        let size = chunk_size as f64;
        ChunkCoord::new(
            (world_x / size).floor() as i32,
            (world_z / size).floor() as i32,
        )
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.z)
    }
}

impl FromStr for ChunkCoord {
    type Err = ParseChunkCoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseChunkCoordError(s.to_string());
        let (x, z) = s.split_once(',').ok_or_else(malformed)?;
        let x = x.trim().parse().map_err(|_| malformed())?;
        let z = z.trim().parse().map_err(|_| malformed())?;
        Ok(ChunkCoord::new(x, z))
    }
}

impl TryFrom<String> for ChunkCoord {
    type Error = ParseChunkCoordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChunkCoord> for String {
    fn from(coord: ChunkCoord) -> Self {
        coord.to_string()
    }
}

/// Splits a world block coordinate into its chunk and the local coordinate
/// inside that chunk. Negative coordinates round toward negative infinity.
///
/// # Returns
/// `(chunk, local_x, local_z)` with `0 <= local_x, local_z < chunk_size`.
pub fn world_to_chunk(world_x: i32, world_z: i32, chunk_size: i32) -> (ChunkCoord, i32, i32) {
    (
        ChunkCoord::new(world_x.div_euclid(chunk_size), world_z.div_euclid(chunk_size)),
        world_x.rem_euclid(chunk_size),
        world_z.rem_euclid(chunk_size),
    )
}

/// Packed local voxel coordinate.
///
/// Bits 0..8 hold `x`, bits 8..16 hold `z` and bits 16..32 hold `y`, so local
/// coordinates are limited to `0..256` horizontally and `0..65536` vertically.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalKey(u32);

impl LocalKey {
    /// Packs a local coordinate, or returns `None` if it cannot be represented.
    pub fn pack(x: i32, y: i32, z: i32) -> Option<LocalKey> {
        if !(0..256).contains(&x) || !(0..256).contains(&z) || !(0..65536).contains(&y) {
            return None;
        }
        Some(LocalKey(x as u32 | (z as u32) << 8 | (y as u32) << 16))
    }

    /// Returns the `(x, y, z)` triple this key was packed from.
    pub fn unpack(self) -> (i32, i32, i32) {
        (
            (self.0 & 0xff) as i32,
            (self.0 >> 16) as i32,
            ((self.0 >> 8) & 0xff) as i32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_to_chunk_floors_negatives() {
        assert_eq!(world_to_chunk(0, 0, 16), (ChunkCoord::new(0, 0), 0, 0));
        assert_eq!(world_to_chunk(17, 31, 16), (ChunkCoord::new(1, 1), 1, 15));
        assert_eq!(world_to_chunk(-1, -16, 16), (ChunkCoord::new(-1, -1), 15, 0));
        assert_eq!(world_to_chunk(-17, 5, 16), (ChunkCoord::new(-2, 0), 15, 5));
        assert_eq!(ChunkCoord::containing(-0.5, 15.9, 16), ChunkCoord::new(-1, 0));
    }

    #[test]
    fn chunk_id_string_form() {
        let coord = ChunkCoord::new(-3, 12);
        assert_eq!(coord.to_string(), "-3,12");
        assert_eq!("-3,12".parse::<ChunkCoord>().unwrap(), coord);
        assert!("3;12".parse::<ChunkCoord>().is_err());
        assert_eq!(serde_json::to_string(&coord).unwrap(), "\"-3,12\"");
    }

    #[test]
    fn local_key_packing() {
        let key = LocalKey::pack(15, 300, 7).unwrap();
        assert_eq!(key.unpack(), (15, 300, 7));
        assert_eq!(LocalKey::pack(-1, 0, 0), None);
        assert_eq!(LocalKey::pack(0, 0, 256), None);
    }
}
