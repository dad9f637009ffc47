use crate::engine_state::voxels::block::{block_side::BlockSide, BlockId};

/// A rectangle of merged voxel faces lying on one slice of the chunk.
///
/// Rectangles live in the 2D coordinate system of their slice mask:
///
/// | Axis | Rows | Columns |
/// |------|------|---------|
/// | X    | y    | z       |
/// | Y    | x    | z       |
/// | Z    | y    | x       |
///
/// The covered cells are `row0..row1` × `col0..col1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    /// Which side of the blocks this rectangle shows
    pub side: BlockSide,
    /// Slice coordinate along the face axis
    pub layer: i32,
    pub row0: i32,
    pub row1: i32,
    pub col0: i32,
    pub col1: i32,
    /// Block id the faces belong to
    pub block: BlockId,
}

impl Face {
    /// Number of mask columns covered.
    pub fn width(&self) -> i32 {
        self.col1 - self.col0
    }

    /// Number of mask rows covered.
    pub fn height(&self) -> i32 {
        self.row1 - self.row0
    }

    /// Every `(side, voxel)` unit face this rectangle covers, in chunk-local coordinates.
    pub fn unit_faces(&self) -> impl Iterator<Item = (BlockSide, [i32; 3])> + '_ {
        (self.row0..self.row1).flat_map(move |row| {
            (self.col0..self.col1).map(move |col| {
                let voxel = match self.side.axis() {
                    0 => [self.layer, row, col],
                    1 => [row, self.layer, col],
                    _ => [col, row, self.layer],
                };
                (self.side, voxel)
            })
        })
    }

    /// The four corners of the quad in world space.
    ///
    /// Corners wind counter-clockwise when seen from outside the block, so the
    /// index pattern `0, 1, 2, 0, 2, 3` yields front-facing triangles.
    ///
    /// # Arguments
    /// * `offset_x`, `offset_z` - World position of the chunk origin
    pub fn vertices(&self, offset_x: f32, offset_z: f32) -> [[f32; 3]; 4] {
        let (r0, r1) = (self.row0 as f32, self.row1 as f32);
        let (c0, c1) = (self.col0 as f32, self.col1 as f32);
        let plane = (self.layer + 1 - self.side.direction() as i32) as f32;

        match self.side {
            BlockSide::RIGHT => {
                let x = offset_x + plane;
                [
                    [x, r0, offset_z + c1],
                    [x, r0, offset_z + c0],
                    [x, r1, offset_z + c0],
                    [x, r1, offset_z + c1],
                ]
            }
            BlockSide::LEFT => {
                let x = offset_x + plane;
                [
                    [x, r0, offset_z + c0],
                    [x, r0, offset_z + c1],
                    [x, r1, offset_z + c1],
                    [x, r1, offset_z + c0],
                ]
            }
            BlockSide::TOP => [
                [offset_x + r1, plane, offset_z + c0],
                [offset_x + r0, plane, offset_z + c0],
                [offset_x + r0, plane, offset_z + c1],
                [offset_x + r1, plane, offset_z + c1],
            ],
            BlockSide::BOTTOM => [
                [offset_x + r0, plane, offset_z + c0],
                [offset_x + r1, plane, offset_z + c0],
                [offset_x + r1, plane, offset_z + c1],
                [offset_x + r0, plane, offset_z + c1],
            ],
            BlockSide::FRONT => {
                let z = offset_z + plane;
                [
                    [offset_x + c0, r0, z],
                    [offset_x + c1, r0, z],
                    [offset_x + c1, r1, z],
                    [offset_x + c0, r1, z],
                ]
            }
            BlockSide::BACK => {
                let z = offset_z + plane;
                [
                    [offset_x + c1, r0, z],
                    [offset_x + c0, r0, z],
                    [offset_x + c0, r1, z],
                    [offset_x + c1, r1, z],
                ]
            }
        }
    }

    /// Texture coordinates scaled to the rectangle so textures tile across merged faces.
    pub fn uvs(&self) -> [[f32; 2]; 4] {
        let (w, h) = (self.width() as f32, self.height() as f32);
        if self.side.axis() == 1 {
            [[0.0, 0.0], [h, 0.0], [h, w], [0.0, w]]
        } else {
            [[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_faces_map_back_to_voxels() {
        let face = Face {
            side: BlockSide::TOP,
            layer: 4,
            row0: 1,
            row1: 3,
            col0: 5,
            col1: 6,
            block: 2,
        };
        let cells: Vec<_> = face.unit_faces().map(|(_, v)| v).collect();
        assert_eq!(cells, vec![[1, 4, 5], [2, 4, 5]]);
        assert_eq!(face.vertices(16.0, 0.0)[0], [19.0, 5.0, 5.0]);
        assert_eq!(face.uvs()[2], [2.0, 1.0]);
    }

    #[test]
    fn planes_sit_on_the_exposed_side() {
        let mut face = Face {
            side: BlockSide::RIGHT,
            layer: 2,
            row0: 0,
            row1: 1,
            col0: 0,
            col1: 1,
            block: 1,
        };
        assert!(face.vertices(0.0, 0.0).iter().all(|v| v[0] == 3.0));
        face.side = BlockSide::LEFT;
        assert!(face.vertices(0.0, 0.0).iter().all(|v| v[0] == 2.0));
        face.side = BlockSide::BACK;
        assert!(face.vertices(0.0, 32.0).iter().all(|v| v[2] == 34.0));
    }
}
