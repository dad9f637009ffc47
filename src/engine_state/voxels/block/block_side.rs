//! # Block Side Module
//!
//! This module defines the six faces of a voxel block and the axis/direction
//! pair each one corresponds to in the greedy mesher.

use cgmath::Vector3;

/// Represents the six possible faces of a voxel block.
///
/// The greedy mesher walks faces as an `(axis, direction)` pair: direction `0`
/// is the positive face of the axis and direction `1` the negative one.
///
/// The order is: [RIGHT, LEFT, TOP, BOTTOM, FRONT, BACK]
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug, PartialOrd, Ord)]
pub enum BlockSide {
    /// The right face (facing positive X)
    RIGHT = 0,

    /// The left face (facing negative X)
    LEFT = 1,

    /// The top face (facing positive Y)
    TOP = 2,

    /// The bottom face (facing negative Y)
    BOTTOM = 3,

    /// The front face (facing positive Z)
    FRONT = 4,

    /// The back face (facing negative Z)
    BACK = 5,
}

impl BlockSide {
    /// Returns an array containing all six block faces in a consistent order.
    ///
    /// The order is: [RIGHT, LEFT, TOP, BOTTOM, FRONT, BACK]
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::RIGHT,
            BlockSide::LEFT,
            BlockSide::TOP,
            BlockSide::BOTTOM,
            BlockSide::FRONT,
            BlockSide::BACK,
        ]
    }

    /// Builds a side from an axis index (`0` = X, `1` = Y, `2` = Z) and a
    /// direction (`0` = positive, `1` = negative).
    pub fn from_axis(axis: usize, direction: usize) -> BlockSide {
        match (axis, direction) {
            (0, 0) => BlockSide::RIGHT,
            (0, _) => BlockSide::LEFT,
            (1, 0) => BlockSide::TOP,
            (1, _) => BlockSide::BOTTOM,
            (_, 0) => BlockSide::FRONT,
            (_, _) => BlockSide::BACK,
        }
    }

    /// The axis this face is perpendicular to (`0` = X, `1` = Y, `2` = Z).
    pub fn axis(self) -> usize {
        self as usize / 2
    }

    /// `0` for the positive face of the axis, `1` for the negative one.
    pub fn direction(self) -> usize {
        self as usize % 2
    }

    /// Offset of the neighbouring cell this face looks at.
    pub fn offset(self) -> Vector3<i32> {
        match self {
            BlockSide::RIGHT => Vector3::new(1, 0, 0),
            BlockSide::LEFT => Vector3::new(-1, 0, 0),
            BlockSide::TOP => Vector3::new(0, 1, 0),
            BlockSide::BOTTOM => Vector3::new(0, -1, 0),
            BlockSide::FRONT => Vector3::new(0, 0, 1),
            BlockSide::BACK => Vector3::new(0, 0, -1),
        }
    }

    /// Outward unit normal of this face.
    pub fn normal(self) -> Vector3<f32> {
        self.offset().cast::<f32>().unwrap_or_else(|| Vector3::new(0.0, 0.0, 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_direction_round_trip() {
        for side in BlockSide::all() {
            assert_eq!(BlockSide::from_axis(side.axis(), side.direction()), side);
            let offset = side.offset();
            let sum = offset.x.abs() + offset.y.abs() + offset.z.abs();
            assert_eq!(sum, 1);
            assert_eq!(offset[side.axis()], if side.direction() == 0 { 1 } else { -1 });
        }
    }
}
