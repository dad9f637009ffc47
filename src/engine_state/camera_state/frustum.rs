//! # Frustum Culling
//!
//! Extracts the six clipping planes from a combined `projection × view`
//! matrix (Gribb/Hartmann) and tests axis-aligned boxes against them.
//!
//! The test is conservative: a box is reported visible unless it lies
//! entirely on the outside of at least one plane.

use cgmath::{Matrix4, Vector3, Vector4};

/// Axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Aabb {
    pub fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Aabb {
            min: min.into(),
            max: max.into(),
        }
    }

    /// The corner furthest along `normal`.
    fn positive_vertex(&self, normal: Vector3<f32>) -> Vector3<f32> {
        Vector3::new(
            if normal.x >= 0.0 { self.max.x } else { self.min.x },
            if normal.y >= 0.0 { self.max.y } else { self.min.y },
            if normal.z >= 0.0 { self.max.z } else { self.min.z },
        )
    }
}

/// A plane `normal · p + distance = 0`; the inside is where the sum is positive.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Plane {
    normal: Vector3<f32>,
    distance: f32,
}

impl Plane {
    fn from_coefficients(v: Vector4<f32>) -> Self {
        let normal = Vector3::new(v.x, v.y, v.z);
        let length = (normal.x * normal.x + normal.y * normal.y + normal.z * normal.z).sqrt();
        if length <= f32::EPSILON {
            return Plane {
                normal,
                distance: v.w,
            };
        }
        Plane {
            normal: normal / length,
            distance: v.w / length,
        }
    }

    fn signed_distance(&self, point: Vector3<f32>) -> f32 {
        self.normal.x * point.x + self.normal.y * point.y + self.normal.z * point.z + self.distance
    }
}

/// The six clipping planes of a view volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Plane; 6],
}

impl Frustum {
    /// Builds the frustum of a combined `projection × view` matrix.
    pub fn from_matrix(m: Matrix4<f32>) -> Self {
        // cgmath stores columns; row i is (x[i], y[i], z[i], w[i]).
        let row = |i: usize| Vector4::new(m.x[i], m.y[i], m.z[i], m.w[i]);
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));
        Frustum {
            planes: [
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 + r1),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r3 + r2),
                Plane::from_coefficients(r3 - r2),
            ],
        }
    }

    /// Whether any part of `aabb` may be inside the frustum.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(aabb.positive_vertex(plane.normal)) >= 0.0)
    }
}
