//! Axis-aligned bounding boxes.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box.
///
/// Used for the optional terrain boundary (cells outside it are never ray
/// tested) and for the collision world's global bounds that back the default
/// active domain.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aabb {
    /// Minimum corner.
    pub min: Point3<f64>,
    /// Maximum corner.
    pub max: Point3<f64>,
}

impl Aabb {
    /// Create a box from its corners. No ordering is enforced; an inverted
    /// box is detectable through [`Aabb::is_inverted`].
    #[must_use]
    pub const fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// An inverted (empty) box that grows to fit points.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::MAX, f64::MAX, f64::MAX),
            max: Point3::new(f64::MIN, f64::MIN, f64::MIN),
        }
    }

    /// True if `min` exceeds `max` on any axis.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Center of the box.
    #[must_use]
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Half-dimensions of the box.
    #[must_use]
    pub fn half_dims(&self) -> Vector3<f64> {
        (self.max - self.min) * 0.5
    }

    /// The `k`-th of the 8 corners, `k` in `0..8`.
    ///
    /// Bit 0 of `k` selects x, bit 1 selects y, bit 2 selects z.
    #[must_use]
    pub fn corner(&self, k: usize) -> Point3<f64> {
        Point3::new(
            if k & 1 == 0 { self.min.x } else { self.max.x },
            if k & 2 == 0 { self.min.y } else { self.max.y },
            if k & 4 == 0 { self.min.z } else { self.max.z },
        )
    }

    /// Grow the box to contain a point.
    pub fn extend(&mut self, p: &Point3<f64>) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Check whether `(x, y)` lies inside the box projection on the xy plane.
    #[must_use]
    pub fn contains_xy(&self, x: f64, y: f64) -> bool {
        x >= self.min.x && x <= self.max.x && y >= self.min.y && y <= self.max.y
    }
}
