//! Rigid frames.

use nalgebra::{Point3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A rigid frame: position plus orientation.
///
/// Used for the SCM reference frame (the grid lives in its x-y plane and soil
/// deforms along its +Z axis) and for body reference frames reported by the
/// embedding multibody system.
///
/// # Example
///
/// ```
/// use scm_types::Pose;
/// use nalgebra::Point3;
///
/// let frame = Pose::from_position(Point3::new(0.0, 0.0, 2.0));
/// let p = frame.transform_point(&Point3::new(1.0, 0.0, 0.0));
/// assert!((p.z - 2.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    /// Position of the frame origin in parent coordinates.
    pub position: Point3<f64>,
    /// Orientation as a unit quaternion.
    pub rotation: UnitQuaternion<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// The identity frame (origin, no rotation).
    #[must_use]
    pub fn identity() -> Self {
        Self {
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// A frame translated from the parent origin, with identity rotation.
    #[must_use]
    pub fn from_position(position: Point3<f64>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
        }
    }

    /// A frame with the given position and rotation.
    #[must_use]
    pub const fn from_position_rotation(
        position: Point3<f64>,
        rotation: UnitQuaternion<f64>,
    ) -> Self {
        Self { position, rotation }
    }

    /// Transform a point from local to parent coordinates.
    #[must_use]
    pub fn transform_point(&self, local: &Point3<f64>) -> Point3<f64> {
        self.position + self.rotation * local.coords
    }

    /// Transform a direction from local to parent coordinates (rotation only).
    #[must_use]
    pub fn transform_vector(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * local
    }

    /// Transform a point from parent to local coordinates.
    #[must_use]
    pub fn inverse_transform_point(&self, parent: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation.inverse() * (parent - self.position))
    }

    /// Transform a direction from parent to local coordinates.
    #[must_use]
    pub fn inverse_transform_vector(&self, parent: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.inverse() * parent
    }

    /// The local +Z axis expressed in parent coordinates.
    ///
    /// For the SCM reference frame this is the deformation direction.
    #[must_use]
    pub fn up(&self) -> Vector3<f64> {
        self.transform_vector(&Vector3::z())
    }

    /// Check that the pose contains no `NaN` or infinite components.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.coords.iter().all(|x| x.is_finite())
            && self.rotation.coords.iter().all(|x| x.is_finite())
    }
}
