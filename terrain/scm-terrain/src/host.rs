//! Contracts the terrain imposes on its embedding multibody world.
//!
//! The terrain never owns bodies or FEA meshes; it reaches them through two
//! narrow traits. [`CollisionQuery`] is the read side -- ray queries and
//! kinematics -- and must be callable from worker threads concurrently.
//! [`LoadSink`] is the write side: at the end of a step the accumulated
//! terrain forces are handed over as loads, unless co-simulation mode holds
//! them back for external query.

use nalgebra::{Point3, Vector3};
use scm_types::{Aabb, BodyId, ContactableId, ContactableSoil, Pose, TriangleId};

/// Result of a ray query into the collision world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHitInfo {
    /// Identity of the hit object.
    pub contactable: ContactableId,
    /// Hit point in world coordinates.
    pub point: Point3<f64>,
}

/// An FEA contact triangle as reported by the embedder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeaTriangle {
    /// The three mesh nodes carrying this triangle.
    pub nodes: [scm_types::FeaNodeId; 3],
    /// Current world positions of the three nodes.
    pub vertices: [Point3<f64>; 3],
}

impl FeaTriangle {
    /// Barycentric weights of a point with respect to the triangle.
    ///
    /// Returns `None` for a degenerate triangle (the caller skips the
    /// distribution for that cell).
    #[must_use]
    pub fn barycentric(&self, p: &Point3<f64>) -> Option<[f64; 3]> {
        let v0 = self.vertices[1] - self.vertices[0];
        let v1 = self.vertices[2] - self.vertices[0];
        let v2 = p - self.vertices[0];
        let d00 = v0.dot(&v0);
        let d01 = v0.dot(&v1);
        let d11 = v1.dot(&v1);
        let d20 = v2.dot(&v0);
        let d21 = v2.dot(&v1);
        let denom = d00 * d11 - d01 * d01;
        if denom.abs() < 1e-12 {
            return None;
        }
        let v = (d11 * d20 - d01 * d21) / denom;
        let w = (d00 * d21 - d01 * d20) / denom;
        Some([1.0 - v - w, v, w])
    }
}

/// Read-only services of the embedding multibody world.
///
/// `Sync` is part of the contract: [`ray_hit`](CollisionQuery::ray_hit) is
/// invoked from rayon worker threads during the ray-cast stage. The other
/// methods are only called from the coordinating thread.
pub trait CollisionQuery: Sync {
    /// Closest intersection of the segment `from -> to` with any collision
    /// shape, or `None`. The terrain casts its test rays bottom-up, so the
    /// reported point is on the underside of the contacting object.
    fn ray_hit(&self, from: &Point3<f64>, to: &Point3<f64>) -> Option<RayHitInfo>;

    /// Bounding box of all collision geometry, used by the default active
    /// domain. An inverted box means "nothing to collide with".
    fn collision_bounds(&self) -> Aabb;

    /// Reference frame of a rigid body (world pose).
    fn body_ref_frame(&self, body: BodyId) -> Pose;

    /// Center of mass of a rigid body, in world coordinates.
    fn body_com(&self, body: BodyId) -> Point3<f64>;

    /// Velocity of the contactable's material point at a world position.
    fn contact_point_speed(
        &self,
        contactable: ContactableId,
        point: &Point3<f64>,
    ) -> Vector3<f64>;

    /// Geometry of an FEA contact triangle, or `None` if unknown.
    fn fea_triangle(&self, triangle: TriangleId) -> Option<FeaTriangle>;

    /// Per-object tangential soil override, if the embedder attached one.
    fn contactable_soil(&self, _contactable: ContactableId) -> Option<ContactableSoil> {
        None
    }
}

/// Receiver of the terrain loads computed in a step.
pub trait LoadSink {
    /// Resultant force (applied at the COM) and torque for a rigid body.
    fn body_load(&mut self, body: BodyId, force: Vector3<f64>, torque: Vector3<f64>);

    /// Force on an FEA node.
    fn node_load(&mut self, node: scm_types::FeaNodeId, force: Vector3<f64>);

    /// Force on a loadable surface at a parametric location.
    fn surface_load(&mut self, surface: scm_types::SurfaceId, force: Vector3<f64>, uv: (f64, f64));
}

/// A sink that discards all loads; convenient in co-simulation mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLoadSink;

impl LoadSink for NullLoadSink {
    fn body_load(&mut self, _: BodyId, _: Vector3<f64>, _: Vector3<f64>) {}
    fn node_load(&mut self, _: scm_types::FeaNodeId, _: Vector3<f64>) {}
    fn surface_load(&mut self, _: scm_types::SurfaceId, _: Vector3<f64>, _: (f64, f64)) {}
}
