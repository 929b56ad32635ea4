//! Parallel ray-cast dispatch over an active domain.
//!
//! Hits are collected map-reduce style: each rayon worker folds into its own
//! hit map, the maps are merged pairwise, and the caller inserts fresh node
//! records for newly-hit cells on the coordinating thread. During the
//! parallel region the grid store is read-only.

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use scm_grid::NodeStore;
use scm_types::{Aabb, ContactableId, GridCoord, Pose};

use crate::domain::ActiveDomain;
use crate::host::CollisionQuery;

/// A recorded ray hit for one cell.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HitRecord {
    pub contactable: ContactableId,
    /// Hit point in world coordinates.
    pub point: Point3<f64>,
}

pub(crate) type HitMap = HashMap<GridCoord, HitRecord>;

/// Cast one vertical test ray per cell of the domain's range.
///
/// Returns the per-domain hit map and the number of rays actually cast
/// (cells rejected by the boundary or the slab test are not counted).
#[allow(clippy::too_many_arguments)]
pub(crate) fn cast_domain<W: CollisionQuery + ?Sized>(
    world: &W,
    store: &NodeStore,
    frame: &Pose,
    z_world: &Vector3<f64>,
    domain: &ActiveDomain,
    body_frame: Option<&Pose>,
    boundary: Option<&Aabb>,
    test_offset_up: f64,
    test_offset_down: f64,
) -> (HitMap, usize) {
    let delta = store.base().delta();
    let range = &domain.range;

    (0..range.len())
        .into_par_iter()
        .fold(
            || (HitMap::new(), 0_usize),
            |(mut hits, mut casts), k| {
                let ij = range.coord(k);
                let (x, y) = ij.to_plane(delta);

                // Optional rectangular terrain boundary
                if let Some(b) = boundary {
                    if !b.contains_xy(x, y) {
                        return (hits, casts);
                    }
                }

                let z = store.height(ij);
                let vertex_abs = frame.transform_point(&Point3::new(x, y, z));

                // Vertical test segment, cast bottom-up along the SCM normal
                let to = vertex_abs + z_world * test_offset_up;
                let from = to - z_world * test_offset_down;

                // Fast rejection against the domain box (user domains only)
                if let Some(bf) = body_frame {
                    if !domain.ray_obb_test(bf, &from) {
                        return (hits, casts);
                    }
                }

                casts += 1;
                if let Some(hit) = world.ray_hit(&from, &to) {
                    hits.insert(
                        ij,
                        HitRecord {
                            contactable: hit.contactable,
                            point: hit.point,
                        },
                    );
                }
                (hits, casts)
            },
        )
        .reduce(
            || (HitMap::new(), 0_usize),
            |(mut a, ca), (b, cb)| {
                a.extend(b);
                (a, ca + cb)
            },
        )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::host::RayHitInfo;
    use scm_grid::BaseSurface;
    use scm_types::BodyId;

    /// A world with one axis-aligned box obstacle whose underside is at
    /// `bottom`; rays hit anywhere under its x-y footprint.
    struct SlabWorld {
        x_range: (f64, f64),
        y_range: (f64, f64),
        bottom: f64,
    }

    impl CollisionQuery for SlabWorld {
        fn ray_hit(&self, from: &Point3<f64>, to: &Point3<f64>) -> Option<RayHitInfo> {
            let (x, y) = (from.x, from.y);
            let inside = x >= self.x_range.0
                && x <= self.x_range.1
                && y >= self.y_range.0
                && y <= self.y_range.1;
            let spans = from.z <= self.bottom && to.z >= self.bottom;
            (inside && spans).then(|| RayHitInfo {
                contactable: ContactableId::Body(BodyId::new(0)),
                point: Point3::new(x, y, self.bottom),
            })
        }

        fn collision_bounds(&self) -> Aabb {
            Aabb::new(
                Point3::new(self.x_range.0, self.y_range.0, self.bottom),
                Point3::new(self.x_range.1, self.y_range.1, self.bottom + 1.0),
            )
        }

        fn body_ref_frame(&self, _: BodyId) -> Pose {
            Pose::identity()
        }

        fn body_com(&self, _: BodyId) -> Point3<f64> {
            Point3::origin()
        }

        fn contact_point_speed(&self, _: ContactableId, _: &Point3<f64>) -> Vector3<f64> {
            Vector3::zeros()
        }

        fn fea_triangle(&self, _: scm_types::TriangleId) -> Option<crate::host::FeaTriangle> {
            None
        }
    }

    fn run(world: &SlabWorld, boundary: Option<&Aabb>) -> (HitMap, usize) {
        let store = NodeStore::new(BaseSurface::flat(4.0, 4.0, 0.1).unwrap());
        let frame = Pose::identity();
        let z = frame.up();
        let mut domain = ActiveDomain::default_domain();
        domain.update_default(&world.collision_bounds(), &frame, store.base().delta());
        cast_domain(world, &store, &frame, &z, &domain, None, boundary, 0.1, 0.5)
    }

    #[test]
    fn test_hits_under_footprint() {
        let world = SlabWorld {
            x_range: (-0.2, 0.2),
            y_range: (-0.2, 0.2),
            bottom: -0.02,
        };
        let (hits, casts) = run(&world, None);
        // Cells at +/-0.2 inclusive: 5x5 grid of hits
        assert_eq!(hits.len(), 25);
        assert!(casts >= hits.len());
        for (ij, rec) in &hits {
            assert!(ij.x.abs() <= 2 && ij.y.abs() <= 2);
            assert!((rec.point.z - -0.02).abs() < 1e-12);
        }
    }

    #[test]
    fn test_boundary_rejection() {
        let world = SlabWorld {
            x_range: (-0.2, 0.2),
            y_range: (-0.2, 0.2),
            bottom: -0.02,
        };
        // Boundary admits only x >= 0
        let boundary = Aabb::new(Point3::new(0.0, -10.0, -10.0), Point3::new(10.0, 10.0, 10.0));
        let (hits, _) = run(&world, Some(&boundary));
        assert_eq!(hits.len(), 15);
        assert!(hits.keys().all(|ij| ij.x >= 0));
    }

    #[test]
    fn test_miss_produces_no_hits() {
        // Obstacle well above the test window
        let world = SlabWorld {
            x_range: (-0.2, 0.2),
            y_range: (-0.2, 0.2),
            bottom: 5.0,
        };
        let store = NodeStore::new(BaseSurface::flat(4.0, 4.0, 0.1).unwrap());
        let frame = Pose::identity();
        let z = frame.up();
        let mut domain = ActiveDomain::default_domain();
        domain.update_default(&world.collision_bounds(), &frame, store.base().delta());
        let (hits, casts) =
            cast_domain(&world, &store, &frame, &z, &domain, None, None, 0.1, 0.5);
        assert!(hits.is_empty());
        assert!(casts > 0);
    }
}
