//! Active domains: which cells are ray-tested each step.

use nalgebra::{Point3, Vector3};
use scm_types::{Aabb, BodyId, GridCoord, Pose};

use crate::host::CollisionQuery;

/// Rectangle of candidate grid cells covered by a domain this step.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CellRange {
    x_min: i32,
    y_min: i32,
    count_x: usize,
    count_y: usize,
}

impl CellRange {
    fn from_plane_bounds(p_min: (f64, f64), p_max: (f64, f64), delta: f64) -> Self {
        let x_min = (p_min.0 / delta).ceil() as i32;
        let y_min = (p_min.1 / delta).ceil() as i32;
        let x_max = (p_max.0 / delta).floor() as i32;
        let y_max = (p_max.1 / delta).floor() as i32;
        if x_max < x_min || y_max < y_min {
            return Self::default();
        }
        Self {
            x_min,
            y_min,
            count_x: (x_max - x_min + 1) as usize,
            count_y: (y_max - y_min + 1) as usize,
        }
    }

    pub fn len(&self) -> usize {
        self.count_x * self.count_y
    }

    /// The `k`-th cell, row-major from the rectangle corner.
    pub fn coord(&self, k: usize) -> GridCoord {
        debug_assert!(k < self.len());
        GridCoord::new(
            self.x_min + (k % self.count_x) as i32,
            self.y_min + (k / self.count_x) as i32,
        )
    }
}

/// An active domain: an oriented box attached to a monitored body (or, for
/// the default domain, the collision world's global bounds), resolved each
/// step to a rectangle of grid cells.
#[derive(Debug, Clone)]
pub(crate) struct ActiveDomain {
    /// Tracked body; `None` for the default domain.
    pub body: Option<BodyId>,
    /// Box center: in the body frame for user domains, in world coordinates
    /// for the default domain.
    pub center: Vector3<f64>,
    /// Box half-dimensions.
    pub hdims: Vector3<f64>,
    /// Cells covered this step.
    pub range: CellRange,
    /// Componentwise inverse of the SCM up direction in the body frame, with
    /// zero components replaced by a large sentinel; feeds the slab test.
    pub inv_normal: Vector3<f64>,
}

fn invert_or_sentinel(v: f64) -> f64 {
    if v == 0.0 {
        1e10
    } else {
        1.0 / v
    }
}

impl ActiveDomain {
    /// A user domain following `body`, with the box given in the body frame.
    pub fn attached(body: BodyId, center: Vector3<f64>, dims: Vector3<f64>) -> Self {
        Self {
            body: Some(body),
            center,
            hdims: dims / 2.0,
            range: CellRange::default(),
            inv_normal: Vector3::zeros(),
        }
    }

    /// The default domain; its box is refreshed from the collision bounds.
    pub fn default_domain() -> Self {
        Self {
            body: None,
            center: Vector3::zeros(),
            hdims: Vector3::new(0.1, 0.1, 0.1),
            range: CellRange::default(),
            inv_normal: Vector3::zeros(),
        }
    }

    /// Resolve a user domain for this step.
    ///
    /// Projects the 8 box corners into the SCM frame, takes the bounding
    /// rectangle of their x-y coordinates, and snaps it to cell indices.
    /// Also caches the inverse SCM up direction in the body frame for the
    /// slab test.
    pub fn update_user<W: CollisionQuery + ?Sized>(
        &mut self,
        world: &W,
        frame: &Pose,
        z_world: &Vector3<f64>,
        delta: f64,
    ) {
        let Some(body) = self.body else { return };
        let body_frame = world.body_ref_frame(body);

        let mut p_min = (f64::MAX, f64::MAX);
        let mut p_max = (f64::MIN, f64::MIN);
        for k in 0..8_usize {
            let sx = f64::from((k & 1) as i32 * 2 - 1);
            let sy = f64::from(((k >> 1) & 1) as i32 * 2 - 1);
            let sz = f64::from(((k >> 2) & 1) as i32 * 2 - 1);
            let c_body = Point3::from(self.center + self.hdims.component_mul(&Vector3::new(sx, sy, sz)));
            let c_abs = body_frame.transform_point(&c_body);
            let c_scm = frame.inverse_transform_point(&c_abs);
            p_min.0 = p_min.0.min(c_scm.x);
            p_min.1 = p_min.1.min(c_scm.y);
            p_max.0 = p_max.0.max(c_scm.x);
            p_max.1 = p_max.1.max(c_scm.y);
        }
        self.range = CellRange::from_plane_bounds(p_min, p_max, delta);

        let dir = body_frame.inverse_transform_vector(z_world);
        self.inv_normal = Vector3::new(
            invert_or_sentinel(dir.x),
            invert_or_sentinel(dir.y),
            invert_or_sentinel(dir.z),
        );
    }

    /// Resolve the default domain from the collision world's bounds.
    pub fn update_default(&mut self, aabb: &Aabb, frame: &Pose, delta: f64) {
        if aabb.is_inverted() {
            // Nothing to collide with
            self.range = CellRange::default();
            return;
        }
        self.center = aabb.center().coords;
        self.hdims = aabb.half_dims();

        let mut p_min = (f64::MAX, f64::MAX);
        let mut p_max = (f64::MIN, f64::MIN);
        for k in 0..8_usize {
            let c_scm = frame.inverse_transform_point(&aabb.corner(k));
            p_min.0 = p_min.0.min(c_scm.x);
            p_min.1 = p_min.1.min(c_scm.y);
            p_max.0 = p_max.0.max(c_scm.x);
            p_max.1 = p_max.1.max(c_scm.y);
        }
        self.range = CellRange::from_plane_bounds(p_min, p_max, delta);
    }

    /// Kay-Kajiya slab test of a vertical test ray against the domain box.
    ///
    /// `body_frame` must be the pose used by the matching
    /// [`update_user`](Self::update_user) call this step.
    pub fn ray_obb_test(&self, body_frame: &Pose, from: &Point3<f64>) -> bool {
        let orig = body_frame.inverse_transform_point(from) - Point3::from(self.center);

        let t1 = (-self.hdims.x - orig.x) * self.inv_normal.x;
        let t2 = (self.hdims.x - orig.x) * self.inv_normal.x;
        let t3 = (-self.hdims.y - orig.y) * self.inv_normal.y;
        let t4 = (self.hdims.y - orig.y) * self.inv_normal.y;
        let t5 = (-self.hdims.z - orig.z) * self.inv_normal.z;
        let t6 = (self.hdims.z - orig.z) * self.inv_normal.z;

        let tmin = t1.min(t2).max(t3.min(t4)).max(t5.min(t6));
        let tmax = t1.max(t2).min(t3.max(t4)).min(t5.max(t6));

        tmax >= 0.0 && tmin <= tmax
    }
}
