//! Contact-patch segmentation.
//!
//! Hit cells are grouped into 4-connected components; each component gets the
//! planar convex hull of its cell centers, from which the Bekker shape factor
//! `1/b ~ perimeter / (2 area)` is derived. All cells of a patch share that
//! factor in the constitutive update.

use std::collections::VecDeque;

use hashbrown::HashMap;
use nalgebra::Point2;
use scm_types::GridCoord;

use crate::raycast::HitMap;

/// Minimum hull area below which the shape factor is zeroed (degenerate
/// patches contribute no Bekker cohesion term).
const MIN_PATCH_AREA: f64 = 1e-6;

/// A connected group of hit cells.
#[derive(Debug, Clone)]
pub(crate) struct ContactPatch {
    /// Member cells, in flood-fill discovery order.
    pub cells: Vec<GridCoord>,
    /// Convex hull area of the cell centers in the SCM plane.
    pub area: f64,
    /// Convex hull perimeter.
    pub perimeter: f64,
    /// Approximation of the Bekker `1/b` term; zero for degenerate hulls.
    pub oob: f64,
}

/// Flood-fill the hit cells into contact patches.
///
/// Returns the patches and a map from cell to patch index. Patch numbering
/// depends on hash-map iteration order, but membership does not; downstream
/// consumers only use per-patch aggregates.
pub(crate) fn segment(hits: &HitMap, delta: f64) -> (Vec<ContactPatch>, HashMap<GridCoord, usize>) {
    let mut patch_of: HashMap<GridCoord, usize> = HashMap::with_capacity(hits.len());
    let mut patches: Vec<ContactPatch> = Vec::new();

    for (&seed, _) in hits.iter() {
        if patch_of.contains_key(&seed) {
            continue;
        }

        let patch_id = patches.len();
        let mut cells = Vec::new();
        let mut todo = VecDeque::new();

        patch_of.insert(seed, patch_id);
        cells.push(seed);
        todo.push_back(seed);

        while let Some(crt) = todo.pop_front() {
            for nbr in crt.neighbors4() {
                if !hits.contains_key(&nbr) || patch_of.contains_key(&nbr) {
                    continue;
                }
                patch_of.insert(nbr, patch_id);
                cells.push(nbr);
                todo.push_back(nbr);
            }
        }

        let points: Vec<Point2<f64>> = cells
            .iter()
            .map(|c| {
                let (x, y) = c.to_plane(delta);
                Point2::new(x, y)
            })
            .collect();
        let hull = convex_hull(points);
        let area = hull_area(&hull);
        let perimeter = hull_perimeter(&hull);
        let oob = if area < MIN_PATCH_AREA {
            0.0
        } else {
            perimeter / (2.0 * area)
        };

        patches.push(ContactPatch {
            cells,
            area,
            perimeter,
            oob,
        });
    }

    (patches, patch_of)
}

/// Andrew's monotone-chain convex hull.
///
/// Returns the hull vertices in counter-clockwise order without repeating the
/// first point. Inputs with fewer than three points come back unchanged
/// (sorted); collinear inputs collapse to their two extremes.
fn convex_hull(mut points: Vec<Point2<f64>>) -> Vec<Point2<f64>> {
    points.sort_by(|a, b| (a.x, a.y).partial_cmp(&(b.x, b.y)).unwrap_or(std::cmp::Ordering::Equal));
    points.dedup();
    let n = points.len();
    if n < 3 {
        return points;
    }

    let cross = |o: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>| {
        (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
    };

    let mut hull: Vec<Point2<f64>> = Vec::with_capacity(2 * n);
    // Lower chain
    for p in &points {
        while hull.len() >= 2 && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(*p);
    }
    // Upper chain
    let lower_len = hull.len() + 1;
    for p in points.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(*p);
    }
    hull.pop(); // last point repeats the first
    hull
}

/// Shoelace area of a convex polygon.
fn hull_area(hull: &[Point2<f64>]) -> f64 {
    if hull.len() < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..hull.len() {
        let a = &hull[i];
        let b = &hull[(i + 1) % hull.len()];
        acc += a.x * b.y - b.x * a.y;
    }
    acc.abs() / 2.0
}

/// Closed-polygon perimeter; for a two-point "hull" this is twice the
/// segment length (out and back).
fn hull_perimeter(hull: &[Point2<f64>]) -> f64 {
    if hull.len() < 2 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..hull.len() {
        let a = &hull[i];
        let b = &hull[(i + 1) % hull.len()];
        acc += (b - a).norm();
    }
    acc
}
