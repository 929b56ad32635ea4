//! Persistent per-cell state.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// State of one touched grid cell.
///
/// Records are created on the first ray hit (or the first bulldozing touch)
/// and are never destroyed. Scalar depths (`sinkage*`) are measured along the
/// local undeformed normal; levels are measured along the SCM frame z axis.
///
/// Invariants maintained by the step pipeline:
/// - `sinkage == sinkage_elastic + sinkage_plastic` at the end of a step;
/// - `sigma >= 0` (unilateral contact);
/// - `sigma_yield` never decreases over the record's lifetime.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeRecord {
    /// Undeformed height at creation; drifts upward when bulldozing deposits
    /// material on this cell.
    pub level_initial: f64,
    /// Current height.
    pub level: f64,
    /// Height of this step's ray intersection; [`f64::INFINITY`] when the
    /// cell was not hit this step.
    pub hit_level: f64,
    /// Undeformed surface normal at creation, in the SCM frame.
    pub normal: Vector3<f64>,
    /// Total sinkage along the local normal.
    pub sinkage: f64,
    /// Plastic (permanent) part of the sinkage.
    pub sinkage_plastic: f64,
    /// Elastic (recoverable) part of the sinkage.
    pub sinkage_elastic: f64,
    /// Normal pressure, [Pa].
    pub sigma: f64,
    /// Yield pressure; hardened by plastic flow, [Pa].
    pub sigma_yield: f64,
    /// Accumulated tangential shear displacement (Janosi state), [m].
    pub kshear: f64,
    /// Shear traction, [Pa].
    pub tau: f64,
    /// Whether the cell belongs to the current erosion domain.
    pub erosion: bool,
    /// Material that could not be deposited because the raise would cross the
    /// contacting surface; carried until smoothing moves it elsewhere.
    pub massremainder: f64,
    /// Plastic sinkage rate of this step, [m/s]; feeds the bulldozing raise.
    pub step_plastic_flow: f64,
}

impl NodeRecord {
    /// Create a record with the given initial and current levels.
    #[must_use]
    pub fn new(level_initial: f64, level: f64, normal: Vector3<f64>) -> Self {
        Self {
            level_initial,
            level,
            hit_level: f64::INFINITY,
            normal,
            sinkage: level_initial - level,
            sinkage_plastic: 0.0,
            sinkage_elastic: 0.0,
            sigma: 0.0,
            sigma_yield: 0.0,
            kshear: 0.0,
            tau: 0.0,
            erosion: false,
            massremainder: 0.0,
            step_plastic_flow: 0.0,
        }
    }

    /// Whether the cell carries pressure this step.
    #[must_use]
    pub fn is_touched(&self) -> bool {
        self.sigma > 0.0
    }

    /// Reset the per-step transient fields.
    ///
    /// Called for every cell modified in the previous step before new hits
    /// are processed; persistent history (levels, plastic sinkage, yield
    /// pressure, accumulated shear) is untouched.
    pub fn reset_step(&mut self) {
        self.sigma = 0.0;
        self.sinkage_elastic = 0.0;
        self.step_plastic_flow = 0.0;
        self.erosion = false;
        self.hit_level = f64::INFINITY;
    }

    /// Deposit material on this cell.
    ///
    /// The raise is clamped so `level` never exceeds `hit_level`; the excess
    /// is parked in `massremainder`. `level_initial` moves with `level` so
    /// that future sinkage is referenced to the new surface.
    pub fn add_material(&mut self, amount: f64) {
        let mut amount = amount;
        let headroom = self.hit_level - self.level;
        if amount > headroom {
            self.massremainder += amount - headroom;
            amount = headroom;
        }
        self.level += amount;
        self.level_initial += amount;
    }

    /// Remove material from this cell.
    ///
    /// `massremainder` is drained before `level` is lowered.
    pub fn remove_material(&mut self, amount: f64) {
        let mut amount = amount;
        if self.massremainder >= amount {
            self.massremainder -= amount;
            return;
        }
        amount -= self.massremainder;
        self.massremainder = 0.0;
        self.level -= amount;
        self.level_initial -= amount;
    }
}

impl Default for NodeRecord {
    fn default() -> Self {
        Self::new(0.0, 0.0, Vector3::z())
    }
}
