//! Soil model parameters.
//!
//! The normal response follows the Bekker pressure-sinkage law augmented with
//! an elastic-plastic split (Krenn & Hirzinger); the tangential response is
//! Janosi-Hanamoto shear displacement capped by a Mohr-Coulomb criterion.

use nalgebra::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Global soil constants.
///
/// Friction angles are supplied in degrees and stored as their tangent.
/// A very large `elastic_k` together with `damping_r = 0` recovers the
/// original rigid-plastic SCM; `elastic_k` is clamped from below by
/// `bekker_kphi` so the elastic branch is never softer than the plastic one.
///
/// # Example
///
/// ```
/// use scm_types::SoilParams;
///
/// // elastic_k below Kphi gets clamped up
/// let soil = SoilParams::new(2e6, 0.0, 1.1, 50.0, 20.0, 0.01, 1e5, 0.0);
/// assert!((soil.elastic_k - 2e6).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SoilParams {
    /// Frictional modulus in the Bekker model, [Pa/m^n].
    pub bekker_kphi: f64,
    /// Cohesive modulus in the Bekker model, [Pa/m^(n-1)].
    pub bekker_kc: f64,
    /// Exponent of sinkage in the Bekker model (usually 0.6..1.8).
    pub bekker_n: f64,
    /// Cohesion for shear failure, [Pa].
    pub mohr_cohesion: f64,
    /// Tangent of the internal friction angle for shear failure.
    pub mohr_mu: f64,
    /// Shear displacement parameter in the Janosi-Hanamoto formula, [m].
    pub janosi_shear: f64,
    /// Elastic stiffness per unit area, [Pa/m]; at least `bekker_kphi`.
    pub elastic_k: f64,
    /// Vertical damping per unit area, [Pa s/m].
    pub damping_r: f64,
}

impl SoilParams {
    /// Build soil parameters, taking the friction angle in degrees.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bekker_kphi: f64,
        bekker_kc: f64,
        bekker_n: f64,
        mohr_cohesion: f64,
        mohr_friction_deg: f64,
        janosi_shear: f64,
        elastic_k: f64,
        damping_r: f64,
    ) -> Self {
        Self {
            bekker_kphi,
            bekker_kc,
            bekker_n,
            mohr_cohesion,
            mohr_mu: mohr_friction_deg.to_radians().tan(),
            janosi_shear,
            elastic_k: elastic_k.max(bekker_kphi),
            damping_r,
        }
    }
}

impl Default for SoilParams {
    /// Defaults for a generic dry soil.
    fn default() -> Self {
        Self::new(2e6, 0.0, 1.1, 50.0, 20.0, 0.01, 5e7, 0.0)
    }
}

/// Per-object override of the tangential soil interaction.
///
/// Attached by the embedder to individual contactables (e.g. a grousered
/// wheel); the terrain blends the object-soil shear traction with the
/// soil-soil one by the area fraction `area_ratio`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactableSoil {
    /// Fraction of the contact area governed by these parameters, in [0, 1].
    pub area_ratio: f64,
    /// Cohesion for shear failure against this object, [Pa].
    pub mohr_cohesion: f64,
    /// Tangent of the friction angle against this object.
    pub mohr_mu: f64,
    /// Janosi-Hanamoto shear parameter against this object, [m].
    pub janosi_shear: f64,
}

impl ContactableSoil {
    /// Build an override, taking the friction angle in degrees.
    #[must_use]
    pub fn new(area_ratio: f64, mohr_cohesion: f64, mohr_friction_deg: f64, janosi_shear: f64) -> Self {
        Self {
            area_ratio: area_ratio.clamp(0.0, 1.0),
            mohr_cohesion,
            mohr_mu: mohr_friction_deg.to_radians().tan(),
            janosi_shear,
        }
    }
}

/// Parameters of the bulldozing heuristic.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BulldozingParams {
    /// Tangent of the erosion angle of the displaced material.
    pub erosion_slope: f64,
    /// Growth of lateral volume relative to the pressed volume.
    pub flow_factor: f64,
    /// Number of smoothing passes per step.
    pub erosion_iterations: usize,
    /// Number of concentric dilations of the erosion domain.
    pub erosion_propagations: usize,
}

impl BulldozingParams {
    /// Build bulldozing parameters, taking the erosion angle in degrees.
    #[must_use]
    pub fn new(
        erosion_angle_deg: f64,
        flow_factor: f64,
        erosion_iterations: usize,
        erosion_propagations: usize,
    ) -> Self {
        Self {
            erosion_slope: erosion_angle_deg.to_radians().tan(),
            flow_factor,
            erosion_iterations,
            erosion_propagations,
        }
    }
}

impl Default for BulldozingParams {
    fn default() -> Self {
        Self::new(40.0, 1.2, 3, 10)
    }
}

/// Location-dependent soil parameters.
///
/// When registered on the terrain, the sampler is queried with the hit
/// location (in SCM-frame coordinates) before the constitutive update of each
/// cell; the returned record shadows the global defaults for that cell only.
pub trait SoilSampler: Send + Sync {
    /// Soil parameters at the given SCM-frame location.
    fn sample(&self, loc: &Point3<f64>) -> SoilParams;
}

impl<F> SoilSampler for F
where
    F: Fn(&Point3<f64>) -> SoilParams + Send + Sync,
{
    fn sample(&self, loc: &Point3<f64>) -> SoilParams {
        self(loc)
    }
}
