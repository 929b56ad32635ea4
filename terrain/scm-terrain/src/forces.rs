//! Node-level constitutive update and force accumulation.
//!
//! For each hit cell the elastic-plastic normal response and the
//! Janosi-Hanamoto shear traction are evaluated, then the cell force is
//! accumulated per contactable: rigid bodies collect a resultant force and a
//! torque about their center of mass, FEA triangles spread the force
//! barycentrically over their nodes, generic surfaces collect a plain sum.
//!
//! The per-cell computation depends only on the cell's own record and its
//! patch's shape factor, and the accumulation is a commutative sum, so the
//! result is invariant under the hit-map iteration order.

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use scm_grid::NodeStore;
use scm_types::{BodyId, ContactableId, FeaNodeId, Pose, SoilParams, SoilSampler, SurfaceId};
use tracing::debug;

use crate::host::CollisionQuery;
use crate::patch::ContactPatch;
use crate::raycast::HitMap;

/// Forces accumulated over one step, keyed by contactable identity.
#[derive(Debug, Default)]
pub(crate) struct ForceAccumulators {
    /// Resultant force and torque (about the COM) per rigid body.
    pub bodies: HashMap<BodyId, (Vector3<f64>, Vector3<f64>)>,
    /// Force per FEA node.
    pub nodes: HashMap<FeaNodeId, Vector3<f64>>,
    /// Summed force per loadable surface.
    pub surfaces: HashMap<SurfaceId, Vector3<f64>>,
}

impl ForceAccumulators {
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.nodes.clear();
        self.surfaces.clear();
    }
}

fn safe_normalize(v: Vector3<f64>) -> Vector3<f64> {
    let n = v.norm();
    if n > 1e-10 {
        v / n
    } else {
        Vector3::zeros()
    }
}

/// Run the constitutive update over all hit cells and accumulate forces.
///
/// Cells whose elastic trial pressure is negative lose contact: their
/// pressure is clamped to zero and they are neither marked modified nor given
/// any traction.
#[allow(clippy::too_many_arguments, clippy::too_many_lines)]
pub(crate) fn compute_contact_forces<W: CollisionQuery + ?Sized>(
    world: &W,
    dt: f64,
    frame: &Pose,
    soil: &SoilParams,
    sampler: Option<&dyn SoilSampler>,
    store: &mut NodeStore,
    hits: &HitMap,
    patch_of: &HashMap<scm_types::GridCoord, usize>,
    patches: &[ContactPatch],
    accum: &mut ForceAccumulators,
) {
    let delta = store.base().delta();
    let cell_area = store.base().cell_area();

    for (&ij, hit) in hits.iter() {
        let hit_point_loc = frame.inverse_transform_point(&hit.point);

        // Location-dependent parameters shadow the global defaults
        let params = match sampler {
            Some(s) => s.sample(&hit_point_loc),
            None => *soil,
        };

        let Some(nr) = store.get_mut(ij) else {
            continue; // hit nodes are materialized during the ray-cast merge
        };
        // Cosine between the local undeformed normal and the SCM vertical
        let ca = nr.normal.z;

        nr.hit_level = hit_point_loc.z;
        // Sinkage along the local normal direction
        let hit_offset = ca * (nr.level_initial - nr.hit_level);

        // Elastic trial
        nr.sigma = params.elastic_k * (hit_offset - nr.sinkage_plastic);

        // Unilateral contact: never tensile
        if nr.sigma < 0.0 {
            nr.sigma = 0.0;
            continue;
        }

        store.mark_modified(ij);
        let nr = match store.get_mut(ij) {
            Some(nr) => nr,
            None => continue,
        };

        // Velocity of the contactable at the touched grid node
        let (x, y) = ij.to_plane(delta);
        let point_abs = frame.transform_point(&Point3::new(x, y, nr.level));
        let speed_abs = world.contact_point_speed(hit.contactable, &point_abs);

        // Normal and tangent directions in the world frame
        let n_world = frame.transform_vector(&nr.normal);
        let v_n = speed_abs.dot(&n_world);
        let t_world = safe_normalize(-(speed_abs - v_n * n_world));

        nr.sinkage = hit_offset;
        nr.level = nr.hit_level;

        // Accumulate shear displacement for Janosi-Hanamoto
        nr.kshear += speed_abs.dot(&-t_world) * dt;

        // Plastic correction: return to the Bekker curve and harden the yield
        if nr.sigma > nr.sigma_yield {
            let oob = patch_of.get(&ij).map_or(0.0, |&p| patches[p].oob);
            nr.sigma = (oob * params.bekker_kc + params.bekker_kphi)
                * nr.sinkage.powf(params.bekker_n);
            nr.sigma_yield = nr.sigma;
            let old_plastic = nr.sinkage_plastic;
            nr.sinkage_plastic = nr.sinkage - nr.sigma / params.elastic_k;
            nr.step_plastic_flow = (nr.sinkage_plastic - old_plastic) / dt;
        }

        nr.sinkage_elastic = nr.sinkage - nr.sinkage_plastic;

        // Compressive speed-proportional damping; deliberately not fed back
        // into the yield pressure
        nr.sigma += -v_n * params.damping_r;

        // Mohr-Coulomb cap, then Janosi-Hanamoto shear
        let tau_max = params.mohr_cohesion + nr.sigma * params.mohr_mu;
        nr.tau = tau_max * (1.0 - (-nr.kshear / params.janosi_shear).exp());

        // Cell forces in the world frame
        let f_normal = n_world * (cell_area * nr.sigma);
        let f_tangent = match world.contactable_soil(hit.contactable) {
            Some(c) => {
                // Blend soil-contactable and soil-soil shear by area fraction
                let c_tau_max = c.mohr_cohesion + nr.sigma * c.mohr_mu;
                let c_tau = c_tau_max * (1.0 - (-nr.kshear / c.janosi_shear).exp());
                t_world * (cell_area * ((1.0 - c.area_ratio) * nr.tau + c.area_ratio * c_tau))
            }
            None => t_world * (cell_area * nr.tau),
        };
        let force = f_normal + f_tangent;

        match hit.contactable {
            ContactableId::Body(body) => {
                let moment = (point_abs - world.body_com(body)).cross(&force);
                let entry = accum
                    .bodies
                    .entry(body)
                    .or_insert((Vector3::zeros(), Vector3::zeros()));
                entry.0 += force;
                entry.1 += moment;
            }
            ContactableId::Triangle(tri_id) => {
                if let Some(tri) = world.fea_triangle(tri_id) {
                    if let Some(weights) = tri.barycentric(&point_abs) {
                        for (node, w) in tri.nodes.iter().zip(weights) {
                            *accum.nodes.entry(*node).or_insert_with(Vector3::zeros) +=
                                force * w;
                        }
                    } else {
                        debug!(%tri_id, "skipping degenerate FEA triangle");
                    }
                }
            }
            ContactableId::Surface(surf) => {
                *accum.surfaces.entry(surf).or_insert_with(Vector3::zeros) += force;
            }
        }

        // Updated cell height for visualization, back along the SCM z axis
        nr.level = nr.level_initial - nr.sinkage / ca;
    }
}
