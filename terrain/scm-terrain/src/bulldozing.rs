//! Bulldozing: lateral redistribution of plastically displaced material.
//!
//! A three-stage heuristic run after the contact forces:
//!
//! 1. the material plastically displaced by each contact patch this step is
//!    piled onto the patch *boundary* (neighbors not in contact), as a sharp
//!    ridge;
//! 2. the boundary is dilated a fixed number of times into an *erosion
//!    domain*;
//! 3. several smoothing passes over the domain equalize parked mass
//!    remainders and relax slopes that exceed the erosion angle.
//!
//! The smoothing is not order-independent; the domain is iterated in a
//! deterministic insertion order (patch boundaries in patch order, then
//! dilation rings), so a given step is reproducible, but changing the grid
//! resolution or the domain ordering changes the heightfield cosmetically.

use hashbrown::HashSet;
use scm_grid::NodeStore;
use scm_types::{BulldozingParams, GridCoord};

use crate::patch::ContactPatch;
use crate::timers::Timers;

/// Apply the bulldozing heuristic; returns the erosion-domain size.
pub(crate) fn apply(
    store: &mut NodeStore,
    patches: &[ContactPatch],
    params: &BulldozingParams,
    dt: f64,
    timers: &mut Timers,
) -> usize {
    let delta = store.base().delta();
    // Maximum level change between neighboring nodes tolerated by smoothing
    let dy_lim = delta * params.erosion_slope;

    // (1) Raise the boundary of each contact patch
    timers.bulldozing_boundary.start();

    // Union of patch boundaries, in deterministic insertion order
    let mut boundary: Vec<GridCoord> = Vec::new();
    let mut boundary_seen: HashSet<GridCoord> = HashSet::new();

    for patch in patches {
        let mut p_boundary: Vec<GridCoord> = Vec::new();
        let mut p_seen: HashSet<GridCoord> = HashSet::new();

        // Displaced material of the effective patch, and its boundary
        let mut tot_step_flow = 0.0;
        for &ij in &patch.cells {
            let Some(nr) = store.get(ij) else { continue };
            if !nr.is_touched() {
                continue; // pressure-free cells are not in the effective patch
            }
            tot_step_flow += nr.step_plastic_flow;
            for nbr in ij.neighbors4() {
                let is_boundary = match store.get(nbr) {
                    None => true,
                    Some(n) => !n.is_touched(),
                };
                if is_boundary && p_seen.insert(nbr) {
                    p_boundary.push(nbr);
                }
            }
        }
        let tot_step_flow = tot_step_flow * dt;

        if p_boundary.is_empty() {
            continue;
        }
        // Target raise per boundary node; a sharp spike smoothed out below
        let diff = params.flow_factor * tot_step_flow / p_boundary.len() as f64;

        for &ij in &p_boundary {
            store.mark_modified(ij);
            let nr = store.ensure(ij);
            nr.erosion = true;
            nr.add_material(diff);
            if boundary_seen.insert(ij) {
                boundary.push(ij);
            }
        }
    }

    timers.bulldozing_boundary.stop();

    // (2) Dilate the boundary into the erosion domain
    timers.bulldozing_domain.start();

    let mut erosion_domain: Vec<GridCoord> = boundary.clone();
    let mut erosion_front: Vec<GridCoord> = boundary;

    for _ in 0..params.erosion_propagations {
        let mut front: Vec<GridCoord> = Vec::new();
        for &ij in &erosion_front {
            for nbr in ij.neighbors4() {
                match store.get(nbr) {
                    None => {
                        let nr = store.ensure(nbr);
                        nr.erosion = true;
                        front.push(nbr);
                        store.mark_modified(nbr);
                    }
                    Some(n) if !n.erosion && !n.is_touched() => {
                        if let Some(nr) = store.get_mut(nbr) {
                            nr.erosion = true;
                        }
                        front.push(nbr);
                        store.mark_modified(nbr);
                    }
                    Some(_) => {}
                }
            }
        }
        erosion_domain.extend_from_slice(&front);
        erosion_front = front;
    }

    let num_erosion_nodes = erosion_domain.len();
    timers.bulldozing_domain.stop();

    // (3) Smoothing passes over the erosion domain
    timers.bulldozing_erosion.start();

    for _ in 0..params.erosion_iterations {
        for &ij in &erosion_domain {
            for nbr in ij.neighbors4() {
                if !store.contains(nbr) {
                    continue;
                }

                // (3.1) Equalize parked mass remainders
                let (rem, nbr_rem) = match (store.get(ij), store.get(nbr)) {
                    (Some(a), Some(b)) => (a.massremainder, b.massremainder),
                    _ => continue,
                };
                let diff = 0.5 * (rem - nbr_rem) / 4.0;
                if diff > 0.0 {
                    transfer(store, ij, nbr, diff);
                }

                // (3.2) Relax slopes above the erosion angle
                let (level, rem, nbr_level, nbr_rem, nbr_touched) =
                    match (store.get(ij), store.get(nbr)) {
                        (Some(a), Some(b)) => (
                            a.level,
                            a.massremainder,
                            b.level,
                            b.massremainder,
                            b.is_touched(),
                        ),
                        _ => continue,
                    };
                if nbr_touched {
                    continue;
                }
                let dy = (level + rem) - (nbr_level + nbr_rem);
                let diff = 0.5 * (dy.abs() - dy_lim) / 4.0;
                if diff > 0.0 {
                    if dy > 0.0 {
                        transfer(store, ij, nbr, diff);
                    } else {
                        transfer(store, nbr, ij, diff);
                    }
                }
            }
        }
    }

    timers.bulldozing_erosion.stop();

    num_erosion_nodes
}

/// Move material between two existing nodes.
fn transfer(store: &mut NodeStore, from: GridCoord, to: GridCoord, amount: f64) {
    if let Some(nr) = store.get_mut(from) {
        nr.remove_material(amount);
    }
    if let Some(nr) = store.get_mut(to) {
        nr.add_material(amount);
    }
}
