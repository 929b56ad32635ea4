//! Deformable terrain based on the Soil Contact Model (SCM).
//!
//! This crate implements a per-step soil contact pipeline over the sparse
//! height grid of [`scm_grid`]: objects from an embedding multibody world
//! press into the terrain, the terrain answers with sinkage-dependent
//! pressure and shear forces, and the heightfield deforms -- optionally with
//! lateral material flow ("bulldozing") building up side ruts.
//!
//! # The model
//!
//! The normal response combines the Bekker pressure-sinkage law with an
//! elastic-plastic split following Krenn & Hirzinger: each cell carries an
//! elastic trial stiffness `K` and a plastically hardening yield pressure
//! capped by `sigma = (Kc/b + Kphi) s^n`, where `1/b` is approximated per
//! contact patch as `perimeter / (2 area)` of the patch hull. Tangential
//! traction follows Janosi-Hanamoto, `tau = tau_max (1 - e^(-k/J))`, with a
//! Mohr-Coulomb cap `tau_max = c + sigma mu`.
//!
//! # The per-step pipeline
//!
//! [`ScmTerrain::advance`] runs once per integrator step:
//!
//! 1. resolve the *active domains* (oriented boxes attached to monitored
//!    bodies) to rectangles of candidate grid cells;
//! 2. ray-cast from every candidate cell into the embedder's collision world,
//!    in parallel, collecting hits map-reduce style;
//! 3. flood-fill the hit cells into *contact patches* and compute their hull
//!    area, perimeter and Bekker shape factor;
//! 4. run the constitutive update per hit cell;
//! 5. accumulate forces per contactable and hand them to the embedder (or
//!    hold them for external query in co-simulation mode);
//! 6. if enabled, bulldoze displaced material to the patch boundaries and
//!    relax it under a slope limit;
//! 7. push modified cells to the visualization mesh.
//!
//! The embedder supplies its side of the contract through the
//! [`CollisionQuery`] and [`LoadSink`] traits.
//!
//! # Example
//!
//! ```
//! use nalgebra::{Point3, Vector3};
//! use scm_terrain::{
//!     Aabb, BodyId, CollisionQuery, ContactableId, FeaTriangle, NullLoadSink, Pose, RayHitInfo,
//!     ScmTerrain, TriangleId,
//! };
//!
//! // A world with no collision geometry; a real embedder forwards these
//! // queries to its collision and multibody services.
//! struct EmptyWorld;
//!
//! impl CollisionQuery for EmptyWorld {
//!     fn ray_hit(&self, _: &Point3<f64>, _: &Point3<f64>) -> Option<RayHitInfo> {
//!         None
//!     }
//!     fn collision_bounds(&self) -> Aabb {
//!         Aabb::empty()
//!     }
//!     fn body_ref_frame(&self, _: BodyId) -> Pose {
//!         Pose::identity()
//!     }
//!     fn body_com(&self, _: BodyId) -> Point3<f64> {
//!         Point3::origin()
//!     }
//!     fn contact_point_speed(&self, _: ContactableId, _: &Point3<f64>) -> Vector3<f64> {
//!         Vector3::zeros()
//!     }
//!     fn fea_triangle(&self, _: TriangleId) -> Option<FeaTriangle> {
//!         None
//!     }
//! }
//!
//! let mut terrain = ScmTerrain::flat(20.0, 20.0, 0.05, true).unwrap();
//! terrain.set_soil_parameters(2e6, 0.0, 1.1, 0.0, 30.0, 0.01, 4e7, 3e4);
//! terrain.enable_bulldozing(true);
//!
//! let mut sink = NullLoadSink;
//! terrain.advance(1e-3, &EmptyWorld, &mut sink);
//! assert_eq!(terrain.num_ray_hits(), 0);
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::cast_precision_loss,      // grid indices to f64 are exact
    clippy::cast_possible_truncation, // snapping plane coordinates to indices
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]

mod bulldozing;
mod domain;
mod forces;
mod host;
mod patch;
mod raycast;
mod terrain;
mod timers;
mod viz;

pub use host::{CollisionQuery, FeaTriangle, LoadSink, NullLoadSink, RayHitInfo};
pub use terrain::{NodeInfo, ScmTerrain, StepStats};
pub use viz::{Colormap, PlotType, TerrainMesh};

// Re-export the crates that make up the public API surface
pub use scm_grid::{BaseSurface, NodeRecord, NodeStore, TriMesh};
pub use scm_types::{
    Aabb, BodyId, BulldozingParams, ContactableId, ContactableSoil, FeaNodeId, GridCoord, Pose,
    Result, SoilParams, SoilSampler, SurfaceId, TerrainError, TriangleId,
};
