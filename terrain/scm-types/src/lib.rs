//! Core types for SCM deformable terrain simulation.
//!
//! This crate provides the foundational types shared by the terrain grid and
//! the per-step contact pipeline:
//!
//! - [`GridCoord`] - Integer cell index on the terrain grid
//! - [`Pose`] - Rigid frame (SCM reference frame, body reference frames)
//! - [`Aabb`] - Axis-aligned bounding box (terrain boundary, collision bounds)
//! - [`ContactableId`] - Tagged identifier for objects touching the soil
//! - [`SoilParams`] - Bekker / Mohr-Coulomb / Janosi-Hanamoto soil constants
//! - [`BulldozingParams`] - Lateral material-flow heuristic settings
//! - [`TerrainError`] - Error taxonomy for initialization and queries
//!
//! # Design Philosophy
//!
//! These types are **pure data**. They carry no terrain state and no contact
//! mechanics; they are the common language between the sparse grid store, the
//! step pipeline, and the embedding multibody application.
//!
//! # Coordinate System
//!
//! The terrain is defined relative to an SCM reference frame: a user-supplied
//! rigid [`Pose`] whose local x-y plane carries the grid and whose local +Z is
//! the direction of soil deformation. World-frame quantities are always
//! converted through this frame at the boundary of an operation.
//!
//! # Example
//!
//! ```
//! use scm_types::{GridCoord, SoilParams};
//!
//! let soil = SoilParams::default();
//! assert!(soil.elastic_k >= soil.bekker_kphi);
//!
//! let cell = GridCoord::new(3, -2);
//! let neighbors: Vec<GridCoord> = cell.neighbors4().collect();
//! assert_eq!(neighbors.len(), 4);
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,  // Many methods can't be const due to nalgebra
    clippy::cast_precision_loss,   // i32 to f64 grid-coordinate conversion is exact
    clippy::missing_errors_doc
)]

mod bounds;
mod coord;
mod error;
mod ids;
mod pose;
mod soil;

pub use bounds::Aabb;
pub use coord::{GridCoord, NEIGHBORS4, NEIGHBORS8};
pub use error::TerrainError;
pub use ids::{BodyId, ContactableId, FeaNodeId, SurfaceId, TriangleId};
pub use pose::Pose;
pub use soil::{BulldozingParams, ContactableSoil, SoilParams, SoilSampler};

// Re-export math types for convenience
pub use nalgebra::{Point3, UnitQuaternion, Vector3};

/// Result type for terrain operations.
pub type Result<T> = std::result::Result<T, TerrainError>;
