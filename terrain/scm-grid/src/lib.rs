//! Sparse height grid for SCM deformable terrain.
//!
//! The terrain state lives on a lazily-materialized grid: cells are plain
//! integer coordinates until something touches them, at which point a
//! [`NodeRecord`] is created in the [`NodeStore`] and persists for the rest of
//! the simulation. Lookups for untouched cells fall through to a
//! [`BaseSurface`], the undeformed heightfield built at initialization from a
//! flat patch, a gray-scale heightmap image, or a triangle mesh.
//!
//! Only a small fraction of cells is ever touched in typical vehicle runs,
//! which is why the store is a hash map rather than a dense array; the
//! active-domain filter in the step pipeline bounds how many new cells can
//! appear per step, so the monotone growth of the map is acceptable.
//!
//! # Example
//!
//! ```
//! use scm_grid::{BaseSurface, NodeStore};
//! use scm_types::GridCoord;
//!
//! let base = BaseSurface::flat(10.0, 10.0, 0.1).unwrap();
//! let mut store = NodeStore::new(base);
//!
//! // Untouched cells read from the base surface
//! let c = GridCoord::new(3, 4);
//! assert_eq!(store.height(c), 0.0);
//!
//! // Touching a cell materializes a persistent record
//! store.ensure(c).level = -0.02;
//! assert!((store.height(c) + 0.02).abs() < 1e-12);
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::cast_precision_loss,      // grid indices to f64 are exact
    clippy::cast_possible_truncation, // snapping plane coordinates to indices
    clippy::cast_sign_loss,
    clippy::missing_errors_doc
)]

mod base;
mod node;
mod store;
mod trimesh;

pub use base::BaseSurface;
pub use node::NodeRecord;
pub use store::NodeStore;
pub use trimesh::TriMesh;
