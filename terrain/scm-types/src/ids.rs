//! Identifiers for objects interacting with the terrain.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub struct $name(u64);

        impl $name {
            /// Create an id from a raw index.
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// The raw index.
            #[must_use]
            pub const fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

id_type! {
    /// Identifier of a rigid body in the embedding multibody system.
    BodyId
}

id_type! {
    /// Identifier of an FEA mesh node.
    FeaNodeId
}

id_type! {
    /// Identifier of an FEA contact triangle.
    TriangleId
}

id_type! {
    /// Identifier of a generic loadable parametric surface.
    SurfaceId
}

/// Identity of an object hit by a terrain ray.
///
/// The terrain dispatches on exactly three cases: rigid bodies receive a
/// resultant force and torque about their center of mass, FEA triangles
/// distribute the cell force barycentrically to their nodes, and generic
/// parametric surfaces receive a surface load. There is deliberately no open
/// trait hierarchy here; the embedder maps its own object model onto these
/// three cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ContactableId {
    /// A rigid body.
    Body(BodyId),
    /// An FEA contact triangle.
    Triangle(TriangleId),
    /// A generic loadable surface.
    Surface(SurfaceId),
}

impl fmt::Display for ContactableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Body(id) => write!(f, "{id}"),
            Self::Triangle(id) => write!(f, "{id}"),
            Self::Surface(id) => write!(f, "{id}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trip() {
        assert_eq!(BodyId::new(7).raw(), 7);
        assert_eq!(FeaNodeId::new(0).raw(), 0);
    }

    #[test]
    fn test_contactable_eq() {
        let a = ContactableId::Body(BodyId::new(1));
        let b = ContactableId::Body(BodyId::new(1));
        let c = ContactableId::Triangle(TriangleId::new(1));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_display() {
        let id = ContactableId::Body(BodyId::new(3));
        assert_eq!(id.to_string(), "BodyId(3)");
    }
}
