//! Error types for terrain operations.

use thiserror::Error;

/// Errors that can occur while configuring or initializing the terrain.
///
/// Per-step anomalies (degenerate patches, out-of-grid cells) are not errors;
/// they are localized by skipping the offending cell or patch and surface
/// through the step counters instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TerrainError {
    /// Grid spacing must be positive and finite.
    #[error("invalid grid spacing: {0} (must be positive and finite)")]
    InvalidSpacing(f64),

    /// Patch dimensions must be positive.
    #[error("invalid patch size: {size_x} x {size_y} (must be positive)")]
    InvalidPatchSize {
        /// Requested extent along x.
        size_x: f64,
        /// Requested extent along y.
        size_y: f64,
    },

    /// The heightmap image could not be read or decoded.
    #[error("cannot read height map image '{path}': {reason}")]
    Heightmap {
        /// Path of the offending file.
        path: String,
        /// Decoder diagnostic.
        reason: String,
    },

    /// The heightmap image is too small to resample.
    #[error("height map image '{path}' must be at least 2x2 pixels")]
    HeightmapTooSmall {
        /// Path of the offending file.
        path: String,
    },

    /// The mesh file could not be read or parsed.
    #[error("cannot load mesh '{path}': {reason}")]
    MeshLoad {
        /// Path of the offending file.
        path: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// The mesh has no vertices or no faces.
    #[error("mesh has no usable geometry")]
    EmptyMesh,

    /// Writing an output file failed.
    #[error("cannot write '{path}': {reason}")]
    Write {
        /// Path of the offending file.
        path: String,
        /// I/O diagnostic.
        reason: String,
    },
}

impl TerrainError {
    /// Create a heightmap error.
    #[must_use]
    pub fn heightmap(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Heightmap {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a mesh-load error.
    #[must_use]
    pub fn mesh_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MeshLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a write error.
    #[must_use]
    pub fn write(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Write {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = TerrainError::InvalidSpacing(-0.1);
        assert!(err.to_string().contains("-0.1"));

        let err = TerrainError::mesh_load("hills.obj", "truncated face record");
        assert!(err.to_string().contains("hills.obj"));
        assert!(err.to_string().contains("truncated"));
    }
}
