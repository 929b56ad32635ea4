//! Undeformed base heightfield.

use std::path::Path;

use nalgebra::Vector3;
use scm_types::{GridCoord, Result, TerrainError};
use tracing::{debug, info};

use crate::trimesh::TriMesh;

/// The undeformed terrain surface sampled on the grid.
///
/// Built once at initialization from one of three sources: a flat patch, a
/// gray-scale heightmap image, or a triangle mesh rasterized onto the grid.
/// Height lookups outside the grid range are clamped to the interior.
///
/// Grid sizing is shared by all three modes: for a patch of extent
/// `size_x x size_y` and target spacing `delta`, the half-counts are
/// `nx = ceil(size_x / (2 delta))` (and analogously `ny`), and the actual
/// spacing is recomputed as `size_x / (2 nx)` so the grid covers the patch
/// exactly.
#[derive(Debug, Clone)]
pub struct BaseSurface {
    nx: i32,
    ny: i32,
    delta: f64,
    /// Dense heights, row-major `(2nx+1) x (2ny+1)`; `None` for a flat patch.
    heights: Option<Vec<f64>>,
}

fn validate_spacing(delta: f64) -> Result<()> {
    if !delta.is_finite() || delta <= 0.0 {
        return Err(TerrainError::InvalidSpacing(delta));
    }
    Ok(())
}

fn validate_size(size_x: f64, size_y: f64) -> Result<()> {
    if size_x <= 0.0 || size_y <= 0.0 {
        return Err(TerrainError::InvalidPatchSize { size_x, size_y });
    }
    Ok(())
}

fn half_divisions(extent: f64, delta: f64) -> i32 {
    ((extent / 2.0) / delta).ceil() as i32
}

impl BaseSurface {
    /// Flat patch at height zero.
    pub fn flat(size_x: f64, size_y: f64, delta: f64) -> Result<Self> {
        validate_spacing(delta)?;
        validate_size(size_x, size_y)?;
        let nx = half_divisions(size_x, delta);
        let ny = half_divisions(size_y, delta);
        let delta = size_x / (2.0 * f64::from(nx));
        info!(nx, ny, delta, "initialized flat terrain patch");
        Ok(Self {
            nx,
            ny,
            delta,
            heights: None,
        })
    }

    /// Patch sampled from a single-channel heightmap image.
    ///
    /// Each grid vertex bilinearly interpolates the gray level at its
    /// fractional image coordinate; black maps to `h_min` and white to
    /// `h_max`. The image origin is its top-left corner while grid row 0 is
    /// the bottom edge of the patch, so rows are flipped during resampling.
    pub fn from_heightmap(
        path: impl AsRef<Path>,
        size_x: f64,
        size_y: f64,
        h_min: f64,
        h_max: f64,
        delta: f64,
    ) -> Result<Self> {
        validate_spacing(delta)?;
        validate_size(size_x, size_y)?;
        let path_str = path.as_ref().display().to_string();
        let img = image::open(path.as_ref())
            .map_err(|e| TerrainError::heightmap(&path_str, e.to_string()))?
            .to_luma8();
        let (w, h) = (img.width() as usize, img.height() as usize);
        if w < 2 || h < 2 {
            return Err(TerrainError::HeightmapTooSmall { path: path_str });
        }

        let nx = half_divisions(size_x, delta);
        let ny = half_divisions(size_y, delta);
        let delta = size_x / (2.0 * f64::from(nx));
        let nvx = (2 * nx + 1) as usize;
        let nvy = (2 * ny + 1) as usize;

        let dx_img = 1.0 / (w as f64 - 1.0);
        let dy_img = 1.0 / (h as f64 - 1.0);
        let dx_grid = 0.5 / f64::from(nx);
        let dy_grid = 0.5 / f64::from(ny);
        let h_scale = (h_max - h_min) / 255.0;

        let gray = |jx: usize, jy: usize| f64::from(img.get_pixel(jx as u32, jy as u32)[0]);

        let mut heights = vec![0.0_f64; nvx * nvy];
        for ix in 0..nvx {
            // x location in the image, in [0, 1], 0 at the left edge
            let x = ix as f64 * dx_grid;
            let jx1 = ((x / dx_img).floor() as usize).min(w - 1);
            let jx2 = ((x / dx_img).ceil() as usize).min(w - 1);
            let ax = ((x - jx1 as f64 * dx_img) / dx_img).clamp(0.0, 1.0);

            for iy in 0..nvy {
                // y location in the image, in [0, 1], 0 at the top edge
                let y = (nvy - 1 - iy) as f64 * dy_grid;
                let jy1 = ((y / dy_img).floor() as usize).min(h - 1);
                let jy2 = ((y / dy_img).ceil() as usize).min(h - 1);
                let ay = ((y - jy1 as f64 * dy_img) / dy_img).clamp(0.0, 1.0);

                let g11 = gray(jx1, jy1);
                let g12 = gray(jx1, jy2);
                let g21 = gray(jx2, jy1);
                let g22 = gray(jx2, jy2);
                let g = (1.0 - ax) * (1.0 - ay) * g11
                    + (1.0 - ax) * ay * g12
                    + ax * (1.0 - ay) * g21
                    + ax * ay * g22;
                heights[ix + nvx * iy] = h_min + g * h_scale;
            }
        }

        info!(nx, ny, delta, image_w = w, image_h = h, "initialized terrain from height map");
        Ok(Self {
            nx,
            ny,
            delta,
            heights: Some(heights),
        })
    }

    /// Patch sampled from a triangle mesh.
    ///
    /// The grid covers the x-y bounds of the mesh shrunk by one spacing on
    /// each side and is centered on those bounds. Each triangle's projection
    /// is rasterized over the cells whose center passes a 2-D barycentric
    /// inclusion test; overlapping triangles are last-write-wins. Cells never
    /// covered by any triangle keep the floor value `z_min + base_offset` --
    /// this is the external-boundary policy for meshes that do not cover the
    /// whole rectangular patch.
    pub fn from_trimesh(mesh: &TriMesh, delta: f64, base_offset: f64) -> Result<Self> {
        validate_spacing(delta)?;
        if mesh.is_empty() {
            return Err(TerrainError::EmptyMesh);
        }

        let bounds = mesh.bounds();
        let min_x = bounds.min.x + delta;
        let max_x = bounds.max.x - delta;
        let min_y = bounds.min.y + delta;
        let max_y = bounds.max.y - delta;
        let min_z = bounds.min.z;
        let size_x = max_x - min_x;
        let size_y = max_y - min_y;
        validate_size(size_x, size_y)?;
        let center_x = (max_x + min_x) / 2.0;
        let center_y = (max_y + min_y) / 2.0;

        let nx = half_divisions(size_x, delta);
        let ny = half_divisions(size_y, delta);
        let delta = size_x / (2.0 * f64::from(nx));
        let nvx = (2 * nx + 1) as usize;
        let nvy = (2 * ny + 1) as usize;

        let mut heights = vec![min_z + base_offset; nvx * nvy];
        let mut num_set = 0_usize;
        let mut num_degenerate = 0_usize;

        for f in &mesh.faces {
            // Face vertices shifted so the grid is centered on the mesh
            let v = [
                mesh.vertices[f[0] as usize],
                mesh.vertices[f[1] as usize],
                mesh.vertices[f[2] as usize],
            ];
            let p = |k: usize| (v[k].x - center_x, v[k].y - center_y);
            let (x1, y1) = p(0);
            let (x2, y2) = p(1);
            let (x3, y3) = p(2);

            let denom = (y2 - y3) * (x1 - x3) + (x3 - x2) * (y1 - y3);
            if denom.abs() < 1e-12 {
                num_degenerate += 1;
                continue;
            }

            let x_min = x1.min(x2).min(x3);
            let x_max = x1.max(x2).max(x3);
            let y_min = y1.min(y2).min(y3);
            let y_max = y1.max(y2).max(y3);
            let i_min = ((x_min / delta).floor() as i32).clamp(-nx, nx);
            let i_max = ((x_max / delta).ceil() as i32).clamp(-nx, nx);
            let j_min = ((y_min / delta).floor() as i32).clamp(-ny, ny);
            let j_max = ((y_max / delta).ceil() as i32).clamp(-ny, ny);

            for i in i_min..=i_max {
                for j in j_min..=j_max {
                    let x = f64::from(i) * delta;
                    let y = f64::from(j) * delta;
                    let a1 = ((y2 - y3) * (x - x3) + (x3 - x2) * (y - y3)) / denom;
                    let a2 = ((y3 - y1) * (x - x3) + (x1 - x3) * (y - y3)) / denom;
                    let a3 = 1.0 - a1 - a2;
                    let inside = (0.0..=1.0).contains(&a1)
                        && (0.0..=1.0).contains(&a2)
                        && (0.0..=1.0).contains(&a3);
                    if inside {
                        let idx = (i + nx) as usize + nvx * ((j + ny) as usize);
                        heights[idx] = min_z + a1 * v[0].z + a2 * v[1].z + a3 * v[2].z;
                        num_set += 1;
                    }
                }
            }
        }

        if num_degenerate > 0 {
            debug!(num_degenerate, "skipped degenerate mesh triangles");
        }
        info!(nx, ny, delta, num_set, "initialized terrain from triangle mesh");
        Ok(Self {
            nx,
            ny,
            delta,
            heights: Some(heights),
        })
    }

    /// Half-count of divisions along x; indices run over `[-nx, nx]`.
    #[must_use]
    pub fn nx(&self) -> i32 {
        self.nx
    }

    /// Half-count of divisions along y.
    #[must_use]
    pub fn ny(&self) -> i32 {
        self.ny
    }

    /// Grid spacing.
    #[must_use]
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Area of one grid cell.
    #[must_use]
    pub fn cell_area(&self) -> f64 {
        self.delta * self.delta
    }

    /// Extent of the patch along x.
    #[must_use]
    pub fn size_x(&self) -> f64 {
        2.0 * f64::from(self.nx) * self.delta
    }

    /// Extent of the patch along y.
    #[must_use]
    pub fn size_y(&self) -> f64 {
        2.0 * f64::from(self.ny) * self.delta
    }

    /// True for a flat (all-zero) base.
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.heights.is_none()
    }

    /// Undeformed height at a grid vertex, clamped to the grid interior.
    #[must_use]
    pub fn init_height(&self, loc: GridCoord) -> f64 {
        match &self.heights {
            None => 0.0,
            Some(heights) => {
                let c = loc.clamped(self.nx, self.ny);
                let nvx = (2 * self.nx + 1) as usize;
                heights[(c.x + self.nx) as usize + nvx * ((c.y + self.ny) as usize)]
            }
        }
    }

    /// Undeformed surface normal at a grid vertex, in the SCM frame.
    ///
    /// Estimated from the four-neighbor finite difference of the base height;
    /// a flat base returns +Z exactly.
    #[must_use]
    pub fn init_normal(&self, loc: GridCoord) -> Vector3<f64> {
        if self.heights.is_none() {
            return Vector3::z();
        }
        let h_e = self.init_height(loc + GridCoord::new(1, 0));
        let h_w = self.init_height(loc - GridCoord::new(1, 0));
        let h_n = self.init_height(loc + GridCoord::new(0, 1));
        let h_s = self.init_height(loc - GridCoord::new(0, 1));
        Vector3::new(h_w - h_e, h_s - h_n, 2.0 * self.delta).normalize()
    }
}
