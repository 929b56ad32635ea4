//! Visualization bridge: persistent terrain mesh, colormap, false coloring.
//!
//! The terrain owns one triangle mesh with fixed connectivity (two triangles
//! per grid cell) whose vertices track the deforming heightfield. Only the
//! vertices of cells modified in a step are updated, and their indices are
//! exposed so a renderer can upload incrementally instead of re-sending the
//! whole mesh.

use std::io::Write as _;
use std::path::Path;

use nalgebra::{Point3, Vector3};
use scm_grid::{BaseSurface, NodeRecord};
use scm_types::{GridCoord, Pose, Result, TerrainError};

/// Field used for false coloring of the terrain mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlotType {
    /// No coloring (all vertices stay white).
    #[default]
    None,
    /// Current height.
    Level,
    /// Initial (undeformed, possibly bulldozed-up) height.
    LevelInitial,
    /// Total sinkage.
    Sinkage,
    /// Elastic part of the sinkage.
    SinkageElastic,
    /// Plastic part of the sinkage.
    SinkagePlastic,
    /// Plastic flow rate of the current step.
    StepPlasticFlow,
    /// Normal pressure.
    Pressure,
    /// Yield pressure.
    PressureYield,
    /// Shear traction.
    Shear,
    /// Accumulated Janosi shear displacement.
    KJanosi,
    /// Red where the cell carries pressure, blue elsewhere.
    IsTouched,
    /// Black for erosion-domain cells, red for pressured cells.
    IslandId,
    /// Parked mass remainder from bulldozing.
    MassRemainder,
}

/// Jet colormap lookup.
///
/// Maps a scalar linearly into `[0, 1]` over `[vmin, vmax]` and returns the
/// classic blue-cyan-yellow-red ramp.
#[derive(Debug, Clone, Copy, Default)]
pub struct Colormap;

impl Colormap {
    /// Color for `value` over the range `[vmin, vmax]`.
    #[must_use]
    pub fn get(&self, value: f64, vmin: f64, vmax: f64) -> [f32; 3] {
        let t = if (vmax - vmin).abs() < 1e-300 {
            0.0
        } else {
            ((value - vmin) / (vmax - vmin)).clamp(0.0, 1.0)
        };
        let channel = |center: f64| ((1.5 - (4.0 * t - center).abs()).clamp(0.0, 1.0)) as f32;
        [channel(3.0), channel(2.0), channel(1.0)]
    }
}

/// The persistent visualization mesh of the terrain patch.
#[derive(Debug, Clone)]
pub struct TerrainMesh {
    nx: i32,
    ny: i32,
    delta: f64,
    /// Vertex positions in world coordinates.
    pub vertices: Vec<Point3<f64>>,
    /// Smoothed vertex normals (world frame).
    pub normals: Vec<Vector3<f64>>,
    /// Vertex colors.
    pub colors: Vec<[f32; 3]>,
    /// Texture coordinates in `[0, 1] x [0, 1]`.
    pub uv: Vec<[f64; 2]>,
    /// Triangle faces, counter-clockwise.
    pub faces: Vec<[u32; 3]>,
    wireframe: bool,
    modified: Vec<u32>,
}

impl TerrainMesh {
    /// Build the initial mesh over the base surface.
    ///
    /// Vertices are ordered row by row from the bottom-left corner of the
    /// patch. Flat bases get +Z normals directly; sampled bases get smoothed
    /// per-vertex normals averaged from all incident faces.
    #[must_use]
    pub fn build(base: &BaseSurface, frame: &Pose) -> Self {
        let nx = base.nx();
        let ny = base.ny();
        let delta = base.delta();
        let nvx = (2 * nx + 1) as usize;
        let nvy = (2 * ny + 1) as usize;
        let n_verts = nvx * nvy;
        let n_faces = 2 * (nvx - 1) * (nvy - 1);
        let x_scale = 0.5 / f64::from(nx);
        let y_scale = 0.5 / f64::from(ny);

        let mut vertices = Vec::with_capacity(n_verts);
        let mut normals = vec![Vector3::zeros(); n_verts];
        let mut colors = Vec::with_capacity(n_verts);
        let mut uv = Vec::with_capacity(n_verts);

        for iy in 0..nvy {
            for ix in 0..nvx {
                let loc = GridCoord::new(ix as i32 - nx, iy as i32 - ny);
                let (x, y) = loc.to_plane(delta);
                let z = base.init_height(loc);
                vertices.push(frame.transform_point(&Point3::new(x, y, z)));
                colors.push([1.0, 1.0, 1.0]);
                uv.push([ix as f64 * x_scale, iy as f64 * y_scale]);
            }
        }

        let mut faces = Vec::with_capacity(n_faces);
        for iy in 0..nvy - 1 {
            for ix in 0..nvx - 1 {
                let v0 = (ix + nvx * iy) as u32;
                let nvx = nvx as u32;
                faces.push([v0, v0 + 1, v0 + nvx + 1]);
                faces.push([v0, v0 + nvx + 1, v0 + nvx]);
            }
        }

        if base.is_flat() {
            let up = frame.up();
            for n in &mut normals {
                *n = up;
            }
        } else {
            // Average the normals of all faces incident to each vertex
            let mut counts = vec![0_u32; n_verts];
            for f in &faces {
                let a = vertices[f[0] as usize];
                let b = vertices[f[1] as usize];
                let c = vertices[f[2] as usize];
                let nrm = (b - a).cross(&(c - a));
                let nrm = if nrm.norm() > 1e-12 {
                    nrm.normalize()
                } else {
                    frame.up()
                };
                for &i in f {
                    normals[i as usize] += nrm;
                    counts[i as usize] += 1;
                }
            }
            for (n, &c) in normals.iter_mut().zip(&counts) {
                if c > 0 {
                    *n /= f64::from(c);
                }
            }
        }

        Self {
            nx,
            ny,
            delta,
            vertices,
            normals,
            colors,
            uv,
            faces,
            wireframe: true,
            modified: Vec::new(),
        }
    }

    /// Whether a grid location falls inside the mesh.
    #[must_use]
    pub fn in_bounds(&self, loc: GridCoord) -> bool {
        loc.in_range(self.nx, self.ny)
    }

    /// Mesh vertex index of a grid location (must be in bounds).
    #[must_use]
    pub fn vertex_index(&self, loc: GridCoord) -> usize {
        (loc.x + self.nx) as usize + (2 * self.nx + 1) as usize * ((loc.y + self.ny) as usize)
    }

    /// Indices of the (up to six) faces incident to a grid vertex.
    ///
    /// Boundary vertices report no faces and keep their initial normal.
    #[must_use]
    pub fn incident_faces(&self, loc: GridCoord) -> Vec<usize> {
        if loc.x == -self.nx || loc.x == self.nx || loc.y == -self.ny || loc.y == self.ny {
            return Vec::new();
        }
        let i = (loc.x + self.nx) as usize;
        let j = (loc.y + self.ny) as usize;
        let row = 2 * self.nx as usize;
        vec![
            2 * ((i - 1) + row * (j - 1)),
            2 * ((i - 1) + row * (j - 1)) + 1,
            2 * ((i - 1) + row * j),
            2 * (i + row * j),
            2 * (i + row * j) + 1,
            2 * (i + row * (j - 1)) + 1,
        ]
    }

    /// Move a vertex to the cell's current level and refresh its color.
    pub fn update_vertex(
        &mut self,
        loc: GridCoord,
        nr: &NodeRecord,
        frame: &Pose,
        plot: PlotType,
        colormap: &Colormap,
        v_min: f64,
        v_max: f64,
    ) {
        let iv = self.vertex_index(loc);
        let (x, y) = loc.to_plane(self.delta);
        self.vertices[iv] = frame.transform_point(&Point3::new(x, y, nr.level));

        let color = match plot {
            PlotType::None => None,
            PlotType::Level => Some(colormap.get(nr.level, v_min, v_max)),
            PlotType::LevelInitial => Some(colormap.get(nr.level_initial, v_min, v_max)),
            PlotType::Sinkage => Some(colormap.get(nr.sinkage, v_min, v_max)),
            PlotType::SinkageElastic => Some(colormap.get(nr.sinkage_elastic, v_min, v_max)),
            PlotType::SinkagePlastic => Some(colormap.get(nr.sinkage_plastic, v_min, v_max)),
            PlotType::StepPlasticFlow => Some(colormap.get(nr.step_plastic_flow, v_min, v_max)),
            PlotType::Pressure => Some(colormap.get(nr.sigma, v_min, v_max)),
            PlotType::PressureYield => Some(colormap.get(nr.sigma_yield, v_min, v_max)),
            PlotType::Shear => Some(colormap.get(nr.tau, v_min, v_max)),
            PlotType::KJanosi => Some(colormap.get(nr.kshear, v_min, v_max)),
            PlotType::MassRemainder => Some(colormap.get(nr.massremainder, v_min, v_max)),
            PlotType::IsTouched => Some(if nr.is_touched() {
                [1.0, 0.0, 0.0]
            } else {
                [0.0, 0.0, 1.0]
            }),
            PlotType::IslandId => {
                if nr.is_touched() {
                    Some([1.0, 0.0, 0.0])
                } else if nr.erosion {
                    Some([0.0, 0.0, 0.0])
                } else {
                    None
                }
            }
        };
        if let Some(c) = color {
            self.colors[iv] = c;
        }
    }

    /// Recompute the smoothed normal of a vertex from its incident faces.
    pub fn update_normal(&mut self, loc: GridCoord) {
        let faces = self.incident_faces(loc);
        if faces.is_empty() {
            return;
        }
        let iv = self.vertex_index(loc);
        let mut acc = Vector3::zeros();
        for &f in &faces {
            let [a, b, c] = self.faces[f];
            let va = self.vertices[a as usize];
            let vb = self.vertices[b as usize];
            let vc = self.vertices[c as usize];
            let nrm = (vb - va).cross(&(vc - va));
            if nrm.norm() > 1e-12 {
                acc += nrm.normalize();
            }
        }
        self.normals[iv] = acc / faces.len() as f64;
    }

    /// Render the mesh as wireframe (skips normal smoothing).
    pub fn set_wireframe(&mut self, wireframe: bool) {
        self.wireframe = wireframe;
    }

    /// Whether the mesh renders as wireframe.
    #[must_use]
    pub fn is_wireframe(&self) -> bool {
        self.wireframe
    }

    /// Replace the modified-vertex list for this step.
    pub(crate) fn set_modified(&mut self, modified: Vec<u32>) {
        self.modified = modified;
    }

    /// Vertices touched in the last step, for incremental upload.
    #[must_use]
    pub fn modified_vertices(&self) -> &[u32] {
        &self.modified
    }

    /// Write the mesh as a Wavefront OBJ file.
    pub fn write_obj(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let path_str = path.display().to_string();
        let file = std::fs::File::create(path)
            .map_err(|e| TerrainError::write(&path_str, e.to_string()))?;
        let mut out = std::io::BufWriter::new(file);
        let io_err = |e: std::io::Error| TerrainError::write(&path_str, e.to_string());

        for v in &self.vertices {
            writeln!(out, "v {} {} {}", v.x, v.y, v.z).map_err(io_err)?;
        }
        for n in &self.normals {
            writeln!(out, "vn {} {} {}", n.x, n.y, n.z).map_err(io_err)?;
        }
        for f in &self.faces {
            writeln!(
                out,
                "f {0}//{0} {1}//{1} {2}//{2}",
                f[0] + 1,
                f[1] + 1,
                f[2] + 1
            )
            .map_err(io_err)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn flat_mesh() -> TerrainMesh {
        let base = BaseSurface::flat(2.0, 2.0, 0.5).unwrap();
        TerrainMesh::build(&base, &Pose::identity())
    }

    #[test]
    fn test_build_counts() {
        let mesh = flat_mesh(); // nx = ny = 2 -> 5x5 vertices
        assert_eq!(mesh.vertices.len(), 25);
        assert_eq!(mesh.faces.len(), 2 * 4 * 4);
        assert!(mesh.is_wireframe());
        for n in &mesh.normals {
            assert_relative_eq!(*n, Vector3::z(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_vertex_index_corners() {
        let mesh = flat_mesh();
        assert_eq!(mesh.vertex_index(GridCoord::new(-2, -2)), 0);
        assert_eq!(mesh.vertex_index(GridCoord::new(2, 2)), 24);
        let v = mesh.vertices[mesh.vertex_index(GridCoord::origin())];
        assert_relative_eq!(v.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(v.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_incident_faces_interior_and_boundary() {
        let mesh = flat_mesh();
        assert_eq!(mesh.incident_faces(GridCoord::origin()).len(), 6);
        assert!(mesh.incident_faces(GridCoord::new(2, 0)).is_empty());
    }

    #[test]
    fn test_update_vertex_moves_and_colors() {
        let mut mesh = flat_mesh();
        let mut nr = NodeRecord::default();
        nr.level = -0.1;
        nr.sigma = 100.0;
        let loc = GridCoord::new(1, 1);
        mesh.update_vertex(
            loc,
            &nr,
            &Pose::identity(),
            PlotType::IsTouched,
            &Colormap,
            0.0,
            1.0,
        );
        let iv = mesh.vertex_index(loc);
        assert_relative_eq!(mesh.vertices[iv].z, -0.1, epsilon = 1e-12);
        assert_eq!(mesh.colors[iv], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_update_normal_tilts_toward_pit() {
        let mut mesh = flat_mesh();
        let pit = GridCoord::new(1, 0);
        let mut nr = NodeRecord::default();
        nr.level = -0.2;
        mesh.update_vertex(pit, &nr, &Pose::identity(), PlotType::None, &Colormap, 0.0, 1.0);
        // Neighbor vertex normal leans toward the pit (+x)
        mesh.update_normal(GridCoord::origin());
        let n = mesh.normals[mesh.vertex_index(GridCoord::origin())];
        assert!(n.x > 0.0);
        assert!(n.z > 0.0);
    }

    #[test]
    fn test_colormap_endpoints() {
        let cm = Colormap;
        let lo = cm.get(0.0, 0.0, 1.0);
        let hi = cm.get(1.0, 0.0, 1.0);
        // Jet: low end blue-ish, high end red-ish
        assert!(lo[2] > lo[0]);
        assert!(hi[0] > hi[2]);
        // Degenerate range does not divide by zero
        let c = cm.get(0.5, 1.0, 1.0);
        assert!(c.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_write_obj_round_trip() {
        let mesh = flat_mesh();
        let path = std::env::temp_dir().join("scm_terrain_test_mesh.obj");
        mesh.write_obj(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 25);
        assert_eq!(text.lines().filter(|l| l.starts_with("f ")).count(), 32);
        std::fs::remove_file(&path).ok();
    }
}
