//! Minimal indexed triangle mesh with Wavefront OBJ input.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use nalgebra::Point3;
use scm_types::{Aabb, Result, TerrainError};

/// An indexed triangle mesh used as terrain input geometry.
///
/// Faces are triples of indices into the vertex array. Polygonal OBJ faces
/// are fan-triangulated on load.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TriMesh {
    /// Vertex positions.
    pub vertices: Vec<Point3<f64>>,
    /// Triangle faces, counter-clockwise winding.
    pub faces: Vec<[u32; 3]>,
}

impl TriMesh {
    /// Create a mesh from vertices and faces.
    #[must_use]
    pub fn new(vertices: Vec<Point3<f64>>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// True if the mesh has no vertices or no faces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Axis-aligned bounds of the vertex data.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        let mut aabb = Aabb::empty();
        for v in &self.vertices {
            aabb.extend(v);
        }
        aabb
    }

    /// Load a mesh from a Wavefront OBJ file.
    ///
    /// Only `v` and `f` records are interpreted; texture/normal indices in
    /// face records are accepted and ignored. Negative (relative) vertex
    /// indices are supported.
    pub fn from_obj_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();
        let file =
            File::open(path).map_err(|e| TerrainError::mesh_load(&path_str, e.to_string()))?;
        Self::from_obj_reader(BufReader::new(file), &path_str)
    }

    /// Parse OBJ data from any reader; `origin` names the source in errors.
    pub fn from_obj_reader(reader: impl Read, origin: &str) -> Result<Self> {
        let mut vertices: Vec<Point3<f64>> = Vec::new();
        let mut faces: Vec<[u32; 3]> = Vec::new();

        for (lineno, line) in BufReader::new(reader).lines().enumerate() {
            let line = line.map_err(|e| TerrainError::mesh_load(origin, e.to_string()))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("v") => {
                    let mut coord = [0.0_f64; 3];
                    for c in &mut coord {
                        let tok = tokens.next().ok_or_else(|| {
                            TerrainError::mesh_load(
                                origin,
                                format!("line {}: truncated vertex record", lineno + 1),
                            )
                        })?;
                        *c = tok.parse().map_err(|_| {
                            TerrainError::mesh_load(
                                origin,
                                format!("line {}: bad vertex coordinate '{tok}'", lineno + 1),
                            )
                        })?;
                    }
                    vertices.push(Point3::new(coord[0], coord[1], coord[2]));
                }
                Some("f") => {
                    let mut idx: Vec<u32> = Vec::with_capacity(4);
                    for tok in tokens {
                        // "i", "i/t", "i/t/n", "i//n" all start with the vertex index
                        let vtok = tok.split('/').next().unwrap_or(tok);
                        let raw: i64 = vtok.parse().map_err(|_| {
                            TerrainError::mesh_load(
                                origin,
                                format!("line {}: bad face index '{tok}'", lineno + 1),
                            )
                        })?;
                        let resolved = if raw < 0 {
                            vertices.len() as i64 + raw
                        } else {
                            raw - 1
                        };
                        if resolved < 0 || resolved >= vertices.len() as i64 {
                            return Err(TerrainError::mesh_load(
                                origin,
                                format!("line {}: face index {raw} out of range", lineno + 1),
                            ));
                        }
                        idx.push(resolved as u32);
                    }
                    if idx.len() < 3 {
                        return Err(TerrainError::mesh_load(
                            origin,
                            format!("line {}: face with fewer than 3 vertices", lineno + 1),
                        ));
                    }
                    for k in 1..idx.len() - 1 {
                        faces.push([idx[0], idx[k], idx[k + 1]]);
                    }
                }
                _ => {} // vn, vt, o, g, usemtl, ... ignored
            }
        }

        let mesh = Self { vertices, faces };
        if mesh.is_empty() {
            return Err(TerrainError::EmptyMesh);
        }
        Ok(mesh)
    }
}
