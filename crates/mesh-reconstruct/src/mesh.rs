//! Output mesh types and the sink interface fed by assembly.

use std::path::Path;

use nalgebra::{Point3, Vector3};
use tracing::debug;

use crate::error::ReconstructResult;
use crate::types::BoundingBox;

/// Receives vertices and triangles during mesh assembly.
///
/// Vertex indices arrive in strictly increasing order starting at zero.
/// Triangles only reference vertices already added.
pub trait MeshSink {
    /// Add vertex number `index` at `position`.
    fn add_vertex(&mut self, index: u32, position: Point3<f64>);

    /// Add a triangle by vertex indices.
    fn add_triangle(&mut self, face: [u32; 3]);

    /// Called once after the last cell.
    fn finalize(&mut self) {}
}

/// A vertex of the reconstructed surface.
#[derive(Debug, Clone)]
pub struct Vertex {
    /// 3D position.
    pub position: Point3<f64>,

    /// Unit normal, filled in by [`Mesh::compute_vertex_normals`].
    pub normal: Option<Vector3<f64>>,
}

impl Vertex {
    #[inline]
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            normal: None,
        }
    }
}

/// A triangle mesh with indexed vertices and faces.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Vertex data.
    pub vertices: Vec<Vertex>,

    /// Triangle faces as indices into the vertex array.
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
        }
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if mesh is empty (no vertices or faces).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Axis-aligned bounds of all vertices.
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_points(self.vertices.iter().map(|v| &v.position))
    }

    /// Total surface area.
    pub fn surface_area(&self) -> f64 {
        self.faces
            .iter()
            .map(|f| self.face_normal_unnormalized(f).norm() / 2.0)
            .sum()
    }

    /// Signed enclosed volume. Positive for a closed mesh whose faces are
    /// wound counter-clockwise seen from outside.
    pub fn signed_volume(&self) -> f64 {
        self.faces
            .iter()
            .map(|f| {
                let [a, b, c] = f.map(|i| self.vertices[i as usize].position.coords);
                a.dot(&b.cross(&c))
            })
            .sum::<f64>()
            / 6.0
    }

    /// Area-weighted vertex normals. Vertices touching only degenerate
    /// faces keep `None`.
    pub fn compute_vertex_normals(&mut self) {
        let mut accum = vec![Vector3::zeros(); self.vertices.len()];

        for face in &self.faces {
            // Length is twice the triangle area, which gives the weighting.
            let n = self.face_normal_unnormalized(face);
            for &i in face {
                accum[i as usize] += n;
            }
        }

        for (vertex, n) in self.vertices.iter_mut().zip(accum) {
            let len_sq = n.norm_squared();
            vertex.normal = (len_sq > f64::EPSILON).then(|| n / len_sq.sqrt());
        }

        debug!(vertices = self.vertices.len(), "Computed vertex normals");
    }

    /// Save to `.ply` or `.obj`, chosen by extension.
    pub fn save(&self, path: impl AsRef<Path>) -> ReconstructResult<()> {
        crate::io::save_mesh(self, path.as_ref())
    }

    fn face_normal_unnormalized(&self, face: &[u32; 3]) -> Vector3<f64> {
        let a = self.vertices[face[0] as usize].position;
        let b = self.vertices[face[1] as usize].position;
        let c = self.vertices[face[2] as usize].position;
        (b - a).cross(&(c - a))
    }
}

impl MeshSink for Mesh {
    fn add_vertex(&mut self, index: u32, position: Point3<f64>) {
        debug_assert_eq!(index as usize, self.vertices.len(), "vertex indices must be dense");
        self.vertices.push(Vertex::new(position));
    }

    fn add_triangle(&mut self, face: [u32; 3]) {
        self.faces.push(face);
    }

    fn finalize(&mut self) {
        self.compute_vertex_normals();
    }
}
