//! Per-cell isosurface polygonization.

mod tables;

use nalgebra::Point3;

use crate::mesh::MeshSink;

pub use tables::{EDGE_CORNERS, EDGE_TABLE, TRI_TABLE};

/// Position and field value of one cell corner.
///
/// `value` is `None` when the distance field could not be evaluated there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerSample {
    pub position: Point3<f64>,
    pub value: Option<f64>,
}

/// Turns the eight corner samples of a cell into triangles.
///
/// Implementations must number the vertices they emit consecutively
/// starting at `next_vertex` and return the next unused index. Triangles
/// may only reference vertices emitted by the same call, and at most one
/// vertex per cell edge may be emitted. Assembly relies on this to renumber
/// cells polygonized in parallel and to bound the vertex counter.
pub trait Polygonizer {
    fn polygonize<S: MeshSink + ?Sized>(
        &self,
        corners: &[CornerSample; 8],
        next_vertex: u32,
        sink: &mut S,
    ) -> u32;
}

/// Classic marching cubes over a single cell.
///
/// Corners with a value below `iso_level` are inside. Each intersected
/// edge produces one vertex per cell, placed by linear interpolation.
/// Triangles are wound counter-clockwise seen from outside, so face normals
/// point towards larger field values. A cell with any unevaluated corner is
/// skipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarchingCubes {
    pub iso_level: f64,
}

impl MarchingCubes {
    pub fn new(iso_level: f64) -> Self {
        Self { iso_level }
    }

    /// Classification index: bit `i` set when corner `i` is inside.
    pub fn cube_index(&self, values: &[f64; 8]) -> usize {
        values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v < self.iso_level)
            .fold(0, |acc, (i, _)| acc | (1 << i))
    }

    fn interpolate(&self, a: &CornerSample, va: f64, b: &CornerSample, vb: f64) -> Point3<f64> {
        let denom = vb - va;
        let t = if denom.abs() < 1e-12 {
            0.5
        } else {
            ((self.iso_level - va) / denom).clamp(0.0, 1.0)
        };
        a.position + (b.position - a.position) * t
    }
}

impl Default for MarchingCubes {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Polygonizer for MarchingCubes {
    fn polygonize<S: MeshSink + ?Sized>(
        &self,
        corners: &[CornerSample; 8],
        next_vertex: u32,
        sink: &mut S,
    ) -> u32 {
        let mut values = [0.0; 8];
        for (v, corner) in values.iter_mut().zip(corners) {
            match corner.value {
                Some(d) => *v = d,
                None => return next_vertex,
            }
        }

        let case = self.cube_index(&values);
        if EDGE_TABLE[case] == 0 {
            return next_vertex;
        }

        let mut next = next_vertex;
        let mut edge_vertex: [Option<u32>; 12] = [None; 12];

        for tri in TRI_TABLE[case].chunks_exact(3).take_while(|t| t[0] != -1) {
            let mut face = [0u32; 3];
            for (slot, &edge) in face.iter_mut().zip(tri) {
                let edge = edge as usize;
                *slot = match edge_vertex[edge] {
                    Some(index) => index,
                    None => {
                        let [i, j] = EDGE_CORNERS[edge];
                        let position =
                            self.interpolate(&corners[i], values[i], &corners[j], values[j]);
                        let index = next;
                        sink.add_vertex(index, position);
                        edge_vertex[edge] = Some(index);
                        next += 1;
                        index
                    }
                };
            }
            // Table winding faces the inside corners; flip so normals point
            // towards increasing field values.
            sink.add_triangle([face[0], face[2], face[1]]);
        }

        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;

    fn unit_cell(values: [f64; 8]) -> [CornerSample; 8] {
        let signs = crate::grid::tables::CORNER_SIGNS;
        std::array::from_fn(|i| CornerSample {
            position: Point3::new(
                (signs[i][0] + 1) as f64 / 2.0,
                (signs[i][1] + 1) as f64 / 2.0,
                (signs[i][2] + 1) as f64 / 2.0,
            ),
            value: Some(values[i]),
        })
    }

    #[test]
    fn test_uniform_cell_emits_nothing() {
        let mc = MarchingCubes::default();
        let mut mesh = Mesh::new();
        assert_eq!(mc.polygonize(&unit_cell([1.0; 8]), 5, &mut mesh), 5);
        assert_eq!(mc.polygonize(&unit_cell([-1.0; 8]), 5, &mut mesh), 5);
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_single_inside_corner() {
        let mc = MarchingCubes::default();
        let mut mesh = Mesh::new();
        let mut values = [1.0; 8];
        values[0] = -1.0;
        let next = mc.polygonize(&unit_cell(values), 0, &mut mesh);

        assert_eq!(next, 3);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.face_count(), 1);
        // Midpoints of the three edges leaving corner 0.
        for v in &mesh.vertices {
            let coords = [v.position.x, v.position.y, v.position.z];
            assert_eq!(coords.iter().filter(|&&c| (c - 0.5).abs() < 1e-12).count(), 1);
            assert_eq!(coords.iter().filter(|&&c| c.abs() < 1e-12).count(), 2);
        }
    }

    #[test]
    fn test_face_normal_points_outside() {
        let mc = MarchingCubes::default();
        let mut mesh = Mesh::new();
        let mut values = [1.0; 8];
        values[0] = -1.0;
        mc.polygonize(&unit_cell(values), 0, &mut mesh);

        let [a, b, c] = mesh.faces[0].map(|i| mesh.vertices[i as usize].position);
        let normal = (b - a).cross(&(c - a));
        // Corner 0 sits at the origin, outside is towards (1, 1, 1).
        assert!(normal.x > 0.0 && normal.y > 0.0 && normal.z > 0.0, "{:?}", normal);
    }

    #[test]
    fn test_edge_vertices_are_shared_within_cell() {
        let mc = MarchingCubes::default();
        let mut mesh = Mesh::new();
        // Bottom face inside: one quad made of two triangles over four edges.
        let values = [-1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0];
        let next = mc.polygonize(&unit_cell(values), 10, mesh_with_offset(&mut mesh, 10));
        assert_eq!(next, 14);
        assert_eq!(mesh.vertex_count(), 14);
        assert_eq!(mesh.face_count(), 2);
        for face in &mesh.faces {
            assert!(face.iter().all(|&i| (10..14).contains(&i)));
        }
    }

    #[test]
    fn test_interpolation_weights() {
        let mc = MarchingCubes::new(0.0);
        let mut mesh = Mesh::new();
        let mut values = [3.0; 8];
        values[0] = -1.0;
        mc.polygonize(&unit_cell(values), 0, &mut mesh);
        // Along each edge the crossing sits at 1/4 of the way from corner 0.
        for v in &mesh.vertices {
            let sum = v.position.x + v.position.y + v.position.z;
            assert!((sum - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn test_missing_value_skips_cell() {
        let mc = MarchingCubes::default();
        let mut mesh = Mesh::new();
        let mut corners = unit_cell([-1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        corners[6].value = None;
        assert_eq!(mc.polygonize(&corners, 7, &mut mesh), 7);
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_cube_index() {
        let mc = MarchingCubes::new(0.5);
        assert_eq!(mc.cube_index(&[1.0; 8]), 0);
        assert_eq!(mc.cube_index(&[0.0; 8]), 255);
        assert_eq!(mc.cube_index(&[0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0]), 0b1000_0001);
    }

    /// Pads `mesh` with placeholder vertices so indices starting at `offset` line up.
    fn mesh_with_offset(mesh: &mut Mesh, offset: u32) -> &mut Mesh {
        for i in 0..offset {
            mesh.add_vertex(i, Point3::origin());
        }
        mesh
    }
}
