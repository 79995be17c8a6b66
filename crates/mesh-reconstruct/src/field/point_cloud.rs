//! Signed distance to the implicit surface of an oriented point cloud.

use hashbrown::HashSet;
use kiddo::{ImmutableKdTree, SquaredEuclidean};
use nalgebra::{Matrix3, Point3, Vector3};
use tracing::{debug, info};

use crate::error::{ReconstructError, ReconstructResult};
use crate::pointcloud::PointCloud;

use super::DistanceField;

/// Distance from a query position to the local tangent plane of the cloud.
///
/// Normals are estimated once by PCA over the `normal_neighbors` nearest
/// points and flipped to point away from the cloud centroid. A query takes
/// the `distance_neighbors` nearest points and returns the projection of
/// `q - mean` onto their averaged normal. Positive outside.
///
/// Exact duplicate points are collapsed before the tree is built, so
/// [`normals`](Self::normals) may be shorter than the input cloud.
pub struct PointCloudDistance {
    tree: ImmutableKdTree<f64, 3>,
    points: Vec<Point3<f64>>,
    normals: Vec<Vector3<f64>>,
    distance_neighbors: usize,
}

impl std::fmt::Debug for PointCloudDistance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointCloudDistance")
            .field("points", &self.points.len())
            .field("distance_neighbors", &self.distance_neighbors)
            .finish()
    }
}

impl PointCloudDistance {
    /// Build the search tree and estimate normals.
    ///
    /// # Errors
    ///
    /// - [`ReconstructError::EmptyPointCloud`] for an empty cloud
    /// - [`ReconstructError::InvalidParams`] if either neighbour count is zero
    pub fn new(
        cloud: &PointCloud,
        normal_neighbors: usize,
        distance_neighbors: usize,
    ) -> ReconstructResult<Self> {
        if cloud.is_empty() {
            return Err(ReconstructError::EmptyPointCloud);
        }
        if normal_neighbors == 0 {
            return Err(ReconstructError::invalid_param(
                "normal_neighbors",
                normal_neighbors,
                "at least one neighbour is required",
            ));
        }
        if distance_neighbors == 0 {
            return Err(ReconstructError::invalid_param(
                "distance_neighbors",
                distance_neighbors,
                "at least one neighbour is required",
            ));
        }

        let points = unique_points(cloud.points());
        if points.len() < cloud.len() {
            debug!(
                input = cloud.len(),
                unique = points.len(),
                "Collapsed duplicate points"
            );
        }
        let tree = build_kdtree(&points);
        let mut normals = estimate_normals(&tree, &points, normal_neighbors);
        orient_normals_outward(&points, &mut normals);

        info!(
            points = points.len(),
            normal_neighbors, distance_neighbors, "Point cloud distance field ready"
        );

        Ok(Self {
            tree,
            points,
            normals,
            distance_neighbors,
        })
    }

    /// Estimated unit normal per input point.
    pub fn normals(&self) -> &[Vector3<f64>] {
        &self.normals
    }
}

impl DistanceField for PointCloudDistance {
    fn distance(&self, p: &Point3<f64>) -> Option<f64> {
        let neighbors = self
            .tree
            .nearest_n::<SquaredEuclidean>(&[p.x, p.y, p.z], self.distance_neighbors);
        if neighbors.is_empty() {
            return None;
        }

        let mut mean = Vector3::zeros();
        let mut normal = Vector3::zeros();
        for n in &neighbors {
            let i = n.item as usize;
            mean += self.points[i].coords;
            normal += self.normals[i];
        }
        mean /= neighbors.len() as f64;

        let len = normal.norm();
        if len < 1e-10 {
            // Neighbour normals cancel out, no usable orientation here.
            return None;
        }

        Some((p.coords - mean).dot(&(normal / len)))
    }
}

/// Drop exact duplicates, keeping first occurrences in input order.
fn unique_points(points: &[Point3<f64>]) -> Vec<Point3<f64>> {
    let mut seen = HashSet::with_capacity(points.len());
    points
        .iter()
        .filter(|p| seen.insert([p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]))
        .copied()
        .collect()
}

/// Bulk-built tree; item `i` is `points[i]`. Bulk construction tolerates
/// many points sharing a coordinate on one axis, as in planar scans.
fn build_kdtree(points: &[Point3<f64>]) -> ImmutableKdTree<f64, 3> {
    let entries: Vec<[f64; 3]> = points.iter().map(|p| [p.x, p.y, p.z]).collect();
    ImmutableKdTree::new_from_slice(&entries)
}

/// PCA normal per point: eigenvector of the smallest covariance eigenvalue.
fn estimate_normals(
    tree: &ImmutableKdTree<f64, 3>,
    points: &[Point3<f64>],
    k: usize,
) -> Vec<Vector3<f64>> {
    let normals: Vec<_> = points
        .iter()
        .map(|p| {
            let neighbors = tree.nearest_n::<SquaredEuclidean>(&[p.x, p.y, p.z], k);

            let centroid = neighbors
                .iter()
                .fold(Vector3::zeros(), |acc, n| acc + points[n.item as usize].coords)
                / neighbors.len() as f64;

            let mut cov = Matrix3::zeros();
            for n in &neighbors {
                let d = points[n.item as usize].coords - centroid;
                cov += d * d.transpose();
            }

            let eig = cov.symmetric_eigen();
            let min_idx = eig.eigenvalues.imin();
            let normal = eig.eigenvectors.column(min_idx).into_owned();
            let norm = normal.norm();
            if norm > 1e-10 { normal / norm } else { Vector3::z() }
        })
        .collect();

    debug!(count = normals.len(), k, "Estimated point normals");
    normals
}

/// Flip normals that face the centroid of the whole cloud.
fn orient_normals_outward(points: &[Point3<f64>], normals: &mut [Vector3<f64>]) {
    let centroid = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords)
        / points.len() as f64;

    for (p, n) in points.iter().zip(normals.iter_mut()) {
        if n.dot(&(p.coords - centroid)) < 0.0 {
            *n = -*n;
        }
    }
}
