//! Input point cloud with a running bounding box.

use std::path::Path;

use nalgebra::Point3;

use crate::error::{ReconstructError, ReconstructResult};
use crate::types::BoundingBox;

/// An unorganized set of 3D points.
///
/// Points are only added through [`push`](Self::push) so the bounding box
/// always covers exactly the stored points. Once reconstruction starts the
/// cloud is borrowed immutably and the box is frozen.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    points: Vec<Point3<f64>>,
    bounds: BoundingBox,
}

impl PointCloud {
    /// Create an empty point cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a point cloud with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            bounds: BoundingBox::empty(),
        }
    }

    /// Create a point cloud from positions.
    pub fn from_positions(positions: &[Point3<f64>]) -> Self {
        positions.iter().copied().collect()
    }

    /// Load from `.xyz`, `.pts`, `.txt` or `.ply`.
    pub fn load(path: impl AsRef<Path>) -> ReconstructResult<Self> {
        crate::io::load_point_cloud(path.as_ref())
    }

    /// Add a point and grow the bounding box.
    #[inline]
    pub fn push(&mut self, p: Point3<f64>) {
        self.bounds.expand(&p);
        self.points.push(p);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Bounding box of all points.
    #[inline]
    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Point3<f64>> {
        self.points.iter()
    }

    /// Mean position, `None` for an empty cloud.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.points.is_empty() {
            return None;
        }
        let sum = self.points.iter().fold(nalgebra::Vector3::zeros(), |acc, p| acc + p.coords);
        Some(Point3::from(sum / self.points.len() as f64))
    }

    /// Check the cloud can seed a grid.
    ///
    /// # Errors
    ///
    /// - [`ReconstructError::EmptyPointCloud`] if there are no points
    /// - [`ReconstructError::InvalidCoordinate`] for the first non-finite point
    pub fn validate(&self) -> ReconstructResult<()> {
        if self.points.is_empty() {
            return Err(ReconstructError::EmptyPointCloud);
        }
        if let Some((index, p)) = self
            .points
            .iter()
            .enumerate()
            .find(|(_, p)| !p.coords.iter().all(|c| c.is_finite()))
        {
            return Err(ReconstructError::InvalidCoordinate {
                index,
                x: p.x,
                y: p.y,
                z: p.z,
            });
        }
        Ok(())
    }
}

impl FromIterator<Point3<f64>> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Point3<f64>>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut cloud = Self::with_capacity(iter.size_hint().0);
        for p in iter {
            cloud.push(p);
        }
        cloud
    }
}

impl Extend<Point3<f64>> for PointCloud {
    fn extend<I: IntoIterator<Item = Point3<f64>>>(&mut self, iter: I) {
        for p in iter {
            self.push(p);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_tracks_bounds() {
        let mut cloud = PointCloud::new();
        assert!(cloud.bounds().is_empty());
        cloud.push(Point3::new(1.0, -2.0, 0.5));
        cloud.push(Point3::new(-1.0, 4.0, 0.0));
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.bounds().min(), Point3::new(-1.0, -2.0, 0.0));
        assert_eq!(cloud.bounds().max(), Point3::new(1.0, 4.0, 0.5));
    }

    #[test]
    fn test_centroid() {
        let cloud = PointCloud::from_positions(&[Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 4.0, 6.0)]);
        assert_eq!(cloud.centroid(), Some(Point3::new(1.0, 2.0, 3.0)));
        assert_eq!(PointCloud::new().centroid(), None);
    }

    #[test]
    fn test_validate() {
        assert!(matches!(
            PointCloud::new().validate(),
            Err(ReconstructError::EmptyPointCloud)
        ));

        let mut cloud = PointCloud::from_positions(&[Point3::origin(), Point3::new(1.0, 1.0, 1.0)]);
        assert!(cloud.validate().is_ok());
        cloud.push(Point3::new(0.0, f64::INFINITY, 0.0));
        match cloud.validate() {
            Err(ReconstructError::InvalidCoordinate { index, .. }) => assert_eq!(index, 2),
            other => panic!("unexpected {:?}", other),
        }
    }
}
