//! Append-only storage for deduplicated cell corners.

use nalgebra::Point3;

/// Stable handle into a [`QueryPointStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryPointId(usize);

impl QueryPointId {
    /// Position of the query point in the store.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Distance field sample attached to a query point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FieldValue {
    /// Not evaluated yet.
    #[default]
    Unevaluated,
    /// Signed distance returned by the field.
    Distance(f64),
    /// The field could not produce a value here.
    Failed,
}

impl FieldValue {
    /// The sampled distance, if any.
    #[inline]
    pub fn value(self) -> Option<f64> {
        match self {
            FieldValue::Distance(d) => Some(d),
            _ => None,
        }
    }

    #[inline]
    pub fn is_failed(self) -> bool {
        matches!(self, FieldValue::Failed)
    }
}

/// A cell corner shared by up to eight cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryPoint {
    pub position: Point3<f64>,
    pub value: FieldValue,
}

/// Owns every query point. Ids are handed out in insertion order and never
/// invalidated: points are appended, never removed or reordered.
#[derive(Debug, Clone, Default)]
pub struct QueryPointStore {
    points: Vec<QueryPoint>,
}

impl QueryPointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    /// Append an unevaluated point and return its id.
    pub(crate) fn push(&mut self, position: Point3<f64>) -> QueryPointId {
        let id = QueryPointId(self.points.len());
        self.points.push(QueryPoint {
            position,
            value: FieldValue::Unevaluated,
        });
        id
    }

    /// Look up a point. Ids only come from this store, so they are always valid.
    #[inline]
    pub fn get(&self, id: QueryPointId) -> &QueryPoint {
        &self.points[id.0]
    }

    /// Record the field value for `id`.
    #[inline]
    pub fn set_value(&mut self, id: QueryPointId, value: FieldValue) {
        self.points[id.0].value = value;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points in id order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &QueryPoint> {
        self.points.iter()
    }

    /// Number of points whose evaluation failed.
    pub fn failed_count(&self) -> usize {
        self.points.iter().filter(|q| q.value.is_failed()).count()
    }

    /// Mutable view for the evaluation pass. Element order must be preserved.
    pub(crate) fn points_mut(&mut self) -> &mut [QueryPoint] {
        &mut self.points
    }
}
