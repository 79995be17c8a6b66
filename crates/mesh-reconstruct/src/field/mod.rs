//! Distance field sampling at query points.
//!
//! The field is an external collaborator: anything that maps a position to
//! a signed distance (negative inside) implements [`DistanceField`]. The
//! evaluation pass samples it once per query point and records failures
//! without aborting.

mod point_cloud;

use std::time::Instant;

use nalgebra::Point3;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::grid::{FieldValue, QueryPoint, QueryPointStore};

pub use point_cloud::PointCloudDistance;

const PROGRESS_INTERVAL: usize = 10_000;

/// A signed distance function.
pub trait DistanceField {
    /// Signed distance at `p`, or `None` if it cannot be computed there.
    fn distance(&self, p: &Point3<f64>) -> Option<f64>;
}

impl<F> DistanceField for F
where
    F: Fn(&Point3<f64>) -> Option<f64>,
{
    fn distance(&self, p: &Point3<f64>) -> Option<f64> {
        self(p)
    }
}

/// Outcome of an evaluation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldEvaluationStats {
    /// Query points sampled.
    pub evaluated: usize,
    /// Query points for which the field returned no value.
    pub failed: usize,
    /// Wall time in milliseconds.
    pub time_ms: u64,
}

#[inline]
fn sample<F: DistanceField + ?Sized>(field: &F, q: &mut QueryPoint) -> bool {
    q.value = match field.distance(&q.position) {
        Some(d) if d.is_finite() => FieldValue::Distance(d),
        _ => FieldValue::Failed,
    };
    !q.value.is_failed()
}

/// Evaluate `field` at every query point, in id order.
pub fn evaluate_field<F>(store: &mut QueryPointStore, field: &F) -> FieldEvaluationStats
where
    F: DistanceField + ?Sized,
{
    let start = Instant::now();
    let total = store.len();
    let mut failed = 0;

    for (i, q) in store.points_mut().iter_mut().enumerate() {
        if i % PROGRESS_INTERVAL == 0 {
            debug!(done = i, total, "Field evaluation progress");
        }
        if !sample(field, q) {
            failed += 1;
        }
    }

    finish(total, failed, start)
}

/// Parallel variant of [`evaluate_field`]. Results are identical because
/// each query point is sampled independently.
pub fn evaluate_field_parallel<F>(store: &mut QueryPointStore, field: &F) -> FieldEvaluationStats
where
    F: DistanceField + Sync + ?Sized,
{
    let start = Instant::now();
    let total = store.len();
    let failed = store
        .points_mut()
        .par_iter_mut()
        .map(|q| sample(field, q))
        .filter(|ok| !ok)
        .count();

    finish(total, failed, start)
}

fn finish(evaluated: usize, failed: usize, start: Instant) -> FieldEvaluationStats {
    let stats = FieldEvaluationStats {
        evaluated,
        failed,
        time_ms: start.elapsed().as_millis() as u64,
    };
    if failed > 0 {
        warn!(failed, evaluated, "Distance field failed at some query points");
    }
    info!(evaluated, failed, time_ms = stats.time_ms, "Field evaluated");
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> QueryPointStore {
        let mut store = QueryPointStore::new();
        for i in 0..10 {
            store.push(Point3::new(i as f64, 0.0, 0.0));
        }
        store
    }

    fn plane(p: &Point3<f64>) -> Option<f64> {
        if p.x > 7.0 { None } else { Some(p.x - 4.5) }
    }

    #[test]
    fn test_sequential_evaluation() {
        let mut s = store();
        let stats = evaluate_field(&mut s, &plane);
        assert_eq!(stats.evaluated, 10);
        assert_eq!(stats.failed, 2);
        let values: Vec<_> = s.iter().map(|q| q.value).collect();
        assert_eq!(values[0], FieldValue::Distance(-4.5));
        assert_eq!(values[9], FieldValue::Failed);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut a = store();
        let mut b = store();
        let sa = evaluate_field(&mut a, &plane);
        let sb = evaluate_field_parallel(&mut b, &plane);
        assert_eq!(sa.failed, sb.failed);
        let va: Vec<_> = a.iter().map(|q| q.value).collect();
        let vb: Vec<_> = b.iter().map(|q| q.value).collect();
        assert_eq!(va, vb);
    }

    #[test]
    fn test_non_finite_value_is_failure() {
        let mut s = store();
        let stats = evaluate_field(&mut s, &|_: &Point3<f64>| Some(f64::NAN));
        assert_eq!(stats.failed, 10);
        assert_eq!(s.failed_count(), 10);
    }
}
