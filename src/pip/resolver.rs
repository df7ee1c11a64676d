//! Turns bounding-box candidates into a single region answer.

use geo::Point;
use tracing::{debug, info};

use super::finder::IndexedShape;
use super::geometry::{checked_point, polygon_contains, polygon_distance};
use crate::error::QueryError;
use crate::models::{Match, RegionId};

/// Source of bounding-box candidates for a point.
pub trait CandidateIndex {
    /// Every indexed shape whose box contains the point.
    fn candidates(&self, point: Point<f64>) -> Vec<&IndexedShape>;
}

/// Receives lookups that did not land cleanly inside a polygon.
///
/// Observers must not influence the answer; they exist for monitoring
/// drift between the dataset and incoming queries.
pub trait ResolveObserver: Send + Sync {
    fn on_weak_match(&self, point: Point<f64>, id: RegionId, distance: f64);

    /// `candidates` is empty when no box contained the point.
    fn on_not_found(&self, point: Point<f64>, candidates: &[RegionId]);
}

/// Logs weak matches at info and misses at debug.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ResolveObserver for TracingObserver {
    fn on_weak_match(&self, point: Point<f64>, id: RegionId, distance: f64) {
        info!(
            "closest county to {:.6},{:.6} ({:.6}) is {}",
            point.y(),
            point.x(),
            distance,
            id
        );
    }

    fn on_not_found(&self, point: Point<f64>, candidates: &[RegionId]) {
        debug!(
            "no county for {:.6},{:.6} ({} ambiguous candidates)",
            point.y(),
            point.x(),
            candidates.len()
        );
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ResolveObserver for NoopObserver {
    fn on_weak_match(&self, _point: Point<f64>, _id: RegionId, _distance: f64) {}

    fn on_not_found(&self, _point: Point<f64>, _candidates: &[RegionId]) {}
}

/// Resolve a `(lon, lat)` point to one region.
///
/// 1. A polygon containing the point (boundary included) wins outright.
///    Candidates are visited in ascending id order, so ties between
///    overlapping regions always go to the lowest id.
/// 2. Otherwise, if every candidate box belongs to the same id, that id is
///    returned with its distance to the point (a weak match).
/// 3. Otherwise the point is not classifiable and `None` is returned.
pub fn resolve<I>(
    index: &I,
    point: Point<f64>,
    observer: &dyn ResolveObserver,
) -> Result<Option<Match>, QueryError>
where
    I: CandidateIndex + ?Sized,
{
    let point = checked_point(point.x(), point.y())?;

    let mut candidates = index.candidates(point);
    candidates.sort_by_key(|shape| shape.id);

    if let Some(shape) = candidates
        .iter()
        .find(|shape| polygon_contains(shape.polygon(), point))
    {
        return Ok(Some(Match::contained(shape.id)));
    }

    let mut ids: Vec<RegionId> = candidates.iter().map(|shape| shape.id).collect();
    ids.dedup();

    match ids.as_slice() {
        [id] => {
            let distance = weak_distance(
                candidates
                    .iter()
                    .map(|shape| polygon_distance(shape.polygon(), point))
                    .fold(f64::INFINITY, f64::min),
            );
            observer.on_weak_match(point, *id, distance);
            Ok(Some(Match {
                id: *id,
                distance,
            }))
        }
        _ => {
            observer.on_not_found(point, &ids);
            Ok(None)
        }
    }
}

/// Distance reported for a weak match.
///
/// A point outside every polygon can still sit close enough to an edge that
/// the computed distance rounds to zero. It is kept strictly positive so the
/// match stays distinguishable from containment.
fn weak_distance(distance: f64) -> f64 {
    distance.max(f64::MIN_POSITIVE)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::pip::finder::Finder;
    use crate::pip::geometry::tests::square;
    use geo::{LineString, Polygon};

    #[derive(Default)]
    struct Recorder {
        weak: Mutex<Vec<(RegionId, f64)>>,
        missed: Mutex<Vec<Vec<RegionId>>>,
    }

    impl ResolveObserver for Recorder {
        fn on_weak_match(&self, _point: Point<f64>, id: RegionId, distance: f64) {
            self.weak.lock().unwrap().push((id, distance));
        }

        fn on_not_found(&self, _point: Point<f64>, candidates: &[RegionId]) {
            self.missed.lock().unwrap().push(candidates.to_vec());
        }
    }

    fn finder(shapes: Vec<(RegionId, Polygon<f64>)>) -> Finder {
        let mut finder = Finder::new();
        for (id, poly) in shapes {
            finder.add(id, poly).unwrap();
        }
        finder
    }

    #[test]
    fn test_point_inside_single_square() {
        let finder = finder(vec![(1, square(0.0, 0.0, 10.0))]);
        let found = resolve(&finder, Point::new(5.0, 5.0), &NoopObserver).unwrap();
        assert_eq!(found, Some(Match::contained(1)));
    }

    #[test]
    fn test_point_outside_every_box() {
        let recorder = Recorder::default();
        let finder = finder(vec![(1, square(0.0, 0.0, 10.0))]);
        let found = resolve(&finder, Point::new(50.0, 50.0), &recorder).unwrap();
        assert_eq!(found, None);
        assert_eq!(*recorder.missed.lock().unwrap(), vec![Vec::<RegionId>::new()]);
    }

    #[test]
    fn test_shared_edge_is_consistent() {
        let finder = finder(vec![
            (2, square(10.0, 0.0, 10.0)),
            (1, square(0.0, 0.0, 10.0)),
        ]);
        let point = Point::new(10.0, 5.0);
        let first = resolve(&finder, point, &NoopObserver).unwrap();
        assert!(matches!(first, Some(Match { id: 1 | 2, distance }) if distance == 0.0));
        for _ in 0..10 {
            assert_eq!(resolve(&finder, point, &NoopObserver).unwrap(), first);
        }
    }

    #[test]
    fn test_weak_match_reports_distance() {
        // Right triangle whose hypotenuse cuts the box corner at (10, 10).
        let triangle = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (0.0, 10.0), (10.0, 0.0), (0.0, 0.0)]),
            vec![],
        );
        let recorder = Recorder::default();
        let finder = finder(vec![(4, triangle)]);

        let found = resolve(&finder, Point::new(9.0, 9.0), &recorder)
            .unwrap()
            .unwrap();
        // Distance from (9, 9) to the line x + y = 10 is 8 / sqrt(2).
        let expected = 8.0 / 2f64.sqrt();
        assert_eq!(found.id, 4);
        assert!(found.is_weak());
        assert!((found.distance - expected).abs() < 1e-9);

        let weak = recorder.weak.lock().unwrap();
        assert_eq!(weak.len(), 1);
        assert_eq!(weak[0].0, 4);
    }

    #[test]
    fn test_ambiguous_weak_candidates_not_found() {
        let left = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (0.0, 10.0), (10.0, 0.0), (0.0, 0.0)]),
            vec![],
        );
        let right = Polygon::new(
            LineString::from(vec![(10.0, 10.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)]),
            vec![],
        );
        let recorder = Recorder::default();
        // Shift the right triangle so the diagonal leaves a gap between them.
        let right = geo::Translate::translate(&right, 0.5, 0.5);
        let finder = finder(vec![(1, left), (2, right)]);

        let found = resolve(&finder, Point::new(5.2, 5.2), &recorder).unwrap();
        assert_eq!(found, None);
        assert_eq!(*recorder.missed.lock().unwrap(), vec![vec![1, 2]]);
    }

    #[test]
    fn test_multi_piece_region_uses_nearest_piece() {
        let lower = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (0.0, 10.0), (10.0, 0.0), (0.0, 0.0)]),
            vec![],
        );
        let upper = Polygon::new(
            LineString::from(vec![(10.5, 10.5), (10.5, 0.5), (0.5, 10.5), (10.5, 10.5)]),
            vec![],
        );
        let finder = finder(vec![(9, upper), (9, lower)]);

        let found = resolve(&finder, Point::new(5.2, 5.2), &NoopObserver)
            .unwrap()
            .unwrap();
        assert_eq!(found.id, 9);
        assert!((found.distance - 0.4 / 2f64.sqrt()).abs() < 1e-9);

        let inside = resolve(&finder, Point::new(9.0, 9.0), &NoopObserver).unwrap();
        assert_eq!(inside, Some(Match::contained(9)));
    }

    #[test]
    fn test_weak_distance_never_zero() {
        assert_eq!(weak_distance(0.0), f64::MIN_POSITIVE);
        assert!(Match { id: 1, distance: weak_distance(0.0) }.is_weak());
        assert_eq!(weak_distance(0.25), 0.25);
    }

    #[test]
    fn test_non_finite_point_is_an_error() {
        let finder = finder(vec![(1, square(0.0, 0.0, 10.0))]);
        let err = resolve(&finder, Point::new(f64::NAN, 5.0), &NoopObserver);
        assert!(matches!(err, Err(QueryError::NonFiniteCoordinate { .. })));
    }
}
