//! Bounding-box R-tree over region polygons.

use geo::{Point, Polygon};
use rstar::{RTree, RTreeObject, AABB};

use super::geometry::{validate_polygon, BoundingBox};
use super::resolver::{self, CandidateIndex, ResolveObserver};
use crate::error::{GeometryError, QueryError};
use crate::models::{Match, Region, RegionId};

/// One polygon piece in the tree, keyed by its region id.
///
/// Several pieces may share an id when a region is split into disjoint
/// parts.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedShape {
    pub id: RegionId,
    bbox: BoundingBox,
    polygon: Polygon<f64>,
}

impl RTreeObject for IndexedShape {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.bbox.envelope()
    }
}

impl IndexedShape {
    pub fn new(id: RegionId, polygon: Polygon<f64>) -> Result<Self, GeometryError> {
        let polygon = validate_polygon(polygon)?;
        let bbox = BoundingBox::from_polygon(&polygon)?;
        Ok(Self { id, bbox, polygon })
    }

    /// Shape for an already validated region.
    pub fn from_region(region: &Region) -> Self {
        Self {
            id: region.id(),
            bbox: region.bbox(),
            polygon: region.polygon().clone(),
        }
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }
}

/// Mutable spatial index answering "which boxes contain this point".
///
/// Built by repeated [`Finder::add`] calls (or [`Finder::bulk_load`]) and
/// then frozen into a [`Searcher`](super::Searcher).
#[derive(Debug, Clone, Default)]
pub struct Finder {
    tree: RTree<IndexedShape>,
}

impl Finder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a complete set of shapes with a packed tree.
    pub fn bulk_load(shapes: Vec<IndexedShape>) -> Self {
        Self {
            tree: RTree::bulk_load(shapes),
        }
    }

    /// Index a polygon under `id`. Repeated ids are kept as extra pieces.
    pub fn add(&mut self, id: RegionId, polygon: Polygon<f64>) -> Result<(), GeometryError> {
        self.tree.insert(IndexedShape::new(id, polygon)?);
        Ok(())
    }

    /// Number of indexed boxes.
    pub fn size(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Ids of every box containing the point, in unspecified order.
    ///
    /// Boxes are coarser than polygons, so callers get false positives but
    /// never miss a region whose polygon contains the point.
    pub fn query(&self, point: Point<f64>) -> Vec<RegionId> {
        self.shapes_at(point).map(|shape| shape.id).collect()
    }

    /// Resolve a point against the live index.
    pub fn resolve(
        &self,
        point: Point<f64>,
        observer: &dyn ResolveObserver,
    ) -> Result<Option<Match>, QueryError> {
        resolver::resolve(self, point, observer)
    }

    pub fn shapes(&self) -> impl Iterator<Item = &IndexedShape> {
        self.tree.iter()
    }

    fn shapes_at(&self, point: Point<f64>) -> impl Iterator<Item = &IndexedShape> {
        let query_envelope = AABB::from_point([point.x(), point.y()]);
        self.tree
            .locate_in_envelope_intersecting(&query_envelope)
            .filter(move |shape| shape.bbox.contains(point))
    }
}

impl CandidateIndex for Finder {
    fn candidates(&self, point: Point<f64>) -> Vec<&IndexedShape> {
        self.shapes_at(point).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pip::geometry::tests::square;

    #[test]
    fn test_empty_finder() {
        let finder = Finder::new();
        assert_eq!(finder.size(), 0);
        assert!(finder.query(Point::new(1.0, 1.0)).is_empty());
    }

    #[test]
    fn test_query_returns_containing_boxes() {
        let mut finder = Finder::new();
        finder.add(1, square(0.0, 0.0, 10.0)).unwrap();
        finder.add(2, square(10.0, 0.0, 10.0)).unwrap();
        finder.add(3, square(100.0, 100.0, 1.0)).unwrap();
        assert_eq!(finder.size(), 3);

        assert_eq!(finder.query(Point::new(5.0, 5.0)), vec![1]);

        let mut shared_edge = finder.query(Point::new(10.0, 5.0));
        shared_edge.sort_unstable();
        assert_eq!(shared_edge, vec![1, 2]);

        assert!(finder.query(Point::new(50.0, 50.0)).is_empty());
    }

    #[test]
    fn test_duplicate_ids_are_kept() {
        let mut finder = Finder::new();
        finder.add(7, square(0.0, 0.0, 1.0)).unwrap();
        finder.add(7, square(5.0, 5.0, 1.0)).unwrap();
        assert_eq!(finder.size(), 2);
        assert_eq!(finder.query(Point::new(5.5, 5.5)), vec![7]);
        assert_eq!(finder.query(Point::new(0.5, 0.5)), vec![7]);
    }

    #[test]
    fn test_add_rejects_degenerate_polygon() {
        let mut finder = Finder::new();
        let line = Polygon::new(vec![(0.0, 0.0), (1.0, 1.0)].into(), vec![]);
        assert!(finder.add(1, line).is_err());
        assert!(finder.is_empty());
    }

    #[test]
    fn test_query_matches_linear_scan() {
        let mut finder = Finder::new();
        let mut boxes = Vec::new();
        for i in 0..40u32 {
            let x = -130.0 + f64::from(i % 8) * 3.5;
            let y = 25.0 + f64::from(i / 8) * 4.0;
            let poly = square(x, y, 5.0);
            boxes.push((i, BoundingBox::from_polygon(&poly).unwrap()));
            finder.add(i, poly).unwrap();
        }
        for step in 0..200 {
            let p = Point::new(-131.0 + f64::from(step) * 0.17, 24.0 + f64::from(step % 23));
            let mut expected: Vec<RegionId> = boxes
                .iter()
                .filter(|(_, b)| b.contains(p))
                .map(|(id, _)| *id)
                .collect();
            let mut found = finder.query(p);
            expected.sort_unstable();
            found.sort_unstable();
            assert_eq!(found, expected, "mismatch at {:?}", p);
        }
    }
}
