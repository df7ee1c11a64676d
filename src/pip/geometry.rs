//! Geometry primitives: envelopes, polygon validation, containment and
//! planar distance.
//!
//! All coordinates are `(x = longitude, y = latitude)`. Distances are plain
//! Euclidean distances in degrees; nothing here is geodesic.

use geo::{BoundingRect, Coord, Distance, Euclidean, Intersects, Point, Polygon};
use rstar::AABB;
use serde::{Deserialize, Serialize};

use crate::error::{GeometryError, QueryError};

/// Minimum vertex count of a closed ring (a triangle plus its closing vertex).
pub const MIN_RING_VERTICES: usize = 4;

/// Build a query point, rejecting NaN and infinite coordinates.
pub fn checked_point(lon: f64, lat: f64) -> Result<Point<f64>, QueryError> {
    if lon.is_finite() && lat.is_finite() {
        Ok(Point::new(lon, lat))
    } else {
        Err(QueryError::NonFiniteCoordinate { lon, lat })
    }
}

/// Check a polygon's outer ring.
///
/// `geo::Polygon::new` already closes an open ring, so a ring supplied
/// without its closing vertex is accepted as implicitly closed.
pub fn validate_polygon(polygon: Polygon<f64>) -> Result<Polygon<f64>, GeometryError> {
    let ring = polygon.exterior();
    let found = ring.0.len();
    if found < MIN_RING_VERTICES {
        return Err(GeometryError::TooFewVertices {
            found,
            required: MIN_RING_VERTICES,
        });
    }
    if let Some((index, c)) = ring
        .coords()
        .enumerate()
        .find(|(_, c)| !(c.x.is_finite() && c.y.is_finite()))
    {
        return Err(GeometryError::NonFiniteVertex {
            index,
            x: c.x,
            y: c.y,
        });
    }
    Ok(polygon)
}

/// Axis-aligned envelope of a polygon, inclusive on every edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    min: Coord<f64>,
    max: Coord<f64>,
}

impl BoundingBox {
    pub fn new(min: Coord<f64>, max: Coord<f64>) -> Result<Self, GeometryError> {
        // Written as negations so NaN corners are rejected too.
        if !(min.x <= max.x && min.y <= max.y) {
            return Err(GeometryError::InvertedBoundingBox {
                min_x: min.x,
                min_y: min.y,
                max_x: max.x,
                max_y: max.y,
            });
        }
        Ok(Self { min, max })
    }

    /// Envelope of the polygon's outer ring.
    pub fn from_polygon(polygon: &Polygon<f64>) -> Result<Self, GeometryError> {
        let rect = polygon
            .bounding_rect()
            .ok_or(GeometryError::TooFewVertices {
                found: 0,
                required: MIN_RING_VERTICES,
            })?;
        Self::new(rect.min(), rect.max())
    }

    pub fn min(&self) -> Coord<f64> {
        self.min
    }

    pub fn max(&self) -> Coord<f64> {
        self.max
    }

    pub fn contains(&self, point: Point<f64>) -> bool {
        self.min.x <= point.x()
            && point.x() <= self.max.x
            && self.min.y <= point.y()
            && point.y() <= self.max.y
    }

    /// Distance from the point to the nearest edge; `0.0` inside or on it.
    pub fn distance(&self, point: Point<f64>) -> f64 {
        let dx = (self.min.x - point.x()).max(point.x() - self.max.x).max(0.0);
        let dy = (self.min.y - point.y()).max(point.y() - self.max.y).max(0.0);
        dx.hypot(dy)
    }

    pub fn envelope(&self) -> AABB<[f64; 2]> {
        AABB::from_corners([self.min.x, self.min.y], [self.max.x, self.max.y])
    }
}

/// Point-in-polygon test that counts the boundary as inside.
///
/// The answer for a given point and polygon never changes between calls.
pub fn polygon_contains(polygon: &Polygon<f64>, point: Point<f64>) -> bool {
    polygon.intersects(&point)
}

/// Distance from the point to the polygon's outer ring; `0.0` when contained.
pub fn polygon_distance(polygon: &Polygon<f64>, point: Point<f64>) -> f64 {
    if polygon_contains(polygon, point) {
        return 0.0;
    }
    Euclidean.distance(&point, polygon)
}
