//! Region records and lookup results.

use geo::Polygon;
use serde::{Deserialize, Serialize};

use crate::error::GeometryError;
use crate::pip::geometry::{validate_polygon, BoundingBox};

/// Numeric region identifier (a county GeoID such as `6001`).
pub type RegionId = u32;

/// A loaded region record as it comes out of the dataset loader.
///
/// Records are not validated; [`Region::from_record`] performs the
/// geometry checks when the index is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub id: RegionId,
    pub name: String,
    pub full_name: String,
    pub state_code: String,
    /// Outer boundary in `(lon, lat)` order.
    pub polygon: Polygon<f64>,
}

/// Public metadata returned for a resolved point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionMeta {
    pub id: RegionId,
    pub name: String,
    pub full_name: String,
    pub state_code: String,
}

/// A validated region with its envelope.
///
/// Fields are private so the bounding box can never drift from the polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    meta: RegionMeta,
    polygon: Polygon<f64>,
    bbox: BoundingBox,
}

impl Region {
    pub fn new(
        id: RegionId,
        name: impl Into<String>,
        full_name: impl Into<String>,
        state_code: impl Into<String>,
        polygon: Polygon<f64>,
    ) -> Result<Self, GeometryError> {
        let polygon = validate_polygon(polygon)?;
        let bbox = BoundingBox::from_polygon(&polygon)?;
        Ok(Self {
            meta: RegionMeta {
                id,
                name: name.into(),
                full_name: full_name.into(),
                state_code: state_code.into(),
            },
            polygon,
            bbox,
        })
    }

    pub fn from_record(record: RegionRecord) -> Result<Self, GeometryError> {
        Self::new(
            record.id,
            record.name,
            record.full_name,
            record.state_code,
            record.polygon,
        )
    }

    pub fn id(&self) -> RegionId {
        self.meta.id
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn full_name(&self) -> &str {
        &self.meta.full_name
    }

    pub fn state_code(&self) -> &str {
        &self.meta.state_code
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn meta(&self) -> &RegionMeta {
        &self.meta
    }
}

/// Raw resolver answer: the winning id and how far the point was from it.
///
/// `distance` is `0.0` when a polygon contains the point. A positive value
/// marks a weak match accepted only because it was the sole candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub id: RegionId,
    pub distance: f64,
}

impl Match {
    pub fn contained(id: RegionId) -> Self {
        Self { id, distance: 0.0 }
    }

    pub fn is_weak(&self) -> bool {
        self.distance > 0.0
    }
}

/// A resolved county with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountyMatch {
    #[serde(flatten)]
    pub meta: RegionMeta,
    pub distance: f64,
}
