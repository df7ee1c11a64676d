//! County polygon JSON loader.
//!
//! The source file is an array of objects whose `bbox` and `poly` fields
//! are themselves JSON arrays encoded as strings:
//!
//! ```json
//! [{"geoid": "06001", "name": "Alameda", "fullname": "Alameda County",
//!   "state": "CA", "geotype": "county",
//!   "bbox": "[[-122.37,37.45],[-122.37,37.91],...]",
//!   "poly": "[[-122.27,37.90],[-122.26,37.90],...]"}]
//! ```
//!
//! Coordinates are `[lon, lat]`.

use std::fs::File;
use std::io::{BufReader, Read};
use std::num::ParseIntError;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use geo::{Coord, LineString, Polygon};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::models::{RegionId, RegionRecord};

/// A closed bounding box ring has five points.
const MIN_BBOX_POINTS: usize = 5;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse county JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed for ({index}/{total}) geoid {geoid:?}: {source}")]
    Record {
        index: usize,
        total: usize,
        geoid: String,
        #[source]
        source: RecordError,
    },
}

/// Problem with a single raw county record.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid geoid: {0}")]
    GeoId(#[from] ParseIntError),

    #[error("invalid bbox: {0}")]
    BBox(#[source] serde_json::Error),

    #[error("incomplete bbox ({0} points)")]
    IncompleteBBox(usize),

    #[error("invalid polygon: {0}")]
    Poly(#[source] serde_json::Error),
}

/// County record exactly as it appears in the JSON source.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCounty {
    pub geoid: String,
    #[serde(rename = "fullname")]
    pub full_name: String,
    pub name: String,
    pub state: String,
    #[serde(default, rename = "geotype")]
    pub geo_type: String,
    pub bbox: String,
    pub poly: String,
}

impl RawCounty {
    /// Convert into a record, decoding the string-encoded coordinates.
    ///
    /// The source bbox is only checked for completeness; the record's
    /// envelope is always recomputed from the polygon later on.
    pub fn into_record(self) -> Result<RegionRecord, RecordError> {
        let id: RegionId = self.geoid.trim().parse()?;

        let bbox: Vec<[f64; 2]> = serde_json::from_str(&self.bbox).map_err(RecordError::BBox)?;
        if bbox.len() < MIN_BBOX_POINTS {
            return Err(RecordError::IncompleteBBox(bbox.len()));
        }

        let ring: Vec<[f64; 2]> = serde_json::from_str(&self.poly).map_err(RecordError::Poly)?;
        let ring: LineString<f64> = ring
            .into_iter()
            .map(|[x, y]| Coord { x, y })
            .collect::<Vec<_>>()
            .into();

        Ok(RegionRecord {
            id,
            name: self.name,
            full_name: self.full_name,
            state_code: self.state,
            polygon: Polygon::new(ring, vec![]),
        })
    }
}

/// Parse county JSON from any reader.
pub fn parse_county_json<R: Read>(reader: R) -> Result<Vec<RegionRecord>, LoadError> {
    let raw: Vec<RawCounty> = serde_json::from_reader(reader)?;
    let total = raw.len();
    raw.into_iter()
        .enumerate()
        .map(|(i, county)| {
            let geoid = county.geoid.clone();
            county.into_record().map_err(|source| LoadError::Record {
                index: i + 1,
                total,
                geoid,
                source,
            })
        })
        .collect()
}

/// Load county JSON from disk; `.gz` files are decompressed on the fly.
pub fn load_county_json(path: &Path) -> Result<Vec<RegionRecord>, LoadError> {
    info!("Loading county polygons from {}", path.display());

    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader: Box<dyn Read> = if path.extension().map_or(false, |e| e == "gz") {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let records = parse_county_json(reader)?;
    info!("Loaded {} county records", records.len());
    Ok(records)
}
