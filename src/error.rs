//! Error types for building, persisting and querying the county index.
//!
//! A point that no region claims is not an error: resolvers report it as
//! `None`. Errors here are reserved for bad input geometry, bad
//! identifiers, undecodable persisted data and malformed query points.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::RegionId;

/// Invalid polygon or bounding box supplied at build time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// Polygon ring has fewer vertices than a closed triangle needs.
    #[error("polygon has {found} vertices after closing, need at least {required}")]
    TooFewVertices { found: usize, required: usize },

    /// Polygon contains a NaN or infinite coordinate.
    #[error("polygon vertex {index} is not finite: ({x}, {y})")]
    NonFiniteVertex { index: usize, x: f64, y: f64 },

    /// Bounding box whose min corner exceeds its max corner.
    #[error("bounding box is inverted: min ({min_x}, {min_y}) max ({max_x}, {max_y})")]
    InvertedBoundingBox {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    },
}

/// Failure while building a region store or finder from records.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("region {id} has invalid geometry: {source}")]
    InvalidGeometry {
        id: RegionId,
        #[source]
        source: GeometryError,
    },

    #[error("duplicate region id {0}")]
    DuplicateId(RegionId),
}

/// Malformed query input. Never raised for a point that simply has no match.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("query coordinate is not finite: lon {lon}, lat {lat}")]
    NonFiniteCoordinate { lon: f64, lat: f64 },
}

/// Failure while reading a persisted searcher or record cache.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read persisted data: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid magic: expected {expected:?}, found {found:?}")]
    InvalidMagic { expected: [u8; 4], found: [u8; 4] },

    #[error("unsupported format version {found}; supported version is {supported}")]
    UnsupportedVersion { found: u16, supported: u16 },

    #[error("payload length mismatch: header says {expected} bytes, read {found}")]
    LengthMismatch { expected: u64, found: u64 },

    #[error("payload checksum mismatch: expected {expected:#018x}, computed {found:#018x}")]
    ChecksumMismatch { expected: u64, found: u64 },

    #[error("failed to decode payload: {0}")]
    Payload(#[from] bincode::Error),

    #[error("persisted region metadata repeats id {0}")]
    DuplicateId(RegionId),

    #[error("persisted geometry for region {id} is invalid: {source}")]
    InvalidGeometry {
        id: RegionId,
        #[source]
        source: GeometryError,
    },
}

/// Failure while writing a persisted searcher or record cache.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to write persisted data to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write persisted data: {0}")]
    Stream(#[from] std::io::Error),

    #[error("failed to encode payload: {0}")]
    Payload(#[from] bincode::Error),
}
