//! Counties - point to US county lookup over a static polygon dataset.
//!
//! This library provides the spatial index, the frozen searcher and the
//! dataset loaders shared with the `counties` binary.
//!
//! Points are always `(longitude, latitude)`; only
//! [`Searcher::resolve_lat_lon`] takes latitude first.

pub mod error;
pub mod ingest;
pub mod models;
pub mod persist;
pub mod pip;

pub use error::{BuildError, DecodeError, EncodeError, GeometryError, QueryError};
pub use models::{CountyMatch, Match, Region, RegionId, RegionMeta, RegionRecord};
pub use pip::{build_searcher, BuildOptions, Finder, RegionStore, Searcher, SearcherHandle};
