//! Frozen, read-only snapshot of a built index.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use geo::Point;
use hashbrown::HashMap;
use tracing::{info, warn};

use super::finder::{Finder, IndexedShape};
use super::resolver::{self, CandidateIndex, ResolveObserver, TracingObserver};
use super::store::RegionStore;
use crate::error::{DecodeError, EncodeError, QueryError};
use crate::models::{CountyMatch, Match, RegionId, RegionMeta};
use crate::persist::{self, SearcherPayload};

/// Immutable query object built once from a finished [`Finder`] and
/// [`RegionStore`].
///
/// A `Searcher` has no interior mutability, so a single instance can be
/// shared behind an `Arc` by any number of threads. [`Searcher::duplicate`]
/// gives a fully independent deep copy.
#[derive(Debug, Clone)]
pub struct Searcher {
    finder: Finder,
    meta: HashMap<RegionId, RegionMeta>,
}

impl Searcher {
    /// Snapshot the finder and the metadata of every stored region.
    ///
    /// Taking the finder by value is what makes further `add` calls
    /// impossible.
    pub fn freeze(finder: Finder, store: &RegionStore) -> Self {
        let meta = store
            .regions()
            .map(|region| (region.id(), region.meta().clone()))
            .collect();
        Self { finder, meta }
    }

    pub(crate) fn from_parts(finder: Finder, meta: HashMap<RegionId, RegionMeta>) -> Self {
        Self { finder, meta }
    }

    /// Resolve a `(lon, lat)` point, logging weak matches through `tracing`.
    pub fn resolve(&self, point: Point<f64>) -> Result<Option<Match>, QueryError> {
        self.resolve_with(point, &TracingObserver)
    }

    pub fn resolve_with(
        &self,
        point: Point<f64>,
        observer: &dyn ResolveObserver,
    ) -> Result<Option<Match>, QueryError> {
        resolver::resolve(self, point, observer)
    }

    /// Resolve a latitude/longitude pair to county metadata.
    ///
    /// This is the only place the `(lat, lon)` argument order is accepted;
    /// it is swapped into `(lon, lat)` before querying.
    pub fn resolve_lat_lon(&self, lat: f64, lon: f64) -> Result<Option<CountyMatch>, QueryError> {
        let Some(found) = self.resolve(Point::new(lon, lat))? else {
            return Ok(None);
        };
        match self.meta.get(&found.id) {
            Some(meta) => Ok(Some(CountyMatch {
                meta: meta.clone(),
                distance: found.distance,
            })),
            None => {
                warn!("region {} is indexed but has no metadata", found.id);
                Ok(None)
            }
        }
    }

    pub fn meta(&self, id: RegionId) -> Option<&RegionMeta> {
        self.meta.get(&id)
    }

    /// Independent deep copy; nothing is shared with `self`.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    /// Number of indexed boxes.
    pub fn size(&self) -> usize {
        self.finder.size()
    }

    /// Number of regions with metadata.
    pub fn region_count(&self) -> usize {
        self.meta.len()
    }

    pub(crate) fn shapes(&self) -> impl Iterator<Item = &IndexedShape> {
        self.finder.shapes()
    }

    pub(crate) fn regions(&self) -> impl Iterator<Item = &RegionMeta> {
        self.meta.values()
    }

    /// Write the uncompressed persisted form.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), EncodeError> {
        persist::write_searcher(writer, &SearcherPayload::from_searcher(self))
    }

    /// Read the uncompressed persisted form.
    pub fn read_from<R: Read>(reader: R) -> Result<Self, DecodeError> {
        persist::read_searcher(reader)?.into_searcher()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::read_from(bytes)
    }

    /// Persist gzip-compressed to `path`, replacing any existing file
    /// atomically.
    pub fn save(&self, path: &Path) -> Result<(), EncodeError> {
        persist::write_gz_atomic(path, |writer| self.write_to(writer))?;
        info!(
            "Saved searcher with {} boxes to {}",
            self.size(),
            path.display()
        );
        Ok(())
    }

    /// Load a searcher written by [`Searcher::save`].
    pub fn load(path: &Path) -> Result<Self, DecodeError> {
        let file = File::open(path)?;
        let searcher = Self::read_from(GzDecoder::new(BufReader::new(file)))?;
        info!(
            "Loaded searcher with {} boxes ({} regions) from {}",
            searcher.size(),
            searcher.region_count(),
            path.display()
        );
        Ok(searcher)
    }
}

impl CandidateIndex for Searcher {
    fn candidates(&self, point: Point<f64>) -> Vec<&IndexedShape> {
        self.finder.candidates(point)
    }
}
