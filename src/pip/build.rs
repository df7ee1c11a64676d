//! Index construction from loaded records.

use hashbrown::HashSet;
use serde::Deserialize;
use tracing::{info, warn};

use super::finder::{Finder, IndexedShape};
use super::searcher::Searcher;
use super::store::RegionStore;
use crate::error::BuildError;
use crate::models::{Region, RegionRecord};

/// American Samoa, Guam, US Virgin Islands, Northern Mariana Islands.
pub const DEFAULT_EXCLUDED_STATES: &[&str] = &["AS", "GU", "VI", "MP"];

/// What to do with a record whose polygon fails validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidGeometryPolicy {
    /// Abort the whole build.
    #[default]
    FailFast,
    /// Log a warning and leave the region out.
    SkipAndLog,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// State codes whose regions are left out of the index.
    pub excluded_states: Vec<String>,
    pub invalid_geometry: InvalidGeometryPolicy,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            excluded_states: DEFAULT_EXCLUDED_STATES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            invalid_geometry: InvalidGeometryPolicy::default(),
        }
    }
}

/// Validate records and build the finder and region store together.
///
/// Nothing is returned unless the whole build succeeds.
pub fn build_index(
    records: impl IntoIterator<Item = RegionRecord>,
    options: &BuildOptions,
) -> Result<(Finder, RegionStore), BuildError> {
    let excluded: HashSet<&str> = options.excluded_states.iter().map(String::as_str).collect();

    let mut regions = Vec::new();
    let mut excluded_count = 0usize;
    let mut skipped_count = 0usize;

    for record in records {
        if excluded.contains(record.state_code.as_str()) {
            excluded_count += 1;
            continue;
        }
        let id = record.id;
        match Region::from_record(record) {
            Ok(region) => regions.push(region),
            Err(source) => match options.invalid_geometry {
                InvalidGeometryPolicy::FailFast => {
                    return Err(BuildError::InvalidGeometry { id, source });
                }
                InvalidGeometryPolicy::SkipAndLog => {
                    warn!("Skipping region {}: {}", id, source);
                    skipped_count += 1;
                }
            },
        }
    }

    let shapes: Vec<IndexedShape> = regions.iter().map(IndexedShape::from_region).collect();
    let store = RegionStore::build(regions)?;
    let finder = Finder::bulk_load(shapes);

    info!(
        "Indexed {} regions ({} excluded, {} skipped)",
        store.len(),
        excluded_count,
        skipped_count
    );

    Ok((finder, store))
}

/// Build and immediately freeze.
pub fn build_searcher(
    records: impl IntoIterator<Item = RegionRecord>,
    options: &BuildOptions,
) -> Result<Searcher, BuildError> {
    let (finder, store) = build_index(records, options)?;
    Ok(Searcher::freeze(finder, &store))
}
