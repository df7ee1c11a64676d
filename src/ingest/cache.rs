//! Compressed cache of loaded county records.
//!
//! Parsing the string-encoded JSON source is slow, so the loaded records
//! are kept in a gzip-compressed binary file and rebuilt into an index on
//! startup.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::info;

use super::loader::{load_county_json, LoadError};
use crate::error::{DecodeError, EncodeError};
use crate::models::RegionRecord;
use crate::persist::{read_frame, write_frame, write_gz_atomic, RECORDS_MAGIC};

/// Write records to `path`, replacing it atomically.
pub fn save_records(path: &Path, records: &[RegionRecord]) -> Result<(), EncodeError> {
    write_gz_atomic(path, |writer| write_frame(writer, RECORDS_MAGIC, &records))?;
    info!("Cached {} records to {}", records.len(), path.display());
    Ok(())
}

/// Read records written by [`save_records`].
pub fn load_records(path: &Path) -> Result<Vec<RegionRecord>, DecodeError> {
    let file = File::open(path)?;
    let records: Vec<RegionRecord> =
        read_frame(GzDecoder::new(BufReader::new(file)), RECORDS_MAGIC)?;
    info!("Loaded {} cached records from {}", records.len(), path.display());
    Ok(records)
}

#[derive(Debug, thiserror::Error)]
pub enum PrepareError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Convert the JSON source into the record cache.
pub fn prepare(json: &Path, cache: &Path) -> Result<usize, PrepareError> {
    let records = load_county_json(json)?;
    save_records(cache, &records)?;
    Ok(records.len())
}
