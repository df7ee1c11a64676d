//! Dataset loading: the county JSON source, the record cache and the
//! configuration naming their locations.

mod cache;
pub mod config;
mod loader;

pub use cache::{load_records, prepare, save_records, PrepareError};
pub use config::{Config, DataConfig};
pub use loader::{load_county_json, parse_county_json, LoadError, RawCounty, RecordError};
