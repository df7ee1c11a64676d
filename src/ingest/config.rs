use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::pip::BuildOptions;

/// Default JSON source as produced by the county extraction scripts.
pub const COUNTY_JSON_FILE: &str = "county_poly.json";
/// Default cache of parsed county records.
pub const COUNTY_CACHE_FILE: &str = "county_geo.bin.gz";
/// Default persisted searcher.
pub const COUNTY_SEARCHER_FILE: &str = "county_searcher.bin.gz";

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub build: BuildOptions,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    pub json: PathBuf,
    pub cache: PathBuf,
    pub searcher: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            json: PathBuf::from(COUNTY_JSON_FILE),
            cache: PathBuf::from(COUNTY_CACHE_FILE),
            searcher: PathBuf::from(COUNTY_SEARCHER_FILE),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        Ok(config)
    }
}
