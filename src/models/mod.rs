//! Core data models for county lookup.

pub mod region;

pub use region::{CountyMatch, Match, Region, RegionId, RegionMeta, RegionRecord};
