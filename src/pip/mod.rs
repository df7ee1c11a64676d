//! Point-in-Polygon (PIP) county lookup.
//!
//! Region polygons are indexed by bounding box in an R-tree; candidate
//! boxes are then confirmed against the exact polygon, with a
//! nearest-candidate fallback when no polygon contains the point.

mod build;
mod finder;
pub mod geometry;
mod handle;
mod resolver;
mod searcher;
mod store;

pub use build::{
    build_index, build_searcher, BuildOptions, InvalidGeometryPolicy, DEFAULT_EXCLUDED_STATES,
};
pub use finder::{Finder, IndexedShape};
pub use geometry::{checked_point, BoundingBox};
pub use handle::SearcherHandle;
pub use resolver::{resolve, CandidateIndex, NoopObserver, ResolveObserver, TracingObserver};
pub use searcher::Searcher;
pub use store::RegionStore;
