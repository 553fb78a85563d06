//! Nearest-feature queries against Mapbox Vector Tiles.
//!
//! Given a set of encoded tiles and a longitude/latitude, [`query`] returns
//! the closest features as a GeoJSON `FeatureCollection`, each annotated with
//! its distance in meters, layer name and geometry type.

// Import our error types
pub mod error;
// Import typed feature property values
pub mod value;
// Import our models
pub mod models;
// Import our vector tile parser
pub mod mvt_parser;
// Import geometry decoding and the distance engine
pub mod geometry;
// Import tile and lng/lat projection helpers
pub mod projection;
// Import basic attribute filters
pub mod filter;
// Import cross-tile dedupe keys
pub mod dedupe;
// Import the ranked result accumulator
pub mod results;
// Import the query orchestrator
pub mod query;

#[cfg(test)]
mod test_support;

pub use error::{DecodeError, FilterError, QueryError, Result};
pub use filter::BasicFilter;
pub use models::{FeatureCollection, GeomKind, LngLat, QueryOptions, ResultFeature, TileCoord, TileInput};
pub use query::{query, query_blocking, EngineConfig, QueryEngine};
pub use value::PropertyValue;
