//! Query orchestration: fan tiles out to a worker pool, fan results back in.
//!
//! Each tile is decoded, measured and ranked on a pool thread into its own
//! [`ResultSet`]. The calling task awaits those per-tile sets in input
//! order and merges them into one accumulator, so ranking, tie order and the
//! dedupe winner never depend on which worker finishes first.

use futures::channel::oneshot;
use geo_types::Coord;
use lazy_static::lazy_static;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use tracing::{debug, error, instrument, trace};

use crate::error::{DecodeError, QueryError, Result};
use crate::geometry::{Proximity, TileGeometry};
use crate::models::{Candidate, FeatureCollection, GeomKind, LngLat, QueryOptions, ResultFeature, TileInput};
use crate::mvt_parser::parse_tile;
use crate::projection::{lng_lat_to_tile, tile_to_lng_lat, Ruler, MAX_MERCATOR_LAT};
use crate::results::ResultSet;

/// Worker pool settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of pool threads; defaults to the number of logical CPUs.
    pub threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
        }
    }
}

/// Runs proximity queries on a dedicated thread pool.
///
/// Cloning is cheap and shares the pool. No state survives between queries.
#[derive(Clone)]
pub struct QueryEngine {
    pool: Arc<ThreadPool>,
}

impl QueryEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.threads.max(1))
            .thread_name(|i| format!("tilequery-worker-{i}"))
            .panic_handler(|_| error!("Tile worker panicked"))
            .build()
            .map_err(|e| QueryError::Worker(e.to_string()))?;

        debug!("Started query engine with {} threads", pool.current_num_threads());
        Ok(Self { pool: Arc::new(pool) })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Find the features nearest to `point` across `tiles`.
    ///
    /// Inputs are assumed validated. The first tile (in input order) that
    /// fails to decode fails the whole query.
    pub async fn query(&self, tiles: Vec<TileInput>, point: LngLat, options: QueryOptions) -> Result<FeatureCollection> {
        debug!(
            tiles = tiles.len(),
            radius = options.radius,
            limit = options.limit,
            dedupe = options.dedupe,
            "Starting tile query at [{}, {}]",
            point.lng,
            point.lat
        );

        let options = Arc::new(options);
        let ruler = Ruler::new(point.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT));

        let pending: Vec<_> = tiles
            .into_iter()
            .map(|tile| {
                let (tx, rx) = oneshot::channel();
                let options = Arc::clone(&options);
                self.pool.spawn(move || {
                    let outcome = process_tile(&tile, point, &ruler, &options);
                    // The receiver is gone once an earlier tile has failed.
                    let _ = tx.send(outcome);
                });
                rx
            })
            .collect();

        let mut merged = ResultSet::for_options(&options);
        for rx in pending {
            let local = rx
                .await
                .map_err(|_| QueryError::Worker("tile worker exited without a result".to_string()))??;
            merged.extend(local);
        }

        debug!("Query finished with {} results", merged.len());
        Ok(FeatureCollection::new(
            merged.into_vec().into_iter().map(ResultFeature::from).collect(),
        ))
    }

    /// Blocking variant of [`QueryEngine::query`].
    pub fn query_blocking(&self, tiles: Vec<TileInput>, point: LngLat, options: QueryOptions) -> Result<FeatureCollection> {
        futures::executor::block_on(self.query(tiles, point, options))
    }
}

#[instrument(level = "debug", skip_all, fields(z = tile.coord.z, x = tile.coord.x, y = tile.coord.y))]
fn process_tile(tile: &TileInput, point: LngLat, ruler: &Ruler, options: &QueryOptions) -> Result<ResultSet, DecodeError> {
    let parsed = parse_tile(&tile.data)?;
    let (z, x, y) = (tile.coord.z, tile.coord.x, tile.coord.y);
    let origin = Coord { x: point.lng, y: point.lat };
    let mut results = ResultSet::for_options(options);

    for layer in &parsed.layers {
        if !options.wants_layer(&layer.name) {
            continue;
        }
        // Layers may use different extents, so project per layer.
        let local = lng_lat_to_tile(point.lng, point.lat, layer.extent, z, x, y);

        for feature in &layer.features {
            let Some(kind) = feature.kind else {
                trace!(layer = &*layer.name, "Skipping feature with unknown geometry type");
                continue;
            };
            if !options.wants_geometry(kind) {
                continue;
            }

            let geometry = TileGeometry::decode(kind, &feature.geometry)?;
            let (coordinates, distance, hit) = match geometry.proximity(local) {
                Proximity::Hit => ([point.lng, point.lat], 0.0, true),
                Proximity::Near(closest) => {
                    let lnglat = tile_to_lng_lat(closest.x, closest.y, layer.extent, z, x, y);
                    ([lnglat.x, lnglat.y], ruler.distance(origin, lnglat), false)
                }
                Proximity::Empty => continue,
            };

            if options.direct_hit_polygon && kind == GeomKind::Polygon && !hit {
                continue;
            }
            if distance > options.radius || !results.admits(distance) {
                continue;
            }
            // Rejected features still compete in dedupe when the set keeps them.
            let passes = options
                .basic_filters
                .as_ref()
                .map_or(true, |filter| filter.evaluate(|key| layer.property(feature, key)));
            if !passes && !results.keeps_rejected() {
                continue;
            }

            results.offer(
                Candidate {
                    id: feature.id,
                    layer: Arc::clone(&layer.name),
                    geometry: kind,
                    properties: layer.collect_properties(feature),
                    coordinates,
                    distance,
                    tile: tile.coord,
                },
                passes,
            );
        }
    }

    debug!("Tile produced {} candidates", results.len());
    Ok(results)
}

lazy_static! {
    static ref DEFAULT_ENGINE: std::result::Result<QueryEngine, String> =
        QueryEngine::new(EngineConfig::default()).map_err(|e| e.to_string());
}

fn default_engine() -> Result<&'static QueryEngine> {
    DEFAULT_ENGINE
        .as_ref()
        .map_err(|e| QueryError::Worker(e.clone()))
}

/// Query on the process-wide engine, sized to the number of CPUs.
pub async fn query(tiles: Vec<TileInput>, point: LngLat, options: QueryOptions) -> Result<FeatureCollection> {
    default_engine()?.query(tiles, point, options).await
}

pub fn query_blocking(tiles: Vec<TileInput>, point: LngLat, options: QueryOptions) -> Result<FeatureCollection> {
    default_engine()?.query_blocking(tiles, point, options)
}
