// Shared data structures: query inputs, options and the GeoJSON output
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::sync::Arc;

use crate::error::QueryError;
use crate::filter::BasicFilter;
use crate::value::PropertyValue;

/// Geometry type of a feature, also used as the `geometry` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeomKind {
    Point,
    #[serde(rename = "linestring")]
    LineString,
    Polygon,
}

impl GeomKind {
    pub fn label(self) -> &'static str {
        match self {
            GeomKind::Point => "point",
            GeomKind::LineString => "linestring",
            GeomKind::Polygon => "polygon",
        }
    }
}

/// Address of a tile in the web-mercator pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u32,
    pub x: u32,
    pub y: u32,
}

/// One encoded tile plus its address.
///
/// The payload is reference counted so the same bytes can back several
/// tiles and be handed to worker threads without copying.
#[derive(Debug, Clone)]
pub struct TileInput {
    pub data: Arc<[u8]>,
    pub coord: TileCoord,
}

impl TileInput {
    pub fn new(data: impl Into<Arc<[u8]>>, z: u32, x: u32, y: u32) -> Self {
        Self {
            data: data.into(),
            coord: TileCoord { z, x, y },
        }
    }
}

/// Query point as `[longitude, latitude]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

impl From<[f64; 2]> for LngLat {
    fn from([lng, lat]: [f64; 2]) -> Self {
        Self { lng, lat }
    }
}

impl From<LngLat> for [f64; 2] {
    fn from(p: LngLat) -> Self {
        [p.lng, p.lat]
    }
}

/// Query options. Range validation is the caller's responsibility.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryOptions {
    /// Search radius in meters.
    pub radius: f64,
    #[serde(alias = "numResults")]
    pub limit: usize,
    pub layers: Option<Vec<String>>,
    pub geometry: Option<GeomKind>,
    pub dedupe: bool,
    pub direct_hit_polygon: bool,
    #[serde(rename = "basic-filters")]
    pub basic_filters: Option<BasicFilter>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            radius: 0.0,
            limit: 5,
            layers: None,
            geometry: None,
            dedupe: true,
            direct_hit_polygon: false,
            basic_filters: None,
        }
    }
}

impl QueryOptions {
    /// Build options from a JSON object.
    ///
    /// A malformed `basic-filters` expression is reported as
    /// [`QueryError::Filter`] with its specific message; any other bad key
    /// or value is [`QueryError::Options`].
    pub fn from_json(mut raw: Value) -> Result<Self, QueryError> {
        let filters = raw.as_object_mut().and_then(|map| map.remove("basic-filters"));
        let mut options: QueryOptions = serde_json::from_value(raw)?;
        options.basic_filters = match filters {
            Some(Value::Null) | None => None,
            Some(filters) => Some(BasicFilter::from_json(&filters)?),
        };
        Ok(options)
    }

    /// Whether features of this layer should be examined at all.
    pub fn wants_layer(&self, name: &str) -> bool {
        match &self.layers {
            Some(layers) if !layers.is_empty() => layers.iter().any(|l| l == name),
            _ => true,
        }
    }

    pub fn wants_geometry(&self, kind: GeomKind) -> bool {
        self.geometry.map_or(true, |g| g == kind)
    }
}

/// A feature that passed the radius and filter checks for one tile.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: Option<u64>,
    pub layer: Arc<str>,
    pub geometry: GeomKind,
    pub properties: Vec<(String, PropertyValue)>,
    /// Closest point on the feature as `[lng, lat]`.
    pub coordinates: [f64; 2],
    /// Distance in meters from the query point.
    pub distance: f64,
    pub tile: TileCoord,
}

/// GeoJSON `FeatureCollection` returned by a query.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    kind: &'static str,
    pub features: Vec<ResultFeature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<ResultFeature>) -> Self {
        Self {
            kind: "FeatureCollection",
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// One ranked result, serialized as a GeoJSON point feature.
#[derive(Debug, Clone, Serialize)]
pub struct ResultFeature {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub geometry: PointGeometry,
    pub properties: ResultProperties,
}

impl From<Candidate> for ResultFeature {
    fn from(candidate: Candidate) -> Self {
        Self {
            kind: "Feature",
            id: candidate.id,
            geometry: PointGeometry {
                kind: "Point",
                coordinates: candidate.coordinates,
            },
            properties: ResultProperties {
                values: candidate.properties,
                tilequery: TileQueryInfo {
                    distance: candidate.distance,
                    layer: candidate.layer.to_string(),
                    geometry: candidate.geometry,
                },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PointGeometry {
    #[serde(rename = "type")]
    kind: &'static str,
    pub coordinates: [f64; 2],
}

/// Original feature properties in tile order, plus the `tilequery` block.
#[derive(Debug, Clone)]
pub struct ResultProperties {
    pub values: Vec<(String, PropertyValue)>,
    pub tilequery: TileQueryInfo,
}

impl ResultProperties {
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.values.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl Serialize for ResultProperties {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
        for (key, value) in &self.values {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry("tilequery", &self.tilequery)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileQueryInfo {
    pub distance: f64,
    pub layer: String,
    pub geometry: GeomKind,
}
