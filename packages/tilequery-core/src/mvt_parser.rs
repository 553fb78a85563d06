use flate2::read::{GzDecoder, ZlibDecoder};
use geozero::mvt::{tile, Message, Tile};
use std::borrow::Cow;
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

use crate::error::DecodeError;
use crate::models::GeomKind;
use crate::value::PropertyValue;

/// Default layer extent when a layer does not declare one.
pub const DEFAULT_EXTENT: u32 = 4096;

/// A decoded tile: its layers in encounter order.
#[derive(Debug, Clone)]
pub struct ParsedTile {
    pub layers: Vec<ParsedLayer>,
}

/// A layer with its shared key/value dictionary.
///
/// Features reference the dictionary through their tag indices, which are
/// validated during parsing so lookups never go out of range.
#[derive(Debug, Clone)]
pub struct ParsedLayer {
    pub name: Arc<str>,
    pub extent: u32,
    pub keys: Vec<String>,
    values: Vec<Option<PropertyValue>>,
    pub features: Vec<ParsedFeature>,
}

/// A feature with its raw geometry command stream and tag indices.
#[derive(Debug, Clone)]
pub struct ParsedFeature {
    pub id: Option<u64>,
    /// `None` for geometry types outside point/linestring/polygon.
    pub kind: Option<GeomKind>,
    pub geometry: Vec<u32>,
    tags: Vec<u32>,
}

impl ParsedLayer {
    /// Iterate a feature's properties in tag order.
    pub fn properties<'a>(
        &'a self,
        feature: &'a ParsedFeature,
    ) -> impl Iterator<Item = (&'a str, &'a PropertyValue)> + 'a {
        feature.tags.chunks_exact(2).filter_map(move |pair| {
            let key = self.keys.get(pair[0] as usize)?;
            let value = self.values.get(pair[1] as usize)?.as_ref()?;
            Some((key.as_str(), value))
        })
    }

    pub fn property<'a>(&'a self, feature: &'a ParsedFeature, key: &str) -> Option<&'a PropertyValue> {
        self.properties(feature)
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Owned copy of a feature's properties.
    pub fn collect_properties(&self, feature: &ParsedFeature) -> Vec<(String, PropertyValue)> {
        self.properties(feature)
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

fn is_gzipped(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1F && data[1] == 0x8B
}

fn is_zlib(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x78 && (u16::from(data[0]) << 8 | u16::from(data[1])) % 31 == 0
}

/// Reverse gzip or zlib framing if present; plain tiles are borrowed as-is.
pub fn decompress(data: &[u8]) -> Result<Cow<'_, [u8]>, DecodeError> {
    let mut decompressed = Vec::new();
    if is_gzipped(data) {
        debug!("Detected gzipped tile, decompressing {} bytes", data.len());
        GzDecoder::new(data).read_to_end(&mut decompressed)?;
    } else if is_zlib(data) {
        debug!("Detected zlib tile, decompressing {} bytes", data.len());
        ZlibDecoder::new(data).read_to_end(&mut decompressed)?;
    } else {
        return Ok(Cow::Borrowed(data));
    }
    Ok(Cow::Owned(decompressed))
}

/// Decode a (possibly compressed) vector tile.
///
/// Every feature must carry a geometry type tag and a geometry; a single
/// feature missing either fails the whole tile.
pub fn parse_tile(data: &[u8]) -> Result<ParsedTile, DecodeError> {
    let data = decompress(data)?;
    let tile = Tile::decode(data.as_ref()).map_err(|e| DecodeError::Protobuf(e.to_string()))?;

    let layers = tile
        .layers
        .into_iter()
        .map(parse_layer)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ParsedTile { layers })
}

fn parse_layer(layer: tile::Layer) -> Result<ParsedLayer, DecodeError> {
    let extent = layer.extent.unwrap_or(DEFAULT_EXTENT);
    let values: Vec<Option<PropertyValue>> = layer.values.iter().map(PropertyValue::from_mvt).collect();

    let features = layer
        .features
        .into_iter()
        .map(|feature| parse_feature(feature, &layer.name, layer.keys.len(), &values))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ParsedLayer {
        name: Arc::from(layer.name),
        extent,
        keys: layer.keys,
        values,
        features,
    })
}

fn parse_feature(
    feature: tile::Feature,
    layer_name: &str,
    key_count: usize,
    values: &[Option<PropertyValue>],
) -> Result<ParsedFeature, DecodeError> {
    let raw_type = feature.r#type.ok_or(DecodeError::MissingGeometry)?;
    if feature.geometry.is_empty() {
        return Err(DecodeError::MissingGeometry);
    }

    if feature.tags.len() % 2 != 0 {
        return Err(DecodeError::UnpairedTags {
            layer: layer_name.to_string(),
        });
    }
    for pair in feature.tags.chunks_exact(2) {
        if pair[0] as usize >= key_count {
            return Err(DecodeError::TagOutOfRange {
                layer: layer_name.to_string(),
                index: pair[0],
            });
        }
        match values.get(pair[1] as usize) {
            Some(Some(_)) => {}
            Some(None) => {
                return Err(DecodeError::EmptyValue {
                    layer: layer_name.to_string(),
                })
            }
            None => {
                return Err(DecodeError::TagOutOfRange {
                    layer: layer_name.to_string(),
                    index: pair[1],
                })
            }
        }
    }

    let kind = match tile::GeomType::from_i32(raw_type) {
        Some(tile::GeomType::Point) => Some(GeomKind::Point),
        Some(tile::GeomType::Linestring) => Some(GeomKind::LineString),
        Some(tile::GeomType::Polygon) => Some(GeomKind::Polygon),
        Some(tile::GeomType::Unknown) | None => None,
    };

    Ok(ParsedFeature {
        id: feature.id,
        kind,
        geometry: feature.geometry,
        tags: feature.tags,
    })
}
