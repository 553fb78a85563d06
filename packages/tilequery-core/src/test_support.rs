// Fixture builders for encoding small vector tiles in tests
use flate2::write::GzEncoder;
use flate2::Compression;
use geozero::mvt::{tile, Message, Tile};
use std::io::Write;

use crate::projection::lng_lat_to_tile;
use crate::value::PropertyValue;

const CMD_MOVE_TO: u32 = 1;
const CMD_LINE_TO: u32 = 2;
const CMD_CLOSE_PATH: u32 = 7;

fn zigzag_encode(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

fn command(id: u32, count: usize) -> u32 {
    (id & 0x7) | ((count as u32) << 3)
}

/// Encodes geometry parts while tracking the cursor across parts.
#[derive(Default)]
pub struct CommandEncoder {
    cursor: (i32, i32),
    out: Vec<u32>,
}

impl CommandEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_point(&mut self, (x, y): (i32, i32)) {
        self.out.push(zigzag_encode(x - self.cursor.0));
        self.out.push(zigzag_encode(y - self.cursor.1));
        self.cursor = (x, y);
    }

    pub fn points(mut self, coords: &[(i32, i32)]) -> Self {
        self.out.push(command(CMD_MOVE_TO, coords.len()));
        for &c in coords {
            self.push_point(c);
        }
        self
    }

    pub fn line(mut self, coords: &[(i32, i32)]) -> Self {
        self.out.push(command(CMD_MOVE_TO, 1));
        self.push_point(coords[0]);
        self.out.push(command(CMD_LINE_TO, coords.len() - 1));
        for &c in &coords[1..] {
            self.push_point(c);
        }
        self
    }

    /// A closed ring; the closing vertex is implied by ClosePath.
    pub fn ring(mut self, coords: &[(i32, i32)]) -> Self {
        self = self.line(coords);
        self.out.push(command(CMD_CLOSE_PATH, 1));
        self
    }

    pub fn finish(self) -> Vec<u32> {
        self.out
    }
}

pub fn point_commands(coords: &[(i32, i32)]) -> Vec<u32> {
    CommandEncoder::new().points(coords).finish()
}

pub fn line_commands(coords: &[(i32, i32)]) -> Vec<u32> {
    CommandEncoder::new().line(coords).finish()
}

pub fn ring_commands(coords: &[(i32, i32)]) -> Vec<u32> {
    CommandEncoder::new().ring(coords).finish()
}

/// Tile-local integer coordinates of a lng/lat for a 4096-extent tile.
pub fn local(lng: f64, lat: f64, z: u32, x: u32, y: u32) -> (i32, i32) {
    let c = lng_lat_to_tile(lng, lat, 4096, z, x, y);
    (c.x.round() as i32, c.y.round() as i32)
}

/// Column and row of the tile containing a lng/lat.
pub fn tile_containing(lng: f64, lat: f64, z: u32) -> (u32, u32) {
    let world = lng_lat_to_tile(lng, lat, 4096, z, 0, 0);
    ((world.x / 4096.0).floor() as u32, (world.y / 4096.0).floor() as u32)
}

/// Exterior ring of an axis-aligned square, wound as an outer ring.
pub fn square((cx, cy): (i32, i32), half: i32) -> Vec<(i32, i32)> {
    vec![
        (cx - half, cy - half),
        (cx + half, cy - half),
        (cx + half, cy + half),
        (cx - half, cy + half),
    ]
}

pub struct FeatureBuilder {
    id: Option<u64>,
    kind: Option<i32>,
    geometry: Vec<u32>,
    props: Vec<(String, PropertyValue)>,
}

impl FeatureBuilder {
    fn new(kind: tile::GeomType, geometry: Vec<u32>) -> Self {
        Self {
            id: None,
            kind: Some(kind as i32),
            geometry,
            props: Vec::new(),
        }
    }

    pub fn point(coords: &[(i32, i32)]) -> Self {
        Self::new(tile::GeomType::Point, point_commands(coords))
    }

    pub fn line(coords: &[(i32, i32)]) -> Self {
        Self::new(tile::GeomType::Linestring, line_commands(coords))
    }

    pub fn polygon(ring: &[(i32, i32)]) -> Self {
        Self::new(tile::GeomType::Polygon, ring_commands(ring))
    }

    pub fn id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn prop(mut self, key: &str, value: PropertyValue) -> Self {
        self.props.push((key.to_string(), value));
        self
    }

    pub fn without_type(mut self) -> Self {
        self.kind = None;
        self
    }

    pub fn raw_type(mut self, kind: i32) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn raw_geometry(mut self, geometry: Vec<u32>) -> Self {
        self.geometry = geometry;
        self
    }
}

fn to_mvt_value(value: &PropertyValue) -> tile::Value {
    let mut out = tile::Value::default();
    match value {
        PropertyValue::String(s) => out.string_value = Some(s.clone()),
        PropertyValue::Float(f) => out.float_value = Some(*f),
        PropertyValue::Double(d) => out.double_value = Some(*d),
        PropertyValue::Int(i) => out.int_value = Some(*i),
        PropertyValue::UInt(u) => out.uint_value = Some(*u),
        PropertyValue::SInt(s) => out.sint_value = Some(*s),
        PropertyValue::Bool(b) => out.bool_value = Some(*b),
    }
    out
}

/// Build a layer, interning keys and values into the shared dictionary.
pub fn layer(name: &str, features: Vec<FeatureBuilder>) -> tile::Layer {
    let mut keys: Vec<String> = Vec::new();
    let mut values: Vec<PropertyValue> = Vec::new();
    let mut encoded = Vec::with_capacity(features.len());

    for feature in features {
        let mut tags = Vec::new();
        for (key, value) in feature.props {
            let key_index = keys.iter().position(|k| *k == key).unwrap_or_else(|| {
                keys.push(key);
                keys.len() - 1
            });
            let value_index = values.iter().position(|v| *v == value).unwrap_or_else(|| {
                values.push(value);
                values.len() - 1
            });
            tags.push(key_index as u32);
            tags.push(value_index as u32);
        }

        encoded.push(tile::Feature {
            id: feature.id,
            tags,
            r#type: feature.kind,
            geometry: feature.geometry,
        });
    }

    tile::Layer {
        version: 2,
        name: name.to_string(),
        features: encoded,
        keys,
        values: values.iter().map(to_mvt_value).collect(),
        extent: Some(4096),
    }
}

pub fn encode_tile(layers: Vec<tile::Layer>) -> Vec<u8> {
    Tile { layers }.encode_to_vec()
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
