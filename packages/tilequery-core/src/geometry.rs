//! MVT geometry decoding and the point-to-geometry distance engine.
//!
//! Geometries stay in tile-local coordinates (y down, `0..extent`) as `f64`.
//! The query point is projected into the same space per tile, the closest
//! point is found there, and only that single coordinate is converted back
//! to lng/lat for metric distance.

use geo::{Closest, ClosestPoint, Intersects};
use geo_types::{Coord, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};

use crate::error::DecodeError;
use crate::models::GeomKind;

const CMD_MOVE_TO: u32 = 1;
const CMD_LINE_TO: u32 = 2;
const CMD_CLOSE_PATH: u32 = 7;

/// A decoded feature geometry in tile-local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum TileGeometry {
    Points(MultiPoint<f64>),
    Lines(MultiLineString<f64>),
    Polygons(MultiPolygon<f64>),
}

/// Where the closest point of a geometry lies relative to the query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Proximity {
    /// The query point lies on the geometry, or inside it for areas.
    Hit,
    /// Closest point on the geometry, in tile-local coordinates.
    Near(Coord<f64>),
    /// Geometry has no coordinates to measure against.
    Empty,
}

#[inline]
fn zigzag_decode(n: u32) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// Cursor over a packed geometry command stream.
struct CommandReader<'a> {
    commands: &'a [u32],
    pos: usize,
    cursor_x: i64,
    cursor_y: i64,
}

impl<'a> CommandReader<'a> {
    fn new(commands: &'a [u32]) -> Self {
        Self {
            commands,
            pos: 0,
            cursor_x: 0,
            cursor_y: 0,
        }
    }

    fn done(&self) -> bool {
        self.pos >= self.commands.len()
    }

    fn command(&mut self) -> Result<(u32, u32), DecodeError> {
        let command = *self
            .commands
            .get(self.pos)
            .ok_or_else(|| DecodeError::Geometry("unexpected end of command stream".to_string()))?;
        self.pos += 1;
        Ok((command & 0x7, command >> 3))
    }

    fn expect(&mut self, id: u32, name: &str) -> Result<u32, DecodeError> {
        let (cmd_id, count) = self.command()?;
        if cmd_id != id {
            return Err(DecodeError::Geometry(format!(
                "expected {} command, found command id {}",
                name, cmd_id
            )));
        }
        Ok(count)
    }

    fn point(&mut self) -> Result<Coord<f64>, DecodeError> {
        match self.commands.get(self.pos..self.pos + 2) {
            Some(&[dx, dy]) => {
                self.pos += 2;
                self.cursor_x += zigzag_decode(dx);
                self.cursor_y += zigzag_decode(dy);
                Ok(Coord {
                    x: self.cursor_x as f64,
                    y: self.cursor_y as f64,
                })
            }
            _ => Err(DecodeError::Geometry("truncated coordinate parameters".to_string())),
        }
    }

    /// Coordinate pairs left in the stream, bounding any count read from it.
    fn remaining_points(&self) -> usize {
        self.commands.len().saturating_sub(self.pos) / 2
    }
}

/// Decode a POINT command stream: a single MoveTo with one or more points.
pub fn decode_points(commands: &[u32]) -> Result<MultiPoint<f64>, DecodeError> {
    let mut reader = CommandReader::new(commands);
    let count = reader.expect(CMD_MOVE_TO, "MoveTo")?;
    if count == 0 {
        return Err(DecodeError::Geometry("MoveTo with zero count in point geometry".to_string()));
    }

    if count as usize > reader.remaining_points() {
        return Err(DecodeError::Geometry(format!(
            "MoveTo count {} exceeds the remaining coordinate parameters",
            count
        )));
    }

    let mut points = Vec::with_capacity(count as usize);
    for _ in 0..count {
        points.push(Point::from(reader.point()?));
    }

    if !reader.done() {
        return Err(DecodeError::Geometry("additional data after end of point geometry".to_string()));
    }
    Ok(MultiPoint::new(points))
}

/// Decode a LINESTRING command stream: repeated MoveTo(1) + LineTo(n).
pub fn decode_lines(commands: &[u32]) -> Result<MultiLineString<f64>, DecodeError> {
    let mut reader = CommandReader::new(commands);
    let mut lines = Vec::new();

    while !reader.done() {
        let mut line = Vec::new();
        if reader.expect(CMD_MOVE_TO, "MoveTo")? != 1 {
            return Err(DecodeError::Geometry("MoveTo command count is not 1".to_string()));
        }
        line.push(reader.point()?);

        let count = reader.expect(CMD_LINE_TO, "LineTo")?;
        if count == 0 {
            return Err(DecodeError::Geometry("LineTo command count is zero".to_string()));
        }
        for _ in 0..count {
            line.push(reader.point()?);
        }
        lines.push(LineString::new(line));
    }

    Ok(MultiLineString::new(lines))
}

/// Decode a POLYGON command stream: repeated MoveTo(1) + LineTo(n) + ClosePath.
///
/// Rings with positive area (clockwise with y pointing down) start a new
/// polygon; negative-area rings become holes of the most recent polygon.
pub fn decode_polygons(commands: &[u32]) -> Result<MultiPolygon<f64>, DecodeError> {
    let mut reader = CommandReader::new(commands);
    let mut polygons: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();

    while !reader.done() {
        let mut ring = Vec::new();
        if reader.expect(CMD_MOVE_TO, "MoveTo")? != 1 {
            return Err(DecodeError::Geometry("MoveTo command count is not 1".to_string()));
        }
        ring.push(reader.point()?);

        let count = reader.expect(CMD_LINE_TO, "LineTo")?;
        for _ in 0..count {
            ring.push(reader.point()?);
        }

        if reader.expect(CMD_CLOSE_PATH, "ClosePath")? != 1 {
            return Err(DecodeError::Geometry("ClosePath command count is not 1".to_string()));
        }
        ring.push(ring[0]);

        let area = signed_area(&ring);
        let ring = LineString::new(ring);
        if area > 0.0 {
            polygons.push((ring, Vec::new()));
        } else if area < 0.0 {
            // holes before the first exterior ring have nothing to belong to
            if let Some((_, interiors)) = polygons.last_mut() {
                interiors.push(ring);
            }
        }
    }

    Ok(MultiPolygon::new(
        polygons
            .into_iter()
            .map(|(exterior, interiors)| Polygon::new(exterior, interiors))
            .collect(),
    ))
}

// Shoelace sum over a closed ring; positive means clockwise in tile space.
fn signed_area(ring: &[Coord<f64>]) -> f64 {
    ring.windows(2)
        .map(|w| w[0].x * w[1].y - w[1].x * w[0].y)
        .sum::<f64>()
        / 2.0
}

impl TileGeometry {
    /// Decode the command stream for a known geometry kind.
    pub fn decode(kind: GeomKind, commands: &[u32]) -> Result<Self, DecodeError> {
        Ok(match kind {
            GeomKind::Point => TileGeometry::Points(decode_points(commands)?),
            GeomKind::LineString => TileGeometry::Lines(decode_lines(commands)?),
            GeomKind::Polygon => TileGeometry::Polygons(decode_polygons(commands)?),
        })
    }

    /// Locate the closest point of this geometry to `query`.
    ///
    /// For polygons, a query point inside any exterior ring (and outside its
    /// holes) or on any boundary is a hit.
    pub fn proximity(&self, query: Coord<f64>) -> Proximity {
        let point = Point::from(query);
        let closest = match self {
            TileGeometry::Points(points) => points.closest_point(&point),
            TileGeometry::Lines(lines) => closest_on_lines(lines, &point),
            TileGeometry::Polygons(polygons) => {
                if polygons.iter().any(|polygon| polygon.intersects(&point)) {
                    return Proximity::Hit;
                }
                closest_on_boundaries(polygons, &point)
            }
        };

        match closest {
            Closest::Intersection(_) => Proximity::Hit,
            Closest::SinglePoint(p) => Proximity::Near(p.0),
            Closest::Indeterminate => Proximity::Empty,
        }
    }
}

fn closest_on_lines(lines: &MultiLineString<f64>, point: &Point<f64>) -> Closest<f64> {
    pick_closest(lines.iter().map(|line| line.closest_point(point)), point)
}

fn closest_on_boundaries(polygons: &MultiPolygon<f64>, point: &Point<f64>) -> Closest<f64> {
    let rings = polygons
        .iter()
        .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()));
    pick_closest(rings.map(|ring| ring.closest_point(point)), point)
}

// First minimum wins so results stay deterministic across equal candidates.
fn pick_closest(candidates: impl Iterator<Item = Closest<f64>>, point: &Point<f64>) -> Closest<f64> {
    let mut best = Closest::Indeterminate;
    let mut best_dist = f64::INFINITY;

    for candidate in candidates {
        match candidate {
            Closest::Intersection(_) => return candidate,
            Closest::SinglePoint(p) => {
                let d = (p.x() - point.x()).hypot(p.y() - point.y());
                if d < best_dist {
                    best_dist = d;
                    best = candidate;
                }
            }
            Closest::Indeterminate => {}
        }
    }
    best
}
