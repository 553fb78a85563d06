use geo_types::Coord;
use std::f64::consts::PI;

/// Latitude beyond which spherical mercator diverges.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

// WGS84 ellipsoid
const EARTH_RADIUS_KM: f64 = 6378.137;
const FLATTENING: f64 = 1.0 / 298.257_223_563;

/// Convert tile-local coordinates to longitude/latitude.
pub fn tile_to_lng_lat(px: f64, py: f64, extent: u32, zoom: u32, tile_x: u32, tile_y: u32) -> Coord {
    let n = 2.0_f64.powi(zoom as i32);

    // Normalized web-mercator position in 0..1
    let normalized_x = (tile_x as f64 + px / extent as f64) / n;
    let normalized_y = (tile_y as f64 + py / extent as f64) / n;

    let lng = normalized_x * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * normalized_y)).sinh().atan().to_degrees();

    Coord { x: lng, y: lat }
}

/// Project a longitude/latitude into the local coordinate space of one tile.
///
/// The result is unbounded: points outside the tile land outside `0..extent`,
/// which is what the distance engine needs for queries across tile seams.
pub fn lng_lat_to_tile(lng: f64, lat: f64, extent: u32, zoom: u32, tile_x: u32, tile_y: u32) -> Coord {
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let size = extent as f64 * 2.0_f64.powi(zoom as i32);

    let lat_rad = lat.to_radians();
    let world_x = (lng + 180.0) / 360.0 * size;
    let world_y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * size;

    Coord {
        x: world_x - tile_x as f64 * extent as f64,
        y: world_y - tile_y as f64 * extent as f64,
    }
}

/// Fast planar distance approximation around a fixed latitude.
///
/// Accurate to well under a percent for the city-scale distances tile
/// queries deal with, and much cheaper than haversine.
#[derive(Debug, Clone, Copy)]
pub struct Ruler {
    kx: f64,
    ky: f64,
}

impl Ruler {
    pub fn new(lat: f64) -> Self {
        let meters_per_degree = EARTH_RADIUS_KM * 1000.0 * PI / 180.0;
        let e2 = FLATTENING * (2.0 - FLATTENING);
        let coslat = lat.to_radians().cos();
        let w2 = 1.0 / (1.0 - e2 * (1.0 - coslat * coslat));
        let w = w2.sqrt();

        Ruler {
            kx: meters_per_degree * w * coslat,
            ky: meters_per_degree * w * w2 * (1.0 - e2),
        }
    }

    /// Distance in meters between two lng/lat coordinates.
    pub fn distance(&self, a: Coord, b: Coord) -> f64 {
        let dx = wrap_longitude(a.x - b.x) * self.kx;
        let dy = (a.y - b.y) * self.ky;
        (dx * dx + dy * dy).sqrt()
    }
}

fn wrap_longitude(mut deg: f64) -> f64 {
    while deg < -180.0 {
        deg += 360.0;
    }
    while deg > 180.0 {
        deg -= 360.0;
    }
    deg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, eps: f64) {
        assert!((a - b).abs() <= eps, "{a} vs {b}");
    }

    #[test]
    fn tile_corners_match_web_mercator() {
        let nw = tile_to_lng_lat(0.0, 0.0, 4096, 0, 0, 0);
        assert_close(nw.x, -180.0, 1e-9);
        assert_close(nw.y, MAX_MERCATOR_LAT, 1e-9);

        let center = tile_to_lng_lat(2048.0, 2048.0, 4096, 0, 0, 0);
        assert_close(center.x, 0.0, 1e-9);
        assert_close(center.y, 0.0, 1e-9);
    }

    #[test]
    fn projection_round_trips_inside_tile() {
        let (lng, lat) = (-122.4477, 37.7665);
        let local = lng_lat_to_tile(lng, lat, 4096, 15, 5238, 12666);
        assert!(local.x >= 0.0 && local.x < 4096.0);
        assert!(local.y >= 0.0 && local.y < 4096.0);

        let back = tile_to_lng_lat(local.x, local.y, 4096, 15, 5238, 12666);
        assert_close(back.x, lng, 1e-9);
        assert_close(back.y, lat, 1e-9);
    }

    #[test]
    fn neighbouring_tile_sees_point_outside_extent() {
        let local = lng_lat_to_tile(-122.4477, 37.7665, 4096, 15, 5239, 12666);
        assert!(local.x < 0.0);
    }

    #[test]
    fn clamps_polar_latitudes() {
        let local = lng_lat_to_tile(0.0, 90.0, 4096, 0, 0, 0);
        assert!(local.y.is_finite());
        assert_close(local.y, 0.0, 1e-6);
    }

    #[test]
    fn ruler_measures_meters() {
        let ruler = Ruler::new(0.0);
        // One degree of longitude at the equator is about 111.3 km.
        let d = ruler.distance(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 0.0 });
        assert_close(d, 111_319.49, 1.0);

        let ruler = Ruler::new(60.0);
        let d = ruler.distance(Coord { x: 0.0, y: 60.0 }, Coord { x: 1.0, y: 60.0 });
        assert!(d < 56_000.0 && d > 55_000.0);
    }

    #[test]
    fn ruler_wraps_antimeridian() {
        let ruler = Ruler::new(0.0);
        let d = ruler.distance(Coord { x: 179.9, y: 0.0 }, Coord { x: -179.9, y: 0.0 });
        assert!(d < 23_000.0);
    }
}
