use geo_types::{Coord, Rect};
use serde::{Deserialize, Serialize};

/// A WGS84 coordinate, latitude first.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Builds a point from a GeoJSON / OSRM `[lng, lat]` pair.
    pub fn from_lng_lat([lng, lat]: [f64; 2]) -> Self {
        Self { lat, lng }
    }
}

impl From<GeoPoint> for Coord<f64> {
    fn from(point: GeoPoint) -> Self {
        Coord {
            x: point.lng,
            y: point.lat,
        }
    }
}

/// South-west / north-east corners of a map viewport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub south_west: GeoPoint,
    pub north_east: GeoPoint,
}

impl Bounds {
    pub fn enclosing(points: &[GeoPoint]) -> Option<Self> {
        let first = points.first()?;
        let mut rect = Rect::new(Coord::from(*first), Coord::from(*first));

        for point in points.iter().skip(1) {
            let min = rect.min();
            let max = rect.max();
            rect = Rect::new(
                Coord {
                    x: min.x.min(point.lng),
                    y: min.y.min(point.lat),
                },
                Coord {
                    x: max.x.max(point.lng),
                    y: max.y.max(point.lat),
                },
            );
        }

        Some(rect.into())
    }
}

impl From<Rect<f64>> for Bounds {
    fn from(rect: Rect<f64>) -> Self {
        Self {
            south_west: GeoPoint::new(rect.min().y, rect.min().x),
            north_east: GeoPoint::new(rect.max().y, rect.max().x),
        }
    }
}

#[test]
fn lng_lat_pairs_are_inverted() {
    let point = GeoPoint::from_lng_lat([-75.58, 6.24]);

    assert_eq!(point, GeoPoint::new(6.24, -75.58));
}

#[test]
fn bounds_enclose_all_points() {
    let bounds = Bounds::enclosing(&[
        GeoPoint::new(6.25, -75.57),
        GeoPoint::new(6.20, -75.60),
        GeoPoint::new(6.30, -75.55),
    ])
    .unwrap();

    assert_eq!(bounds.south_west, GeoPoint::new(6.20, -75.60));
    assert_eq!(bounds.north_east, GeoPoint::new(6.30, -75.55));
    assert!(Bounds::enclosing(&[]).is_none());
}
