use serde::{Deserialize, Serialize};

use crate::entities::GeoPoint;

/// Street-following path from origin to destination. Never patched in
/// place: a new trace produces a new value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteGeometry {
    pub points: Vec<GeoPoint>,
    /// Meters, as reported by the router.
    pub distance: f64,
    /// Seconds, as reported by the router.
    pub duration: f64,
}

impl RouteGeometry {
    pub fn new(points: Vec<GeoPoint>) -> Self {
        Self {
            points,
            distance: 0.0,
            duration: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[test]
fn empty_geometry_has_no_points() {
    let geometry = RouteGeometry::default();

    assert!(geometry.is_empty());
    assert_eq!(RouteGeometry::new(vec![GeoPoint::new(6.24, -75.58)]).len(), 1);
}
