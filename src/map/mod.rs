//! Map rendering capability. A concrete map library plugs in by
//! implementing [`MapSurface`]; user gestures on the map are fed back into
//! the dashboard as events rather than registered callbacks.

mod memory;

use uuid::Uuid;

use crate::entities::{Bounds, GeoPoint};

pub use memory::{Layer, MemoryMap};

pub type LayerId = Uuid;

#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    pub position: GeoPoint,
    pub title: String,
    pub draggable: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Polyline {
    pub points: Vec<GeoPoint>,
    pub color: &'static str,
    pub weight: u8,
    pub opacity: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Circle {
    pub center: GeoPoint,
    /// Screen pixels, like a circle marker.
    pub radius: f64,
    pub color: &'static str,
    pub fill_opacity: f64,
}

pub trait MapSurface {
    fn set_view(&mut self, center: GeoPoint, zoom: u8);
    fn fit_bounds(&mut self, bounds: Bounds);

    fn add_marker(&mut self, marker: Marker) -> LayerId;
    fn move_marker(&mut self, id: LayerId, position: GeoPoint);
    fn add_polyline(&mut self, polyline: Polyline) -> LayerId;
    fn add_circle(&mut self, circle: Circle) -> LayerId;
    fn bind_popup(&mut self, id: LayerId, content: String);

    /// Removing an id that is not on the map is a no-op.
    fn remove_layer(&mut self, id: LayerId);
}
