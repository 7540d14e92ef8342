use std::collections::HashMap;

use uuid::Uuid;

use super::{Circle, LayerId, MapSurface, Marker, Polyline};
use crate::entities::{Bounds, GeoPoint};

#[derive(Clone, Debug, PartialEq)]
pub enum Layer {
    Marker(Marker),
    Polyline(Polyline),
    Circle(Circle),
}

#[derive(Clone, Debug)]
struct DrawnLayer {
    layer: Layer,
    popup: Option<String>,
}

/// Keeps every drawn layer in memory. Used headless by the CLI and as the
/// observable map in tests.
#[derive(Debug)]
pub struct MemoryMap {
    center: GeoPoint,
    zoom: u8,
    bounds: Option<Bounds>,
    layers: HashMap<LayerId, DrawnLayer>,
}

impl MemoryMap {
    pub fn new(center: GeoPoint, zoom: u8) -> Self {
        Self {
            center,
            zoom,
            bounds: None,
            layers: HashMap::new(),
        }
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Last bounds the view was fitted to, cleared by `set_view`.
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(&id).map(|drawn| &drawn.layer)
    }

    pub fn popup(&self, id: LayerId) -> Option<&str> {
        self.layers.get(&id).and_then(|drawn| drawn.popup.as_deref())
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn markers(&self) -> Vec<&Marker> {
        self.layers
            .values()
            .filter_map(|drawn| match &drawn.layer {
                Layer::Marker(marker) => Some(marker),
                _ => None,
            })
            .collect()
    }

    pub fn polylines(&self) -> Vec<&Polyline> {
        self.layers
            .values()
            .filter_map(|drawn| match &drawn.layer {
                Layer::Polyline(polyline) => Some(polyline),
                _ => None,
            })
            .collect()
    }

    pub fn circles(&self) -> Vec<&Circle> {
        self.layers
            .values()
            .filter_map(|drawn| match &drawn.layer {
                Layer::Circle(circle) => Some(circle),
                _ => None,
            })
            .collect()
    }

    fn insert(&mut self, layer: Layer) -> LayerId {
        let id = Uuid::new_v4();
        self.layers.insert(id, DrawnLayer { layer, popup: None });

        id
    }
}

impl MapSurface for MemoryMap {
    fn set_view(&mut self, center: GeoPoint, zoom: u8) {
        self.center = center;
        self.zoom = zoom;
        self.bounds = None;
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        self.center = GeoPoint::new(
            (bounds.south_west.lat + bounds.north_east.lat) / 2.0,
            (bounds.south_west.lng + bounds.north_east.lng) / 2.0,
        );
        self.bounds = Some(bounds);
    }

    fn add_marker(&mut self, marker: Marker) -> LayerId {
        self.insert(Layer::Marker(marker))
    }

    fn move_marker(&mut self, id: LayerId, position: GeoPoint) {
        if let Some(DrawnLayer {
            layer: Layer::Marker(marker),
            ..
        }) = self.layers.get_mut(&id)
        {
            marker.position = position;
        }
    }

    fn add_polyline(&mut self, polyline: Polyline) -> LayerId {
        self.insert(Layer::Polyline(polyline))
    }

    fn add_circle(&mut self, circle: Circle) -> LayerId {
        self.insert(Layer::Circle(circle))
    }

    fn bind_popup(&mut self, id: LayerId, content: String) {
        if let Some(drawn) = self.layers.get_mut(&id) {
            drawn.popup = Some(content);
        }
    }

    fn remove_layer(&mut self, id: LayerId) {
        self.layers.remove(&id);
    }
}

#[test]
fn remove_layer_only_drops_that_layer() {
    let mut map = MemoryMap::new(GeoPoint::new(6.2442, -75.5812), 13);

    let marker = map.add_marker(Marker {
        position: GeoPoint::new(6.24, -75.58),
        title: "origin".into(),
        draggable: true,
    });
    let line = map.add_polyline(Polyline {
        points: vec![GeoPoint::new(6.24, -75.58), GeoPoint::new(6.25, -75.57)],
        color: "#28a745",
        weight: 6,
        opacity: 0.8,
    });

    map.remove_layer(line);
    map.remove_layer(line);

    assert_eq!(map.layer_count(), 1);
    assert!(map.layer(marker).is_some());
}

#[test]
fn fit_bounds_recenters() {
    let mut map = MemoryMap::new(GeoPoint::new(0.0, 0.0), 13);

    map.fit_bounds(Bounds {
        south_west: GeoPoint::new(6.0, -76.0),
        north_east: GeoPoint::new(7.0, -75.0),
    });

    assert_eq!(map.center(), GeoPoint::new(6.5, -75.5));
    assert!(map.bounds().is_some());

    map.set_view(GeoPoint::new(6.2, -75.5), 15);
    assert!(map.bounds().is_none());
}
