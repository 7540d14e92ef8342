use super::{helpers::popup_for_point, Selection, Session};

use crate::{
    entities::{AddressSuggestion, GeoPoint, Role, SelectionMode},
    map::{MapSurface, Marker},
};

impl<M: MapSurface> Session<M> {
    #[tracing::instrument(skip(self))]
    pub fn set_mode(&mut self, mode: SelectionMode) {
        self.mode = mode;
    }

    /// Role a click lands on. In auto mode the origin is sticky once set and
    /// every later click goes to the destination.
    pub fn click_target(&self) -> Role {
        match self.mode {
            SelectionMode::Origin => Role::Origin,
            SelectionMode::Destination => Role::Destination,
            SelectionMode::Auto if self.selections.origin.is_none() => Role::Origin,
            SelectionMode::Auto => Role::Destination,
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn handle_map_click(&mut self, point: GeoPoint) -> Role {
        let role = self.click_target();
        self.set_point(role, point);

        role
    }

    /// Places the role's marker, replacing any previous one.
    #[tracing::instrument(skip(self))]
    pub fn set_point(&mut self, role: Role, point: GeoPoint) {
        if let Some(previous) = self.selections[role].take() {
            self.map.remove_layer(previous.marker);
        }

        let marker = self.map.add_marker(Marker {
            position: point,
            title: role.name().into(),
            draggable: true,
        });
        self.map
            .bind_popup(marker, popup_for_point(role.name(), point.lat, point.lng));

        self.selections[role] = Some(Selection { point, marker });
        tracing::info!("{} set to {:.5}, {:.5}", role.name(), point.lat, point.lng);

        self.invalidate_route();
    }

    /// A marker was dragged on the map. Ignored if the role has no marker.
    #[tracing::instrument(skip(self))]
    pub fn drag_marker(&mut self, role: Role, point: GeoPoint) {
        let Some(selection) = self.selections[role].as_mut() else {
            tracing::debug!("dragend for {} without a marker", role.name());
            return;
        };

        selection.point = point;
        let marker = selection.marker;

        self.map.move_marker(marker, point);
        self.map
            .bind_popup(marker, popup_for_point(role.name(), point.lat, point.lng));

        self.invalidate_route();
    }

    pub fn clear_origin(&mut self) {
        self.clear_point(Role::Origin);
    }

    pub fn clear_destination(&mut self) {
        self.clear_point(Role::Destination);
    }

    #[tracing::instrument(skip(self))]
    pub fn clear_point(&mut self, role: Role) {
        if let Some(previous) = self.selections[role].take() {
            self.map.remove_layer(previous.marker);
        }

        self.invalidate_route();
    }

    /// Applies a geocoding hit to a role and centers the map on it.
    #[tracing::instrument(skip(self))]
    pub fn set_from_suggestion(&mut self, role: Role, suggestion: &AddressSuggestion) {
        self.set_point(role, suggestion.point);
        self.map.set_view(suggestion.point, self.config.focus_zoom);
    }
}

#[cfg(test)]
use super::test_session as session;

#[test]
fn auto_mode_fills_origin_then_destination() {
    let mut s = session();

    assert_eq!(s.handle_map_click(GeoPoint::new(6.24, -75.58)), Role::Origin);
    assert_eq!(s.handle_map_click(GeoPoint::new(6.25, -75.57)), Role::Destination);

    assert_eq!(s.origin(), Some(GeoPoint::new(6.24, -75.58)));
    assert_eq!(s.destination(), Some(GeoPoint::new(6.25, -75.57)));
    assert_eq!(s.map().markers().len(), 2);
}

#[test]
fn auto_mode_keeps_origin_once_both_are_set() {
    let mut s = session();
    let origin = GeoPoint::new(6.24, -75.58);

    s.handle_map_click(origin);
    s.handle_map_click(GeoPoint::new(6.25, -75.57));

    for n in 0..5 {
        let point = GeoPoint::new(6.26 + n as f64 * 0.01, -75.56);

        assert_eq!(s.handle_map_click(point), Role::Destination);
        assert_eq!(s.origin(), Some(origin));
        assert_eq!(s.destination(), Some(point));
        assert_eq!(s.map().markers().len(), 2);
    }
}

#[test]
fn explicit_mode_replaces_marker_without_leaking() {
    let mut s = session();
    s.set_mode(SelectionMode::Destination);

    s.handle_map_click(GeoPoint::new(6.24, -75.58));
    let first = s.selection(Role::Destination).unwrap().marker;
    s.handle_map_click(GeoPoint::new(6.25, -75.57));

    assert!(s.map().layer(first).is_none());
    assert_eq!(s.map().markers().len(), 1);
    assert!(s.origin().is_none());
    assert_eq!(s.destination(), Some(GeoPoint::new(6.25, -75.57)));
}

#[test]
fn auto_mode_refills_cleared_origin() {
    let mut s = session();

    s.handle_map_click(GeoPoint::new(6.24, -75.58));
    s.handle_map_click(GeoPoint::new(6.25, -75.57));
    s.clear_origin();

    assert_eq!(s.map().markers().len(), 1);
    assert_eq!(s.handle_map_click(GeoPoint::new(6.20, -75.60)), Role::Origin);
}

#[test]
fn drag_moves_existing_marker() {
    let mut s = session();

    s.handle_map_click(GeoPoint::new(6.24, -75.58));
    let marker = s.selection(Role::Origin).unwrap().marker;

    s.drag_marker(Role::Origin, GeoPoint::new(6.30, -75.50));
    s.drag_marker(Role::Destination, GeoPoint::new(6.31, -75.51));

    assert_eq!(s.selection(Role::Origin).unwrap().marker, marker);
    assert_eq!(s.origin(), Some(GeoPoint::new(6.30, -75.50)));
    assert!(s.destination().is_none());
    assert!(matches!(
        s.map().layer(marker),
        Some(crate::map::Layer::Marker(m)) if m.position == GeoPoint::new(6.30, -75.50)
    ));
}

#[test]
fn suggestion_recenters_map() {
    let mut s = session();
    let suggestion = AddressSuggestion::new(GeoPoint::new(6.21, -75.57), "Calle 10, Medellín");

    s.set_from_suggestion(Role::Destination, &suggestion);

    assert_eq!(s.destination(), Some(suggestion.point));
    assert_eq!(s.map().center(), suggestion.point);
    assert_eq!(s.map().zoom(), s.config().focus_zoom);
}

#[cfg(test)]
fn session_with_route() -> super::Session<crate::map::MemoryMap> {
    use crate::entities::{RiskAnnotation, RiskLevel, RouteGeometry, RoutePrediction};

    let mut s = session();
    s.handle_map_click(GeoPoint::new(6.24, -75.58));
    s.handle_map_click(GeoPoint::new(6.25, -75.57));

    let points: Vec<_> = (0..4)
        .map(|i| GeoPoint::new(6.24 + i as f64 * 0.003, -75.58 + i as f64 * 0.003))
        .collect();
    let annotation = RiskAnnotation {
        probability: 0.5,
        risk_level: RiskLevel::Medium,
    };
    let prediction = RoutePrediction {
        annotations: vec![annotation; points.len()],
        ..Default::default()
    };

    s.render_route(RouteGeometry::new(points), prediction).unwrap();
    assert_eq!(s.map().polylines().len(), 3);

    s
}

#[test]
fn every_endpoint_change_erases_drawn_route() {
    use super::Session;
    use crate::map::MemoryMap;

    type Change = fn(&mut Session<MemoryMap>);

    let changes: [(&str, Change); 4] = [
        (
            "drag",
            |s: &mut Session<MemoryMap>| s.drag_marker(Role::Origin, GeoPoint::new(6.30, -75.50)),
        ),
        ("clear origin", |s: &mut Session<MemoryMap>| s.clear_origin()),
        ("clear destination", |s: &mut Session<MemoryMap>| {
            s.clear_destination()
        }),
        ("suggestion", |s: &mut Session<MemoryMap>| {
            let hit = AddressSuggestion::new(GeoPoint::new(6.21, -75.57), "Calle 10");
            s.set_from_suggestion(Role::Destination, &hit)
        }),
    ];

    for (name, change) in changes {
        let mut s = session_with_route();

        change(&mut s);

        assert!(s.route().is_none(), "{} kept the route", name);
        assert!(s.map().polylines().is_empty(), "{} kept segments", name);
        assert!(s.map().circles().is_empty(), "{} kept risk markers", name);
    }
}
