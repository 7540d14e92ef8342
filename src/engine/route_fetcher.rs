use super::Session;

use crate::{
    api::RoutingAPI,
    entities::{GeoPoint, RouteGeometry},
    error::{missing_endpoints_error, no_route_found_error, Error},
};

/// Identifies one "trace route" request and the endpoints it was issued
/// for. Stale once either endpoint changes or a newer trace is issued.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceTicket {
    pub epoch: u64,
    pub trace: u64,
    pub origin: GeoPoint,
    pub destination: GeoPoint,
}

/// Asks the routing proxy for a street-following path. Fails with
/// `MissingEndpoints` before touching the network if either end is absent.
#[tracing::instrument(skip(api))]
pub async fn fetch_route<R: RoutingAPI + Sync + ?Sized>(
    api: &R,
    origin: Option<GeoPoint>,
    destination: Option<GeoPoint>,
    profile: &str,
) -> Result<RouteGeometry, Error> {
    let (origin, destination) = match (origin, destination) {
        (Some(origin), Some(destination)) => (origin, destination),
        _ => return Err(missing_endpoints_error()),
    };

    let geometry = api.find_route(origin, destination, profile).await?;

    if geometry.is_empty() {
        return Err(no_route_found_error("router returned an empty path"));
    }

    tracing::info!(
        "route with {} points, {:.0} m",
        geometry.len(),
        geometry.distance
    );

    Ok(geometry)
}

impl<M> Session<M> {
    #[tracing::instrument(skip(self))]
    pub fn begin_trace(&mut self) -> Result<TraceTicket, Error> {
        let (origin, destination) = match (self.origin(), self.destination()) {
            (Some(origin), Some(destination)) => (origin, destination),
            _ => return Err(missing_endpoints_error()),
        };

        self.latest_trace += 1;

        Ok(TraceTicket {
            epoch: self.route_epoch,
            trace: self.latest_trace,
            origin,
            destination,
        })
    }

    pub fn is_current_trace(&self, ticket: &TraceTicket) -> bool {
        ticket.epoch == self.route_epoch && ticket.trace == self.latest_trace
    }
}

#[test]
fn missing_endpoints_skip_the_network() {
    use crate::api::mock::MockBackend;
    use crate::error::ErrorKind;
    use tokio_test::block_on;

    let backend = MockBackend::default();
    let origin = Some(GeoPoint::new(6.24, -75.58));

    for (origin, destination) in [(origin, None), (None, origin), (None, None)] {
        let err = block_on(fetch_route(&backend, origin, destination, "driving")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingEndpoints);
    }

    assert_eq!(backend.route_calls(), 0);
}

#[test]
fn empty_geometry_is_no_route() {
    use crate::api::mock::MockBackend;
    use crate::error::ErrorKind;
    use tokio_test::block_on;

    let backend = MockBackend::default();
    backend.set_route(Ok(RouteGeometry::default()));

    let err = block_on(fetch_route(
        &backend,
        Some(GeoPoint::new(6.24, -75.58)),
        Some(GeoPoint::new(6.25, -75.57)),
        "driving",
    ))
    .unwrap_err();

    assert_eq!(err.kind, ErrorKind::NoRouteFound);
    assert_eq!(backend.route_calls(), 1);
}

#[test]
fn begin_trace_requires_both_points() {
    use crate::error::ErrorKind;

    let mut s = super::test_session();

    assert_eq!(s.begin_trace().unwrap_err().kind, ErrorKind::MissingEndpoints);

    s.handle_map_click(GeoPoint::new(6.24, -75.58));
    assert_eq!(s.begin_trace().unwrap_err().kind, ErrorKind::MissingEndpoints);

    s.handle_map_click(GeoPoint::new(6.25, -75.57));
    let first = s.begin_trace().unwrap();
    assert_eq!(first.origin, GeoPoint::new(6.24, -75.58));
    assert!(s.is_current_trace(&first));

    let second = s.begin_trace().unwrap();
    assert!(!s.is_current_trace(&first));
    assert!(s.is_current_trace(&second));

    s.drag_marker(crate::entities::Role::Origin, GeoPoint::new(6.20, -75.60));
    assert!(!s.is_current_trace(&second));
}
