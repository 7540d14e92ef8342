use chrono::NaiveDateTime;

use super::{helpers::sampled_indices, RenderedRoute, Session, TraceTicket};

use crate::{
    api::PredictionAPI,
    entities::{Bounds, RouteGeometry, RoutePrediction},
    error::{invalid_request_error, unexpected_error, Error},
    map::{Circle, MapSurface, Polyline},
};

const SEGMENT_WEIGHT: u8 = 6;
const SEGMENT_OPACITY: f64 = 0.8;
const RISK_MARKER_RADIUS: f64 = 8.0;

/// Requests risk for every point of the path in one call.
#[tracing::instrument(skip(api, geometry), fields(points = geometry.len()))]
pub async fn annotate<P: PredictionAPI + Sync + ?Sized>(
    api: &P,
    geometry: &RouteGeometry,
    at: Option<NaiveDateTime>,
) -> Result<RoutePrediction, Error> {
    if geometry.is_empty() {
        return Err(invalid_request_error("route has no points to annotate"));
    }

    let prediction = api.predict_route(&geometry.points, at).await?;

    if prediction.annotations.len() != geometry.len() {
        return Err(unexpected_error(format!(
            "got {} risk annotations for {} route points",
            prediction.annotations.len(),
            geometry.len()
        )));
    }

    Ok(prediction)
}

impl<M: MapSurface> Session<M> {
    /// Annotates and draws `geometry` in place. On failure whatever route was
    /// drawn before stays on the map.
    pub async fn annotate_and_render<P: PredictionAPI + Sync + ?Sized>(
        &mut self,
        api: &P,
        geometry: RouteGeometry,
    ) -> Result<(), Error> {
        let prediction = annotate(api, &geometry, self.prediction_time).await?;

        self.render_route(geometry, prediction)
    }

    /// Applies a prediction for a traced route unless the trace went stale.
    #[tracing::instrument(skip(self, geometry, result))]
    pub fn apply_prediction(
        &mut self,
        ticket: TraceTicket,
        geometry: RouteGeometry,
        result: Result<RoutePrediction, Error>,
    ) -> Result<(), Error> {
        if !self.is_current_trace(&ticket) {
            tracing::debug!("dropping stale prediction");
            return Ok(());
        }

        self.render_route(geometry, result?)
    }

    /// Replaces the drawn route. Each segment takes the color of its leading
    /// point; risk markers are sampled evenly and capped. The prediction must
    /// carry one annotation per point, otherwise nothing is redrawn.
    #[tracing::instrument(skip_all, fields(points = geometry.len()))]
    pub fn render_route(
        &mut self,
        geometry: RouteGeometry,
        prediction: RoutePrediction,
    ) -> Result<(), Error> {
        if prediction.annotations.len() != geometry.len() {
            return Err(unexpected_error(format!(
                "got {} risk annotations for {} route points",
                prediction.annotations.len(),
                geometry.len()
            )));
        }

        self.erase_route();

        let points = &geometry.points;
        let annotations = &prediction.annotations;

        let segments: Vec<_> = points
            .windows(2)
            .zip(annotations.iter())
            .map(|(pair, leading)| {
                self.map.add_polyline(Polyline {
                    points: pair.to_vec(),
                    color: leading.risk_level.color(),
                    weight: SEGMENT_WEIGHT,
                    opacity: SEGMENT_OPACITY,
                })
            })
            .collect();

        let mut markers = vec![];
        for index in sampled_indices(points.len()) {
            let (point, annotation) = match (points.get(index), annotations.get(index)) {
                (Some(point), Some(annotation)) => (*point, *annotation),
                _ => continue,
            };

            let id = self.map.add_circle(Circle {
                center: point,
                radius: RISK_MARKER_RADIUS,
                color: annotation.risk_level.color(),
                fill_opacity: SEGMENT_OPACITY,
            });
            self.map.bind_popup(
                id,
                format!(
                    "Risk: {} ({:.1}%)",
                    annotation.risk_level.label(),
                    annotation.probability * 100.0
                ),
            );

            markers.push(id);
        }

        if let Some(bounds) = Bounds::enclosing(points) {
            self.map.fit_bounds(bounds);
        }

        tracing::info!(
            "drew {} segments and {} risk markers, average risk {:.2}",
            segments.len(),
            markers.len(),
            prediction.average_probability
        );

        self.route = Some(RenderedRoute {
            geometry,
            prediction,
            segments,
            markers,
        });

        Ok(())
    }

    /// Removes the drawn route. Origin and destination markers stay.
    #[tracing::instrument(skip(self))]
    pub fn clear_route(&mut self) {
        self.invalidate_route();
    }

    /// Drops the route and makes every in-flight trace stale.
    pub(crate) fn invalidate_route(&mut self) {
        self.route_epoch += 1;
        self.erase_route();
    }

    fn erase_route(&mut self) {
        if let Some(route) = self.route.take() {
            for id in route.segments.into_iter().chain(route.markers) {
                self.map.remove_layer(id);
            }
        }
    }
}

#[cfg(test)]
use crate::entities::{GeoPoint, RiskAnnotation, RiskLevel};

#[cfg(test)]
fn path(len: usize) -> RouteGeometry {
    RouteGeometry::new(
        (0..len)
            .map(|i| GeoPoint::new(6.24 + i as f64 * 0.001, -75.58 + i as f64 * 0.001))
            .collect(),
    )
}

#[cfg(test)]
fn prediction(levels: &[RiskLevel]) -> RoutePrediction {
    RoutePrediction {
        annotations: levels
            .iter()
            .map(|level| RiskAnnotation {
                probability: match level {
                    RiskLevel::High => 0.8,
                    RiskLevel::Medium => 0.5,
                    RiskLevel::Low => 0.1,
                },
                risk_level: *level,
            })
            .collect(),
        ..Default::default()
    }
}

#[test]
fn segment_and_marker_counts() {
    for len in [2, 5, 37] {
        let mut s = super::test_session();
        s.render_route(path(len), prediction(&vec![RiskLevel::Low; len])).unwrap();

        assert_eq!(s.map().polylines().len(), len - 1);
        assert!(s.map().circles().len() <= 10);
        assert_eq!(s.route().unwrap().segments().len(), len - 1);
    }
}

#[test]
fn segment_color_follows_leading_point() {
    let mut s = super::test_session();
    s.render_route(
        path(3),
        prediction(&[RiskLevel::High, RiskLevel::Low, RiskLevel::Medium]),
    )
    .unwrap();

    let route = s.route().unwrap();
    let colors: Vec<_> = route
        .segments()
        .iter()
        .map(|id| match s.map().layer(*id) {
            Some(crate::map::Layer::Polyline(line)) => line.color,
            other => panic!("expected polyline, got {:?}", other),
        })
        .collect();

    assert_eq!(colors, vec![RiskLevel::High.color(), RiskLevel::Low.color()]);
}

#[test]
fn render_replaces_previous_route() {
    let mut s = super::test_session();

    s.render_route(path(5), prediction(&[RiskLevel::Low; 5])).unwrap();
    s.render_route(path(3), prediction(&[RiskLevel::High; 3])).unwrap();

    assert_eq!(s.map().polylines().len(), 2);
    assert_eq!(s.map().circles().len(), 3);
}

#[test]
fn clearing_route_keeps_endpoint_markers() {
    let mut s = super::test_session();
    let origin = GeoPoint::new(6.24, -75.58);
    let destination = GeoPoint::new(6.25, -75.57);
    s.handle_map_click(origin);
    s.handle_map_click(destination);

    s.render_route(path(12), prediction(&[RiskLevel::Medium; 12])).unwrap();
    assert!(s.map().layer_count() > 2);

    s.clear_route();

    assert!(s.route().is_none());
    assert_eq!(s.map().layer_count(), 2);
    assert_eq!(s.map().markers().len(), 2);
    assert_eq!(s.origin(), Some(origin));
    assert_eq!(s.destination(), Some(destination));
}

#[test]
fn moving_an_endpoint_erases_route() {
    let mut s = super::test_session();
    s.handle_map_click(GeoPoint::new(6.24, -75.58));
    s.handle_map_click(GeoPoint::new(6.25, -75.57));
    s.render_route(path(4), prediction(&[RiskLevel::Low; 4])).unwrap();

    s.handle_map_click(GeoPoint::new(6.26, -75.56));

    assert!(s.route().is_none());
    assert!(s.map().polylines().is_empty());
    assert!(s.map().circles().is_empty());
}

#[test]
fn failed_prediction_keeps_previous_route() {
    use crate::error::{model_unavailable_error, ErrorKind};

    let mut s = super::test_session();
    s.handle_map_click(GeoPoint::new(6.24, -75.58));
    s.handle_map_click(GeoPoint::new(6.25, -75.57));

    let ticket = s.begin_trace().unwrap();
    s.apply_prediction(ticket, path(4), Ok(prediction(&[RiskLevel::Low; 4]))).unwrap();

    let ticket = s.begin_trace().unwrap();
    let err = s
        .apply_prediction(ticket, path(6), Err(model_unavailable_error("no model")))
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::ModelUnavailable);
    assert_eq!(s.route().unwrap().geometry.len(), 4);
    assert_eq!(s.map().polylines().len(), 3);
}

#[test]
fn annotate_makes_one_batched_call() {
    use crate::api::mock::MockBackend;
    use tokio_test::block_on;

    let backend = MockBackend::default();
    let mut s = super::test_session();

    block_on(s.annotate_and_render(&backend, path(37))).unwrap();

    assert_eq!(backend.predict_calls(), 1);
    assert_eq!(s.map().polylines().len(), 36);
    assert_eq!(s.map().circles().len(), 10);
}

#[test]
fn annotate_rejects_empty_geometry() {
    use crate::api::mock::MockBackend;
    use crate::error::ErrorKind;
    use tokio_test::block_on;

    let backend = MockBackend::default();
    let err = block_on(annotate(&backend, &RouteGeometry::default(), None)).unwrap_err();

    assert_eq!(err.kind, ErrorKind::InvalidRequest);
    assert_eq!(backend.predict_calls(), 0);
}

#[test]
fn render_rejects_short_prediction() {
    use crate::error::ErrorKind;

    let mut s = super::test_session();
    s.render_route(path(3), prediction(&[RiskLevel::Low; 3])).unwrap();

    let err = s
        .render_route(path(5), prediction(&[RiskLevel::High; 2]))
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Unknown);
    assert_eq!(s.route().unwrap().geometry.len(), 3);
    assert_eq!(s.map().polylines().len(), 2);
}
