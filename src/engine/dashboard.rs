use async_channel::{Receiver, Sender};
use tokio::task::JoinHandle;

use super::{annotate, fetch_route, resolve_address, SearchTicket, Session, TraceTicket};

use crate::{
    api::DynAPI,
    entities::{
        AddressSuggestion, GeoPoint, Role, RoleMap, RouteGeometry, RoutePrediction, SelectionMode,
    },
    error::{invalid_request_error, unexpected_error, Error},
    map::MapSurface,
};

/// User input coming from the map and the address forms.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    MapClicked(GeoPoint),
    MarkerDragged { role: Role, point: GeoPoint },
    ModeSelected(SelectionMode),
    ClearOrigin,
    ClearDestination,
    ClearRoute,
    /// Keystroke in an address field; looked up after the debounce period.
    AddressTyped { role: Role, text: String },
    /// Explicit search button; looked up immediately.
    AddressSubmitted { role: Role, text: String },
    SuggestionPicked { role: Role, index: usize },
    TraceRoute,
    Shutdown,
}

#[derive(Debug)]
enum Completion {
    SearchDue {
        role: Role,
        timer: u64,
        text: String,
    },
    Geocoded {
        ticket: SearchTicket,
        result: Result<Vec<AddressSuggestion>, Error>,
    },
    RouteFetched {
        ticket: TraceTicket,
        result: Result<RouteGeometry, Error>,
    },
    RoutePredicted {
        ticket: TraceTicket,
        geometry: RouteGeometry,
        result: Result<RoutePrediction, Error>,
    },
}

#[derive(Debug)]
enum Message {
    Event(Event),
    Completion(Completion),
}

/// Cloneable sender for UI adapters: map click and dragend callbacks, form
/// inputs and buttons all push events through this.
#[derive(Clone, Debug)]
pub struct DashboardHandle {
    tx: Sender<Message>,
}

impl DashboardHandle {
    pub async fn send(&self, event: Event) -> Result<(), Error> {
        self.tx
            .send(Message::Event(event))
            .await
            .map_err(|_| unexpected_error("dashboard has stopped"))
    }

    /// For synchronous callbacks. The queue is unbounded so this only fails
    /// once the dashboard is gone.
    pub fn try_send(&self, event: Event) -> Result<(), Error> {
        self.tx
            .try_send(Message::Event(event))
            .map_err(|_| unexpected_error("dashboard has stopped"))
    }
}

struct Timer {
    id: u64,
    handle: JoinHandle<()>,
}

/// Event loop around a [`Session`]. Network work runs on spawned tasks that
/// post their results back; the session and the map are only touched from
/// the task driving the loop. Must be driven inside a Tokio runtime.
pub struct Dashboard<M> {
    session: Session<M>,
    api: DynAPI,
    tx: Sender<Message>,
    rx: Receiver<Message>,
    timers: RoleMap<Option<Timer>>,
    next_timer: u64,
    in_flight: usize,
    closed: bool,
}

impl<M: MapSurface> Dashboard<M> {
    pub fn new(session: Session<M>, api: DynAPI) -> Self {
        let (tx, rx) = async_channel::unbounded();

        Self {
            session,
            api,
            tx,
            rx,
            timers: RoleMap::default(),
            next_timer: 0,
            in_flight: 0,
            closed: false,
        }
    }

    pub fn handle(&self) -> DashboardHandle {
        DashboardHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn session(&self) -> &Session<M> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<M> {
        &mut self.session
    }

    pub fn into_session(mut self) -> Session<M> {
        self.disarm_timer(Role::Origin);
        self.disarm_timer(Role::Destination);

        self.session
    }

    /// Whether a debounce timer or a request is still outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight > 0 || self.timers.origin.is_some() || self.timers.destination.is_some()
    }

    /// Handles one user event. Failures are also recorded as the session
    /// notice.
    #[tracing::instrument(skip(self))]
    pub fn handle_event(&mut self, event: Event) -> Result<(), Error> {
        self.session.dismiss_notice();

        let result = self.apply_event(event);
        self.record(result)
    }

    /// Waits for and handles the next queued event or completion.
    pub async fn step(&mut self) -> Result<(), Error> {
        let message = self
            .rx
            .recv()
            .await
            .map_err(|_| unexpected_error("dashboard queue closed"))?;

        match message {
            Message::Event(event) => self.handle_event(event),
            Message::Completion(completion) => {
                let result = self.apply_completion(completion);
                self.record(result)
            }
        }
    }

    /// Drives the loop until no timer or request is outstanding.
    pub async fn settle(&mut self) {
        while self.is_busy() && !self.closed {
            let _ = self.step().await;
        }
    }

    /// Drives the loop until a `Shutdown` event arrives.
    #[tracing::instrument(skip(self))]
    pub async fn run(&mut self) {
        tracing::info!("dashboard running");

        while !self.closed {
            let _ = self.step().await;
        }

        tracing::info!("dashboard stopped");
    }

    fn record(&mut self, result: Result<(), Error>) -> Result<(), Error> {
        if let Err(err) = &result {
            tracing::warn!("{}", err);
            self.session.report(err.clone());
        }

        result
    }

    fn apply_event(&mut self, event: Event) -> Result<(), Error> {
        match event {
            Event::MapClicked(point) => {
                self.session.handle_map_click(point);
            }
            Event::MarkerDragged { role, point } => self.session.drag_marker(role, point),
            Event::ModeSelected(mode) => self.session.set_mode(mode),
            Event::ClearOrigin => self.session.clear_origin(),
            Event::ClearDestination => self.session.clear_destination(),
            Event::ClearRoute => self.session.clear_route(),
            Event::AddressTyped { role, text } => {
                if self.session.type_address(role, &text) {
                    self.arm_timer(role, text);
                } else {
                    self.disarm_timer(role);
                }
            }
            Event::AddressSubmitted { role, text } => {
                self.disarm_timer(role);
                self.session.type_address(role, &text);
                self.search(role, &text)?;
            }
            Event::SuggestionPicked { role, index } => {
                self.session.select_suggestion(role, index)?
            }
            Event::TraceRoute => self.trace()?,
            Event::Shutdown => self.closed = true,
        }

        Ok(())
    }

    fn apply_completion(&mut self, completion: Completion) -> Result<(), Error> {
        match completion {
            Completion::SearchDue { role, timer, text } => {
                let armed = matches!(&self.timers[role], Some(armed) if armed.id == timer);
                if !armed {
                    return Ok(());
                }

                self.timers[role] = None;

                self.search(role, &text)
            }
            Completion::Geocoded { ticket, result } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.session.apply_search(ticket, result)
            }
            Completion::RouteFetched { ticket, result } => {
                self.in_flight = self.in_flight.saturating_sub(1);

                if !self.session.is_current_trace(&ticket) {
                    tracing::debug!("dropping stale route");
                    return Ok(());
                }

                self.predict(ticket, result?);
                Ok(())
            }
            Completion::RoutePredicted {
                ticket,
                geometry,
                result,
            } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.session.apply_prediction(ticket, geometry, result)
            }
        }
    }

    /// Restarts the role's quiet period. Only the timer is cancelled; a
    /// lookup that already went out is left to be dropped as stale.
    fn arm_timer(&mut self, role: Role, text: String) {
        self.disarm_timer(role);

        self.next_timer += 1;
        let id = self.next_timer;
        let delay = self.session.config().debounce;
        let tx = self.tx.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx
                .send(Message::Completion(Completion::SearchDue {
                    role,
                    timer: id,
                    text,
                }))
                .await;
        });

        self.timers[role] = Some(Timer { id, handle });
    }

    fn disarm_timer(&mut self, role: Role) {
        if let Some(timer) = self.timers[role].take() {
            timer.handle.abort();
        }
    }

    fn search(&mut self, role: Role, text: &str) -> Result<(), Error> {
        let ticket = self.session.begin_search(role, text).ok_or_else(|| {
            invalid_request_error(format!(
                "enter at least {} characters to search",
                self.session.config().min_query_chars
            ))
        })?;

        let api = self.api.clone();
        let tx = self.tx.clone();
        let limit = self.session.config().geocode_limit;

        self.in_flight += 1;
        tokio::spawn(async move {
            let result = resolve_address(api.as_ref(), &ticket.query, limit).await;
            let _ = tx
                .send(Message::Completion(Completion::Geocoded { ticket, result }))
                .await;
        });

        Ok(())
    }

    fn trace(&mut self) -> Result<(), Error> {
        let ticket = self.session.begin_trace()?;

        let api = self.api.clone();
        let tx = self.tx.clone();
        let profile = self.session.config().routing_profile.clone();

        self.in_flight += 1;
        tokio::spawn(async move {
            let result = fetch_route(
                api.as_ref(),
                Some(ticket.origin),
                Some(ticket.destination),
                &profile,
            )
            .await;
            let _ = tx
                .send(Message::Completion(Completion::RouteFetched { ticket, result }))
                .await;
        });

        Ok(())
    }

    fn predict(&mut self, ticket: TraceTicket, geometry: RouteGeometry) {
        let api = self.api.clone();
        let tx = self.tx.clone();
        let at = self.session.prediction_time();

        self.in_flight += 1;
        tokio::spawn(async move {
            let result = annotate(api.as_ref(), &geometry, at).await;
            let _ = tx
                .send(Message::Completion(Completion::RoutePredicted {
                    ticket,
                    geometry,
                    result,
                }))
                .await;
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{Dashboard, Event};
    use crate::api::mock::MockBackend;
    use crate::entities::{AddressSuggestion, GeoPoint, Role, RouteGeometry};
    use crate::error::{model_unavailable_error, ErrorKind};
    use crate::map::MemoryMap;

    fn dashboard(backend: &Arc<MockBackend>) -> Dashboard<MemoryMap> {
        Dashboard::new(super::super::test_session(), backend.clone())
    }

    fn hit(label: &str, lat: f64) -> AddressSuggestion {
        AddressSuggestion::new(GeoPoint::new(lat, -75.57), label)
    }

    fn typed(role: Role, text: &str) -> Event {
        Event::AddressTyped {
            role,
            text: text.into(),
        }
    }

    fn submitted(role: Role, text: &str) -> Event {
        Event::AddressSubmitted {
            role,
            text: text.into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_sends_only_the_last_query() {
        let backend = Arc::new(MockBackend::default());
        backend.set_geocode("Cal", Ok(vec![hit("Cali", 3.4)]));
        backend.set_geocode(
            "Calle 10",
            Ok(vec![hit("Calle 10", 6.21), hit("Calle 10 Sur", 6.19)]),
        );
        let mut d = dashboard(&backend);

        d.handle_event(typed(Role::Origin, "Cal")).unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        d.handle_event(typed(Role::Origin, "Calle 10")).unwrap();
        d.settle().await;

        assert_eq!(backend.geocode_calls(), vec!["Calle 10".to_string()]);
        assert_eq!(d.session().suggestions(Role::Origin).len(), 2);
        assert_eq!(d.session().origin(), Some(GeoPoint::new(6.21, -75.57)));
    }

    #[tokio::test(start_paused = true)]
    async fn short_input_cancels_pending_lookup() {
        let backend = Arc::new(MockBackend::default());
        let mut d = dashboard(&backend);

        d.handle_event(typed(Role::Destination, "Calle")).unwrap();
        d.handle_event(typed(Role::Destination, "Ca")).unwrap();

        assert!(!d.is_busy());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(backend.geocode_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_search_skips_debounce() {
        let backend = Arc::new(MockBackend::default());
        backend.set_geocode("Parque Berrío", Ok(vec![hit("Parque Berrío", 6.25)]));
        let mut d = dashboard(&backend);
        let started = tokio::time::Instant::now();

        d.handle_event(typed(Role::Destination, "Parque Ber")).unwrap();
        d.handle_event(submitted(Role::Destination, "Parque Berrío")).unwrap();
        d.settle().await;

        assert!(started.elapsed() < d.session().config().debounce);
        assert_eq!(backend.geocode_calls(), vec!["Parque Berrío".to_string()]);
        assert_eq!(d.session().destination(), Some(GeoPoint::new(6.25, -75.57)));
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_for_superseded_query_is_ignored() {
        let backend = Arc::new(MockBackend::default());
        backend.set_geocode("Calle 10", Ok(vec![hit("Calle 10", 6.21)]));
        backend.delay_geocode("Calle 10", Duration::from_millis(800));
        backend.set_geocode("Carrera 43", Ok(vec![hit("Carrera 43", 6.23)]));
        let mut d = dashboard(&backend);

        d.handle_event(submitted(Role::Origin, "Calle 10")).unwrap();
        d.handle_event(submitted(Role::Origin, "Carrera 43")).unwrap();
        d.settle().await;

        assert_eq!(backend.geocode_calls().len(), 2);
        assert_eq!(d.session().origin(), Some(GeoPoint::new(6.23, -75.57)));
        assert_eq!(
            d.session().suggestions(Role::Origin)[0].formatted_label,
            "Carrera 43"
        );
        assert!(d.session().notice().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn no_match_is_reported() {
        let backend = Arc::new(MockBackend::default());
        let mut d = dashboard(&backend);

        d.handle_event(submitted(Role::Origin, "Calle inexistente")).unwrap();
        d.settle().await;

        assert_eq!(
            d.session().notice().map(|err| err.kind),
            Some(ErrorKind::GeocodeNoMatch)
        );
        assert!(d.session().origin().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn trace_draws_risk_route() {
        let backend = Arc::new(MockBackend::default());
        let points: Vec<_> = (0..37)
            .map(|i| GeoPoint::new(6.24 + i as f64 * 0.0005, -75.58))
            .collect();
        backend.set_route(Ok(RouteGeometry::new(points)));
        let mut d = dashboard(&backend);

        d.handle_event(Event::MapClicked(GeoPoint::new(6.24, -75.58))).unwrap();
        d.handle_event(Event::MapClicked(GeoPoint::new(6.258, -75.58))).unwrap();
        d.handle_event(Event::TraceRoute).unwrap();
        d.settle().await;

        let map = d.session().map();
        assert_eq!(map.polylines().len(), 36);
        assert_eq!(map.circles().len(), 10);
        assert_eq!(map.markers().len(), 2);
        assert_eq!(backend.predict_calls(), 1);
        assert_eq!(d.session().route().unwrap().prediction.annotations.len(), 37);
    }

    #[tokio::test(start_paused = true)]
    async fn trace_without_endpoints_never_calls_router() {
        let backend = Arc::new(MockBackend::default());
        let mut d = dashboard(&backend);

        d.handle_event(Event::MapClicked(GeoPoint::new(6.24, -75.58))).unwrap();
        let err = d.handle_event(Event::TraceRoute).unwrap_err();

        assert_eq!(err.kind, ErrorKind::MissingEndpoints);
        assert_eq!(d.session().notice().map(|err| err.kind), Some(ErrorKind::MissingEndpoints));
        assert!(!d.is_busy());
        assert_eq!(backend.route_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn route_for_moved_endpoint_is_dropped() {
        let backend = Arc::new(MockBackend::default());
        backend.delay_route(Duration::from_secs(1));
        let mut d = dashboard(&backend);

        d.handle_event(Event::MapClicked(GeoPoint::new(6.24, -75.58))).unwrap();
        d.handle_event(Event::MapClicked(GeoPoint::new(6.25, -75.57))).unwrap();
        d.handle_event(Event::TraceRoute).unwrap();
        d.handle_event(Event::MapClicked(GeoPoint::new(6.26, -75.56))).unwrap();
        d.settle().await;

        assert!(d.session().route().is_none());
        assert!(d.session().map().polylines().is_empty());
        assert_eq!(backend.predict_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn prediction_for_cleared_route_is_dropped() {
        let backend = Arc::new(MockBackend::default());
        backend.delay_predictions(Duration::from_secs(1));
        let mut d = dashboard(&backend);

        d.handle_event(Event::MapClicked(GeoPoint::new(6.24, -75.58))).unwrap();
        d.handle_event(Event::MapClicked(GeoPoint::new(6.25, -75.57))).unwrap();
        d.handle_event(Event::TraceRoute).unwrap();
        // let the route land, then clear while the prediction is in flight
        d.step().await.unwrap();
        d.handle_event(Event::ClearRoute).unwrap();
        d.settle().await;

        assert_eq!(backend.predict_calls(), 1);
        assert!(d.session().route().is_none());
        assert_eq!(d.session().map().layer_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_prediction_keeps_drawn_route() {
        let backend = Arc::new(MockBackend::default());
        let mut d = dashboard(&backend);

        d.handle_event(Event::MapClicked(GeoPoint::new(6.24, -75.58))).unwrap();
        d.handle_event(Event::MapClicked(GeoPoint::new(6.25, -75.57))).unwrap();
        d.handle_event(Event::TraceRoute).unwrap();
        d.settle().await;
        assert_eq!(d.session().map().polylines().len(), 1);

        backend.fail_predictions(model_unavailable_error("Modelo no disponible"));
        d.handle_event(Event::TraceRoute).unwrap();
        d.settle().await;

        let notice = d.session().notice().unwrap();
        assert_eq!(notice.kind, ErrorKind::ModelUnavailable);
        assert_eq!(notice.message, "Modelo no disponible");
        assert!(d.session().route().is_some());
        assert_eq!(d.session().map().polylines().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_processes_events_until_shutdown() {
        let backend = Arc::new(MockBackend::default());
        let mut d = dashboard(&backend);
        let handle = d.handle();

        handle.send(Event::MapClicked(GeoPoint::new(6.24, -75.58))).await.unwrap();
        handle
            .try_send(Event::MarkerDragged {
                role: Role::Origin,
                point: GeoPoint::new(6.30, -75.50),
            })
            .unwrap();
        handle.send(Event::Shutdown).await.unwrap();
        d.run().await;

        let session = d.into_session();
        assert_eq!(session.origin(), Some(GeoPoint::new(6.30, -75.50)));
        assert_eq!(session.map().markers().len(), 1);
    }
}
