use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::{
    api::{GeocodeAPI, PredictionAPI, RoutingAPI, StatisticsAPI, API},
    entities::{
        AddressSuggestion, GeoPoint, HeatmapPoint, IncidentsByBarrio, IncidentsByDay,
        IncidentsByHour, IncidentsByType, ModelHealth, RiskAnnotation, RiskLevel, RouteGeometry,
        RoutePrediction, StatisticsOverview, TimelinePoint,
    },
    error::{unexpected_error, Error},
};

/// Scripted backend. Unknown geocoding queries answer with no matches, the
/// route is a straight two-point line unless overridden, and predictions
/// cycle high / medium / low along the path.
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    geocode: HashMap<String, Result<Vec<AddressSuggestion>, Error>>,
    geocode_delays: HashMap<String, Duration>,
    geocode_calls: Vec<String>,
    route: Option<Result<RouteGeometry, Error>>,
    route_delay: Duration,
    route_calls: usize,
    prediction: Option<Error>,
    predict_delay: Duration,
    predict_calls: usize,
}

const CYCLE: [(f64, RiskLevel); 3] = [
    (0.8, RiskLevel::High),
    (0.5, RiskLevel::Medium),
    (0.1, RiskLevel::Low),
];

impl MockBackend {
    pub fn set_geocode(&self, query: &str, result: Result<Vec<AddressSuggestion>, Error>) {
        self.lock().geocode.insert(query.into(), result);
    }

    pub fn delay_geocode(&self, query: &str, delay: Duration) {
        self.lock().geocode_delays.insert(query.into(), delay);
    }

    pub fn set_route(&self, result: Result<RouteGeometry, Error>) {
        self.lock().route = Some(result);
    }

    pub fn delay_route(&self, delay: Duration) {
        self.lock().route_delay = delay;
    }

    pub fn fail_predictions(&self, err: Error) {
        self.lock().prediction = Some(err);
    }

    pub fn delay_predictions(&self, delay: Duration) {
        self.lock().predict_delay = delay;
    }

    pub fn geocode_calls(&self) -> Vec<String> {
        self.lock().geocode_calls.clone()
    }

    pub fn route_calls(&self) -> usize {
        self.lock().route_calls
    }

    pub fn predict_calls(&self) -> usize {
        self.lock().predict_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl GeocodeAPI for MockBackend {
    async fn geocode(&self, address: &str, _limit: u8) -> Result<Vec<AddressSuggestion>, Error> {
        let (result, delay) = {
            let mut state = self.lock();
            state.geocode_calls.push(address.into());

            (
                state.geocode.get(address).cloned().unwrap_or(Ok(vec![])),
                state.geocode_delays.get(address).copied().unwrap_or_default(),
            )
        };

        pause(delay).await;
        result
    }
}

#[async_trait]
impl RoutingAPI for MockBackend {
    async fn find_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
        _profile: &str,
    ) -> Result<RouteGeometry, Error> {
        let (result, delay) = {
            let mut state = self.lock();
            state.route_calls += 1;

            (
                state
                    .route
                    .clone()
                    .unwrap_or_else(|| Ok(RouteGeometry::new(vec![origin, destination]))),
                state.route_delay,
            )
        };

        pause(delay).await;
        result
    }
}

#[async_trait]
impl PredictionAPI for MockBackend {
    async fn predict_route(
        &self,
        points: &[GeoPoint],
        _at: Option<NaiveDateTime>,
    ) -> Result<RoutePrediction, Error> {
        let (failure, delay) = {
            let mut state = self.lock();
            state.predict_calls += 1;

            (state.prediction.clone(), state.predict_delay)
        };

        pause(delay).await;

        if let Some(err) = failure {
            return Err(err);
        }

        let annotations: Vec<RiskAnnotation> = (0..points.len())
            .map(|i| {
                let (probability, risk_level) = CYCLE[i % CYCLE.len()];
                RiskAnnotation {
                    probability,
                    risk_level,
                }
            })
            .collect();

        let count = |level: RiskLevel| {
            annotations
                .iter()
                .filter(|annotation| annotation.risk_level == level)
                .count() as u32
        };

        Ok(RoutePrediction {
            average_probability: annotations.iter().map(|a| a.probability).sum::<f64>()
                / annotations.len().max(1) as f64,
            high_count: count(RiskLevel::High),
            medium_count: count(RiskLevel::Medium),
            low_count: count(RiskLevel::Low),
            annotations,
        })
    }

    async fn predict_point(
        &self,
        _point: GeoPoint,
        _at: Option<NaiveDateTime>,
    ) -> Result<RiskAnnotation, Error> {
        Ok(RiskAnnotation {
            probability: CYCLE[0].0,
            risk_level: CYCLE[0].1,
        })
    }

    async fn health(&self) -> Result<ModelHealth, Error> {
        Ok(ModelHealth {
            status: "healthy".into(),
            density_model_loaded: true,
        })
    }
}

#[async_trait]
impl StatisticsAPI for MockBackend {
    async fn overview(&self) -> Result<StatisticsOverview, Error> {
        Err(unexpected_error("not scripted"))
    }

    async fn incidents_by_type(&self) -> Result<Vec<IncidentsByType>, Error> {
        Ok(vec![])
    }

    async fn incidents_by_hour(&self) -> Result<Vec<IncidentsByHour>, Error> {
        Ok(vec![])
    }

    async fn incidents_by_day(&self) -> Result<Vec<IncidentsByDay>, Error> {
        Ok(vec![])
    }

    async fn incidents_by_barrio(&self, _limit: u32) -> Result<Vec<IncidentsByBarrio>, Error> {
        Ok(vec![])
    }

    async fn timeline(&self, _days: u32) -> Result<Vec<TimelinePoint>, Error> {
        Ok(vec![])
    }

    async fn heatmap(&self) -> Result<Vec<HeatmapPoint>, Error> {
        Ok(vec![])
    }
}

impl API for MockBackend {}
