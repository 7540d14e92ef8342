use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::sync::Arc;

use crate::entities::{
    AddressSuggestion, GeoPoint, HeatmapPoint, IncidentsByBarrio, IncidentsByDay,
    IncidentsByHour, IncidentsByType, ModelHealth, RiskAnnotation, RouteGeometry,
    RoutePrediction, StatisticsOverview, TimelinePoint,
};
use crate::error::Error;

#[async_trait]
pub trait GeocodeAPI {
    async fn geocode(&self, address: &str, limit: u8) -> Result<Vec<AddressSuggestion>, Error>;
}

#[async_trait]
pub trait RoutingAPI {
    async fn find_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
        profile: &str,
    ) -> Result<RouteGeometry, Error>;
}

#[async_trait]
pub trait PredictionAPI {
    /// One batched call for the whole path; annotations come back in path order.
    async fn predict_route(
        &self,
        points: &[GeoPoint],
        at: Option<NaiveDateTime>,
    ) -> Result<RoutePrediction, Error>;
    async fn predict_point(
        &self,
        point: GeoPoint,
        at: Option<NaiveDateTime>,
    ) -> Result<RiskAnnotation, Error>;
    async fn health(&self) -> Result<ModelHealth, Error>;
}

#[async_trait]
pub trait StatisticsAPI {
    async fn overview(&self) -> Result<StatisticsOverview, Error>;
    async fn incidents_by_type(&self) -> Result<Vec<IncidentsByType>, Error>;
    async fn incidents_by_hour(&self) -> Result<Vec<IncidentsByHour>, Error>;
    async fn incidents_by_day(&self) -> Result<Vec<IncidentsByDay>, Error>;
    async fn incidents_by_barrio(&self, limit: u32) -> Result<Vec<IncidentsByBarrio>, Error>;
    async fn timeline(&self, days: u32) -> Result<Vec<TimelinePoint>, Error>;
    async fn heatmap(&self) -> Result<Vec<HeatmapPoint>, Error>;
}

pub trait API: GeocodeAPI + RoutingAPI + PredictionAPI + StatisticsAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;
