mod location;
mod place;
mod risk;
mod route;
mod selection;
mod statistics;

pub use location::{Bounds, GeoPoint};
pub use place::AddressSuggestion;
pub use risk::{ModelHealth, RiskAnnotation, RiskLevel, RoutePrediction};
pub use route::RouteGeometry;
pub use selection::{Role, RoleMap, SelectionMode};
pub use statistics::{
    HeatmapPoint, IncidentsByBarrio, IncidentsByDay, IncidentsByHour, IncidentsByType,
    StatisticsOverview, TimelinePoint,
};
