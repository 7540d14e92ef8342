use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatisticsOverview {
    #[serde(rename = "total_incidentes")]
    pub total_incidents: u64,
    #[serde(rename = "incidentes_hoy")]
    pub incidents_today: u64,
    #[serde(rename = "incidentes_ultimo_mes")]
    pub incidents_last_month: u64,
    #[serde(rename = "zonas_seguras")]
    pub safe_zones: u64,
    #[serde(rename = "tendencia")]
    pub trend: String,
    /// Left out by the backend when it has no incidents loaded.
    #[serde(rename = "cambio_porcentual", default)]
    pub percent_change: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IncidentsByType {
    #[serde(rename = "type")]
    pub incident_type: String,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IncidentsByHour {
    pub hour: u8,
    pub count: u64,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IncidentsByDay {
    pub day: String,
    pub day_en: String,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IncidentsByBarrio {
    pub barrio: String,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeatmapPoint {
    pub lat: f64,
    pub lng: f64,
    pub intensity: f64,
    pub risk: String,
    pub count: u64,
}

#[test]
fn overview_decodes_backend_names() {
    let overview: StatisticsOverview = serde_json::from_value(serde_json::json!({
        "total_incidentes": 1200,
        "incidentes_hoy": 4,
        "incidentes_ultimo_mes": 98,
        "zonas_seguras": 12,
        "tendencia": "down",
        "cambio_porcentual": -3.5
    }))
    .unwrap();

    assert_eq!(overview.total_incidents, 1200);
    assert_eq!(overview.trend, "down");
}

#[test]
fn overview_without_percent_change_is_empty_dataset() {
    let overview: StatisticsOverview = serde_json::from_value(serde_json::json!({
        "total_incidentes": 0,
        "incidentes_hoy": 0,
        "incidentes_ultimo_mes": 0,
        "zonas_seguras": 0,
        "tendencia": "sin_datos"
    }))
    .unwrap();

    assert_eq!(overview.total_incidents, 0);
    assert_eq!(overview.trend, "sin_datos");
    assert_eq!(overview.percent_change, 0.0);
}

#[test]
fn timeline_dates_are_iso() {
    let point: TimelinePoint =
        serde_json::from_str(r#"{"date":"2024-01-15","count":7}"#).unwrap();

    assert_eq!(point.date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
}
