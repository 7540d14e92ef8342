use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    api::{GeocodeAPI, PredictionAPI, RoutingAPI, StatisticsAPI, API},
    config::Config,
    entities::{
        AddressSuggestion, GeoPoint, HeatmapPoint, IncidentsByBarrio, IncidentsByDay,
        IncidentsByHour, IncidentsByType, ModelHealth, RiskAnnotation, RiskLevel, RouteGeometry,
        RoutePrediction, StatisticsOverview, TimelinePoint,
    },
    error::{
        backend_unreachable_error, no_route_found_error, status_error, unexpected_error, Error,
        ErrorKind,
    },
};

#[derive(Clone, Debug, Serialize)]
struct OsrmRouteRequest<'a> {
    origin_lat: f64,
    origin_lng: f64,
    destination_lat: f64,
    destination_lng: f64,
    profile: &'a str,
}

/// GeoJSON ordering: every pair is `[lng, lat]`.
#[derive(Clone, Debug, Deserialize)]
struct OsrmRouteResponse {
    coordinates: Vec<[f64; 2]>,
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Punto {
    latitud: f64,
    longitud: f64,
}

impl From<GeoPoint> for Punto {
    fn from(point: GeoPoint) -> Self {
        Self {
            latitud: point.lat,
            longitud: point.lng,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
struct RoutePredictionRequest {
    puntos: Vec<Punto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fecha_hora: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
struct PointPredictionRequest {
    latitud: f64,
    longitud: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    fecha_hora: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct PointPrediction {
    probabilidad: f64,
    riesgo: RiskLevel,
}

impl From<PointPrediction> for RiskAnnotation {
    fn from(prediction: PointPrediction) -> Self {
        Self {
            probability: prediction.probabilidad,
            risk_level: prediction.riesgo,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
struct RoutePredictionResponse {
    puntos: Vec<PointPrediction>,
    probabilidad_promedio: f64,
    riesgo_alto_count: u32,
    riesgo_medio_count: u32,
    riesgo_bajo_count: u32,
}

#[derive(Clone, Debug, Serialize)]
struct GeocodeRequest<'a> {
    address: &'a str,
    limit: u8,
}

#[derive(Clone, Debug, Deserialize)]
struct GeocodeResult {
    latitud: f64,
    longitud: f64,
    direccion: String,
}

/// The backend wraps results in `resultados`; older deployments answered
/// with a bare list or a single hit.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum GeocodeResponse {
    Envelope { resultados: Vec<GeocodeResult> },
    List(Vec<GeocodeResult>),
    Single(GeocodeResult),
}

impl From<GeocodeResponse> for Vec<AddressSuggestion> {
    fn from(response: GeocodeResponse) -> Self {
        let results = match response {
            GeocodeResponse::Envelope { resultados } => resultados,
            GeocodeResponse::List(results) => results,
            GeocodeResponse::Single(result) => vec![result],
        };

        results
            .into_iter()
            .map(|result| {
                AddressSuggestion::new(
                    GeoPoint::new(result.latitud, result.longitud),
                    result.direccion,
                )
            })
            .collect()
    }
}

#[derive(Clone, Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

#[derive(Clone, Debug, Deserialize)]
struct ByType {
    incidents_by_type: Vec<IncidentsByType>,
}

#[derive(Clone, Debug, Deserialize)]
struct ByHour {
    incidents_by_hour: Vec<IncidentsByHour>,
}

#[derive(Clone, Debug, Deserialize)]
struct ByDay {
    incidents_by_day: Vec<IncidentsByDay>,
}

#[derive(Clone, Debug, Deserialize)]
struct ByBarrio {
    incidents_by_barrio: Vec<IncidentsByBarrio>,
}

#[derive(Clone, Debug, Deserialize)]
struct Timeline {
    timeline: Vec<TimelinePoint>,
}

#[derive(Clone, Debug, Deserialize)]
struct Heatmap {
    heatmap_points: Vec<HeatmapPoint>,
}

/// REST client for the prediction backend.
#[derive(Clone, Debug)]
pub struct BackendClient {
    client: reqwest::Client,
    api_base: String,
}

impl BackendClient {
    pub fn new(config: &Config) -> Self {
        Self::with_base(&config.api_base)
    }

    pub fn with_base(api_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let res = self.client.get(self.url(path)).send().await?;

        read_json(res).await
    }
}

/// Splits a response into its status and body, turning non-2xx answers into
/// the matching error kind.
async fn read_body(res: reqwest::Response) -> Result<String, Error> {
    let status = res.status();
    let body = res.text().await?;

    if !status.is_success() {
        return Err(status_error(status.as_u16(), error_detail(&body)));
    }

    Ok(body)
}

async fn read_json<T: DeserializeOwned>(res: reqwest::Response) -> Result<T, Error> {
    let body = read_body(res).await?;

    Ok(serde_json::from_str(&body)?)
}

fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if body.is_empty() => "no detail".into(),
        Err(_) => body.to_string(),
    }
}

fn format_timestamp(at: Option<NaiveDateTime>) -> Option<String> {
    at.map(|at| at.format("%Y-%m-%dT%H:%M:%S").to_string())
}

#[async_trait]
impl GeocodeAPI for BackendClient {
    #[tracing::instrument(skip(self))]
    async fn geocode(&self, address: &str, limit: u8) -> Result<Vec<AddressSuggestion>, Error> {
        let lookup = async {
            let res = self
                .client
                .post(self.url("/geocode"))
                .json(&GeocodeRequest { address, limit })
                .send()
                .await?;

            let data: GeocodeResponse = read_json(res).await?;
            let suggestions: Vec<AddressSuggestion> = data.into();

            Ok::<_, Error>(suggestions)
        };

        lookup
            .await
            .map_err(|err| err.with_kind(ErrorKind::GeocodeLookupFailed))
    }
}

#[async_trait]
impl RoutingAPI for BackendClient {
    #[tracing::instrument(skip(self))]
    async fn find_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
        profile: &str,
    ) -> Result<RouteGeometry, Error> {
        let res = self
            .client
            .post(self.url("/route/osrm"))
            .json(&OsrmRouteRequest {
                origin_lat: origin.lat,
                origin_lng: origin.lng,
                destination_lat: destination.lat,
                destination_lng: destination.lng,
                profile,
            })
            .send()
            .await?;

        let body = match read_body(res).await {
            Ok(body) => body,
            Err(err) if err.kind == ErrorKind::BackendUnreachable => return Err(err),
            // 503 from the proxy means the router itself could not be reached
            Err(err) if err.kind == ErrorKind::ModelUnavailable => {
                return Err(backend_unreachable_error(err.message))
            }
            Err(err) => return Err(no_route_found_error(err.message)),
        };

        let data: OsrmRouteResponse = serde_json::from_str(&body)
            .map_err(|err| no_route_found_error(format!("malformed route response: {}", err)))?;

        if data.coordinates.is_empty() {
            return Err(no_route_found_error("router returned an empty path"));
        }

        Ok(RouteGeometry {
            points: data
                .coordinates
                .into_iter()
                .map(GeoPoint::from_lng_lat)
                .collect(),
            distance: data.distance,
            duration: data.duration,
        })
    }
}

#[async_trait]
impl PredictionAPI for BackendClient {
    #[tracing::instrument(skip(self, points), fields(points = points.len()))]
    async fn predict_route(
        &self,
        points: &[GeoPoint],
        at: Option<NaiveDateTime>,
    ) -> Result<RoutePrediction, Error> {
        let res = self
            .client
            .post(self.url("/predict/route"))
            .json(&RoutePredictionRequest {
                puntos: points.iter().copied().map(Punto::from).collect(),
                fecha_hora: format_timestamp(at),
            })
            .send()
            .await?;

        let data: RoutePredictionResponse = read_json(res).await?;

        if data.puntos.len() != points.len() {
            return Err(unexpected_error(format!(
                "prediction returned {} points for a path of {}",
                data.puntos.len(),
                points.len()
            )));
        }

        Ok(RoutePrediction {
            annotations: data.puntos.into_iter().map(RiskAnnotation::from).collect(),
            average_probability: data.probabilidad_promedio,
            high_count: data.riesgo_alto_count,
            medium_count: data.riesgo_medio_count,
            low_count: data.riesgo_bajo_count,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn predict_point(
        &self,
        point: GeoPoint,
        at: Option<NaiveDateTime>,
    ) -> Result<RiskAnnotation, Error> {
        let res = self
            .client
            .post(self.url("/predict/point"))
            .json(&PointPredictionRequest {
                latitud: point.lat,
                longitud: point.lng,
                fecha_hora: format_timestamp(at),
            })
            .send()
            .await?;

        let data: PointPrediction = read_json(res).await?;

        Ok(data.into())
    }

    #[tracing::instrument(skip(self))]
    async fn health(&self) -> Result<ModelHealth, Error> {
        self.get("/health").await
    }
}

#[async_trait]
impl StatisticsAPI for BackendClient {
    #[tracing::instrument(skip(self))]
    async fn overview(&self) -> Result<StatisticsOverview, Error> {
        self.get("/statistics/overview").await
    }

    #[tracing::instrument(skip(self))]
    async fn incidents_by_type(&self) -> Result<Vec<IncidentsByType>, Error> {
        let data: ByType = self.get("/statistics/by-type").await?;

        Ok(data.incidents_by_type)
    }

    #[tracing::instrument(skip(self))]
    async fn incidents_by_hour(&self) -> Result<Vec<IncidentsByHour>, Error> {
        let data: ByHour = self.get("/statistics/by-time").await?;

        Ok(data.incidents_by_hour)
    }

    #[tracing::instrument(skip(self))]
    async fn incidents_by_day(&self) -> Result<Vec<IncidentsByDay>, Error> {
        let data: ByDay = self.get("/statistics/by-day").await?;

        Ok(data.incidents_by_day)
    }

    #[tracing::instrument(skip(self))]
    async fn incidents_by_barrio(&self, limit: u32) -> Result<Vec<IncidentsByBarrio>, Error> {
        let data: ByBarrio = self
            .get(&format!("/statistics/by-barrio?limit={}", limit))
            .await?;

        Ok(data.incidents_by_barrio)
    }

    #[tracing::instrument(skip(self))]
    async fn timeline(&self, days: u32) -> Result<Vec<TimelinePoint>, Error> {
        let data: Timeline = self
            .get(&format!("/statistics/timeline?days={}", days))
            .await?;

        Ok(data.timeline)
    }

    #[tracing::instrument(skip(self))]
    async fn heatmap(&self) -> Result<Vec<HeatmapPoint>, Error> {
        let data: Heatmap = self.get("/statistics/heatmap-data").await?;

        Ok(data.heatmap_points)
    }
}

impl API for BackendClient {}

#[test]
fn osrm_pairs_decode_lat_first() {
    let data: OsrmRouteResponse =
        serde_json::from_str(r#"{"coordinates":[[-75.58,6.24],[-75.57,6.25]]}"#).unwrap();
    let points: Vec<GeoPoint> = data.coordinates.into_iter().map(GeoPoint::from_lng_lat).collect();

    assert_eq!(
        points,
        vec![GeoPoint::new(6.24, -75.58), GeoPoint::new(6.25, -75.57)]
    );
}

#[test]
fn geocode_accepts_every_response_shape() {
    let hit = r#"{"latitud":6.2,"longitud":-75.5,"direccion":"Calle 10, Medellín","direccion_original":"Calle 10"}"#;

    for body in [
        format!(r#"{{"resultados":[{}]}}"#, hit),
        format!("[{}]", hit),
        hit.to_string(),
    ] {
        let data: GeocodeResponse = serde_json::from_str(&body).unwrap();
        let suggestions: Vec<AddressSuggestion> = data.into();

        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].point, GeoPoint::new(6.2, -75.5));
        assert_eq!(suggestions[0].formatted_label, "Calle 10, Medellín");
    }
}

#[test]
fn error_detail_prefers_backend_message() {
    assert_eq!(
        error_detail(r#"{"detail":"Modelo no disponible"}"#),
        "Modelo no disponible"
    );
    assert_eq!(error_detail(""), "no detail");
    assert_eq!(error_detail("Bad Gateway"), "Bad Gateway");
}

#[test]
fn prediction_request_omits_missing_timestamp() {
    let body = serde_json::to_value(RoutePredictionRequest {
        puntos: vec![GeoPoint::new(6.24, -75.58).into()],
        fecha_hora: None,
    })
    .unwrap();

    assert_eq!(
        body,
        serde_json::json!({"puntos": [{"latitud": 6.24, "longitud": -75.58}]})
    );
}
