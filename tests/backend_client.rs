use std::net::{SocketAddr, TcpListener};

use alertavia::api::{GeocodeAPI, PredictionAPI, RoutingAPI, StatisticsAPI};
use alertavia::entities::{GeoPoint, RiskLevel};
use alertavia::error::ErrorKind;
use alertavia::external::backend::BackendClient;
use axum::{
    extract::Json,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};

async fn osrm(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["origin_lat"] == body["destination_lat"]
        && body["origin_lng"] == body["destination_lng"]
    {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"detail": "No se pudo calcular una ruta entre los puntos seleccionados"})),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "coordinates": [[-75.58, 6.24], [-75.57, 6.25]],
            "distance": 1520.4,
            "duration": 240.0
        })),
    )
}

async fn predict_route(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let puntos = body["puntos"].as_array().cloned().unwrap_or_default();

    if puntos.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "La ruta debe contener al menos un punto"})),
        );
    }

    let scored: Vec<Value> = puntos
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let (probabilidad, riesgo) = if i == 0 { (0.82, "alto") } else { (0.12, "bajo") };
            json!({
                "latitud": p["latitud"],
                "longitud": p["longitud"],
                "probabilidad": probabilidad,
                "riesgo": riesgo
            })
        })
        .collect();

    (
        StatusCode::OK,
        Json(json!({
            "puntos": scored,
            "probabilidad_promedio": 0.47,
            "riesgo_alto_count": 1,
            "riesgo_medio_count": 0,
            "riesgo_bajo_count": puntos.len() - 1
        })),
    )
}

async fn unavailable() -> (StatusCode, Json<Value>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({"detail": "Modelo no disponible. Ejecuta train_density_model.py primero."})),
    )
}

async fn geocode(Json(body): Json<Value>) -> Json<Value> {
    if body["address"] == "Calle 10" {
        return Json(json!({"resultados": [{
            "latitud": 6.2087,
            "longitud": -75.5671,
            "direccion": "Calle 10, El Poblado, Medellín",
            "direccion_original": "Calle 10",
            "tipo": "residential",
            "importancia": 0.4
        }]}));
    }

    Json(json!({"resultados": []}))
}

async fn by_barrio() -> Json<Value> {
    Json(json!({"incidents_by_barrio": [
        {"barrio": "La Candelaria", "count": 310},
        {"barrio": "El Poblado", "count": 122}
    ]}))
}

async fn empty_overview() -> Json<Value> {
    Json(json!({
        "total_incidentes": 0,
        "incidentes_hoy": 0,
        "incidentes_ultimo_mes": 0,
        "zonas_seguras": 0,
        "tendencia": "sin_datos"
    }))
}

fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service())
            .await
            .unwrap();
    });

    format!("http://{}", addr)
}

fn backend() -> BackendClient {
    let app = Router::new()
        .route("/route/osrm", post(osrm))
        .route("/predict/route", post(predict_route))
        .route("/geocode", post(geocode))
        .route("/statistics/overview", get(empty_overview))
        .route("/statistics/by-barrio", get(by_barrio));

    BackendClient::with_base(&serve(app))
}

#[tokio::test]
async fn route_coordinates_are_decoded_lat_first() {
    let client = backend();

    let geometry = client
        .find_route(GeoPoint::new(6.24, -75.58), GeoPoint::new(6.25, -75.57), "driving")
        .await
        .unwrap();

    assert_eq!(
        geometry.points,
        vec![GeoPoint::new(6.24, -75.58), GeoPoint::new(6.25, -75.57)]
    );
    assert_eq!(geometry.distance, 1520.4);
}

#[tokio::test]
async fn unroutable_points_are_no_route_found() {
    let client = backend();
    let point = GeoPoint::new(6.24, -75.58);

    let err = client.find_route(point, point, "driving").await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::NoRouteFound);
}

#[tokio::test]
async fn route_prediction_is_batched_and_aligned() {
    let client = backend();
    let points = vec![
        GeoPoint::new(6.24, -75.58),
        GeoPoint::new(6.25, -75.57),
        GeoPoint::new(6.26, -75.56),
    ];

    let prediction = client.predict_route(&points, None).await.unwrap();

    assert_eq!(prediction.annotations.len(), 3);
    assert_eq!(prediction.annotations[0].risk_level, RiskLevel::High);
    assert_eq!(prediction.annotations[2].risk_level, RiskLevel::Low);
    assert_eq!(prediction.low_count, 2);
}

#[tokio::test]
async fn empty_path_is_invalid_request() {
    let client = backend();

    let err = client.predict_route(&[], None).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::InvalidRequest);
    assert_eq!(err.message, "La ruta debe contener al menos un punto");
}

#[tokio::test]
async fn missing_model_is_model_unavailable() {
    let app = Router::new().route("/predict/route", post(unavailable));
    let client = BackendClient::with_base(&serve(app));

    let err = client
        .predict_route(&[GeoPoint::new(6.24, -75.58)], None)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::ModelUnavailable);
}

#[tokio::test]
async fn closed_port_is_backend_unreachable() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let client = BackendClient::with_base(&format!("http://{}", addr));

    let err = client
        .predict_route(&[GeoPoint::new(6.24, -75.58)], None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::BackendUnreachable);

    let err = client.geocode("Calle 10", 5).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::GeocodeLookupFailed);
}

#[tokio::test]
async fn geocode_reads_result_envelope() {
    let client = backend();

    let found = client.geocode("Calle 10", 5).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].point, GeoPoint::new(6.2087, -75.5671));
    assert_eq!(found[0].formatted_label, "Calle 10, El Poblado, Medellín");

    assert!(client.geocode("Calle 999", 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn statistics_unwraps_envelope() {
    let client = backend();

    let barrios = client.incidents_by_barrio(2).await.unwrap();

    assert_eq!(barrios.len(), 2);
    assert_eq!(barrios[0].barrio, "La Candelaria");
}

#[tokio::test]
async fn overview_of_empty_dataset_decodes() {
    let client = backend();

    let overview = client.overview().await.unwrap();

    assert_eq!(overview.total_incidents, 0);
    assert_eq!(overview.trend, "sin_datos");
    assert_eq!(overview.percent_change, 0.0);
}
