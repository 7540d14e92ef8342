use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingEndpoints,
    NoRouteFound,
    BackendUnreachable,
    ModelUnavailable,
    InvalidRequest,
    GeocodeNoMatch,
    GeocodeLookupFailed,
    InvalidConfig,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Re-labels a transport or decoding failure for a specific call site,
    /// keeping the original message.
    pub fn with_kind(self, kind: ErrorKind) -> Self {
        Self { kind, ..self }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        env_var_error(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        reqwest_error(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(ErrorKind::Unknown, format!("malformed response: {}", err))
    }
}

pub fn missing_endpoints_error() -> Error {
    Error::new(
        ErrorKind::MissingEndpoints,
        "origin and destination must both be selected",
    )
}

pub fn no_route_found_error(detail: impl Into<String>) -> Error {
    Error::new(ErrorKind::NoRouteFound, detail)
}

pub fn backend_unreachable_error(detail: impl Into<String>) -> Error {
    Error::new(ErrorKind::BackendUnreachable, detail)
}

pub fn model_unavailable_error(detail: impl Into<String>) -> Error {
    Error::new(ErrorKind::ModelUnavailable, detail)
}

pub fn invalid_request_error(detail: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidRequest, detail)
}

pub fn geocode_no_match_error(query: &str) -> Error {
    Error::new(
        ErrorKind::GeocodeNoMatch,
        format!("no matches for \"{}\"", query),
    )
}

pub fn geocode_lookup_failed_error(detail: impl Into<String>) -> Error {
    Error::new(ErrorKind::GeocodeLookupFailed, detail)
}

pub fn invalid_config_error(detail: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidConfig, detail)
}

pub fn unexpected_error(detail: impl Into<String>) -> Error {
    Error::new(ErrorKind::Unknown, detail)
}

pub fn env_var_error(err: env::VarError) -> Error {
    invalid_config_error(format!("environment variable error: {}", err))
}

pub fn reqwest_error(err: reqwest::Error) -> Error {
    if err.is_connect() || err.is_timeout() || err.is_request() {
        return backend_unreachable_error(err.to_string());
    }

    if err.is_decode() {
        return unexpected_error(format!("malformed response: {}", err));
    }

    unexpected_error(err.to_string())
}

/// Maps a non-success status from the backend to the error taxonomy.
/// `detail` is the backend's `detail` field when it sent one.
pub fn status_error(status: u16, detail: String) -> Error {
    match status {
        503 => model_unavailable_error(detail),
        400 | 422 => invalid_request_error(detail),
        502 | 504 => backend_unreachable_error(detail),
        _ => unexpected_error(format!("backend returned {}: {}", status, detail)),
    }
}

#[test]
fn status_error_mapping() {
    assert_eq!(status_error(503, "".into()).kind, ErrorKind::ModelUnavailable);
    assert_eq!(status_error(400, "".into()).kind, ErrorKind::InvalidRequest);
    assert_eq!(status_error(422, "".into()).kind, ErrorKind::InvalidRequest);
    assert_eq!(status_error(504, "".into()).kind, ErrorKind::BackendUnreachable);
    assert_eq!(status_error(500, "boom".into()).kind, ErrorKind::Unknown);
}

#[test]
fn with_kind_keeps_message() {
    let err =
        backend_unreachable_error("connection refused").with_kind(ErrorKind::GeocodeLookupFailed);

    assert_eq!(err.kind, ErrorKind::GeocodeLookupFailed);
    assert_eq!(err.message, "connection refused");
}
