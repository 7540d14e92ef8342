use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::entities::GeoPoint;
use crate::error::{invalid_config_error, Error};

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base: String,
    pub routing_profile: String,
    pub debounce: Duration,
    pub min_query_chars: usize,
    pub geocode_limit: u8,
    pub map_center: GeoPoint,
    pub map_zoom: u8,
    /// Zoom used when centering on a single selected point.
    pub focus_zoom: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000".into(),
            routing_profile: "driving".into(),
            debounce: Duration::from_millis(400),
            min_query_chars: 3,
            geocode_limit: 5,
            map_center: GeoPoint::new(6.2442, -75.5812),
            map_zoom: 13,
            focus_zoom: 15,
        }
    }
}

impl Config {
    /// Reads `ALERTAVIA_*` variables, falling back to the defaults for any
    /// that are unset.
    #[tracing::instrument(name = "Config::from_env")]
    pub fn from_env() -> Result<Self, Error> {
        let defaults = Self::default();

        let api_base = optional_var("ALERTAVIA_API_BASE")?
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base);

        let routing_profile =
            optional_var("ALERTAVIA_ROUTING_PROFILE")?.unwrap_or(defaults.routing_profile);

        if !matches!(routing_profile.as_str(), "driving" | "walking" | "cycling") {
            return Err(invalid_config_error(format!(
                "unsupported routing profile {:?}",
                routing_profile
            )));
        }

        let debounce = parsed_var::<u64>("ALERTAVIA_DEBOUNCE_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.debounce);

        let min_query_chars =
            parsed_var("ALERTAVIA_MIN_QUERY_CHARS")?.unwrap_or(defaults.min_query_chars);

        let geocode_limit = parsed_var::<u8>("ALERTAVIA_GEOCODE_LIMIT")?
            .unwrap_or(defaults.geocode_limit)
            .clamp(1, 10);

        Ok(Self {
            api_base,
            routing_profile,
            debounce,
            min_query_chars,
            geocode_limit,
            ..defaults
        })
    }
}

fn optional_var(name: &str) -> Result<Option<String>, Error> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn parsed_var<T: FromStr>(name: &str) -> Result<Option<T>, Error> {
    optional_var(name)?
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| {
                    invalid_config_error(format!("{} has invalid value {:?}", name, value))
                })
        })
        .transpose()
}

#[test]
fn defaults_match_dashboard() {
    let config = Config::default();

    assert_eq!(config.debounce, Duration::from_millis(400));
    assert_eq!(config.min_query_chars, 3);
    assert_eq!(config.routing_profile, "driving");
}

#[test]
fn parsed_var_rejects_garbage() {
    env::set_var("ALERTAVIA_TEST_PARSED_VAR", "four hundred");
    let result = parsed_var::<u64>("ALERTAVIA_TEST_PARSED_VAR");
    env::remove_var("ALERTAVIA_TEST_PARSED_VAR");

    assert_eq!(result.unwrap_err().kind, crate::error::ErrorKind::InvalidConfig);
}

#[test]
fn unset_var_is_none() {
    assert_eq!(parsed_var::<u64>("ALERTAVIA_TEST_UNSET_VAR").unwrap(), None);
}
