use std::sync::Arc;

use alertavia::api::{DynAPI, PredictionAPI};
use alertavia::config::Config;
use alertavia::engine::{Dashboard, Event, Session};
use alertavia::entities::Role;
use alertavia::error::{unexpected_error, Error};
use alertavia::external::backend::BackendClient;
use alertavia::map::MemoryMap;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Resolves two addresses, traces the route between them and reports the
/// predicted street-crime risk along it.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to start from
    origin: String,
    /// Address to go to
    destination: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run(args).await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Error> {
    let Args {
        origin,
        destination,
    } = args;

    let config = Config::from_env()?;
    let client = BackendClient::new(&config);

    match client.health().await {
        Ok(health) if !health.is_healthy() => {
            tracing::warn!("backend reports {:?}, predictions will fail", health.status)
        }
        Err(err) => tracing::warn!("health check failed: {}", err),
        _ => (),
    }

    let map = MemoryMap::new(config.map_center, config.map_zoom);
    let api = Arc::new(client) as DynAPI;
    let mut dashboard = Dashboard::new(Session::new(map, config), api);

    for (role, text) in [(Role::Origin, origin), (Role::Destination, destination)] {
        dashboard.handle_event(Event::AddressSubmitted { role, text })?;
    }
    dashboard.settle().await;

    if let Some(err) = dashboard.session().notice() {
        return Err(err.clone());
    }

    dashboard.handle_event(Event::TraceRoute)?;
    dashboard.settle().await;

    if let Some(err) = dashboard.session().notice() {
        return Err(err.clone());
    }

    let session = dashboard.session();
    let route = session
        .route()
        .ok_or_else(|| unexpected_error("route was not drawn"))?;

    for role in [Role::Origin, Role::Destination] {
        if let Some(suggestion) = session.suggestions(role).first() {
            tracing::info!("{}: {}", role.name(), suggestion.formatted_label);
        }
    }

    tracing::info!(
        "{:.1} km, {:.0} min, {} points",
        route.geometry.distance / 1000.0,
        route.geometry.duration / 60.0,
        route.geometry.len()
    );
    tracing::info!(
        "average risk {:.1}% (high: {}, medium: {}, low: {})",
        route.prediction.average_probability * 100.0,
        route.prediction.high_count,
        route.prediction.medium_count,
        route.prediction.low_count
    );
    tracing::info!(
        "drew {} segments and {} risk markers",
        route.segments().len(),
        route.markers().len()
    );

    Ok(())
}

#[test]
fn args_take_origin_then_destination() {
    let args = Args::try_parse_from(["alertavia", "Parque Berrío", "Calle 10"]).unwrap();

    assert_eq!(args.origin, "Parque Berrío");
    assert_eq!(args.destination, "Calle 10");
    assert!(Args::try_parse_from(["alertavia", "Parque Berrío"]).is_err());
}
