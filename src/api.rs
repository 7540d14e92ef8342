mod interface;

#[cfg(test)]
pub(crate) mod mock;

pub use interface::{
    DynAPI, GeocodeAPI, PredictionAPI, RoutingAPI, StatisticsAPI, API,
};
