mod dashboard;
mod helpers;
mod location_resolver;
mod point_selector;
mod risk_renderer;
mod route_fetcher;

use chrono::NaiveDateTime;

use crate::{
    config::Config,
    entities::{
        AddressSuggestion, GeoPoint, Role, RoleMap, RouteGeometry, RoutePrediction, SelectionMode,
    },
    error::Error,
    map::{LayerId, MapSurface},
};

pub use dashboard::{Dashboard, DashboardHandle, Event};
pub use helpers::{sample_stride, sampled_indices, MAX_RISK_MARKERS};
pub use location_resolver::{resolve_address, SearchTicket};
pub use risk_renderer::annotate;
pub use route_fetcher::{fetch_route, TraceTicket};

/// A selected point and the marker that shows it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Selection {
    pub point: GeoPoint,
    pub marker: LayerId,
}

#[derive(Clone, Debug, Default)]
struct SearchState {
    seq: u64,
    query: String,
    suggestions: Vec<AddressSuggestion>,
    visible: bool,
}

/// What the risk renderer put on the map for the current route.
#[derive(Clone, Debug)]
pub struct RenderedRoute {
    pub geometry: RouteGeometry,
    pub prediction: RoutePrediction,
    segments: Vec<LayerId>,
    markers: Vec<LayerId>,
}

impl RenderedRoute {
    pub fn segments(&self) -> &[LayerId] {
        &self.segments
    }

    pub fn markers(&self) -> &[LayerId] {
        &self.markers
    }
}

/// Route selection state for one map. Handlers are plain methods; anything
/// that needs the network is split into a `begin_*` step that hands out a
/// ticket and an `apply_*` step that drops the result if the ticket is stale.
pub struct Session<M> {
    map: M,
    config: Config,
    mode: SelectionMode,
    selections: RoleMap<Option<Selection>>,
    searches: RoleMap<SearchState>,
    route: Option<RenderedRoute>,
    route_epoch: u64,
    latest_trace: u64,
    prediction_time: Option<NaiveDateTime>,
    notice: Option<Error>,
}

impl<M: MapSurface> Session<M> {
    pub fn new(mut map: M, config: Config) -> Self {
        map.set_view(config.map_center, config.map_zoom);

        Self {
            map,
            config,
            mode: SelectionMode::default(),
            selections: RoleMap::default(),
            searches: RoleMap::default(),
            route: None,
            route_epoch: 0,
            latest_trace: 0,
            prediction_time: None,
            notice: None,
        }
    }
}

impl<M> Session<M> {
    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn selection(&self, role: Role) -> Option<Selection> {
        self.selections[role]
    }

    pub fn point(&self, role: Role) -> Option<GeoPoint> {
        self.selections[role].map(|selection| selection.point)
    }

    pub fn origin(&self) -> Option<GeoPoint> {
        self.point(Role::Origin)
    }

    pub fn destination(&self) -> Option<GeoPoint> {
        self.point(Role::Destination)
    }

    pub fn route(&self) -> Option<&RenderedRoute> {
        self.route.as_ref()
    }

    pub fn query(&self, role: Role) -> &str {
        &self.searches[role].query
    }

    pub fn suggestions(&self, role: Role) -> &[AddressSuggestion] {
        &self.searches[role].suggestions
    }

    pub fn suggestions_visible(&self, role: Role) -> bool {
        self.searches[role].visible
    }

    pub fn prediction_time(&self) -> Option<NaiveDateTime> {
        self.prediction_time
    }

    /// Time the risk model is asked about; `None` means "now" on the backend.
    pub fn set_prediction_time(&mut self, at: Option<NaiveDateTime>) {
        self.prediction_time = at;
    }

    /// Last failure shown to the user.
    pub fn notice(&self) -> Option<&Error> {
        self.notice.as_ref()
    }

    pub fn report(&mut self, err: Error) {
        self.notice = Some(err);
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }
}

#[cfg(test)]
pub(crate) fn test_session() -> Session<crate::map::MemoryMap> {
    let config = Config::default();
    let map = crate::map::MemoryMap::new(config.map_center, config.map_zoom);

    Session::new(map, config)
}
