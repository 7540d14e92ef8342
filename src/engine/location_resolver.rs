use super::Session;

use crate::{
    api::GeocodeAPI,
    entities::{AddressSuggestion, Role},
    error::{geocode_no_match_error, invalid_request_error, Error, ErrorKind},
    map::MapSurface,
};

/// Identifies one issued address lookup. Only the latest ticket per role
/// may apply its response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchTicket {
    pub role: Role,
    pub seq: u64,
    pub query: String,
}

/// Geocodes free text. An empty answer is `GeocodeNoMatch`; anything else
/// that goes wrong is `GeocodeLookupFailed`.
#[tracing::instrument(skip(api))]
pub async fn resolve_address<G: GeocodeAPI + Sync + ?Sized>(
    api: &G,
    query: &str,
    limit: u8,
) -> Result<Vec<AddressSuggestion>, Error> {
    let suggestions = api.geocode(query, limit).await.map_err(|err| match err.kind {
        ErrorKind::GeocodeNoMatch | ErrorKind::GeocodeLookupFailed => err,
        _ => err.with_kind(ErrorKind::GeocodeLookupFailed),
    })?;

    if suggestions.is_empty() {
        return Err(geocode_no_match_error(query));
    }

    Ok(suggestions)
}

impl<M> Session<M> {
    pub fn is_searchable(&self, text: &str) -> bool {
        text.trim().chars().count() >= self.config.min_query_chars
    }

    /// Records what the user typed. Returns whether the text is long enough
    /// to schedule a lookup; shorter text hides the suggestion list.
    #[tracing::instrument(skip(self))]
    pub fn type_address(&mut self, role: Role, text: &str) -> bool {
        let searchable = self.is_searchable(text);
        let search = &mut self.searches[role];

        search.query = text.to_string();

        if !searchable {
            search.suggestions.clear();
            search.visible = false;
        }

        searchable
    }

    /// Issues a lookup for `text`, superseding every earlier lookup for the
    /// same role. `None` when the text is too short to search.
    #[tracing::instrument(skip(self))]
    pub fn begin_search(&mut self, role: Role, text: &str) -> Option<SearchTicket> {
        if !self.is_searchable(text) {
            return None;
        }

        let query = text.trim().to_string();
        let search = &mut self.searches[role];

        search.seq += 1;
        search.query = text.to_string();

        Some(SearchTicket {
            role,
            seq: search.seq,
            query,
        })
    }

    pub fn is_current_search(&self, ticket: &SearchTicket) -> bool {
        self.searches[ticket.role].seq == ticket.seq
    }
}

impl<M: MapSurface> Session<M> {
    /// Applies a lookup result. Stale tickets are dropped silently. The first
    /// suggestion is applied right away while the full list stays visible.
    #[tracing::instrument(skip(self, result))]
    pub fn apply_search(
        &mut self,
        ticket: SearchTicket,
        result: Result<Vec<AddressSuggestion>, Error>,
    ) -> Result<(), Error> {
        if !self.is_current_search(&ticket) {
            tracing::debug!("dropping stale lookup for {:?}", ticket.query);
            return Ok(());
        }

        let search = &mut self.searches[ticket.role];

        let suggestions = match result {
            Ok(suggestions) if !suggestions.is_empty() => suggestions,
            Ok(_) => {
                search.suggestions.clear();
                search.visible = false;
                return Err(geocode_no_match_error(&ticket.query));
            }
            Err(err) => {
                search.suggestions.clear();
                search.visible = false;
                return Err(err);
            }
        };

        let first = suggestions[0].clone();
        search.suggestions = suggestions;
        search.visible = true;

        tracing::info!(
            "{} resolved to {:?}",
            ticket.role.name(),
            first.formatted_label
        );

        self.set_from_suggestion(ticket.role, &first);

        Ok(())
    }

    /// Explicit pick from the visible list. Re-applies it and hides the list.
    #[tracing::instrument(skip(self))]
    pub fn select_suggestion(&mut self, role: Role, index: usize) -> Result<(), Error> {
        let suggestion = self.searches[role]
            .suggestions
            .get(index)
            .cloned()
            .ok_or_else(|| invalid_request_error(format!("no suggestion at {}", index)))?;

        self.set_from_suggestion(role, &suggestion);

        let search = &mut self.searches[role];
        search.query = suggestion.formatted_label;
        search.visible = false;

        Ok(())
    }

    /// Hides the list without touching the selected point.
    pub fn hide_suggestions(&mut self, role: Role) {
        self.searches[role].visible = false;
    }
}

#[cfg(test)]
use super::test_session as session;

#[cfg(test)]
use crate::entities::GeoPoint;

#[cfg(test)]
fn hits() -> Vec<AddressSuggestion> {
    vec![
        AddressSuggestion::new(GeoPoint::new(6.21, -75.57), "Calle 10, El Poblado"),
        AddressSuggestion::new(GeoPoint::new(6.25, -75.56), "Calle 10, La Candelaria"),
    ]
}

#[test]
fn short_text_is_not_searched() {
    let mut s = session();

    assert!(!s.type_address(Role::Origin, "Ca"));
    assert!(s.begin_search(Role::Origin, "  Ca  ").is_none());
    assert!(s.type_address(Role::Origin, "Cal"));
}

#[test]
fn first_hit_is_applied_and_list_stays_visible() {
    let mut s = session();
    let ticket = s.begin_search(Role::Origin, "Calle 10").unwrap();

    s.apply_search(ticket, Ok(hits())).unwrap();

    assert_eq!(s.origin(), Some(GeoPoint::new(6.21, -75.57)));
    assert_eq!(s.suggestions(Role::Origin).len(), 2);
    assert!(s.suggestions_visible(Role::Origin));
    assert_eq!(s.map().center(), GeoPoint::new(6.21, -75.57));
}

#[test]
fn picking_a_suggestion_overrides_and_hides() {
    let mut s = session();
    let ticket = s.begin_search(Role::Destination, "Calle 10").unwrap();
    s.apply_search(ticket, Ok(hits())).unwrap();

    s.select_suggestion(Role::Destination, 1).unwrap();

    assert_eq!(s.destination(), Some(GeoPoint::new(6.25, -75.56)));
    assert!(!s.suggestions_visible(Role::Destination));
    assert_eq!(s.query(Role::Destination), "Calle 10, La Candelaria");
    assert_eq!(s.map().markers().len(), 1);
    assert_eq!(
        s.select_suggestion(Role::Destination, 5).unwrap_err().kind,
        ErrorKind::InvalidRequest
    );
}

#[test]
fn stale_lookup_is_dropped() {
    let mut s = session();

    let old = s.begin_search(Role::Origin, "Cal").unwrap();
    let new = s.begin_search(Role::Origin, "Calle 10").unwrap();

    s.apply_search(new, Ok(hits()[..1].to_vec())).unwrap();
    s.apply_search(
        old,
        Ok(vec![AddressSuggestion::new(GeoPoint::new(1.0, 1.0), "Cali")]),
    )
    .unwrap();

    assert_eq!(s.origin(), Some(GeoPoint::new(6.21, -75.57)));
    assert_eq!(s.suggestions(Role::Origin).len(), 1);
}

#[test]
fn lookup_failures_leave_points_alone() {
    let mut s = session();
    s.handle_map_click(GeoPoint::new(6.24, -75.58));

    let ticket = s.begin_search(Role::Origin, "Nowhere street").unwrap();
    let err = s.apply_search(ticket, Ok(vec![])).unwrap_err();
    assert_eq!(err.kind, ErrorKind::GeocodeNoMatch);

    let ticket = s.begin_search(Role::Origin, "Nowhere street").unwrap();
    let err = s
        .apply_search(
            ticket,
            Err(crate::error::geocode_lookup_failed_error("connection refused")),
        )
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::GeocodeLookupFailed);
    assert_eq!(err.message, "connection refused");

    assert_eq!(s.origin(), Some(GeoPoint::new(6.24, -75.58)));
    assert!(s.suggestions(Role::Origin).is_empty());
}

#[test]
fn resolve_address_maps_empty_to_no_match() {
    use crate::api::mock::MockBackend;
    use tokio_test::block_on;

    let backend = MockBackend::default();
    backend.set_geocode("Calle 10", Ok(hits()));

    let found = block_on(resolve_address(&backend, "Calle 10", 5)).unwrap();
    assert_eq!(found.len(), 2);

    let err = block_on(resolve_address(&backend, "Calle 999", 5)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::GeocodeNoMatch);

    backend.set_geocode(
        "Calle 11",
        Err(crate::error::backend_unreachable_error("connection refused")),
    );
    let err = block_on(resolve_address(&backend, "Calle 11", 5)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::GeocodeLookupFailed);
}
