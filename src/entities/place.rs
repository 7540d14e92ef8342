use serde::{Deserialize, Serialize};

use crate::entities::GeoPoint;

/// A geocoding hit. Replaced wholesale by every new query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddressSuggestion {
    pub point: GeoPoint,
    pub formatted_label: String,
}

impl AddressSuggestion {
    pub fn new(point: GeoPoint, formatted_label: impl Into<String>) -> Self {
        Self {
            point,
            formatted_label: formatted_label.into(),
        }
    }
}
