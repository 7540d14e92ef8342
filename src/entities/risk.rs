use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "alto")]
    High,
    #[serde(rename = "medio")]
    Medium,
    #[serde(rename = "bajo")]
    Low,
}

impl RiskLevel {
    /// Same thresholds the prediction backend applies.
    pub fn from_probability(probability: f64) -> Self {
        if probability > 0.7 {
            Self::High
        } else if probability > 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::High => "#dc3545",
            Self::Medium => "#fd7e14",
            Self::Low => "#28a745",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Risk for one route point, aligned by index with the geometry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskAnnotation {
    pub probability: f64,
    pub risk_level: RiskLevel,
}

/// Per-point annotations plus the backend's summary for the whole route.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutePrediction {
    pub annotations: Vec<RiskAnnotation>,
    pub average_probability: f64,
    pub high_count: u32,
    pub medium_count: u32,
    pub low_count: u32,
}

#[test]
fn probability_thresholds() {
    assert_eq!(RiskLevel::from_probability(0.71), RiskLevel::High);
    assert_eq!(RiskLevel::from_probability(0.7), RiskLevel::Medium);
    assert_eq!(RiskLevel::from_probability(0.41), RiskLevel::Medium);
    assert_eq!(RiskLevel::from_probability(0.4), RiskLevel::Low);
    assert_eq!(RiskLevel::from_probability(0.0), RiskLevel::Low);
}

#[test]
fn risk_level_uses_backend_names() {
    let level: RiskLevel = serde_json::from_str("\"medio\"").unwrap();

    assert_eq!(level, RiskLevel::Medium);
    assert_eq!(serde_json::to_string(&RiskLevel::High).unwrap(), "\"alto\"");
}

/// Backend `/health` report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelHealth {
    pub status: String,
    pub density_model_loaded: bool,
}

impl ModelHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy" && self.density_model_loaded
    }
}
