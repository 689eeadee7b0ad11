//! AQI Categories

use serde::{Deserialize, Serialize};

/// Four-level AQI category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AqiCategory {
    /// AQI below 50
    Good,
    /// AQI in [50, 100)
    Moderate,
    /// AQI in [100, 150)
    UnhealthyForSensitiveGroups,
    /// AQI of 150 and above
    Unhealthy,
}

impl AqiCategory {
    /// Categorize an AQI value. Lower bounds are closed, upper bounds open.
    pub fn from_aqi(aqi: f64) -> Self {
        if aqi < 50.0 {
            AqiCategory::Good
        } else if aqi < 100.0 {
            AqiCategory::Moderate
        } else if aqi < 150.0 {
            AqiCategory::UnhealthyForSensitiveGroups
        } else {
            AqiCategory::Unhealthy
        }
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
        }
    }

    /// Health concern shown alongside a prediction
    pub fn health_concern(&self) -> &'static str {
        match self {
            AqiCategory::Good => "None",
            AqiCategory::Moderate => "Unusually sensitive people may experience symptoms",
            AqiCategory::UnhealthyForSensitiveGroups => {
                "Children, elderly, and people with heart/lung disease should limit outdoor activity"
            }
            AqiCategory::Unhealthy => "Everyone should limit outdoor activity",
        }
    }

    /// Risk label used on the authority risk map
    pub fn risk_level(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Low",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive",
            AqiCategory::Unhealthy => "Unhealthy",
        }
    }

    /// Map colour for the risk level
    pub fn color(&self) -> &'static str {
        match self {
            AqiCategory::Good => "green",
            AqiCategory::Moderate => "yellow",
            AqiCategory::UnhealthyForSensitiveGroups => "orange",
            AqiCategory::Unhealthy => "red",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_boundaries() {
        assert_eq!(AqiCategory::from_aqi(49.9), AqiCategory::Good);
        assert_eq!(AqiCategory::from_aqi(50.0), AqiCategory::Moderate);
        assert_eq!(AqiCategory::from_aqi(99.99), AqiCategory::Moderate);
        assert_eq!(AqiCategory::from_aqi(100.0), AqiCategory::UnhealthyForSensitiveGroups);
        assert_eq!(AqiCategory::from_aqi(150.0), AqiCategory::Unhealthy);
    }

    #[test]
    fn test_labels() {
        assert_eq!(AqiCategory::from_aqi(120.0).as_str(), "Unhealthy for Sensitive Groups");
        assert_eq!(AqiCategory::Good.health_concern(), "None");
        assert_eq!(AqiCategory::Unhealthy.color(), "red");
    }
}
