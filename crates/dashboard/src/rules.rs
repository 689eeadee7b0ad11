//! Alert Rules and Dashboard Configuration

use dataset::HealthRecord;
use serde::{Deserialize, Serialize};

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
        }
    }

    /// Case-insensitive match against a query parameter
    pub fn matches(&self, query: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(query.trim())
    }
}

/// Wearable measurement a personal rule looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vital {
    HeartRate,
    StepCount,
    BodyTemperature,
    BloodOxygen,
}

impl Vital {
    pub fn read(&self, record: &HealthRecord) -> Option<f64> {
        match self {
            Vital::HeartRate => record.heart_rate,
            Vital::StepCount => record.step_count,
            Vital::BodyTemperature => record.body_temperature,
            Vital::BloodOxygen => record.blood_oxygen,
        }
    }
}

/// Strict threshold on one vital; a missing value never matches
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    Above { vital: Vital, threshold: f64 },
    Below { vital: Vital, threshold: f64 },
}

impl Condition {
    fn vital(&self) -> Vital {
        match self {
            Condition::Above { vital, .. } | Condition::Below { vital, .. } => *vital,
        }
    }

    fn holds(&self, record: &HealthRecord) -> bool {
        match (*self, self.vital().read(record)) {
            (Condition::Above { threshold, .. }, Some(v)) => v > threshold,
            (Condition::Below { threshold, .. }, Some(v)) => v < threshold,
            (_, None) => false,
        }
    }
}

/// Personal alert raised when every condition holds.
///
/// `{value}` in the message is replaced with the reading of the first
/// condition's vital.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalAlertRule {
    pub id_prefix: String,
    pub alert_type: String,
    pub severity: Severity,
    pub conditions: Vec<Condition>,
    pub message: String,
    pub recommendation: String,
}

impl PersonalAlertRule {
    fn new(
        id_prefix: &str,
        alert_type: &str,
        severity: Severity,
        conditions: Vec<Condition>,
        message: &str,
        recommendation: &str,
    ) -> Self {
        Self {
            id_prefix: id_prefix.to_string(),
            alert_type: alert_type.to_string(),
            severity,
            conditions,
            message: message.to_string(),
            recommendation: recommendation.to_string(),
        }
    }

    /// Rendered message when the rule fires for `record`
    pub fn evaluate(&self, record: &HealthRecord) -> Option<String> {
        if self.conditions.is_empty() || !self.conditions.iter().all(|c| c.holds(record)) {
            return None;
        }
        let value = self.conditions[0].vital().read(record).unwrap_or(f64::NAN);
        Some(self.message.replace("{value}", &format!("{:.1}", value)))
    }
}

/// One level of the authority AQI alert table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqiAlertLevel {
    /// Fires for AQI strictly above this value
    pub above: f64,
    pub severity: Severity,
    pub alert_type: String,
    /// `{value}` is replaced with the AQI
    pub message: String,
    pub recommendation: String,
}

/// Ordered AQI levels; the last level that fires wins
pub fn classify_aqi(levels: &[AqiAlertLevel], aqi: f64) -> Option<&AqiAlertLevel> {
    levels.iter().rev().find(|level| aqi > level.above)
}

/// Dashboard parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Rows drawn for the risk map
    pub risk_map_sample: usize,
    /// Seed for every sampled or simulated value
    pub seed: u64,
    /// South-west corner of the simulated station coordinates
    pub map_origin: (f64, f64),
    /// Width of the simulated coordinate box in degrees
    pub map_span: f64,
    /// AQI above which a station counts as high risk
    pub high_risk_aqi: f64,
    pub aqi_alerts: Vec<AqiAlertLevel>,
    pub personal_alerts: Vec<PersonalAlertRule>,
    /// Alerts returned per personal request
    pub personal_alert_limit: usize,
    /// Rows sampled when no user is selected (alerts, trends)
    pub personal_sample: usize,
    pub trend_sample: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        use Condition::{Above, Below};
        use Vital::*;

        Self {
            risk_map_sample: 1000,
            seed: 42,
            map_origin: (12.9, 80.1),
            map_span: 0.1,
            high_risk_aqi: 100.0,
            aqi_alerts: vec![
                AqiAlertLevel {
                    above: 100.0,
                    severity: Severity::Medium,
                    alert_type: "Air Quality Advisory".to_string(),
                    message: "Moderate air quality concern (AQI: {value})".to_string(),
                    recommendation: "Limit outdoor activities for sensitive groups".to_string(),
                },
                AqiAlertLevel {
                    above: 150.0,
                    severity: Severity::High,
                    alert_type: "Air Quality Warning".to_string(),
                    message: "Unhealthy air quality detected (AQI: {value})".to_string(),
                    recommendation: "Limit outdoor activities for sensitive groups".to_string(),
                },
            ],
            personal_alerts: vec![
                PersonalAlertRule::new(
                    "HR",
                    "High Heart Rate",
                    Severity::Medium,
                    vec![Above { vital: HeartRate, threshold: 160.0 }],
                    "Your heart rate is elevated ({value} bpm). Consider resting.",
                    "Take a break and monitor your heart rate",
                ),
                PersonalAlertRule::new(
                    "TEMP",
                    "Elevated Body Temperature",
                    Severity::High,
                    vec![Above { vital: BodyTemperature, threshold: 37.5 }],
                    "Your body temperature is elevated ({value}°C).",
                    "Stay hydrated and rest. Consult a doctor if it persists.",
                ),
                PersonalAlertRule::new(
                    "O2",
                    "Low Blood Oxygen",
                    Severity::High,
                    vec![Below { vital: BloodOxygen, threshold: 95.0 }],
                    "Your blood oxygen level is low ({value}%).",
                    "Seek medical attention if symptoms persist",
                ),
                PersonalAlertRule::new(
                    "ACT",
                    "Activity Mismatch",
                    Severity::Low,
                    vec![
                        Below { vital: StepCount, threshold: 300.0 },
                        Above { vital: HeartRate, threshold: 100.0 },
                    ],
                    "High heart rate with low step count detected.",
                    "This might indicate stress. Consider relaxation techniques.",
                ),
            ],
            personal_alert_limit: 20,
            personal_sample: 10,
            trend_sample: 50,
        }
    }
}
