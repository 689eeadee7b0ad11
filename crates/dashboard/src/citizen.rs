//! Citizen Views

use crate::rules::Vital;
use crate::{mean_of, Dashboard, DashboardError};
use chrono::{Duration, NaiveDateTime};
use dataset::{sample_rows, HealthRecord};
use feature_engine::parse_timestamp;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalAlert {
    pub alert_id: String,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub timestamp: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalAlerts {
    pub user_id: String,
    /// At most `personal_alert_limit` alerts
    pub alerts: Vec<PersonalAlert>,
    /// Alerts raised before truncation
    pub total_alerts: usize,
}

/// Series selected by the `metric` query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendMetric {
    All,
    HeartRate,
    StepCount,
    BodyTemperature,
    ActivityDistribution,
}

impl FromStr for TrendMetric {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(TrendMetric::All),
            "heart_rate" => Ok(TrendMetric::HeartRate),
            "step_count" => Ok(TrendMetric::StepCount),
            "body_temperature" => Ok(TrendMetric::BodyTemperature),
            "activity_distribution" => Ok(TrendMetric::ActivityDistribution),
            other => Err(DashboardError::UnknownMetric(other.to_string())),
        }
    }
}

impl TrendMetric {
    fn includes(&self, metric: TrendMetric) -> bool {
        *self == TrendMetric::All || *self == metric
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricTrend {
    pub values: Vec<f64>,
    /// `%Y-%m-%d %H:%M`, aligned with `values`
    pub dates: Vec<String>,
    pub average: Option<f64>,
    /// "increasing", "decreasing" or "stable" (last vs first value)
    pub trend: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Trends {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<MetricTrend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_count: Option<MetricTrend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_temperature: Option<MetricTrend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_distribution: Option<BTreeMap<String, usize>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    pub user_id: String,
    pub period_days: i64,
    pub trends: Trends,
}

fn metric_trend(rows: &[(NaiveDateTime, &HealthRecord)], vital: Vital) -> MetricTrend {
    let (values, dates): (Vec<f64>, Vec<String>) = rows
        .iter()
        .filter_map(|(at, record)| {
            vital
                .read(record)
                .map(|v| (v, at.format("%Y-%m-%d %H:%M").to_string()))
        })
        .unzip();

    let trend = match (values.first(), values.last()) {
        (Some(first), Some(last)) if last > first => "increasing",
        (Some(first), Some(last)) if last < first => "decreasing",
        _ => "stable",
    };
    MetricTrend {
        average: mean_of(values.iter().map(|v| Some(*v))),
        values,
        dates,
        trend: trend.to_string(),
    }
}

impl Dashboard {
    /// Rows of `user_id`, or a seeded sample when the user is absent or unknown
    fn select_user(&self, user_id: Option<&str>, sample: usize) -> (String, Vec<&HealthRecord>) {
        if let Some(user) = user_id {
            let rows: Vec<&HealthRecord> =
                self.health.iter().filter(|r| r.athlete_id == user).collect();
            if !rows.is_empty() {
                return (user.to_string(), rows);
            }
            debug!("No rows for user {}; using a sample", user);
        }
        let all: Vec<&HealthRecord> = self.health.iter().collect();
        let label = user_id.unwrap_or("sample").to_string();
        (label, sample_rows(all, sample, self.config.seed))
    }

    /// Personal alerts raised by the configured rules, in row then rule order
    pub fn personal_alerts(&self, user_id: Option<&str>) -> PersonalAlerts {
        let (user_id, rows) = self.select_user(user_id, self.config.personal_sample);

        let mut alerts = Vec::new();
        for record in rows {
            let record_id = record.record_id.as_deref().unwrap_or("Unknown");
            for rule in &self.config.personal_alerts {
                if let Some(message) = rule.evaluate(record) {
                    alerts.push(PersonalAlert {
                        alert_id: format!("{}-{}", rule.id_prefix, record_id),
                        alert_type: rule.alert_type.clone(),
                        severity: rule.severity.as_str().to_string(),
                        message,
                        timestamp: record.timestamp.clone(),
                        recommendation: rule.recommendation.clone(),
                    });
                }
            }
        }

        let total_alerts = alerts.len();
        alerts.truncate(self.config.personal_alert_limit);
        PersonalAlerts {
            user_id,
            alerts,
            total_alerts,
        }
    }

    /// Time series of the user's last `days` days, counted back from their latest reading
    pub fn trends(
        &self,
        user_id: Option<&str>,
        metric: &str,
        days: i64,
    ) -> Result<TrendReport, DashboardError> {
        let metric = TrendMetric::from_str(metric)?;
        if days <= 0 {
            return Err(DashboardError::InvalidParameter(format!(
                "days must be positive, got {}",
                days
            )));
        }

        let (user_id, rows) = self.select_user(user_id, self.config.trend_sample);
        let mut timed: Vec<(NaiveDateTime, &HealthRecord)> = rows
            .into_iter()
            .filter_map(|r| parse_timestamp(&r.timestamp).map(|at| (at, r)))
            .collect();
        timed.sort_by_key(|(at, _)| *at);

        let window = Duration::try_days(days).ok_or_else(|| {
            DashboardError::InvalidParameter(format!("days out of range: {}", days))
        })?;
        if let Some(cutoff) = timed
            .last()
            .and_then(|(latest, _)| latest.checked_sub_signed(window))
        {
            timed.retain(|(at, _)| *at >= cutoff);
        }

        let mut trends = Trends::default();
        if metric.includes(TrendMetric::HeartRate) {
            trends.heart_rate = Some(metric_trend(&timed, Vital::HeartRate));
        }
        if metric.includes(TrendMetric::StepCount) {
            trends.step_count = Some(metric_trend(&timed, Vital::StepCount));
        }
        if metric.includes(TrendMetric::BodyTemperature) {
            trends.body_temperature = Some(metric_trend(&timed, Vital::BodyTemperature));
        }
        if metric.includes(TrendMetric::ActivityDistribution) {
            let mut distribution = BTreeMap::new();
            for (_, record) in &timed {
                *distribution.entry(record.activity_status.clone()).or_insert(0) += 1;
            }
            trends.activity_distribution = Some(distribution);
        }

        Ok(TrendReport {
            user_id,
            period_days: days,
            trends,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DashboardConfig;

    fn health(id: usize, athlete: &str, ts: &str, hr: f64, steps: f64, activity: &str) -> HealthRecord {
        HealthRecord {
            record_id: Some(id.to_string()),
            athlete_id: athlete.to_string(),
            timestamp: ts.to_string(),
            heart_rate: Some(hr),
            step_count: Some(steps),
            body_temperature: Some(36.8),
            blood_oxygen: Some(97.0),
            latitude: None,
            longitude: None,
            blood_pressure: "120/80".to_string(),
            activity_status: activity.to_string(),
        }
    }

    fn dashboard() -> Dashboard {
        let health = vec![
            health(1, "A1", "2024-01-10 08:00:00", 170.0, 900.0, "Running"),
            health(2, "A1", "2024-01-01 08:00:00", 70.0, 100.0, "Resting"),
            health(3, "A1", "2024-01-09 08:00:00", 110.0, 200.0, "Resting"),
            health(4, "A2", "2024-01-05 08:00:00", 90.0, 500.0, "Walking"),
        ];
        Dashboard::new(Vec::new(), health, DashboardConfig::default())
    }

    #[test]
    fn test_personal_alerts_for_user() {
        let result = dashboard().personal_alerts(Some("A1"));
        assert_eq!(result.user_id, "A1");
        let ids: Vec<&str> = result.alerts.iter().map(|a| a.alert_id.as_str()).collect();
        assert_eq!(ids, vec!["HR-1", "ACT-3"]);
        assert_eq!(result.total_alerts, 2);
    }

    #[test]
    fn test_personal_alerts_are_capped() {
        let rows: Vec<HealthRecord> = (0..30)
            .map(|i| health(i, "A9", "2024-01-01 08:00:00", 165.0, 100.0, "Resting"))
            .collect();
        let dashboard = Dashboard::new(Vec::new(), rows, DashboardConfig::default());
        let result = dashboard.personal_alerts(Some("A9"));
        assert_eq!(result.alerts.len(), 20);
        assert_eq!(result.total_alerts, 60);
    }

    #[test]
    fn test_unknown_user_falls_back_to_sample() {
        let result = dashboard().personal_alerts(Some("nobody"));
        assert_eq!(result.user_id, "nobody");
        assert_eq!(result.total_alerts, 2);
    }

    #[test]
    fn test_trends_window_relative_to_latest() {
        let report = dashboard().trends(Some("A1"), "all", 7).unwrap();
        let hr = report.trends.heart_rate.unwrap();
        assert_eq!(hr.values, vec![110.0, 170.0]);
        assert_eq!(hr.dates, vec!["2024-01-09 08:00", "2024-01-10 08:00"]);
        assert_eq!(hr.trend, "increasing");
        assert_eq!(hr.average, Some(140.0));

        let distribution = report.trends.activity_distribution.unwrap();
        assert_eq!(distribution["Running"], 1);
        assert_eq!(distribution["Resting"], 1);
    }

    #[test]
    fn test_trend_metric_filter() {
        let report = dashboard().trends(Some("A1"), "step_count", 30).unwrap();
        assert!(report.trends.heart_rate.is_none());
        let steps = report.trends.step_count.as_ref().unwrap();
        assert_eq!(steps.values, vec![100.0, 200.0, 900.0]);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["trends"].get("heart_rate").is_none());

        assert!(matches!(
            dashboard().trends(None, "pulse", 7),
            Err(DashboardError::UnknownMetric(_))
        ));
        assert!(dashboard().trends(None, "all", 0).is_err());
    }
}
