//! Health Authority Views

use crate::rules::classify_aqi;
use crate::{mean_of, Dashboard};
use dataset::{sample_rows, AqiCategory, AirQualityRecord};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// One station reading on the risk map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskPoint {
    pub station_id: String,
    /// Simulated
    pub latitude: f64,
    /// Simulated
    pub longitude: f64,
    pub aqi: f64,
    pub risk_level: String,
    pub color: String,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskMap {
    pub data: Vec<RiskPoint>,
    pub total_stations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorityAlert {
    pub alert_id: String,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub location: String,
    pub aqi: f64,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub timestamp: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertFeed {
    pub alerts: Vec<AuthorityAlert>,
    pub total_alerts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirQualityStats {
    pub average_aqi: Option<f64>,
    pub max_aqi: Option<f64>,
    /// Distinct stations with at least one reading above the high-risk AQI
    pub high_risk_stations: usize,
    pub total_stations: usize,
    pub risk_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthMetrics {
    pub activity_distribution: BTreeMap<String, usize>,
    pub average_heart_rate: Option<f64>,
    pub average_steps: Option<f64>,
    pub total_records: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub air_quality: AirQualityStats,
    pub health_metrics: HealthMetrics,
}

/// Stable 4-digit suffix for alert ids
fn alert_suffix(date_time: &str) -> u64 {
    let hash = date_time.bytes().fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
        (h ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
    });
    hash % 10_000
}

impl Dashboard {
    /// Seeded sample of station readings with risk level and simulated coordinates
    pub fn risk_map(&self) -> RiskMap {
        let config = &self.config;
        let with_aqi: Vec<&AirQualityRecord> = self.air.iter().filter(|r| r.aqi.is_some()).collect();
        let sample = sample_rows(with_aqi, config.risk_map_sample, config.seed);
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let (lat0, lon0) = config.map_origin;

        let data: Vec<RiskPoint> = sample
            .into_iter()
            .filter_map(|record| {
                let aqi = record.aqi?;
                let category = AqiCategory::from_aqi(aqi);
                Some(RiskPoint {
                    station_id: record.station_id.clone(),
                    latitude: lat0 + rng.gen::<f64>() * config.map_span,
                    longitude: lon0 + rng.gen::<f64>() * config.map_span,
                    aqi,
                    risk_level: category.risk_level().to_string(),
                    color: category.color().to_string(),
                    pm25: record.pm25,
                    pm10: record.pm10,
                    timestamp: record.date_time.clone(),
                })
            })
            .collect();

        debug!("Risk map with {} points", data.len());
        RiskMap {
            total_stations: data.len(),
            data,
        }
    }

    /// First `limit` readings that trigger an AQI alert level, optionally filtered by severity
    pub fn authority_alerts(&self, severity: Option<&str>, limit: usize) -> AlertFeed {
        let levels = &self.config.aqi_alerts;
        let alerts: Vec<AuthorityAlert> = self
            .air
            .iter()
            .filter_map(|record| {
                let aqi = record.aqi?;
                classify_aqi(levels, aqi).map(|level| (record, aqi, level))
            })
            .take(limit)
            .filter(|(_, _, level)| severity.map_or(true, |s| level.severity.matches(s)))
            .map(|(record, aqi, level)| AuthorityAlert {
                alert_id: format!(
                    "AQ-{}-{}",
                    record.station_id,
                    alert_suffix(&record.date_time)
                ),
                alert_type: level.alert_type.clone(),
                severity: level.severity.as_str().to_string(),
                message: level.message.replace("{value}", &format!("{:.1}", aqi)),
                location: format!("Station {}", record.station_id),
                aqi,
                pm25: record.pm25,
                pm10: record.pm10,
                timestamp: record.date_time.clone(),
                recommendation: level.recommendation.clone(),
            })
            .collect();

        AlertFeed {
            total_alerts: alerts.len(),
            alerts,
        }
    }

    /// Table-wide air quality and activity statistics
    pub fn stats(&self) -> DashboardStats {
        let threshold = self.config.high_risk_aqi;
        let stations: BTreeSet<&str> = self.air.iter().map(|r| r.station_id.as_str()).collect();
        let high_risk: BTreeSet<&str> = self
            .air
            .iter()
            .filter(|r| r.aqi.map_or(false, |aqi| aqi > threshold))
            .map(|r| r.station_id.as_str())
            .collect();
        let max_aqi = self
            .air
            .iter()
            .filter_map(|r| r.aqi)
            .fold(None, |max: Option<f64>, v| Some(max.map_or(v, |m| m.max(v))));
        let risk_percentage = if stations.is_empty() {
            0.0
        } else {
            high_risk.len() as f64 / stations.len() as f64 * 100.0
        };

        let mut activity_distribution = BTreeMap::new();
        for record in &self.health {
            *activity_distribution
                .entry(record.activity_status.clone())
                .or_insert(0) += 1;
        }

        DashboardStats {
            air_quality: AirQualityStats {
                average_aqi: mean_of(self.air.iter().map(|r| r.aqi)),
                max_aqi,
                high_risk_stations: high_risk.len(),
                total_stations: stations.len(),
                risk_percentage,
            },
            health_metrics: HealthMetrics {
                activity_distribution,
                average_heart_rate: mean_of(self.health.iter().map(|r| r.heart_rate)),
                average_steps: mean_of(self.health.iter().map(|r| r.step_count)),
                total_records: self.health.len(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DashboardConfig;

    fn air(station: &str, date_time: &str, aqi: Option<f64>) -> AirQualityRecord {
        AirQualityRecord {
            date_time: date_time.to_string(),
            station_id: station.to_string(),
            pm25: Some(35.0),
            pm10: Some(60.0),
            no2: None,
            so2: None,
            co: None,
            o3: None,
            temp_c: None,
            humidity: None,
            wind_speed: None,
            wind_direction: None,
            pressure: None,
            rain: None,
            aqi,
        }
    }

    fn dashboard() -> Dashboard {
        let air = vec![
            air("S1", "2024-01-01 00:00:00", Some(40.0)),
            air("S1", "2024-01-01 01:00:00", Some(120.0)),
            air("S2", "2024-01-01 00:00:00", Some(160.0)),
            air("S2", "2024-01-01 01:00:00", Some(180.0)),
            air("S3", "2024-01-01 00:00:00", None),
            air("S3", "2024-01-01 01:00:00", Some(99.0)),
        ];
        Dashboard::new(air, Vec::new(), DashboardConfig::default())
    }

    #[test]
    fn test_risk_map_levels() {
        let map = dashboard().risk_map();
        assert_eq!(map.total_stations, 5);
        for point in &map.data {
            assert!((12.9..=13.0).contains(&point.latitude));
            assert!((80.1..=80.2).contains(&point.longitude));
            assert_eq!(point.risk_level, AqiCategory::from_aqi(point.aqi).risk_level());
        }
        assert_eq!(dashboard().risk_map(), map);
    }

    #[test]
    fn test_authority_alerts() {
        let feed = dashboard().authority_alerts(None, 50);
        assert_eq!(feed.total_alerts, 3);
        assert_eq!(feed.alerts[0].severity, "Medium");
        assert_eq!(feed.alerts[0].message, "Moderate air quality concern (AQI: 120.0)");
        assert_eq!(feed.alerts[1].alert_type, "Air Quality Warning");
        assert!(feed.alerts[1].alert_id.starts_with("AQ-S2-"));

        let high = dashboard().authority_alerts(Some("HIGH"), 50);
        assert_eq!(high.total_alerts, 2);

        // Limit applies before the severity filter
        let limited = dashboard().authority_alerts(Some("high"), 1);
        assert_eq!(limited.total_alerts, 0);
    }

    #[test]
    fn test_stats_counts_distinct_stations() {
        let stats = dashboard().stats();
        assert_eq!(stats.air_quality.total_stations, 3);
        assert_eq!(stats.air_quality.high_risk_stations, 2);
        assert_eq!(stats.air_quality.max_aqi, Some(180.0));
        assert!((stats.air_quality.average_aqi.unwrap() - 119.8).abs() < 1e-9);
        assert!((stats.air_quality.risk_percentage - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.health_metrics.total_records, 0);
        assert_eq!(stats.health_metrics.average_heart_rate, None);
    }
}
