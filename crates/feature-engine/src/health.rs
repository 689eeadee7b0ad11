//! Health Feature Engineering
//!
//! Records are stably sorted by (athlete, timestamp) and every athlete's
//! series is scanned left to right carrying the previous observation. The
//! first record of a series has no predecessor and receives explicit seam
//! values instead.

use crate::features::{FeatureSchema, FeatureTable};
use crate::imputation::ImputationTable;
use crate::rules::{activity_flags, intensity_table, Bins, DecisionTable, OutOfRangePolicy, RuleInput};
use crate::temporal::{minutes_between, parse_timestamp, RollingMean};
use crate::FeatureError;
use chrono::{NaiveDateTime, Timelike, Utc};
use dataset::HealthRecord;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Health feature vector column order
pub const HEALTH_FEATURE_COLUMNS: [&str; 32] = [
    "Heart_Rate",
    "Step_Count",
    "Body_Temperature",
    "Blood_Oxygen",
    "Latitude",
    "Longitude",
    "BP_Systolic",
    "BP_Diastolic",
    "Time_Diff",
    "HR_Rolling_Mean",
    "Steps_Rolling_Mean",
    "HR_Change",
    "Steps_Change",
    "Activity_Duration",
    "GPS_Speed",
    "Distance_Moved",
    "Step_Rate",
    "Likely_Running",
    "Likely_Walking",
    "Likely_Cycling",
    "Likely_Resting",
    "Activity_Intensity",
    "HR_to_Steps_Ratio",
    "BP_Ratio",
    "BP_Pulse_Pressure",
    "HR_Temp_Interaction",
    "HR_BP_Interaction",
    "HR_Zone",
    "Step_Intensity",
    "Intensity_Score",
    "Hour",
    "Minute",
];

/// Health feature engineering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthFeatureConfig {
    /// Time_Diff assigned to the first record of a series (minutes)
    pub first_record_gap_minutes: f64,
    /// Trailing window for the rolling means
    pub rolling_window: usize,
    /// Degrees-to-meters factor for the flat distance approximation
    pub meters_per_degree: f64,
    /// Added to Time_Diff before dividing by it
    pub time_epsilon_minutes: f64,
    /// Step_Rate denominator when the regular one is undefined
    pub step_rate_fallback_minutes: f64,
    /// Handling of heart rate / step count outside the bin edges
    pub out_of_range: OutOfRangePolicy,
}

impl Default for HealthFeatureConfig {
    fn default() -> Self {
        Self {
            first_record_gap_minutes: 5.0,
            rolling_window: 3,
            meters_per_degree: 111_000.0,
            time_epsilon_minutes: 0.1,
            step_rate_fallback_minutes: 5.0,
            out_of_range: OutOfRangePolicy::Clamp,
        }
    }
}

/// One parsed measurement, missing values as NaN
#[derive(Debug, Clone)]
pub(crate) struct Observation {
    pub timestamp: NaiveDateTime,
    pub heart_rate: f64,
    pub step_count: f64,
    pub body_temperature: f64,
    pub blood_oxygen: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub bp_systolic: f64,
    pub bp_diastolic: f64,
}

impl Observation {
    /// Convert a raw record; returns whether the timestamp fell back to `reference`
    fn from_record(record: &HealthRecord, reference: NaiveDateTime) -> (Self, bool) {
        let parsed = parse_timestamp(&record.timestamp);
        let (bp_systolic, bp_diastolic) = parse_blood_pressure(&record.blood_pressure);
        let observation = Self {
            timestamp: parsed.unwrap_or(reference),
            heart_rate: record.heart_rate.unwrap_or(f64::NAN),
            step_count: record.step_count.unwrap_or(f64::NAN),
            body_temperature: record.body_temperature.unwrap_or(f64::NAN),
            blood_oxygen: record.blood_oxygen.unwrap_or(f64::NAN),
            latitude: record.latitude.unwrap_or(f64::NAN),
            longitude: record.longitude.unwrap_or(f64::NAN),
            bp_systolic,
            bp_diastolic,
        };
        (observation, parsed.is_none())
    }
}

/// Split `"120/80"` into systolic and diastolic; anything else is missing
pub(crate) fn parse_blood_pressure(raw: &str) -> (f64, f64) {
    let mut parts = raw.split('/');
    let parse = |part: Option<&str>| {
        part.and_then(|p| p.trim().parse::<f64>().ok())
            .unwrap_or(f64::NAN)
    };
    let systolic = parse(parts.next());
    let diastolic = parse(parts.next());
    if parts.next().is_some() {
        return (f64::NAN, f64::NAN);
    }
    (systolic, diastolic)
}

/// Difference to the previous value; 0 when either side is missing
fn delta(previous: Option<f64>, current: f64) -> f64 {
    match previous {
        Some(prev) if !prev.is_nan() && !current.is_nan() => current - prev,
        _ => 0.0,
    }
}

fn or_zero(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

/// Every derived health feature of one record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthFeatureRow {
    pub heart_rate: f64,
    pub step_count: f64,
    pub body_temperature: f64,
    pub blood_oxygen: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub bp_systolic: f64,
    pub bp_diastolic: f64,
    pub time_diff: f64,
    pub hr_rolling_mean: f64,
    pub steps_rolling_mean: f64,
    pub hr_change: f64,
    pub steps_change: f64,
    pub activity_duration: f64,
    pub gps_speed: f64,
    pub distance_moved: f64,
    pub step_rate: f64,
    pub likely_running: f64,
    pub likely_walking: f64,
    pub likely_cycling: f64,
    pub likely_resting: f64,
    pub activity_intensity: f64,
    pub hr_to_steps_ratio: f64,
    pub bp_ratio: f64,
    pub bp_pulse_pressure: f64,
    pub hr_temp_interaction: f64,
    pub hr_bp_interaction: f64,
    pub hr_zone: f64,
    pub step_intensity: f64,
    pub intensity_score: f64,
    pub hour: f64,
    pub minute: f64,
    // Derived but not part of the model vector
    pub steps_oxygen_interaction: f64,
    pub hr_steps_product: f64,
    pub oxygen_temp_ratio: f64,
}

impl HealthFeatureRow {
    /// Values in `HEALTH_FEATURE_COLUMNS` order
    pub fn to_vector(&self) -> Vec<f64> {
        vec![
            self.heart_rate,
            self.step_count,
            self.body_temperature,
            self.blood_oxygen,
            self.latitude,
            self.longitude,
            self.bp_systolic,
            self.bp_diastolic,
            self.time_diff,
            self.hr_rolling_mean,
            self.steps_rolling_mean,
            self.hr_change,
            self.steps_change,
            self.activity_duration,
            self.gps_speed,
            self.distance_moved,
            self.step_rate,
            self.likely_running,
            self.likely_walking,
            self.likely_cycling,
            self.likely_resting,
            self.activity_intensity,
            self.hr_to_steps_ratio,
            self.bp_ratio,
            self.bp_pulse_pressure,
            self.hr_temp_interaction,
            self.hr_bp_interaction,
            self.hr_zone,
            self.step_intensity,
            self.intensity_score,
            self.hour,
            self.minute,
        ]
    }
}

/// Output of the health feature pipeline
#[derive(Debug, Clone)]
pub struct EngineeredHealth {
    /// Imputed feature table in `HEALTH_FEATURE_COLUMNS` order
    pub features: FeatureTable,
    /// Activity_Status per row
    pub labels: Vec<String>,
    /// Athlete_ID per row
    pub entities: Vec<String>,
    /// Index of each row in the input records
    pub source_rows: Vec<usize>,
    /// Means used to fill missing values
    pub imputation: ImputationTable,
}

/// Health feature engine
#[derive(Debug, Clone)]
pub struct HealthFeatureEngine {
    config: HealthFeatureConfig,
    hr_zone: Bins,
    step_intensity: Bins,
    flags: [DecisionTable<RuleInput>; 4],
    intensity: DecisionTable<RuleInput>,
}

impl Default for HealthFeatureEngine {
    fn default() -> Self {
        Self::new(HealthFeatureConfig::default())
    }
}

impl HealthFeatureEngine {
    /// Create an engine
    pub fn new(config: HealthFeatureConfig) -> Self {
        Self {
            config,
            hr_zone: Bins::heart_rate_zone(),
            step_intensity: Bins::step_intensity(),
            flags: activity_flags(),
            intensity: intensity_table(),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &HealthFeatureConfig {
        &self.config
    }

    /// Schema of the produced vectors
    pub fn schema(&self) -> FeatureSchema {
        FeatureSchema::new("health", &HEALTH_FEATURE_COLUMNS)
    }

    /// Engineer a training table, fitting imputation means over it
    pub fn engineer(&self, records: &[HealthRecord]) -> Result<EngineeredHealth, FeatureError> {
        self.run(records, None)
    }

    /// Engineer a table using previously fitted imputation means
    pub fn engineer_with(
        &self,
        records: &[HealthRecord],
        imputation: &ImputationTable,
    ) -> Result<EngineeredHealth, FeatureError> {
        self.run(records, Some(imputation))
    }

    fn run(
        &self,
        records: &[HealthRecord],
        imputation: Option<&ImputationTable>,
    ) -> Result<EngineeredHealth, FeatureError> {
        if records.is_empty() {
            return Err(FeatureError::EmptyInput);
        }

        let reference = Utc::now().naive_utc();
        let mut fallbacks = 0usize;
        let observations: Vec<Observation> = records
            .iter()
            .map(|record| {
                let (obs, fell_back) = Observation::from_record(record, reference);
                if fell_back {
                    fallbacks += 1;
                }
                obs
            })
            .collect();

        if fallbacks > 0 {
            warn!(
                "{} health timestamps could not be parsed; using reference time {}",
                fallbacks, reference
            );
        }

        let mut order: Vec<usize> = (0..records.len()).collect();
        order.sort_by(|&a, &b| {
            records[a]
                .athlete_id
                .cmp(&records[b].athlete_id)
                .then(observations[a].timestamp.cmp(&observations[b].timestamp))
        });

        let mut rows = Vec::with_capacity(records.len());
        let mut out_of_range = 0usize;
        let mut start = 0;
        while start < order.len() {
            let athlete = &records[order[start]].athlete_id;
            let end = order[start..]
                .iter()
                .position(|&idx| &records[idx].athlete_id != athlete)
                .map_or(order.len(), |offset| start + offset);

            let series: Vec<Observation> = order[start..end]
                .iter()
                .map(|&idx| observations[idx].clone())
                .collect();
            let (derived, clipped) = self.derive_series(&series)?;
            rows.extend(derived.iter().map(HealthFeatureRow::to_vector));
            out_of_range += clipped;
            start = end;
        }

        if out_of_range > 0 {
            warn!(
                "{} values outside bin edges handled with {:?}",
                out_of_range, self.config.out_of_range
            );
        }

        let columns = HEALTH_FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect();
        let mut features = FeatureTable::from_rows(columns, &rows)?;
        let imputation = match imputation {
            Some(table) => table.clone(),
            None => ImputationTable::fit(&features),
        };
        imputation.apply(&mut features)?;

        let labels = order
            .iter()
            .map(|&idx| records[idx].activity_status.clone())
            .collect();
        let entities = order
            .iter()
            .map(|&idx| records[idx].athlete_id.clone())
            .collect();

        info!(
            "Engineered {} health rows x {} features",
            features.n_rows(),
            features.n_cols()
        );

        Ok(EngineeredHealth {
            features,
            labels,
            entities,
            source_rows: order,
            imputation,
        })
    }

    /// Derive every feature of a single, time-ordered series.
    ///
    /// Returns the rows and the number of values outside the bin edges.
    pub(crate) fn derive_series(
        &self,
        series: &[Observation],
    ) -> Result<(Vec<HealthFeatureRow>, usize), FeatureError> {
        let cfg = &self.config;
        let mut hr_rolling = RollingMean::new(cfg.rolling_window);
        let mut steps_rolling = RollingMean::new(cfg.rolling_window);
        let mut previous: Option<&Observation> = None;
        let mut rows = Vec::with_capacity(series.len());
        let mut out_of_range = 0usize;

        for obs in series {
            let hr = obs.heart_rate;
            let steps = obs.step_count;

            let time_diff = match previous {
                Some(prev) => minutes_between(prev.timestamp, obs.timestamp),
                None => cfg.first_record_gap_minutes,
            };

            let lat_change = delta(previous.map(|p| p.latitude), obs.latitude);
            let lon_change = delta(previous.map(|p| p.longitude), obs.longitude);
            let distance_moved =
                (lat_change * lat_change + lon_change * lon_change).sqrt() * cfg.meters_per_degree;
            let gps_speed = or_zero(distance_moved / (time_diff + cfg.time_epsilon_minutes));

            let step_rate = {
                let rate = steps / (time_diff + cfg.time_epsilon_minutes);
                if rate.is_finite() {
                    rate
                } else {
                    steps / cfg.step_rate_fallback_minutes
                }
            };

            let rule_input = RuleInput {
                heart_rate: hr,
                step_count: steps,
                speed: gps_speed,
            };

            let hr_zone = self.hr_zone.assign(hr, cfg.out_of_range)?;
            let step_intensity = self.step_intensity.assign(steps, cfg.out_of_range)?;
            for binned in [&hr_zone, &step_intensity] {
                if binned.out_of_range {
                    out_of_range += 1;
                }
            }

            let (sys, dia) = (obs.bp_systolic, obs.bp_diastolic);
            rows.push(HealthFeatureRow {
                heart_rate: hr,
                step_count: steps,
                body_temperature: obs.body_temperature,
                blood_oxygen: obs.blood_oxygen,
                latitude: obs.latitude,
                longitude: obs.longitude,
                bp_systolic: sys,
                bp_diastolic: dia,
                time_diff,
                hr_rolling_mean: hr_rolling.push(hr),
                steps_rolling_mean: steps_rolling.push(steps),
                hr_change: delta(previous.map(|p| p.heart_rate), hr),
                steps_change: delta(previous.map(|p| p.step_count), steps),
                activity_duration: time_diff,
                gps_speed,
                distance_moved,
                step_rate,
                likely_running: self.flags[0].evaluate(&rule_input),
                likely_walking: self.flags[1].evaluate(&rule_input),
                likely_cycling: self.flags[2].evaluate(&rule_input),
                likely_resting: self.flags[3].evaluate(&rule_input),
                activity_intensity: self.intensity.evaluate(&rule_input),
                hr_to_steps_ratio: hr / (steps + 1.0),
                bp_ratio: sys / (dia + 1.0),
                bp_pulse_pressure: sys - dia,
                hr_temp_interaction: hr * obs.body_temperature,
                hr_bp_interaction: hr * sys,
                hr_zone: hr_zone.value,
                step_intensity: step_intensity.value,
                intensity_score: (hr / 200.0) * 0.5 + (steps / 1000.0) * 0.5,
                hour: obs.timestamp.hour() as f64,
                minute: obs.timestamp.minute() as f64,
                steps_oxygen_interaction: steps * obs.blood_oxygen,
                hr_steps_product: hr * steps,
                oxygen_temp_ratio: obs.blood_oxygen / (obs.body_temperature + 1.0),
            });

            previous = Some(obs);
        }

        debug!("Derived series of {} observations", series.len());
        Ok((rows, out_of_range))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn record(athlete: &str, ts: &str, hr: f64, steps: f64, lat: f64, lon: f64) -> HealthRecord {
        HealthRecord {
            record_id: None,
            athlete_id: athlete.to_string(),
            timestamp: ts.to_string(),
            heart_rate: Some(hr),
            step_count: Some(steps),
            body_temperature: Some(36.8),
            blood_oxygen: Some(97.0),
            latitude: Some(lat),
            longitude: Some(lon),
            blood_pressure: "120/80".to_string(),
            activity_status: "Walking".to_string(),
        }
    }

    fn column(engineered: &EngineeredHealth, name: &str) -> Vec<f64> {
        engineered.features.column(name).unwrap().to_vec()
    }

    #[test]
    fn test_time_diff_seam_and_elapsed() {
        let records = vec![
            record("A", "2024-01-01 10:00:00", 90.0, 450.0, 40.0, -3.0),
            record("A", "2024-01-01 10:07:30", 95.0, 500.0, 40.0, -3.0),
            record("A", "2024-01-01 10:10:00", 100.0, 520.0, 40.0, -3.0),
        ];
        let engineered = HealthFeatureEngine::default().engineer(&records).unwrap();
        assert_eq!(column(&engineered, "Time_Diff"), vec![5.0, 7.5, 2.5]);
        assert_eq!(column(&engineered, "Activity_Duration"), vec![5.0, 7.5, 2.5]);
    }

    #[test]
    fn test_unsorted_input_is_ordered_per_athlete() {
        let records = vec![
            record("B", "2024-01-01 10:05:00", 100.0, 500.0, 0.0, 0.0),
            record("A", "2024-01-01 10:10:00", 110.0, 600.0, 0.0, 0.0),
            record("A", "2024-01-01 10:00:00", 90.0, 400.0, 0.0, 0.0),
            record("B", "2024-01-01 10:00:00", 80.0, 300.0, 0.0, 0.0),
        ];
        let engineered = HealthFeatureEngine::default().engineer(&records).unwrap();
        assert_eq!(engineered.entities, vec!["A", "A", "B", "B"]);
        assert_eq!(engineered.source_rows, vec![2, 1, 3, 0]);

        let time_diff = column(&engineered, "Time_Diff");
        assert_eq!(time_diff, vec![5.0, 10.0, 5.0, 5.0]);
        assert!(time_diff.iter().all(|t| *t >= 0.0));
        // Deltas never cross the athlete boundary
        assert_eq!(column(&engineered, "HR_Change"), vec![0.0, 20.0, 0.0, 20.0]);
    }

    #[test]
    fn test_rolling_means() {
        let records = vec![
            record("A", "2024-01-01 10:00:00", 90.0, 300.0, 0.0, 0.0),
            record("A", "2024-01-01 10:01:00", 120.0, 600.0, 0.0, 0.0),
            record("A", "2024-01-01 10:02:00", 150.0, 900.0, 0.0, 0.0),
            record("A", "2024-01-01 10:03:00", 180.0, 300.0, 0.0, 0.0),
        ];
        let engineered = HealthFeatureEngine::default().engineer(&records).unwrap();
        assert_eq!(column(&engineered, "HR_Rolling_Mean"), vec![90.0, 105.0, 120.0, 150.0]);
        assert_eq!(column(&engineered, "Steps_Rolling_Mean"), vec![300.0, 450.0, 600.0, 600.0]);
    }

    #[test]
    fn test_speed_and_step_rate() {
        let records = vec![
            record("A", "2024-01-01 10:00:00", 140.0, 700.0, 40.0, -3.0),
            record("A", "2024-01-01 10:05:00", 140.0, 700.0, 40.001, -3.0),
        ];
        let engineered = HealthFeatureEngine::default().engineer(&records).unwrap();

        let distance = column(&engineered, "Distance_Moved");
        assert_eq!(distance[0], 0.0);
        assert!((distance[1] - 111.0).abs() < 1e-6);

        let speed = column(&engineered, "GPS_Speed");
        assert_eq!(speed[0], 0.0);
        assert!((speed[1] - 111.0 / 5.1).abs() < 1e-6);

        let step_rate = column(&engineered, "Step_Rate");
        assert!((step_rate[0] - 700.0 / 5.1).abs() < 1e-9);

        // 140 bpm, 700 steps, ~21.8 m/min
        assert_eq!(column(&engineered, "Likely_Running"), vec![0.0, 1.0]);
        assert_eq!(column(&engineered, "Activity_Intensity"), vec![2.0, 2.0]);
    }

    #[test]
    fn test_interactions_and_bins() {
        let records = vec![record("A", "2024-01-01 08:45:00", 100.0, 499.0, 0.0, 0.0)];
        let engineered = HealthFeatureEngine::default().engineer(&records).unwrap();
        let row = engineered.features.row(0).to_vec();
        let at = |name: &str| row[HEALTH_FEATURE_COLUMNS.iter().position(|c| *c == name).unwrap()];

        assert_eq!(at("BP_Systolic"), 120.0);
        assert_eq!(at("BP_Diastolic"), 80.0);
        assert_eq!(at("HR_to_Steps_Ratio"), 100.0 / 500.0);
        assert_eq!(at("BP_Ratio"), 120.0 / 81.0);
        assert_eq!(at("BP_Pulse_Pressure"), 40.0);
        assert_eq!(at("HR_BP_Interaction"), 12_000.0);
        assert_eq!(at("HR_Zone"), 1.0);
        assert_eq!(at("Step_Intensity"), 1.0);
        assert_eq!(at("Intensity_Score"), 0.25 + 0.2495);
        assert_eq!((at("Hour"), at("Minute")), (8.0, 45.0));
    }

    #[test]
    fn test_missing_values_imputed_with_column_mean() {
        let mut broken = record("A", "2024-01-01 10:05:00", 0.0, 500.0, 0.0, 0.0);
        broken.heart_rate = None;
        broken.blood_pressure = "n/a".to_string();
        let records = vec![
            record("A", "2024-01-01 10:00:00", 90.0, 500.0, 0.0, 0.0),
            broken,
            record("A", "2024-01-01 10:10:00", 110.0, 500.0, 0.0, 0.0),
        ];
        let engineered = HealthFeatureEngine::default().engineer(&records).unwrap();

        assert_eq!(column(&engineered, "Heart_Rate"), vec![90.0, 100.0, 110.0]);
        assert_eq!(column(&engineered, "BP_Systolic"), vec![120.0, 120.0, 120.0]);
        // HR change around the gap falls back to 0
        assert_eq!(column(&engineered, "HR_Change"), vec![0.0, 0.0, 0.0]);
        assert!(engineered.features.values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_out_of_range_reject_fails_batch() {
        let records = vec![record("A", "2024-01-01 10:00:00", 230.0, 500.0, 0.0, 0.0)];
        let config = HealthFeatureConfig {
            out_of_range: OutOfRangePolicy::Reject,
            ..Default::default()
        };
        let err = HealthFeatureEngine::new(config).engineer(&records).unwrap_err();
        assert!(matches!(err, FeatureError::OutOfRange { column: "HR_Zone", .. }));

        let clamped = HealthFeatureEngine::default().engineer(&records).unwrap();
        assert_eq!(column(&clamped, "HR_Zone"), vec![3.0]);
    }

    #[test]
    fn test_unparseable_timestamp_still_engineered() {
        let records = vec![record("A", "not a time", 90.0, 450.0, 0.0, 0.0)];
        let engineered = HealthFeatureEngine::default().engineer(&records).unwrap();
        assert_eq!(column(&engineered, "Time_Diff"), vec![5.0]);
    }

    #[test]
    fn test_empty_input() {
        let err = HealthFeatureEngine::default().engineer(&[]).unwrap_err();
        assert!(matches!(err, FeatureError::EmptyInput));
    }

    #[test]
    fn test_blood_pressure_parsing() {
        assert_eq!(parse_blood_pressure("118/76"), (118.0, 76.0));
        let (s, d) = parse_blood_pressure("118");
        assert_eq!(s, 118.0);
        assert!(d.is_nan());
        let (s, _) = parse_blood_pressure("1/2/3");
        assert!(s.is_nan());
    }
}
