//! CSV Table Loader

use crate::records::TabularRecord;
use crate::DatasetError;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Dataset locations and sampling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Urban air pollution CSV
    pub air_path: PathBuf,
    /// Wearable sports health CSV
    pub health_path: PathBuf,
    /// Row cap for the air table
    pub air_sample_size: usize,
    /// Row cap for the health table
    pub health_sample_size: usize,
    /// Sampling seed
    pub seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            air_path: PathBuf::from("Data/UrbanAirPollutionDataset.csv"),
            health_path: PathBuf::from("Data/wearable_sports_health_dataset.csv"),
            air_sample_size: 10_000,
            health_sample_size: 500,
            seed: 42,
        }
    }
}

/// Load a table from disk, subsampling to `sample_size` rows when larger
pub fn load<T: TabularRecord>(
    path: impl AsRef<Path>,
    sample_size: usize,
    seed: u64,
) -> Result<Vec<T>, DatasetError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| DatasetError::Unreadable {
        path: path.display().to_string(),
        source,
    })?;

    let rows = read_table::<T, _>(file)?;
    let total = rows.len();
    let rows = sample_rows(rows, sample_size, seed);

    info!(
        "Loaded {} of {} rows from {} dataset ({})",
        rows.len(),
        total,
        T::DATASET,
        path.display()
    );
    Ok(rows)
}

/// Parse every row of a CSV source after checking the header
pub fn read_table<T: TabularRecord, R: Read>(source: R) -> Result<Vec<T>, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader.headers().map_err(|e| DatasetError::Malformed {
        dataset: T::DATASET,
        row: 0,
        reason: e.to_string(),
    })?;

    let missing: Vec<String> = T::REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(DatasetError::MissingColumns {
            dataset: T::DATASET,
            missing,
        });
    }

    let mut rows = Vec::new();
    for (idx, result) in reader.deserialize::<T>().enumerate() {
        let row = result.map_err(|e| DatasetError::Malformed {
            dataset: T::DATASET,
            row: idx + 1,
            reason: e.to_string(),
        })?;
        rows.push(row);
    }

    debug!("Parsed {} {} rows", rows.len(), T::DATASET);
    Ok(rows)
}

/// Uniform sample of exactly `sample_size` rows without replacement.
///
/// Tables no larger than `sample_size` are returned untouched. The result is
/// in draw order, so positions in the returned vector are the new row index.
pub fn sample_rows<T>(rows: Vec<T>, sample_size: usize, seed: u64) -> Vec<T> {
    if rows.len() <= sample_size {
        return rows;
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let picked = rand::seq::index::sample(&mut rng, rows.len(), sample_size);

    let mut slots: Vec<Option<T>> = rows.into_iter().map(Some).collect();
    picked
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AirQualityRecord, HealthRecord};
    use proptest::prelude::*;

    const HEALTH_CSV: &str = "\
Record_ID,Athlete_ID,Timestamp,Heart_Rate,Body_Temperature,Blood_Oxygen,Step_Count,Blood_Pressure,Latitude,Longitude,Activity_Status
1,A1,2024-01-01 08:00:00,72,36.6,98,350,120/80,12.90,80.10,Resting
2,A1,2024-01-01 08:05:00,n/a,36.7,97,420,118/79,12.91,80.11,Walking
3,A2,2024-01-01 08:00:00,140,37.1,96,700,130/85,12.95,80.15,Running
";

    #[test]
    fn test_read_health_table() {
        let rows: Vec<HealthRecord> = read_table(HEALTH_CSV.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].athlete_id, "A1");
        assert_eq!(rows[0].heart_rate, Some(72.0));
        assert_eq!(rows[0].blood_pressure, "120/80");
        assert_eq!(rows[2].activity_status, "Running");
    }

    #[test]
    fn test_non_numeric_cell_becomes_missing() {
        let rows: Vec<HealthRecord> = read_table(HEALTH_CSV.as_bytes()).unwrap();
        assert_eq!(rows[1].heart_rate, None);
        assert_eq!(rows[1].step_count, Some(420.0));
    }

    #[test]
    fn test_missing_columns_rejected() {
        let csv = "DateTime,Station_ID,PM2.5\n2024-01-01 00:00:00,S1,12.0\n";
        let err = read_table::<AirQualityRecord, _>(csv.as_bytes()).unwrap_err();
        match err {
            DatasetError::MissingColumns { missing, .. } => {
                assert!(missing.contains(&"AQI_Target".to_string()));
                assert!(missing.contains(&"NO₂".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unreadable_path() {
        let err = load::<HealthRecord>("/definitely/not/here.csv", 10, 42).unwrap_err();
        assert!(matches!(err, DatasetError::Unreadable { .. }));
    }

    #[test]
    fn test_small_table_not_sampled() {
        let rows: Vec<u32> = (0..10).collect();
        assert_eq!(sample_rows(rows.clone(), 10, 7), rows);
    }

    #[test]
    fn test_sampling_is_reproducible() {
        let rows: Vec<u32> = (0..500).collect();
        let a = sample_rows(rows.clone(), 50, 42);
        let b = sample_rows(rows.clone(), 50, 42);
        let c = sample_rows(rows, 50, 43);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    proptest! {
        #[test]
        fn prop_sample_exact_and_unique(len in 1usize..400, cap in 1usize..400, seed in any::<u64>()) {
            let rows: Vec<usize> = (0..len).collect();
            let sampled = sample_rows(rows, cap, seed);
            prop_assert_eq!(sampled.len(), len.min(cap));
            let mut sorted = sampled.clone();
            sorted.sort_unstable();
            sorted.dedup();
            prop_assert_eq!(sorted.len(), sampled.len());
        }
    }
}
