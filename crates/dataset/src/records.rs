//! Raw Table Records

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A row type that can be read from a CSV table
pub trait TabularRecord: DeserializeOwned {
    /// Human readable dataset name used in errors and logs
    const DATASET: &'static str;
    /// Header columns that must be present
    const REQUIRED_COLUMNS: &'static [&'static str];
}

/// One wearable measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    #[serde(rename = "Record_ID", default)]
    pub record_id: Option<String>,
    #[serde(rename = "Athlete_ID")]
    pub athlete_id: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Heart_Rate", deserialize_with = "csv::invalid_option")]
    pub heart_rate: Option<f64>,
    #[serde(rename = "Step_Count", deserialize_with = "csv::invalid_option")]
    pub step_count: Option<f64>,
    #[serde(rename = "Body_Temperature", deserialize_with = "csv::invalid_option")]
    pub body_temperature: Option<f64>,
    #[serde(rename = "Blood_Oxygen", deserialize_with = "csv::invalid_option")]
    pub blood_oxygen: Option<f64>,
    #[serde(rename = "Latitude", deserialize_with = "csv::invalid_option")]
    pub latitude: Option<f64>,
    #[serde(rename = "Longitude", deserialize_with = "csv::invalid_option")]
    pub longitude: Option<f64>,
    /// Encoded as `"systolic/diastolic"`
    #[serde(rename = "Blood_Pressure")]
    pub blood_pressure: String,
    #[serde(rename = "Activity_Status")]
    pub activity_status: String,
}

impl TabularRecord for HealthRecord {
    const DATASET: &'static str = "wearable health";
    const REQUIRED_COLUMNS: &'static [&'static str] = &[
        "Athlete_ID",
        "Timestamp",
        "Heart_Rate",
        "Step_Count",
        "Body_Temperature",
        "Blood_Oxygen",
        "Latitude",
        "Longitude",
        "Blood_Pressure",
        "Activity_Status",
    ];
}

/// One urban air-pollution station reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityRecord {
    #[serde(rename = "DateTime")]
    pub date_time: String,
    #[serde(rename = "Station_ID")]
    pub station_id: String,
    #[serde(rename = "PM2.5", deserialize_with = "csv::invalid_option")]
    pub pm25: Option<f64>,
    #[serde(rename = "PM10", deserialize_with = "csv::invalid_option")]
    pub pm10: Option<f64>,
    #[serde(rename = "NO₂", deserialize_with = "csv::invalid_option")]
    pub no2: Option<f64>,
    #[serde(rename = "SO₂", deserialize_with = "csv::invalid_option")]
    pub so2: Option<f64>,
    #[serde(rename = "CO", deserialize_with = "csv::invalid_option")]
    pub co: Option<f64>,
    #[serde(rename = "O₃", deserialize_with = "csv::invalid_option")]
    pub o3: Option<f64>,
    #[serde(rename = "Temp_C", deserialize_with = "csv::invalid_option")]
    pub temp_c: Option<f64>,
    #[serde(rename = "Humidity_%", deserialize_with = "csv::invalid_option")]
    pub humidity: Option<f64>,
    #[serde(rename = "Wind_Speed_mps", deserialize_with = "csv::invalid_option")]
    pub wind_speed: Option<f64>,
    #[serde(rename = "Wind_Direction_deg", deserialize_with = "csv::invalid_option")]
    pub wind_direction: Option<f64>,
    #[serde(rename = "Pressure_hPa", deserialize_with = "csv::invalid_option")]
    pub pressure: Option<f64>,
    #[serde(rename = "Rain_mm", deserialize_with = "csv::invalid_option")]
    pub rain: Option<f64>,
    #[serde(rename = "AQI_Target", deserialize_with = "csv::invalid_option")]
    pub aqi: Option<f64>,
}

impl AirQualityRecord {
    /// The twelve pollutant and weather inputs, in model order
    pub fn inputs(&self) -> [Option<f64>; 12] {
        [
            self.pm25,
            self.pm10,
            self.no2,
            self.so2,
            self.co,
            self.o3,
            self.temp_c,
            self.humidity,
            self.wind_speed,
            self.wind_direction,
            self.pressure,
            self.rain,
        ]
    }
}

impl TabularRecord for AirQualityRecord {
    const DATASET: &'static str = "urban air pollution";
    const REQUIRED_COLUMNS: &'static [&'static str] = &[
        "DateTime",
        "Station_ID",
        "PM2.5",
        "PM10",
        "NO₂",
        "SO₂",
        "CO",
        "O₃",
        "Temp_C",
        "Humidity_%",
        "Wind_Speed_mps",
        "Wind_Direction_deg",
        "Pressure_hPa",
        "Rain_mm",
        "AQI_Target",
    ];
}
