//! Shared models and wire types
//!
//! Field names on the wire are camelCase to match the ESP32 firmware
//! payloads. Raw payload structs carry `Option` fields so that missing
//! values are reported as `InvalidPayload` instead of a generic decode
//! failure; validated readings are immutable once constructed and carry
//! the server-assigned timestamp.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub db_connected: bool,
    pub mqtt_connected: bool,
}

/// Raw plant-sensor payload as posted by the device
#[derive(Debug, Clone, Deserialize)]
pub struct PlantPayload {
    pub ph: Option<f64>,
    pub tds: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

/// Raw fish-tank payload as posted by the device
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FishPayload {
    pub turbidity: Option<f64>,
    pub water_temperature: Option<f64>,
    pub ph: Option<f64>,
    /// LDR digital output: true while the tank area is dark
    pub ldr: Option<bool>,
    /// Device-reported acknowledgement that the grow lights are on
    pub grow_light_triggered: Option<bool>,
}

/// Validated, server-stamped plant reading
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantReading {
    pub ph: f64,
    pub tds: f64,
    pub temperature: f64,
    pub humidity: f64,
    #[serde(serialize_with = "ser_utc")]
    pub recorded_at: DateTime<Utc>,
}

/// Validated, server-stamped fish reading
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FishReading {
    pub turbidity: f64,
    pub water_temperature: f64,
    pub ph: f64,
    pub ldr: bool,
    pub grow_light_triggered: bool,
    #[serde(serialize_with = "ser_utc")]
    pub recorded_at: DateTime<Utc>,
}

impl PlantPayload {
    /// Validate required fields and stamp the server-side timestamp.
    /// No partial records: any absent field rejects the whole payload.
    pub fn validate(self, recorded_at: DateTime<Utc>) -> Result<PlantReading> {
        Ok(PlantReading {
            ph: require(self.ph, "ph")?,
            tds: require(self.tds, "tds")?,
            temperature: require(self.temperature, "temperature")?,
            humidity: require(self.humidity, "humidity")?,
            recorded_at,
        })
    }
}

impl FishPayload {
    /// Validate required fields and stamp the server-side timestamp.
    pub fn validate(self, recorded_at: DateTime<Utc>) -> Result<FishReading> {
        Ok(FishReading {
            turbidity: require(self.turbidity, "turbidity")?,
            water_temperature: require(self.water_temperature, "waterTemperature")?,
            ph: require(self.ph, "ph")?,
            ldr: require(self.ldr, "ldr")?,
            grow_light_triggered: require(self.grow_light_triggered, "growLightTriggered")?,
            recorded_at,
        })
    }
}

/// Tracked metric series. Each maps to one persisted column for the
/// cold-start history fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    PlantPh,
    Tds,
    AirTemperature,
    Humidity,
    Turbidity,
    WaterTemperature,
    FishPh,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::PlantPh => "plant_ph",
            Metric::Tds => "tds",
            Metric::AirTemperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::Turbidity => "turbidity",
            Metric::WaterTemperature => "water_temperature",
            Metric::FishPh => "fish_ph",
        }
    }

    /// Table holding this metric's history
    pub fn table(&self) -> &'static str {
        match self {
            Metric::PlantPh | Metric::Tds | Metric::AirTemperature | Metric::Humidity => {
                "plant_data"
            }
            Metric::Turbidity | Metric::WaterTemperature | Metric::FishPh => "fish_data",
        }
    }

    /// Column holding this metric's samples
    pub fn column(&self) -> &'static str {
        match self {
            Metric::PlantPh | Metric::FishPh => "ph",
            Metric::Tds => "tds",
            Metric::AirTemperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::Turbidity => "turbidity",
            Metric::WaterTemperature => "water_temperature",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn require<T>(field: Option<T>, name: &str) -> Result<T> {
    field.ok_or_else(|| Error::InvalidPayload(format!("missing required field '{}'", name)))
}

fn ser_utc<S: serde::Serializer>(dt: &DateTime<Utc>, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&dt.to_rfc3339())
}

/// Format a stored UTC instant in the configured display timezone
pub fn format_display(dt: DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Persisted plant row as returned by the query endpoints
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantRow {
    pub ph: f64,
    pub tds: f64,
    pub temperature: f64,
    pub humidity: f64,
    /// Rendered in the display timezone
    pub created_at: String,
}

/// Persisted fish row as returned by the query endpoints
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FishRow {
    pub turbidity: f64,
    pub water_temperature: f64,
    pub ph: f64,
    /// Rendered in the display timezone
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plant_payload_missing_field_rejected() {
        let payload = PlantPayload {
            ph: Some(6.8),
            tds: None,
            temperature: Some(27.0),
            humidity: Some(60.0),
        };
        let err = payload.validate(Utc::now()).unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(ref m) if m.contains("tds")));
    }

    #[test]
    fn fish_payload_complete_accepted() {
        let payload = FishPayload {
            turbidity: Some(300.0),
            water_temperature: Some(26.0),
            ph: Some(7.0),
            ldr: Some(true),
            grow_light_triggered: Some(false),
        };
        let reading = payload.validate(Utc::now()).unwrap();
        assert_eq!(reading.turbidity, 300.0);
        assert!(reading.ldr);
        assert!(!reading.grow_light_triggered);
    }

    #[test]
    fn fish_payload_missing_flag_rejected() {
        let payload = FishPayload {
            turbidity: Some(300.0),
            water_temperature: Some(26.0),
            ph: Some(7.0),
            ldr: Some(true),
            grow_light_triggered: None,
        };
        let err = payload.validate(Utc::now()).unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(ref m) if m.contains("growLightTriggered")));
    }
}
