use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Timestamp layout of the `timestamp` TEXT column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Which ingest path a reading came from. Each source has its own table with
/// an identical shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Serial device attached to this host.
    Local,
    /// Relay client forwarding over TCP.
    Remote,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Local, Source::Remote];

    pub fn table(self) -> &'static str {
        match self {
            Source::Local => "sensor_data",
            Source::Remote => "second_sensor_data",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Source::Local => "local",
            Source::Remote => "remote",
        })
    }
}

/// A parsed sample that has not been stored yet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Relative humidity percentage
    pub humidity: f64,
    /// Degrees Celsius
    pub temperature: f64,
    pub light_level: f64,
}

impl Measurement {
    /// Renders the labeled grammar the relay client forwards.
    pub fn to_labeled(&self) -> String {
        format!(
            "Humidity: {}%, Temperature: {}°C, Light Level: {}",
            self.humidity, self.temperature, self.light_level
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: i64,
    pub timestamp: NaiveDateTime,
    pub humidity: f64,
    pub temperature: f64,
    pub light_level: f64,
}

impl Reading {
    pub fn measurement(&self) -> Measurement {
        Measurement {
            humidity: self.humidity,
            temperature: self.temperature,
            light_level: self.light_level,
        }
    }
}

/// Row shape as stored; the timestamp stays textual until validated.
#[derive(Debug, FromRow)]
pub(crate) struct ReadingRow {
    pub id: i64,
    pub timestamp: String,
    pub humidity: f64,
    pub temperature: f64,
    pub light_level: f64,
}

/// Per-measurement means rounded to two decimals.
///
/// Used both for the trigger-maintained snapshot in `average_data` and for the
/// mean computed on read over the rows currently in a table.
#[derive(Debug, Clone, Copy, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Averages {
    #[sqlx(rename = "average_humidity")]
    pub humidity: f64,
    #[sqlx(rename = "average_temperature")]
    pub temperature: f64,
    #[sqlx(rename = "average_light_level")]
    pub light_level: f64,
}

impl Averages {
    /// Mean of each measurement over `readings`, or `None` when empty.
    pub fn of(readings: &[Reading]) -> Option<Self> {
        if readings.is_empty() {
            return None;
        }
        let n = readings.len() as f64;
        let (h, t, l) = readings.iter().fold((0.0, 0.0, 0.0), |(h, t, l), r| {
            (h + r.humidity, t + r.temperature, l + r.light_level)
        });
        Some(Self {
            humidity: round2(h / n),
            temperature: round2(t / n),
            light_level: round2(l / n),
        })
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, FromRow)]
pub struct Credential {
    pub id: i64,
    pub username: String,
    /// Hex of salt followed by the derived key.
    pub password: String,
}
