use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dashboard::History,
    db::models::{Averages, Reading, Source},
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadingDto {
    pub id: i64,
    /// Local wall-clock time of insertion, second precision.
    pub timestamp: NaiveDateTime,
    /// Relative humidity, percent.
    pub humidity: f64,
    /// Degrees Celsius.
    pub temperature: f64,
    pub light_level: f64,
}

impl From<Reading> for ReadingDto {
    fn from(r: Reading) -> Self {
        Self {
            id: r.id,
            timestamp: r.timestamp,
            humidity: r.humidity,
            temperature: r.temperature,
            light_level: r.light_level,
        }
    }
}

/// Response for `GET /sensor_data`. A side is `null` until its source has
/// stored anything.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LatestPairResponse {
    pub local: Option<ReadingDto>,
    pub remote: Option<ReadingDto>,
}

/// Response for `GET /sensor_graph/{source}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SensorGraphResponse {
    pub source: Source,
    /// Ordered by id ascending.
    pub readings: Vec<ReadingDto>,
    /// Mean over the rows currently stored.
    pub current_window_average: Option<Averages>,
    /// Trigger-maintained mean; lags behind retention deletes.
    pub lifetime_average: Option<Averages>,
}

impl From<History> for SensorGraphResponse {
    fn from(h: History) -> Self {
        Self {
            source: h.source,
            readings: h.readings.into_iter().map(Into::into).collect(),
            current_window_average: h.current_window_average,
            lifetime_average: h.lifetime_average,
        }
    }
}

/// Request body for `POST /register` and `POST /login`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// Send back as `Authorization: Bearer <token>`.
    pub token: Uuid,
}
