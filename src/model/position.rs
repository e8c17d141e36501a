use super::{AgentId, DeliveryId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point on the globe in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// A position as sent by an agent device.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionReport {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    /// Device clock; the server clock is used when absent.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl PositionReport {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            speed: None,
            heading: None,
            timestamp: None,
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// A sample about to be appended; the store assigns its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPositionSample {
    pub delivery_id: DeliveryId,
    pub agent_id: AgentId,
    pub report: PositionReport,
    pub recorded_at: DateTime<Utc>,
}

/// An immutable, persisted position sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSample {
    pub id: u64,
    pub delivery_id: DeliveryId,
    pub agent_id: AgentId,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

impl PositionSample {
    pub fn from_new(id: u64, sample: NewPositionSample) -> Self {
        let NewPositionSample {
            delivery_id,
            agent_id,
            report,
            recorded_at,
        } = sample;
        Self {
            id,
            delivery_id,
            agent_id,
            latitude: report.latitude,
            longitude: report.longitude,
            accuracy: report.accuracy,
            speed: report.speed,
            heading: report.heading,
            recorded_at,
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Distance and travel time to the destination at the assumed average speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalEstimate {
    pub distance_km: f64,
    pub eta_minutes: u32,
}
