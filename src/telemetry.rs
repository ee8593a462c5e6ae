//! Wire and in-memory types for live telemetry.
//!
//! Batches arrive from the feed as JSON with camelCase field names. Top-level
//! fields are optional on the wire so that a batch missing them can be rejected
//! as a whole instead of failing to parse somewhere in the middle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// One position/attribute report for a tracked aircraft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    pub entity_id: String,
    /// NaN when missing or null on the wire
    #[serde(default = "missing_coordinate", deserialize_with = "nullable_coordinate")]
    pub lat: f64,
    #[serde(default = "missing_coordinate", deserialize_with = "nullable_coordinate")]
    pub lon: f64,
    #[serde(default)]
    pub altitude_ft: f64,
    #[serde(default)]
    pub ground_speed_kt: f64,
    #[serde(default)]
    pub vertical_speed_fpm: f64,
    #[serde(default)]
    pub heading_deg: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_timestamp: Option<DateTime<Utc>>,
}

fn missing_coordinate() -> f64 {
    f64::NAN
}

fn nullable_coordinate<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<f64> = Option::deserialize(deserializer)?;
    Ok(value.unwrap_or(f64::NAN))
}

/// A batch of snapshots as delivered by the feed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryBatch {
    pub as_of_timestamp: Option<DateTime<Utc>>,
    pub snapshots: Option<Vec<TelemetrySnapshot>>,
}

impl TelemetryBatch {
    pub fn new(as_of_timestamp: DateTime<Utc>, snapshots: Vec<TelemetrySnapshot>) -> Self {
        Self {
            as_of_timestamp: Some(as_of_timestamp),
            snapshots: Some(snapshots),
        }
    }

    /// Check that the required top-level fields are present
    pub fn validate(self) -> Result<ValidBatch, MalformedBatch> {
        match (self.as_of_timestamp, self.snapshots) {
            (Some(as_of), Some(snapshots)) => Ok(ValidBatch { as_of, snapshots }),
            (None, _) => Err(MalformedBatch::MissingTimestamp),
            (_, None) => Err(MalformedBatch::MissingSnapshots),
        }
    }
}

/// A batch that passed top-level validation
#[derive(Debug, Clone)]
pub struct ValidBatch {
    pub as_of: DateTime<Utc>,
    pub snapshots: Vec<TelemetrySnapshot>,
}

/// Reasons a whole batch is rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedBatch {
    MissingTimestamp,
    MissingSnapshots,
    /// The payload could not be decoded at all
    Undecodable(String),
}

impl fmt::Display for MalformedBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedBatch::MissingTimestamp => write!(f, "batch has no asOfTimestamp"),
            MalformedBatch::MissingSnapshots => write!(f, "batch has no snapshots array"),
            MalformedBatch::Undecodable(reason) => write!(f, "batch is not decodable: {reason}"),
        }
    }
}

impl std::error::Error for MalformedBatch {}

/// One historical sample of an entity's path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePoint {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub altitude_ft: f64,
    #[serde(default)]
    pub ground_speed_kt: f64,
    pub timestamp: DateTime<Utc>,
}

impl RoutePoint {
    pub fn from_snapshot(snapshot: &TelemetrySnapshot, timestamp: DateTime<Utc>) -> Self {
        Self {
            lat: snapshot.lat,
            lon: snapshot.lon,
            altitude_ft: snapshot.altitude_ft,
            ground_speed_kt: snapshot.ground_speed_kt,
            timestamp,
        }
    }
}

/// Coarse flight phase derived from the latest accepted snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightPhase {
    Ground,
    Climb,
    Descent,
    Cruise,
    Enroute,
}

impl fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlightPhase::Ground => write!(f, "ground"),
            FlightPhase::Climb => write!(f, "climb"),
            FlightPhase::Descent => write!(f, "descent"),
            FlightPhase::Cruise => write!(f, "cruise"),
            FlightPhase::Enroute => write!(f, "enroute"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_null_coordinates_become_nan() {
        let snapshot: TelemetrySnapshot = serde_json::from_str(
            r#"{"entityId":"abc123","lat":null,"altitudeFt":1000}"#,
        )
        .unwrap();
        assert!(snapshot.lat.is_nan());
        assert!(snapshot.lon.is_nan());
        assert_eq!(snapshot.altitude_ft, 1000.0);
        assert!(snapshot.report_timestamp.is_none());
    }

    #[test]
    fn test_batch_validation() {
        let batch: TelemetryBatch = serde_json::from_str(r#"{"snapshots":[]}"#).unwrap();
        assert_eq!(batch.validate().unwrap_err(), MalformedBatch::MissingTimestamp);

        let batch: TelemetryBatch =
            serde_json::from_str(r#"{"asOfTimestamp":"2025-01-15T12:00:00Z"}"#).unwrap();
        assert_eq!(batch.validate().unwrap_err(), MalformedBatch::MissingSnapshots);

        let batch: TelemetryBatch = serde_json::from_str(
            r#"{"asOfTimestamp":"2025-01-15T12:00:00Z","snapshots":[
                {"entityId":"a1","lat":40.0,"lon":-105.0,"headingDeg":90.0}
            ]}"#,
        )
        .unwrap();
        let valid = batch.validate().unwrap();
        assert_eq!(valid.snapshots.len(), 1);
        assert_eq!(valid.snapshots[0].heading_deg, 90.0);
    }

    #[test]
    fn test_phase_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&FlightPhase::Cruise).unwrap(),
            "\"cruise\""
        );
        assert_eq!(FlightPhase::Enroute.to_string(), "enroute");
    }
}
