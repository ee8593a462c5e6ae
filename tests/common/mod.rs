//! Shared builders for integration tests

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use trackline::{FiledRouteNode, RoutePoint, TelemetryBatch, TelemetrySnapshot};

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
}

pub fn at_ms(ms: i64) -> DateTime<Utc> {
    epoch() + Duration::milliseconds(ms)
}

pub fn at_secs(secs: i64) -> DateTime<Utc> {
    epoch() + Duration::seconds(secs)
}

pub fn route_point(lat: f64, lon: f64, altitude_ft: f64, secs: i64) -> RoutePoint {
    RoutePoint {
        lat,
        lon,
        altitude_ft,
        ground_speed_kt: 450.0,
        timestamp: at_secs(secs),
    }
}

pub fn snapshot(entity_id: &str, lat: f64, lon: f64, heading_deg: f64) -> TelemetrySnapshot {
    TelemetrySnapshot {
        entity_id: entity_id.to_string(),
        lat,
        lon,
        altitude_ft: 30_000.0,
        ground_speed_kt: 450.0,
        vertical_speed_fpm: 0.0,
        heading_deg,
        report_timestamp: None,
    }
}

/// A batch whose snapshots all take the batch timestamp
pub fn batch_at_ms(ms: i64, snapshots: Vec<TelemetrySnapshot>) -> TelemetryBatch {
    TelemetryBatch::new(at_ms(ms), snapshots)
}

/// Waypoint legs due east along `lat`, one per longitude
pub fn legs_along(lat: f64, lons: &[f64]) -> Vec<FiledRouteNode> {
    lons.iter()
        .enumerate()
        .map(|(i, lon)| FiledRouteNode::leaf(&format!("WP{i}"), lat, *lon, None))
        .collect()
}
