use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

use crate::kinematics::KinematicSample;
use crate::telemetry::{FlightPhase, RoutePoint, TelemetrySnapshot};

/// Persistent per-entity record
/// Lives from the first sighting until the entity is missing from a batch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedEntityState {
    pub last_accepted_timestamp: DateTime<Utc>,
    pub latest_position: RoutePoint,
    pub derived_phase: FlightPhase,

    /// Raw attitude inputs of the last accepted snapshot
    pub heading_deg: f64,
    pub vertical_speed_fpm: f64,

    /// Accepted positions, oldest first, strictly increasing timestamps
    #[serde(skip)]
    recent_positions: VecDeque<RoutePoint>,
    #[serde(skip)]
    capacity: usize,
}

impl TrackedEntityState {
    /// Create a new state from the first accepted snapshot
    pub fn new(
        snapshot: &TelemetrySnapshot,
        timestamp: DateTime<Utc>,
        phase: FlightPhase,
        capacity: usize,
    ) -> Self {
        let capacity = capacity.max(1);
        let point = RoutePoint::from_snapshot(snapshot, timestamp);
        let mut recent_positions = VecDeque::with_capacity(capacity.min(64));
        recent_positions.push_back(point);

        Self {
            last_accepted_timestamp: timestamp,
            latest_position: point,
            derived_phase: phase,
            heading_deg: snapshot.heading_deg,
            vertical_speed_fpm: snapshot.vertical_speed_fpm,
            recent_positions,
            capacity,
        }
    }

    /// Whether a report at `timestamp` would be accepted
    pub fn is_newer(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp > self.last_accepted_timestamp
    }

    /// Apply an accepted snapshot; caller has already checked `is_newer`
    pub fn accept(&mut self, snapshot: &TelemetrySnapshot, timestamp: DateTime<Utc>, phase: FlightPhase) {
        debug_assert!(self.is_newer(timestamp));

        let point = RoutePoint::from_snapshot(snapshot, timestamp);
        self.last_accepted_timestamp = timestamp;
        self.latest_position = point;
        self.derived_phase = phase;
        self.heading_deg = snapshot.heading_deg;
        self.vertical_speed_fpm = snapshot.vertical_speed_fpm;

        if self.recent_positions.len() >= self.capacity {
            self.recent_positions.pop_front();
        }
        self.recent_positions.push_back(point);
    }

    /// Accepted positions, oldest first
    pub fn recent_positions(&self) -> impl Iterator<Item = &RoutePoint> {
        self.recent_positions.iter()
    }

    /// Latest values in the form the kinematic estimator consumes
    pub fn kinematic_sample(&self) -> KinematicSample {
        KinematicSample {
            timestamp: self.last_accepted_timestamp,
            heading_deg: self.heading_deg,
            ground_speed_kt: self.latest_position.ground_speed_kt,
            vertical_speed_fpm: self.vertical_speed_fpm,
            altitude_ft: self.latest_position.altitude_ft,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snapshot(lat: f64) -> TelemetrySnapshot {
        TelemetrySnapshot {
            entity_id: "a1".to_string(),
            lat,
            lon: -105.0,
            altitude_ft: 12_000.0,
            ground_speed_kt: 250.0,
            vertical_speed_fpm: 0.0,
            heading_deg: 90.0,
            report_timestamp: None,
        }
    }

    #[test]
    fn test_recent_positions_are_bounded() {
        let t0 = Utc::now();
        let mut state = TrackedEntityState::new(&snapshot(40.0), t0, FlightPhase::Enroute, 3);

        for i in 1..=5 {
            state.accept(
                &snapshot(40.0 + i as f64 * 0.01),
                t0 + Duration::seconds(i),
                FlightPhase::Enroute,
            );
        }

        let kept: Vec<_> = state.recent_positions().collect();
        assert_eq!(kept.len(), 3);
        assert!((kept[2].lat - 40.05).abs() < 1e-9);
        assert!(kept.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_is_newer_is_strict() {
        let t0 = Utc::now();
        let state = TrackedEntityState::new(&snapshot(40.0), t0, FlightPhase::Enroute, 8);
        assert!(!state.is_newer(t0));
        assert!(!state.is_newer(t0 - Duration::seconds(1)));
        assert!(state.is_newer(t0 + Duration::milliseconds(1)));
    }
}
