use tracing::trace;

use super::PathPoint;
use crate::config::GeometryConfig;
use crate::geo::{haversine_km, initial_bearing, is_valid_coordinate, shortest_delta};
use crate::telemetry::RoutePoint;

/// Drop history points that would clutter the path.
///
/// Removes invalid coordinates, out-of-order timestamps, points under the
/// aircraft's nose (within `nose_exclusion_km` of the live position) and
/// points within `min_point_spacing_km` of the previous kept point.
pub fn sanitize(history: &[RoutePoint], current: &RoutePoint, config: &GeometryConfig) -> Vec<PathPoint> {
    let mut kept: Vec<PathPoint> = Vec::with_capacity(history.len());
    let mut last_timestamp = None;

    for point in history {
        if !is_valid_coordinate(point.lat, point.lon) {
            continue;
        }

        if last_timestamp.is_some_and(|last| point.timestamp <= last) {
            trace!("Dropping out-of-order history point at {}", point.timestamp);
            continue;
        }

        if haversine_km(point.lat, point.lon, current.lat, current.lon) < config.nose_exclusion_km {
            continue;
        }

        if let Some(previous) = kept.last() {
            if haversine_km(previous.lat, previous.lon, point.lat, point.lon)
                < config.min_point_spacing_km
            {
                continue;
            }
        }

        last_timestamp = Some(point.timestamp);
        kept.push(PathPoint::real(point.lat, point.lon, point.altitude_ft));
    }

    kept
}

/// Turn angle at `b` when travelling a -> b -> c, in [0, 180]
pub fn turn_angle(a: &PathPoint, b: &PathPoint, c: &PathPoint) -> f64 {
    let inbound = initial_bearing(a.lat, a.lon, b.lat, b.lon);
    let outbound = initial_bearing(b.lat, b.lon, c.lat, c.lon);
    shortest_delta(inbound, outbound).abs()
}

/// Remove interior points that form an implausibly sharp reversal.
///
/// Single pass: each point is judged against the last kept point and the next
/// input point, and a removed point is never revisited.
pub fn despike(points: Vec<PathPoint>, max_turn_deg: f64) -> Vec<PathPoint> {
    if points.len() < 3 {
        return points;
    }

    let last_index = points.len() - 1;
    let mut kept: Vec<PathPoint> = Vec::with_capacity(points.len());
    kept.push(points[0]);

    for i in 1..last_index {
        let previous = kept[kept.len() - 1];
        let angle = turn_angle(&previous, &points[i], &points[i + 1]);
        if angle > max_turn_deg {
            trace!(
                "Dropping spike at ({:.5}, {:.5}), turn angle {:.1}",
                points[i].lat, points[i].lon, angle
            );
            continue;
        }
        kept.push(points[i]);
    }

    kept.push(points[last_index]);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn rp(lat: f64, lon: f64, secs: i64) -> RoutePoint {
        RoutePoint {
            lat,
            lon,
            altitude_ft: 10_000.0,
            ground_speed_kt: 250.0,
            timestamp: t(secs),
        }
    }

    #[test]
    fn test_sanitize_drops_nose_and_duplicates() {
        let current = rp(40.5, -105.0, 100);
        let history = vec![
            rp(40.0, -105.0, 0),
            rp(40.0001, -105.0, 1), // ~11 m from the previous point
            rp(40.2, -105.0, 2),
            rp(40.499, -105.0, 3), // ~110 m from the live position
        ];

        let kept = sanitize(&history, &current, &GeometryConfig::default());
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].lat, 40.0);
        assert_eq!(kept[1].lat, 40.2);
        assert!(kept.iter().all(|p| !p.simulated));
    }

    #[test]
    fn test_sanitize_drops_out_of_order_and_invalid() {
        let current = rp(45.0, -100.0, 100);
        let history = vec![
            rp(40.0, -105.0, 10),
            rp(40.1, -105.0, 5),
            rp(f64::NAN, -105.0, 11),
            rp(40.2, -105.0, 12),
        ];
        let kept = sanitize(&history, &current, &GeometryConfig::default());
        let lats: Vec<f64> = kept.iter().map(|p| p.lat).collect();
        assert_eq!(lats, vec![40.0, 40.2]);
    }

    #[test]
    fn test_despike_removes_reversal() {
        let points = vec![
            PathPoint::real(40.0, -105.0, 0.0),
            PathPoint::real(40.1, -105.0, 0.0),
            PathPoint::real(40.3, -105.0, 0.0), // overshoot, then back south
            PathPoint::real(40.2, -105.0, 0.0),
            PathPoint::real(40.25, -105.0, 0.0),
        ];
        let kept = despike(points, 150.0);
        let lats: Vec<f64> = kept.iter().map(|p| p.lat).collect();
        assert!(!lats.contains(&40.3));
        assert_eq!(lats.first(), Some(&40.0));
        assert_eq!(lats.last(), Some(&40.25));
    }

    #[test]
    fn test_despike_keeps_ordinary_turns() {
        let points = vec![
            PathPoint::real(40.0, -105.0, 0.0),
            PathPoint::real(40.1, -105.0, 0.0),
            PathPoint::real(40.1, -104.9, 0.0), // 90 degree turn
            PathPoint::real(40.2, -104.9, 0.0),
        ];
        assert_eq!(despike(points, 150.0).len(), 4);
    }

    #[test]
    fn test_turn_angle_straight_and_reversal() {
        let a = PathPoint::real(0.0, 0.0, 0.0);
        let b = PathPoint::real(0.0, 1.0, 0.0);
        let c = PathPoint::real(0.0, 2.0, 0.0);
        assert!(turn_angle(&a, &b, &c) < 1e-6);
        assert!((turn_angle(&a, &b, &a) - 180.0).abs() < 1e-6);
    }
}
