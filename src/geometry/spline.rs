//! Centripetal Catmull-Rom smoothing for dense tracks
//!
//! Works in (latitude, unwrapped longitude) space, which is only reasonable
//! for short segments away from the poles. `should_smooth` decides whether a
//! track qualifies; sparse or high-latitude tracks are drawn as-is. Legs that
//! touch a simulated point stay straight so synthesized plan vertices are
//! never moved.

use super::PathPoint;
use crate::config::GeometryConfig;
use crate::geo::haversine_km;

fn is_real_leg(a: &PathPoint, b: &PathPoint) -> bool {
    !a.simulated && !b.simulated
}

/// Smooth only dense tracks at moderate latitudes with at least three points.
///
/// Density is judged on the legs between real points, so a long synthesized
/// prefix does not hide a dense real track behind it.
pub fn should_smooth(points: &[PathPoint], config: &GeometryConfig) -> bool {
    if points.len() < 3 {
        return false;
    }

    let real_legs: Vec<f64> = points
        .windows(2)
        .filter(|pair| is_real_leg(&pair[0], &pair[1]))
        .map(|pair| haversine_km(pair[0].lat, pair[0].lon, pair[1].lat, pair[1].lon))
        .collect();
    if real_legs.len() < 2 {
        return false;
    }
    let average_spacing_km = real_legs.iter().sum::<f64>() / real_legs.len() as f64;

    let max_abs_lat = points.iter().map(|p| p.lat.abs()).fold(0.0, f64::max);

    average_spacing_km < config.smoothing_max_spacing_km
        && max_abs_lat <= config.smoothing_max_latitude_deg
}

/// Interpolate a single point on the centripetal spline segment between p1 and p2.
///
/// Knot spacing is the square root of the horizontal distance (alpha = 0.5).
/// Altitude is linear in `t` so climbs and descents stay monotonic.
fn catmull_rom_point(
    p0: &PathPoint,
    p1: &PathPoint,
    p2: &PathPoint,
    p3: &PathPoint,
    t: f64,
) -> PathPoint {
    let knot = |a: &PathPoint, b: &PathPoint| -> f64 {
        haversine_km(a.lat, a.lon, b.lat, b.lon).sqrt().max(0.001)
    };

    let t0 = 0.0;
    let t1 = t0 + knot(p0, p1);
    let t2 = t1 + knot(p1, p2);
    let t3 = t2 + knot(p2, p3);

    let altitude_ft = p1.altitude_ft + t * (p2.altitude_ft - p1.altitude_ft);
    let simulated = p1.simulated || p2.simulated;

    if (t2 - t1).abs() < 0.001 {
        let (lat, lon) = lerp(p1, p2, t);
        return PathPoint {
            lat,
            lon,
            altitude_ft,
            simulated,
        };
    }

    let tm = t1 + t * (t2 - t1);
    let safe_div = |num: f64, den: f64| -> f64 { if den.abs() < 1e-9 { 0.0 } else { num / den } };

    let a1 = lerp(p0, p1, safe_div(tm - t0, t1 - t0));
    let a2 = lerp(p1, p2, safe_div(tm - t1, t2 - t1));
    let a3 = lerp(p2, p3, safe_div(tm - t2, t3 - t2));

    let b1 = lerp_xy(a1, a2, safe_div(tm - t0, t2 - t0));
    let b2 = lerp_xy(a2, a3, safe_div(tm - t1, t3 - t1));

    let (lat, lon) = lerp_xy(b1, b2, safe_div(tm - t1, t2 - t1));
    PathPoint {
        lat,
        lon,
        altitude_ft,
        simulated,
    }
}

fn lerp(a: &PathPoint, b: &PathPoint, t: f64) -> (f64, f64) {
    lerp_xy((a.lat, a.lon), (b.lat, b.lon), t)
}

fn lerp_xy(a: (f64, f64), b: (f64, f64), t: f64) -> (f64, f64) {
    (a.0 + t * (b.0 - a.0), a.1 + t * (b.1 - a.1))
}

/// Sample the segment p1 -> p2 at roughly `step_km`, between 2 and `max_samples` points.
///
/// The first and last samples are exact copies of p1 and p2.
pub fn interpolate_segment(
    p0: &PathPoint,
    p1: &PathPoint,
    p2: &PathPoint,
    p3: &PathPoint,
    step_km: f64,
    max_samples: usize,
) -> Vec<PathPoint> {
    let chord_km = haversine_km(p1.lat, p1.lon, p2.lat, p2.lon);
    let estimated = if step_km > 0.0 {
        (chord_km / step_km).ceil() as usize
    } else {
        max_samples
    };
    let num_samples = estimated.clamp(2, max_samples.max(2));

    let mut samples = Vec::with_capacity(num_samples);
    samples.push(*p1);
    for i in 1..num_samples - 1 {
        let t = i as f64 / (num_samples - 1) as f64;
        samples.push(catmull_rom_point(p0, p1, p2, p3, t));
    }
    samples.push(*p2);

    samples
}

/// Smooth the whole path. End segments reuse their endpoint as the missing
/// outer control point, and so does any segment whose neighbour is simulated.
/// Legs with a simulated endpoint are copied through unchanged.
pub fn smooth_path(points: &[PathPoint], config: &GeometryConfig) -> Vec<PathPoint> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut path = Vec::with_capacity(points.len() * 2);
    let last_segment = points.len() - 2;

    for i in 0..points.len() - 1 {
        let p1 = &points[i];
        let p2 = &points[i + 1];

        let samples = if is_real_leg(p1, p2) {
            let p0 = if i == 0 || points[i - 1].simulated { p1 } else { &points[i - 1] };
            let p3 = points.get(i + 2).filter(|p| !p.simulated).unwrap_or(p2);
            interpolate_segment(
                p0,
                p1,
                p2,
                p3,
                config.spline_step_km,
                config.spline_max_samples,
            )
        } else {
            vec![*p1, *p2]
        };

        // Shared endpoints are emitted once
        if i == last_segment {
            path.extend(samples);
        } else {
            path.extend_from_slice(&samples[..samples.len() - 1]);
        }
    }

    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GeometryConfig {
        GeometryConfig::default()
    }

    #[test]
    fn test_two_points_never_smoothed() {
        let points = vec![
            PathPoint::real(40.0, -105.0, 0.0),
            PathPoint::real(40.01, -105.0, 0.0),
        ];
        assert!(!should_smooth(&points, &config()));
        assert_eq!(smooth_path(&points, &config()), points);
    }

    #[test]
    fn test_sparse_track_not_smoothed() {
        let points = vec![
            PathPoint::real(40.0, -105.0, 0.0),
            PathPoint::real(41.0, -105.0, 0.0),
            PathPoint::real(42.0, -104.0, 0.0),
        ];
        assert!(!should_smooth(&points, &config()));
    }

    #[test]
    fn test_polar_track_not_smoothed() {
        let points = vec![
            PathPoint::real(70.0, 20.0, 0.0),
            PathPoint::real(70.05, 20.0, 0.0),
            PathPoint::real(70.1, 20.1, 0.0),
        ];
        assert!(!should_smooth(&points, &config()));
    }

    #[test]
    fn test_dense_track_is_smoothed_through_control_points() {
        let points = vec![
            PathPoint::real(40.0, -105.0, 1000.0),
            PathPoint::real(40.05, -105.0, 1500.0),
            PathPoint::real(40.1, -104.95, 2000.0),
            PathPoint::real(40.1, -104.9, 2500.0),
        ];
        assert!(should_smooth(&points, &config()));

        let path = smooth_path(&points, &config());
        assert!(path.len() > points.len());
        assert_eq!(path.first(), points.first());
        assert_eq!(path.last(), points.last());
        for control in &points {
            assert!(path.contains(control), "control point {control:?} missing");
        }
    }

    #[test]
    fn test_altitude_stays_monotonic() {
        // Circling climb
        let points = vec![
            PathPoint::real(40.0, -105.0, 1000.0),
            PathPoint::real(40.01, -105.01, 1250.0),
            PathPoint::real(40.0, -105.02, 1500.0),
            PathPoint::real(39.99, -105.01, 1750.0),
            PathPoint::real(40.0, -105.0, 2000.0),
        ];
        let path = smooth_path(&points, &config());
        for pair in path.windows(2) {
            assert!(pair[1].altitude_ft >= pair[0].altitude_ft);
        }
    }

    #[test]
    fn test_sample_count_is_bounded() {
        let p1 = PathPoint::real(40.0, -105.0, 0.0);
        let p2 = PathPoint::real(40.5, -105.0, 0.0);
        // ~55 km chord at 1 km steps would be 56 samples without the cap
        let samples = interpolate_segment(&p1, &p1, &p2, &p2, 1.0, 16);
        assert_eq!(samples.len(), 16);

        let near = PathPoint::real(40.001, -105.0, 0.0);
        assert_eq!(interpolate_segment(&p1, &p1, &near, &near, 1.0, 16).len(), 2);
    }

    #[test]
    fn test_simulated_flag_spreads_to_interior_samples() {
        let p1 = PathPoint::real(40.0, -105.0, 0.0);
        let p2 = PathPoint::simulated(40.05, -105.0, 0.0);
        let samples = interpolate_segment(&p1, &p1, &p2, &p2, 1.0, 16);
        assert!(!samples[0].simulated);
        assert!(samples[1..].iter().all(|p| p.simulated));
    }

    #[test]
    fn test_coincident_points_do_not_produce_nan() {
        let p = PathPoint::real(40.0, -105.0, 0.0);
        let q = PathPoint::real(40.02, -105.0, 0.0);
        let samples = interpolate_segment(&p, &p, &q, &q, 0.5, 16);
        assert!(samples.iter().all(|s| s.lat.is_finite() && s.lon.is_finite()));
    }

    #[test]
    fn test_simulated_prefix_stays_on_waypoints() {
        // Two long synthesized legs in front of a dense real track
        let mut points = vec![
            PathPoint::simulated(40.0, -100.0, 30_000.0),
            PathPoint::simulated(40.0, -99.0, 30_000.0),
            PathPoint::simulated(40.0, -98.0, 30_000.0),
        ];
        for i in 0..6 {
            let lat = 40.0 + if i % 2 == 0 { 0.0 } else { 0.03 };
            points.push(PathPoint::real(lat, -97.9 + i as f64 * 0.1, 30_000.0));
        }
        assert!(should_smooth(&points, &config()));

        let path = smooth_path(&points, &config());
        assert!(path.len() > points.len());

        // The prefix comes through untouched, vertex for vertex
        assert_eq!(&path[..4], &points[..4]);
        for pair in path.windows(2) {
            if pair[0].simulated || pair[1].simulated {
                assert_eq!(pair[0].lat, 40.0);
                assert_eq!(pair[1].lat, 40.0);
            }
        }
        // Real legs are still curved
        assert!(path[4..].iter().any(|p| !points.contains(p)));
    }

    #[test]
    fn test_only_simulated_legs_not_smoothed() {
        let points = vec![
            PathPoint::simulated(40.0, -105.0, 0.0),
            PathPoint::simulated(40.01, -105.0, 0.0),
            PathPoint::real(40.02, -105.0, 0.0),
        ];
        assert!(!should_smooth(&points, &config()));
    }
}
