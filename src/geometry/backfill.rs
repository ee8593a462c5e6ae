use metrics::counter;
use tracing::debug;

use super::PathPoint;
use crate::config::GeometryConfig;
use crate::flight_plan::{FlightPlanWaypoint, match_waypoint, nearest_waypoint};
use crate::geo::haversine_km;
use crate::telemetry::RoutePoint;

/// Fill holes in the observed track from the filed route.
///
/// * Sparse history (fewer than `backfill_min_points`): the plan up to the
///   waypoint nearest the live position stands in for the missing track.
/// * History that starts well into the plan gets the plan prefix before it.
/// * Long gaps between consecutive observed points get the filed waypoints
///   in between, when both ends sit near the plan.
///
/// Every synthesized point is marked simulated; observed points pass through.
pub fn backfill(
    real: Vec<PathPoint>,
    current: &RoutePoint,
    plan: &[FlightPlanWaypoint],
    config: &GeometryConfig,
) -> Vec<PathPoint> {
    if plan.is_empty() {
        return real;
    }

    let first_match = real
        .first()
        .and_then(|first| match_waypoint(plan, first.lat, first.lon, config.waypoint_match_km));

    let prefix_end = if real.len() < config.backfill_min_points {
        let nearest_to_current = nearest_waypoint(plan, current.lat, current.lon)
            .map(|(index, _)| index)
            .unwrap_or(0);
        // Never synthesize plan beyond where the observed track picks up
        match first_match {
            Some(matched) => matched.min(nearest_to_current),
            None => nearest_to_current,
        }
    } else {
        match first_match {
            Some(matched) if matched > config.late_start_waypoint_index => matched,
            _ => 0,
        }
    };

    let anchor_altitude = real
        .first()
        .map(|first| first.altitude_ft)
        .unwrap_or(current.altitude_ft);
    let follower = real
        .first()
        .copied()
        .unwrap_or_else(|| PathPoint::real(current.lat, current.lon, current.altitude_ft));

    let mut result = plan_prefix(&plan[..prefix_end], anchor_altitude, &follower, config);
    let prefix_len = result.len();

    let injected = inject_gaps(&real, plan, config, &mut result);

    if prefix_len > 0 || injected > 0 {
        counter!("geometry.backfill_points_total").increment((prefix_len + injected) as u64);
        debug!(
            "Backfilled {} prefix and {} gap points from a {} waypoint plan",
            prefix_len,
            injected,
            plan.len()
        );
    }

    result
}

/// Plan waypoints standing in for track before the first observed point
fn plan_prefix(
    waypoints: &[FlightPlanWaypoint],
    fallback_altitude_ft: f64,
    follower: &PathPoint,
    config: &GeometryConfig,
) -> Vec<PathPoint> {
    let mut prefix: Vec<PathPoint> = Vec::with_capacity(waypoints.len());

    for (i, waypoint) in waypoints.iter().enumerate() {
        let (next_lat, next_lon) = match waypoints.get(i + 1) {
            Some(next) => (next.lat, next.lon),
            None => (follower.lat, follower.lon),
        };
        if haversine_km(waypoint.lat, waypoint.lon, next_lat, next_lon) < config.min_point_spacing_km {
            continue;
        }

        prefix.push(PathPoint::simulated(
            waypoint.lat,
            waypoint.lon,
            waypoint.altitude_ft.unwrap_or(fallback_altitude_ft),
        ));
    }

    prefix
}

/// Append `real` to `out`, splicing plan waypoints into long gaps.
/// Returns the number of injected points.
fn inject_gaps(
    real: &[PathPoint],
    plan: &[FlightPlanWaypoint],
    config: &GeometryConfig,
    out: &mut Vec<PathPoint>,
) -> usize {
    let mut injected = 0;

    for (i, point) in real.iter().enumerate() {
        if i > 0 {
            let previous = &real[i - 1];
            let gap_km = haversine_km(previous.lat, previous.lon, point.lat, point.lon);
            if gap_km > config.gap_distance_km {
                let before = out.len();
                out.extend(gap_waypoints(previous, point, plan, config));
                injected += out.len() - before;
            }
        }
        out.push(*point);
    }

    injected
}

/// Filed waypoints strictly between the waypoints matched to `a` and `b`
fn gap_waypoints(
    a: &PathPoint,
    b: &PathPoint,
    plan: &[FlightPlanWaypoint],
    config: &GeometryConfig,
) -> Vec<PathPoint> {
    let (Some(ia), Some(ib)) = (
        match_waypoint(plan, a.lat, a.lon, config.waypoint_match_km),
        match_waypoint(plan, b.lat, b.lon, config.waypoint_match_km),
    ) else {
        return Vec::new();
    };

    if ib <= ia + 1 {
        return Vec::new();
    }

    let start_nm = plan[ia].cumulative_distance_nm;
    let span_nm = plan[ib].cumulative_distance_nm - start_nm;
    let span_index = (ib - ia) as f64;

    plan[ia + 1..ib]
        .iter()
        .enumerate()
        .map(|(offset, waypoint)| {
            let altitude_ft = waypoint.altitude_ft.unwrap_or_else(|| {
                let fraction = if span_nm > 0.0 {
                    ((waypoint.cumulative_distance_nm - start_nm) / span_nm).clamp(0.0, 1.0)
                } else {
                    (offset + 1) as f64 / span_index
                };
                a.altitude_ft + fraction * (b.altitude_ft - a.altitude_ft)
            });
            PathPoint::simulated(waypoint.lat, waypoint.lon, altitude_ft)
        })
        .collect()
}
