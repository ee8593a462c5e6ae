//! Route geometry pipeline.
//!
//! Turns a sparse, possibly antimeridian-crossing position history and an
//! optional filed route into short great-circle segments ready for drawing.
//! The whole pipeline is re-run on every update; nothing here keeps state
//! between runs.

pub mod backfill;
pub mod densify;
pub mod sanitize;
pub mod spline;
pub mod unwrap;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GeometryConfig;
use crate::flight_plan::FlightPlanWaypoint;
use crate::geo::is_valid_coordinate;
use crate::telemetry::RoutePoint;

/// A point moving through the pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPoint {
    pub lat: f64,
    /// Raw longitude until the unwrap step, continuous afterwards
    pub lon: f64,
    pub altitude_ft: f64,
    /// Synthesized from the filed route rather than observed
    pub simulated: bool,
}

impl PathPoint {
    pub fn real(lat: f64, lon: f64, altitude_ft: f64) -> Self {
        Self {
            lat,
            lon,
            altitude_ft,
            simulated: false,
        }
    }

    pub fn simulated(lat: f64, lon: f64, altitude_ft: f64) -> Self {
        Self {
            lat,
            lon,
            altitude_ft,
            simulated: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

/// One drawable piece of the path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderableRouteSegment {
    pub start: Coordinate,
    pub end: Coordinate,
    pub avg_altitude_ft: f64,
    pub simulated: bool,
}

/// Build the renderable path for one entity.
///
/// `history` is the entity's position history oldest first, `current` its live
/// position. The filed route, when present, fills in what the history lacks.
pub fn build_renderable_route(
    history: &[RoutePoint],
    current: &RoutePoint,
    filed_route: Option<&[FlightPlanWaypoint]>,
    config: &GeometryConfig,
) -> Vec<RenderableRouteSegment> {
    if !is_valid_coordinate(current.lat, current.lon) {
        debug!("Live position is not a valid coordinate, no route drawn");
        return Vec::new();
    }

    let cleaned = sanitize::sanitize(history, current, config);
    let cleaned = sanitize::despike(cleaned, config.despike_max_turn_deg);

    let mut points = match filed_route.filter(|plan| !plan.is_empty()) {
        Some(plan) => backfill::backfill(cleaned, current, plan, config),
        None => cleaned,
    };

    let nose = PathPoint::real(current.lat, current.lon, current.altitude_ft);
    points.push(nose);

    unwrap::unwrap_longitudes(&mut points);

    if spline::should_smooth(&points, config) {
        points = spline::smooth_path(&points, config);
        // Smoothing must never move the aircraft itself
        if let Some(last) = points.last_mut() {
            last.lat = current.lat;
            last.lon = current.lon;
            last.altitude_ft = current.altitude_ft;
        }
    }

    let segments = densify::densify(&points, config.max_render_segment_km);

    counter!("geometry.route_builds_total").increment(1);
    debug!(
        "Built route: {} history points -> {} path points -> {} segments",
        history.len(),
        points.len(),
        segments.len()
    );

    segments
}
