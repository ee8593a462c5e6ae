//! Filed route handling.
//!
//! The route service returns a tree: top-level legs, each of which may hold
//! child waypoints (departure/arrival procedures, airways), nested to any depth.
//! Only leaves carry drawable positions. Flattening walks the tree depth-first
//! with an explicit stack, keeps leaves with valid coordinates in order and
//! annotates each with the cumulative along-route distance.

use serde::{Deserialize, Serialize};

use crate::geo::{METERS_PER_NM, haversine_distance, haversine_km, is_valid_coordinate};

/// One node of the filed route tree as delivered by the route service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiledRouteNode {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub altitude_ft: Option<f64>,
    #[serde(default)]
    pub children: Vec<FiledRouteNode>,
}

impl FiledRouteNode {
    pub fn leaf(identifier: &str, lat: f64, lon: f64, altitude_ft: Option<f64>) -> Self {
        Self {
            identifier: Some(identifier.to_string()),
            lat: Some(lat),
            lon: Some(lon),
            altitude_ft,
            children: Vec::new(),
        }
    }

    pub fn group(identifier: &str, children: Vec<FiledRouteNode>) -> Self {
        Self {
            identifier: Some(identifier.to_string()),
            children,
            ..Self::default()
        }
    }
}

/// A filed route fetch result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiledRoute {
    #[serde(default)]
    pub legs: Vec<FiledRouteNode>,
}

impl FiledRoute {
    pub fn waypoints(&self) -> Vec<FlightPlanWaypoint> {
        flatten_filed_route(&self.legs)
    }
}

/// A drawable waypoint of the filed route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightPlanWaypoint {
    pub identifier: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub altitude_ft: Option<f64>,
    pub cumulative_distance_nm: f64,
}

/// Flatten the route tree into ordered leaf waypoints
pub fn flatten_filed_route(legs: &[FiledRouteNode]) -> Vec<FlightPlanWaypoint> {
    let mut waypoints: Vec<FlightPlanWaypoint> = Vec::new();
    // Reversed so the first leg is popped first
    let mut stack: Vec<&FiledRouteNode> = legs.iter().rev().collect();

    while let Some(node) = stack.pop() {
        if !node.children.is_empty() {
            stack.extend(node.children.iter().rev());
            continue;
        }

        let (Some(lat), Some(lon)) = (node.lat, node.lon) else {
            continue;
        };
        if !is_valid_coordinate(lat, lon) {
            continue;
        }

        let cumulative_distance_nm = match waypoints.last() {
            Some(previous) => {
                previous.cumulative_distance_nm
                    + haversine_distance(previous.lat, previous.lon, lat, lon) / METERS_PER_NM
            }
            None => 0.0,
        };

        waypoints.push(FlightPlanWaypoint {
            identifier: node.identifier.clone().unwrap_or_default(),
            lat,
            lon,
            altitude_ft: node.altitude_ft.filter(|alt| alt.is_finite()),
            cumulative_distance_nm,
        });
    }

    waypoints
}

/// Index and distance (km) of the waypoint closest to a position
pub fn nearest_waypoint(waypoints: &[FlightPlanWaypoint], lat: f64, lon: f64) -> Option<(usize, f64)> {
    waypoints
        .iter()
        .enumerate()
        .map(|(i, wp)| (i, haversine_km(lat, lon, wp.lat, wp.lon)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// Index of the closest waypoint, only if it lies within `max_km`
pub fn match_waypoint(waypoints: &[FlightPlanWaypoint], lat: f64, lon: f64, max_km: f64) -> Option<usize> {
    nearest_waypoint(waypoints, lat, lon)
        .filter(|(_, distance)| *distance <= max_km)
        .map(|(index, _)| index)
}
