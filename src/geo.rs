//! Spherical helpers shared by the ingestion, estimator and geometry code.
//!
//! All angles are degrees unless a name says otherwise. Distances come back in
//! meters, matching the haversine helpers used everywhere else in the crate.

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub const METERS_PER_NM: f64 = 1852.0;

pub const MPS_PER_KNOT: f64 = 0.514_444;

/// Calculate the distance between two points using the Haversine formula
/// Returns distance in meters
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    haversine_distance(lat1, lon1, lat2, lon2) / 1000.0
}

/// Initial great-circle bearing from point 1 to point 2, in [0, 360)
pub fn initial_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let y = delta_lon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lon.cos();

    normalize_heading(y.atan2(x).to_degrees())
}

/// Wrap any angle into [0, 360)
pub fn normalize_heading(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Shortest signed angular difference `to - from`, in [-180, 180]
pub fn shortest_delta(from: f64, to: f64) -> f64 {
    let delta = (to - from + 180.0).rem_euclid(360.0) - 180.0;
    delta.clamp(-180.0, 180.0)
}

/// Wrap a longitude into the canonical (-180, 180] range
pub fn wrap_longitude(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 { 180.0 } else { wrapped }
}

pub fn is_valid_coordinate(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && lat.abs() <= 90.0 && lon.abs() <= 180.0
}

fn to_unit_vector(lat: f64, lon: f64) -> [f64; 3] {
    let phi = lat.to_radians();
    let lambda = lon.to_radians();
    [phi.cos() * lambda.cos(), phi.cos() * lambda.sin(), phi.sin()]
}

fn from_unit_vector(v: [f64; 3]) -> (f64, f64) {
    let lat = v[2].atan2((v[0] * v[0] + v[1] * v[1]).sqrt()).to_degrees();
    let lon = v[1].atan2(v[0]).to_degrees();
    (lat, lon)
}

/// Point at fraction `t` along the great circle from point 1 to point 2.
///
/// The returned longitude is kept continuous with `lon1`, so callers working on
/// unwrapped longitudes get unwrapped output.
pub fn great_circle_point(lat1: f64, lon1: f64, lat2: f64, lon2: f64, t: f64) -> (f64, f64) {
    let a = to_unit_vector(lat1, lon1);
    let b = to_unit_vector(lat2, lon2);
    let dot = (a[0] * b[0] + a[1] * b[1] + a[2] * b[2]).clamp(-1.0, 1.0);
    let omega = dot.acos();

    // Nearly identical points: plain linear blend is exact enough
    if omega.abs() < 1e-9 {
        return (lat1 + t * (lat2 - lat1), lon1 + t * (lon2 - lon1));
    }

    let sin_omega = omega.sin();
    let wa = ((1.0 - t) * omega).sin() / sin_omega;
    let wb = (t * omega).sin() / sin_omega;
    let v = [
        wa * a[0] + wb * b[0],
        wa * a[1] + wb * b[1],
        wa * a[2] + wb * b[2],
    ];

    let (lat, raw_lon) = from_unit_vector(v);
    (lat, lon1 + shortest_delta(wrap_longitude(lon1), raw_lon))
}
