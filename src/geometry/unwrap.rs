use super::PathPoint;
use crate::geo::shortest_delta;

/// Rewrite longitudes into one continuous sequence.
///
/// Each longitude becomes the previous unwrapped value plus the shortest
/// signed delta between the raw values, so no step exceeds 180 degrees. The
/// whole sequence is then shifted by a multiple of 360 so the final point
/// lands back on its raw, canonical longitude.
pub fn unwrap_longitudes(points: &mut [PathPoint]) {
    let Some(first) = points.first() else {
        return;
    };

    let mut previous_raw = first.lon;
    let mut previous_unwrapped = first.lon;

    for point in points.iter_mut().skip(1) {
        let raw = point.lon;
        previous_unwrapped += shortest_delta(previous_raw, raw);
        previous_raw = raw;
        point.lon = previous_unwrapped;
    }

    let shift = ((previous_raw - previous_unwrapped) / 360.0).round() * 360.0;
    if shift != 0.0 {
        for point in points.iter_mut() {
            point.lon += shift;
        }
    }

    // Exact, not just within rounding of it
    if let Some(last) = points.last_mut() {
        last.lon = previous_raw;
    }
}
