use super::{Coordinate, PathPoint, RenderableRouteSegment};
use crate::geo::{great_circle_point, haversine_km};

/// Turn a path into drawable segments no longer than `max_segment_km`.
///
/// Long legs are split into `ceil(d / max_segment_km)` equal great-circle
/// pieces with altitude interpolated linearly. Zero-length legs are skipped.
pub fn densify(points: &[PathPoint], max_segment_km: f64) -> Vec<RenderableRouteSegment> {
    let mut segments = Vec::with_capacity(points.len().saturating_sub(1));

    for pair in points.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let distance_km = haversine_km(a.lat, a.lon, b.lat, b.lon);
        if distance_km <= 0.0 {
            continue;
        }

        let simulated = a.simulated || b.simulated;
        let pieces = if max_segment_km > 0.0 && distance_km > max_segment_km {
            (distance_km / max_segment_km).ceil() as usize
        } else {
            1
        };

        let mut start = Coordinate { lat: a.lat, lon: a.lon };
        let mut start_alt = a.altitude_ft;

        for i in 1..=pieces {
            let (end, end_alt) = if i == pieces {
                (Coordinate { lat: b.lat, lon: b.lon }, b.altitude_ft)
            } else {
                let t = i as f64 / pieces as f64;
                let (lat, lon) = great_circle_point(a.lat, a.lon, b.lat, b.lon, t);
                (
                    Coordinate { lat, lon },
                    a.altitude_ft + t * (b.altitude_ft - a.altitude_ft),
                )
            };

            segments.push(RenderableRouteSegment {
                start,
                end,
                avg_altitude_ft: (start_alt + end_alt) / 2.0,
                simulated,
            });

            start = end;
            start_alt = end_alt;
        }
    }

    segments
}
