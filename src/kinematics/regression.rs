//! Turn-rate estimation over the heading buffer.

use chrono::{DateTime, Utc};

/// Least-squares slope of `(x, y)` samples.
///
/// Returns `None` when there are fewer than two samples or every x is the same
/// (zero denominator); callers fall back to a finite difference.
pub fn least_squares_slope(samples: &[(f64, f64)]) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }

    let n = samples.len() as f64;
    let (sum_x, sum_y, sum_xy, sum_xx) = samples.iter().fold(
        (0.0, 0.0, 0.0, 0.0),
        |(sx, sy, sxy, sxx), &(x, y)| (sx + x, sy + y, sxy + x * y, sxx + x * x),
    );

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator.abs() < 1e-9 {
        return None;
    }

    Some((n * sum_xy - sum_x * sum_y) / denominator)
}

/// Two-point rate between the last two entries, in units per second
pub fn finite_difference(buffer: &[(DateTime<Utc>, f64)]) -> Option<f64> {
    let [.., (t0, h0), (t1, h1)] = buffer else {
        return None;
    };

    let dt = (*t1 - *t0).num_milliseconds() as f64 / 1000.0;
    if dt <= 0.0 {
        return None;
    }

    Some((h1 - h0) / dt)
}

/// Heading rate in degrees per second from the buffer.
///
/// Uses regression when the buffer holds at least three samples, otherwise
/// the last two samples.
pub fn heading_rate(buffer: &[(DateTime<Utc>, f64)]) -> Option<f64> {
    if buffer.len() >= 3 {
        let origin = buffer[0].0;
        let samples: Vec<(f64, f64)> = buffer
            .iter()
            .map(|(t, heading)| ((*t - origin).num_milliseconds() as f64 / 1000.0, *heading))
            .collect();

        if let Some(slope) = least_squares_slope(&samples) {
            return Some(slope);
        }
    }

    finite_difference(buffer)
}
