use crate::config::IngestConfig;
use crate::telemetry::FlightPhase;

/// Classify the flight phase from a single snapshot's altitude and speeds.
///
/// Checks run in a fixed order: ground, climb, descent, cruise, then enroute
/// as the catch-all.
pub fn derive_phase(
    altitude_ft: f64,
    vertical_speed_fpm: f64,
    ground_speed_kt: f64,
    config: &IngestConfig,
) -> FlightPhase {
    if altitude_ft < config.ground_altitude_ft
        && ground_speed_kt < config.ground_max_speed_kt
        && vertical_speed_fpm.abs() < config.ground_max_vertical_fpm
    {
        return FlightPhase::Ground;
    }

    if vertical_speed_fpm > config.climb_threshold_fpm {
        return FlightPhase::Climb;
    }

    if vertical_speed_fpm < config.descent_threshold_fpm {
        return FlightPhase::Descent;
    }

    if altitude_ft >= config.cruise_altitude_ft
        && vertical_speed_fpm.abs() < config.level_threshold_fpm
    {
        return FlightPhase::Cruise;
    }

    FlightPhase::Enroute
}
