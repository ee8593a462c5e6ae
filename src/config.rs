use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Ingestion tuning: phase classification thresholds and live history size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Below this altitude an aircraft with low speeds is on the ground
    pub ground_altitude_ft: f64,
    pub ground_max_speed_kt: f64,
    pub ground_max_vertical_fpm: f64,
    pub climb_threshold_fpm: f64,
    pub descent_threshold_fpm: f64,
    pub cruise_altitude_ft: f64,
    /// |vertical speed| below this counts as level flight for cruise
    pub level_threshold_fpm: f64,
    /// Accepted positions kept per entity for path drawing
    pub live_history_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            ground_altitude_ft: 500.0,
            ground_max_speed_kt: 50.0,
            ground_max_vertical_fpm: 200.0,
            climb_threshold_fpm: 500.0,
            descent_threshold_fpm: -500.0,
            cruise_altitude_ft: 18_000.0,
            level_threshold_fpm: 300.0,
            live_history_capacity: 512,
        }
    }
}

/// Kinematic estimator tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub tick_interval_ms: u64,
    /// Heading change (deg) that makes a sample fresh
    pub heading_epsilon_deg: f64,
    /// Ground speed change (kt) that makes a sample fresh
    pub ground_speed_epsilon_kt: f64,
    /// Trailing regression window
    pub regression_window_secs: f64,
    /// Below this ground speed the turn rate is forced to zero
    pub min_turn_speed_kt: f64,
    /// EMA weight given to the newest turn rate, in (0, 1]
    pub turn_rate_ema_weight: f64,
    pub latch_on_deg_per_sec: f64,
    pub latch_off_deg_per_sec: f64,
    pub latch_min_hold_ms: i64,
    /// Keep the latch after the last fresh sample for this long
    pub data_hold_ms: i64,
    pub max_bank_deg: f64,
    pub sign_min_deg: f64,
    pub sign_hold_ms: i64,
    /// Age of the last fresh sample up to which data counts as fresh
    pub fresh_window_ms: i64,
    /// Age after which data counts as stale and the turn is abandoned
    pub stale_after_ms: i64,
    pub decay_rate_deg_per_sec: f64,
    pub held_decay_rate_deg_per_sec: f64,
    pub max_slew_deg_per_sec: f64,
    /// Pitch degrees per 1000 fpm
    pub pitch_gain: f64,
    pub pitch_limit_deg: f64,
    /// Elapsed time per tick is clamped to this (suspended timers)
    pub max_tick_elapsed_ms: i64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            heading_epsilon_deg: 0.05,
            ground_speed_epsilon_kt: 0.5,
            regression_window_secs: 8.0,
            min_turn_speed_kt: 30.0,
            turn_rate_ema_weight: 0.35,
            latch_on_deg_per_sec: 0.6,
            latch_off_deg_per_sec: 0.3,
            latch_min_hold_ms: 1500,
            data_hold_ms: 8000,
            max_bank_deg: 35.0,
            sign_min_deg: 2.0,
            sign_hold_ms: 800,
            fresh_window_ms: 6000,
            stale_after_ms: 20_000,
            decay_rate_deg_per_sec: 6.0,
            held_decay_rate_deg_per_sec: 2.0,
            max_slew_deg_per_sec: 15.0,
            pitch_gain: 2.0,
            pitch_limit_deg: 15.0,
            max_tick_elapsed_ms: 1000,
        }
    }
}

/// Route geometry tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// History points this close to the live position are dropped
    pub nose_exclusion_km: f64,
    /// History points this close to their predecessor are dropped
    pub min_point_spacing_km: f64,
    /// Interior turn angle above which a point is a spike
    pub despike_max_turn_deg: f64,
    /// Fewer real points than this triggers plan synthesis
    pub backfill_min_points: usize,
    /// First history point matched past this waypoint index gets the plan prefix
    pub late_start_waypoint_index: usize,
    /// Max distance for matching a history point to a waypoint
    pub waypoint_match_km: f64,
    /// Consecutive history points farther apart than this are a gap
    pub gap_distance_km: f64,
    /// Average spacing below which the track is dense enough to smooth
    pub smoothing_max_spacing_km: f64,
    pub smoothing_max_latitude_deg: f64,
    /// Spline sample spacing along a segment
    pub spline_step_km: f64,
    pub spline_max_samples: usize,
    pub max_render_segment_km: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            nose_exclusion_km: 1.0,
            min_point_spacing_km: 0.05,
            despike_max_turn_deg: 150.0,
            backfill_min_points: 5,
            late_start_waypoint_index: 1,
            waypoint_match_km: 50.0,
            gap_distance_km: 150.0,
            smoothing_max_spacing_km: 20.0,
            smoothing_max_latitude_deg: 60.0,
            spline_step_km: 1.0,
            spline_max_samples: 16,
            max_render_segment_km: 100.0,
        }
    }
}

/// Top-level engine configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub ingest: IngestConfig,
    pub estimator: EstimatorConfig,
    pub geometry: GeometryConfig,
}

impl EngineConfig {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let config: EngineConfig =
            toml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(config)
    }

    /// Save config to a TOML file (atomic: write to .tmp then rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        let tmp_path = path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, &contents)
            .with_context(|| format!("Failed to write {:?}", tmp_path))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to rename {:?} to {:?}", tmp_path, path))?;
        Ok(())
    }

    /// Load from the resolved path, or fall back to defaults when no file exists
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        match config_path(explicit) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }
}

/// Resolve the engine config file path.
///
/// Priority:
/// 1. explicit `--config` argument
/// 2. `TRACKLINE_CONFIG` env var
/// 3. `./trackline.toml` when it exists
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var("TRACKLINE_CONFIG") {
        return Some(PathBuf::from(path));
    }

    let local = PathBuf::from("./trackline.toml");
    local.exists().then_some(local)
}
