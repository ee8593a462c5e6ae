//! Synthetic bank and pitch for the focused aircraft.
//!
//! Telemetry carries heading, ground speed and vertical speed but no attitude.
//! The estimator derives a turn rate from the heading history, converts it to a
//! coordinated-turn bank angle and then smooths the result so the displayed
//! attitude moves steadily regardless of how irregularly telemetry arrives.
//!
//! The estimator runs on the render tick, not on telemetry arrival. Most ticks
//! see the same sample as the previous one; only samples that differ from the
//! last fresh one feed the regression.

mod bank;
mod regression;
mod signal;

pub use bank::{SignStickiness, TurnLatch, coordinated_turn_bank, move_toward};
pub use regression::{finite_difference, heading_rate, least_squares_slope};
pub use signal::SignalState;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::trace;

use crate::config::EstimatorConfig;
use crate::geo::shortest_delta;

/// The raw values the estimator reads from the focused entity each tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KinematicSample {
    pub timestamp: DateTime<Utc>,
    pub heading_deg: f64,
    pub ground_speed_kt: f64,
    pub vertical_speed_fpm: f64,
    pub altitude_ft: f64,
}

/// Per-tick estimator output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttitudeEstimate {
    pub displayed_bank_deg: f64,
    pub pitch_deg: f64,
    pub turning: bool,
    pub turn_rate_deg_per_sec: f64,
    pub signal_state: SignalState,
}

/// Mutable estimator state, scoped to a single focus
#[derive(Debug, Clone, Default)]
pub struct KinematicEstimatorState {
    /// Continuous heading, free of the 359 -> 0 wrap
    pub unwrapped_heading: Option<f64>,
    last_raw_heading: f64,
    /// `(sample time, unwrapped heading)` of fresh samples inside the window
    pub regression_buffer: VecDeque<(DateTime<Utc>, f64)>,
    pub turn_rate_ema: f64,
    pub displayed_bank: f64,
    /// Target the display slews toward; decays toward level when not turning
    target_bank: f64,
    pub turning: TurnLatch,
    /// Wall-clock time at which the last fresh sample was observed
    pub last_fresh_timestamp: Option<DateTime<Utc>>,
    last_fresh_heading: f64,
    last_fresh_ground_speed: f64,
    /// Last measured (unsmoothed) turn rate, held between fresh samples
    pub last_turn_rate: f64,
    pub sign: SignStickiness,
    last_tick: Option<DateTime<Utc>>,
}

/// Turn-rate and bank estimator for the focused entity
#[derive(Debug, Clone)]
pub struct KinematicEstimator {
    config: EstimatorConfig,
    state: KinematicEstimatorState,
}

impl KinematicEstimator {
    /// A fresh estimator at zero bank and zero turn rate
    pub fn new(config: EstimatorConfig) -> Self {
        Self {
            config,
            state: KinematicEstimatorState::default(),
        }
    }

    pub fn state(&self) -> &KinematicEstimatorState {
        &self.state
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Advance the estimator by one render tick at wall-clock time `now`
    pub fn tick(&mut self, sample: &KinematicSample, now: DateTime<Utc>) -> AttitudeEstimate {
        let config = &self.config;
        let state = &mut self.state;

        let elapsed_secs = match state.last_tick {
            Some(last) => {
                let ms = (now - last).num_milliseconds().clamp(0, config.max_tick_elapsed_ms);
                ms as f64 / 1000.0
            }
            None => 0.0,
        };
        state.last_tick = Some(now);

        let heading = unwrap_heading(state, sample.heading_deg);
        let fresh = is_fresh(state, heading, sample.ground_speed_kt, config);

        if fresh {
            state.last_fresh_timestamp = Some(now);
            state.last_fresh_heading = heading;
            state.last_fresh_ground_speed = sample.ground_speed_kt;

            push_regression_sample(state, sample.timestamp, heading, config);
            state.last_turn_rate = measure_turn_rate(state, sample.ground_speed_kt, config);
        }

        let signal = SignalState::from_age(state.last_fresh_timestamp.map(|t| now - t), config);

        // Fresh: smooth toward the held rate; Held: rate frozen; Stale: abandoned
        match signal {
            SignalState::Fresh => {
                let weight = config.turn_rate_ema_weight.clamp(0.0, 1.0);
                state.turn_rate_ema += weight * (state.last_turn_rate - state.turn_rate_ema);
            }
            SignalState::Held => {}
            SignalState::Stale => {
                state.last_turn_rate = 0.0;
                state.turn_rate_ema = 0.0;
            }
        }

        let in_data_hold = state
            .last_fresh_timestamp
            .map(|t| (now - t) <= Duration::milliseconds(config.data_hold_ms))
            .unwrap_or(false)
            && state.last_turn_rate.abs() > config.latch_off_deg_per_sec;
        let turning = state
            .turning
            .update(state.turn_rate_ema, in_data_hold, now, config);

        // Only a fresh signal drives the bank; otherwise the last target bleeds off
        // at the rate for the signal's age
        if turning && signal == SignalState::Fresh {
            let raw_target = coordinated_turn_bank(
                state.turn_rate_ema,
                sample.ground_speed_kt,
                config.max_bank_deg,
            );
            state.target_bank = state.sign.apply(raw_target, now, config);
        } else {
            let step = signal.decay_rate(config) * elapsed_secs;
            state.target_bank = move_toward(state.target_bank, 0.0, step);
        }
        state.target_bank = state
            .target_bank
            .clamp(-config.max_bank_deg, config.max_bank_deg);

        let slew_step = config.max_slew_deg_per_sec * elapsed_secs;
        state.displayed_bank = move_toward(state.displayed_bank, state.target_bank, slew_step)
            .clamp(-config.max_bank_deg, config.max_bank_deg);

        trace!(
            "tick: heading={:.2} fresh={} signal={} rate={:.3} ema={:.3} turning={} bank={:.2}",
            heading, fresh, signal, state.last_turn_rate, state.turn_rate_ema, turning, state.displayed_bank
        );

        AttitudeEstimate {
            displayed_bank_deg: state.displayed_bank,
            pitch_deg: pitch_from_vertical_speed(sample.vertical_speed_fpm, config),
            turning,
            turn_rate_deg_per_sec: state.turn_rate_ema,
            signal_state: signal,
        }
    }
}

/// Pitch attitude in degrees from vertical speed, unfiltered
pub fn pitch_from_vertical_speed(vertical_speed_fpm: f64, config: &EstimatorConfig) -> f64 {
    if !vertical_speed_fpm.is_finite() {
        return 0.0;
    }
    (vertical_speed_fpm / 1000.0 * config.pitch_gain)
        .clamp(-config.pitch_limit_deg, config.pitch_limit_deg)
}

fn unwrap_heading(state: &mut KinematicEstimatorState, raw_heading: f64) -> f64 {
    let unwrapped = match state.unwrapped_heading {
        None => raw_heading,
        Some(previous) => previous + shortest_delta(state.last_raw_heading, raw_heading),
    };
    state.last_raw_heading = raw_heading;
    state.unwrapped_heading = Some(unwrapped);
    unwrapped
}

fn is_fresh(
    state: &KinematicEstimatorState,
    heading: f64,
    ground_speed_kt: f64,
    config: &EstimatorConfig,
) -> bool {
    // The very first sample of a focus always counts
    if state.last_fresh_timestamp.is_none() {
        return true;
    }

    (heading - state.last_fresh_heading).abs() > config.heading_epsilon_deg
        || (ground_speed_kt - state.last_fresh_ground_speed).abs() > config.ground_speed_epsilon_kt
}

fn push_regression_sample(
    state: &mut KinematicEstimatorState,
    sample_time: DateTime<Utc>,
    heading: f64,
    config: &EstimatorConfig,
) {
    state.regression_buffer.push_back((sample_time, heading));

    let window = Duration::milliseconds((config.regression_window_secs * 1000.0) as i64);
    while let Some((oldest, _)) = state.regression_buffer.front() {
        if sample_time - *oldest > window {
            state.regression_buffer.pop_front();
        } else {
            break;
        }
    }
}

fn measure_turn_rate(
    state: &KinematicEstimatorState,
    ground_speed_kt: f64,
    config: &EstimatorConfig,
) -> f64 {
    if ground_speed_kt < config.min_turn_speed_kt {
        return 0.0;
    }

    let buffer: Vec<(DateTime<Utc>, f64)> = state.regression_buffer.iter().copied().collect();
    match heading_rate(&buffer) {
        Some(rate) => rate,
        // One sample, or no time spread: nothing new to say about the rate
        None if buffer.len() < 2 => 0.0,
        None => state.last_turn_rate,
    }
}
