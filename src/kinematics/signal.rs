//! Freshness of the turn-rate signal.
//!
//! ```text
//! Fresh --[age > fresh_window]--> Held --[age > stale_after]--> Stale
//!   ^                                                              |
//!   +------------------[fresh sample observed]--------------------+
//! ```
//!
//! `age` is the wall-clock time since the last fresh sample was observed.
//! While Fresh the last computed turn rate is held as-is and drives the bank.
//! While Held the rate is frozen, it no longer drives the bank, and the last bank
//! target bleeds toward level at the reduced rate. Once Stale the turn is
//! abandoned and decay runs at full rate.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::EstimatorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalState {
    Fresh,
    Held,
    Stale,
}

impl SignalState {
    /// Classify the signal from the age of the last fresh sample.
    /// `None` means no fresh sample was ever observed.
    pub fn from_age(age: Option<Duration>, config: &EstimatorConfig) -> Self {
        let Some(age) = age else {
            return SignalState::Stale;
        };

        let age_ms = age.num_milliseconds();
        if age_ms <= config.fresh_window_ms {
            SignalState::Fresh
        } else if age_ms <= config.stale_after_ms {
            SignalState::Held
        } else {
            SignalState::Stale
        }
    }

    /// Decay-to-level rate in degrees per second for this state
    pub fn decay_rate(self, config: &EstimatorConfig) -> f64 {
        match self {
            SignalState::Held => config.held_decay_rate_deg_per_sec,
            SignalState::Fresh | SignalState::Stale => config.decay_rate_deg_per_sec,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalState::Fresh => "fresh",
            SignalState::Held => "held",
            SignalState::Stale => "stale",
        }
    }
}

impl fmt::Display for SignalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_by_age() {
        let config = EstimatorConfig::default();
        assert_eq!(
            SignalState::from_age(Some(Duration::zero()), &config),
            SignalState::Fresh
        );
        assert_eq!(
            SignalState::from_age(Some(Duration::milliseconds(config.fresh_window_ms)), &config),
            SignalState::Fresh
        );
        assert_eq!(
            SignalState::from_age(
                Some(Duration::milliseconds(config.fresh_window_ms + 1)),
                &config
            ),
            SignalState::Held
        );
        assert_eq!(
            SignalState::from_age(
                Some(Duration::milliseconds(config.stale_after_ms + 1)),
                &config
            ),
            SignalState::Stale
        );
        assert_eq!(SignalState::from_age(None, &config), SignalState::Stale);
    }

    #[test]
    fn test_held_decays_slower() {
        let config = EstimatorConfig::default();
        assert!(SignalState::Held.decay_rate(&config) < SignalState::Stale.decay_rate(&config));
        assert_eq!(
            SignalState::Fresh.decay_rate(&config),
            SignalState::Stale.decay_rate(&config)
        );
    }
}
