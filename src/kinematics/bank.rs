use chrono::{DateTime, Utc};

use crate::config::EstimatorConfig;
use crate::geo::MPS_PER_KNOT;

const GRAVITY_MPS2: f64 = 9.80665;

/// Bank angle of a coordinated turn at `turn_rate_deg_per_sec` and ground speed,
/// signed like the turn rate and capped at `max_bank_deg`
pub fn coordinated_turn_bank(turn_rate_deg_per_sec: f64, ground_speed_kt: f64, max_bank_deg: f64) -> f64 {
    let omega = turn_rate_deg_per_sec.abs().to_radians();
    let speed_mps = ground_speed_kt.max(0.0) * MPS_PER_KNOT;
    let bank = (omega * speed_mps / GRAVITY_MPS2).atan().to_degrees();

    turn_rate_deg_per_sec.signum() * bank.min(max_bank_deg)
}

/// Move `current` toward `target` by at most `max_step`, landing exactly on it
pub fn move_toward(current: f64, target: f64, max_step: f64) -> f64 {
    let delta = target - current;
    if delta.abs() <= max_step {
        target
    } else {
        current + delta.signum() * max_step
    }
}

fn sign_of(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

/// Keeps the roll direction from flickering when the target hovers around zero.
///
/// A reversal is taken only once the new direction has persisted for
/// `sign_hold_ms` and the target is at least `sign_min_deg` deep. Until then
/// the previous direction is kept with the new magnitude.
#[derive(Debug, Clone, Default)]
pub struct SignStickiness {
    roll_sign: i8,
    last_sign_change: Option<DateTime<Utc>>,
    pending: Option<(i8, DateTime<Utc>)>,
}

impl SignStickiness {
    pub fn roll_sign(&self) -> i8 {
        self.roll_sign
    }

    pub fn last_sign_change(&self) -> Option<DateTime<Utc>> {
        self.last_sign_change
    }

    pub fn apply(&mut self, target: f64, now: DateTime<Utc>, config: &EstimatorConfig) -> f64 {
        let magnitude = target.abs();
        let sign = sign_of(target);

        if sign == 0 || sign == self.roll_sign {
            self.pending = None;
            return f64::from(self.roll_sign) * magnitude;
        }

        // First direction after focus: no previous sign to protect
        if self.roll_sign == 0 {
            if magnitude < config.sign_min_deg {
                return 0.0;
            }
            self.accept(sign, now);
            return target;
        }

        let since = match self.pending {
            Some((pending_sign, since)) if pending_sign == sign => since,
            _ => {
                self.pending = Some((sign, now));
                now
            }
        };

        let persisted_ms = (now - since).num_milliseconds();
        if persisted_ms >= config.sign_hold_ms && magnitude >= config.sign_min_deg {
            self.accept(sign, now);
            return target;
        }

        f64::from(self.roll_sign) * magnitude
    }

    fn accept(&mut self, sign: i8, now: DateTime<Utc>) {
        self.roll_sign = sign;
        self.last_sign_change = Some(now);
        self.pending = None;
    }
}

/// Hysteresis latch for the "turning" display state
#[derive(Debug, Clone, Default)]
pub struct TurnLatch {
    latched: bool,
    last_change: Option<DateTime<Utc>>,
}

impl TurnLatch {
    pub fn is_latched(&self) -> bool {
        self.latched
    }

    /// Update the latch from the smoothed rate.
    ///
    /// `in_data_hold` keeps the latch on through a short data stall when the
    /// last measured rate was still above the exit threshold.
    pub fn update(
        &mut self,
        smoothed_rate: f64,
        in_data_hold: bool,
        now: DateTime<Utc>,
        config: &EstimatorConfig,
    ) -> bool {
        let rate = smoothed_rate.abs();

        if !self.latched {
            if rate > config.latch_on_deg_per_sec {
                self.latched = true;
                self.last_change = Some(now);
            }
            return self.latched;
        }

        let held_long_enough = self
            .last_change
            .map(|changed| (now - changed).num_milliseconds() >= config.latch_min_hold_ms)
            .unwrap_or(true);

        if rate < config.latch_off_deg_per_sec && held_long_enough && !in_data_hold {
            self.latched = false;
            self.last_change = Some(now);
        }

        self.latched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_coordinated_turn_standard_rate() {
        // Standard rate turn (3 deg/s) at 120 kt is roughly 18 degrees of bank
        let bank = coordinated_turn_bank(3.0, 120.0, 45.0);
        assert!((bank - 17.9).abs() < 0.5, "got {bank}");
        assert!(coordinated_turn_bank(-3.0, 120.0, 45.0) < 0.0);
    }

    #[test]
    fn test_coordinated_turn_is_capped() {
        assert_eq!(coordinated_turn_bank(10.0, 400.0, 35.0), 35.0);
        assert_eq!(coordinated_turn_bank(-10.0, 400.0, 35.0), -35.0);
        assert_eq!(coordinated_turn_bank(0.0, 400.0, 35.0), 0.0);
    }

    #[test]
    fn test_move_toward_lands_exactly() {
        assert_eq!(move_toward(10.0, 0.0, 3.0), 7.0);
        assert_eq!(move_toward(1.0, 0.0, 3.0), 0.0);
        assert_eq!(move_toward(-1.0, 5.0, 2.5), 1.5);
    }

    #[test]
    fn test_sign_reversal_needs_persistence() {
        let config = EstimatorConfig::default();
        let t0 = Utc::now();
        let mut sticky = SignStickiness::default();

        assert_eq!(sticky.apply(10.0, t0, &config), 10.0);
        assert_eq!(sticky.roll_sign(), 1);

        // Reversal starts: previous sign is kept with the new magnitude
        assert_eq!(sticky.apply(-6.0, t0 + Duration::milliseconds(100), &config), 6.0);
        assert_eq!(sticky.apply(-6.0, t0 + Duration::milliseconds(500), &config), 6.0);

        let accepted_at = t0 + Duration::milliseconds(100 + config.sign_hold_ms);
        assert_eq!(sticky.apply(-6.0, accepted_at, &config), -6.0);
        assert_eq!(sticky.roll_sign(), -1);
        assert_eq!(sticky.last_sign_change(), Some(accepted_at));
    }

    #[test]
    fn test_shallow_reversal_is_never_taken() {
        let config = EstimatorConfig::default();
        let t0 = Utc::now();
        let mut sticky = SignStickiness::default();
        sticky.apply(10.0, t0, &config);

        for i in 1..50 {
            let out = sticky.apply(-1.0, t0 + Duration::milliseconds(100 * i), &config);
            assert_eq!(out, 1.0);
        }
        assert_eq!(sticky.roll_sign(), 1);
    }

    #[test]
    fn test_oscillation_does_not_flip_sign() {
        let config = EstimatorConfig::default();
        let t0 = Utc::now();
        let mut sticky = SignStickiness::default();

        let mut flips = 0;
        let mut previous = 0.0_f64;
        for i in 0..200 {
            let target = if i % 2 == 0 { 5.0 } else { -5.0 };
            let out = sticky.apply(target, t0 + Duration::milliseconds(100 * i), &config);
            if previous != 0.0 && out.signum() != previous.signum() {
                flips += 1;
            }
            previous = out;
        }
        assert_eq!(flips, 0);
    }

    #[test]
    fn test_latch_hysteresis_and_hold() {
        let config = EstimatorConfig::default();
        let t0 = Utc::now();
        let mut latch = TurnLatch::default();

        // Between the thresholds: stays off
        assert!(!latch.update(0.5, false, t0, &config));
        assert!(latch.update(1.0, false, t0, &config));

        // Below the exit threshold but inside the minimum hold
        assert!(latch.update(0.1, false, t0 + Duration::milliseconds(500), &config));
        // Between thresholds after the hold: stays on
        assert!(latch.update(0.45, false, t0 + Duration::seconds(3), &config));
        // Data hold keeps it on
        assert!(latch.update(0.1, true, t0 + Duration::seconds(4), &config));
        assert!(!latch.update(0.1, false, t0 + Duration::seconds(5), &config));
    }
}
