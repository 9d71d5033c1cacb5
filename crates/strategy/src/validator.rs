use paper_trade_core::config::ValidationConfig;
use paper_trade_core::events::{IndicatorSnapshot, Signal, SignalAction};
use rust_decimal::prelude::ToPrimitive;
use tracing::warn;

/// Rule-based risk screen applied to a signal after a strategy proposes
/// it and before any capital is committed.
///
/// Approves when the implied risk/reward ratio meets the configured
/// minimum and market volatility sits under the ceiling. Degenerate
/// inputs (non-finite ratio or volatility) count as a validator failure
/// and fall back to the `fail_open` policy.
pub struct SignalValidator {
    enabled: bool,
    fail_open: bool,
    min_risk_reward: f64,
    max_volatility: f64,
}

impl SignalValidator {
    #[must_use]
    pub const fn new(min_risk_reward: f64, max_volatility: f64) -> Self {
        Self {
            enabled: true,
            fail_open: true,
            min_risk_reward,
            max_volatility,
        }
    }

    #[must_use]
    pub const fn from_config(config: &ValidationConfig) -> Self {
        Self {
            enabled: config.enabled,
            fail_open: config.fail_open,
            min_risk_reward: config.min_risk_reward,
            max_volatility: config.max_volatility,
        }
    }

    /// Risk/reward ratio implied by the signal's levels. Wrong-side
    /// stops and `Flat` signals read as zero.
    fn risk_reward(signal: &Signal) -> f64 {
        let entry = signal.entry_price.to_f64().unwrap_or(0.0);
        let stop = signal.stop_loss_price.to_f64().unwrap_or(0.0);
        let target = signal.take_profit_price.to_f64().unwrap_or(0.0);
        let (risk, reward) = match signal.action {
            SignalAction::Long => (entry - stop, target - entry),
            SignalAction::Short => (stop - entry, entry - target),
            SignalAction::Flat => (0.0, 0.0),
        };
        if risk > 0.0 {
            reward / risk
        } else {
            0.0
        }
    }

    pub fn approves(&self, signal: &Signal, snapshot: &IndicatorSnapshot) -> bool {
        if !self.enabled {
            return true;
        }

        let risk_reward = Self::risk_reward(signal);
        let volatility = snapshot.volatility;

        if !risk_reward.is_finite() || !volatility.is_finite() {
            warn!(
                symbol = %signal.symbol,
                fail_open = self.fail_open,
                "signal risk check degenerate"
            );
            return self.fail_open;
        }

        if risk_reward < self.min_risk_reward {
            warn!(
                symbol = %signal.symbol,
                risk_reward,
                min_risk_reward = self.min_risk_reward,
                "signal rejected: risk/reward too low"
            );
            return false;
        }
        if volatility > self.max_volatility {
            warn!(
                symbol = %signal.symbol,
                volatility,
                max_volatility = self.max_volatility,
                "signal rejected: volatility too high"
            );
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn signal(action: SignalAction, entry: Decimal, stop: Decimal, target: Decimal) -> Signal {
        Signal {
            symbol: "BTCUSDT".to_string(),
            action,
            confidence: 0.8,
            entry_price: entry,
            stop_loss_price: stop,
            take_profit_price: target,
            reason: "test".to_string(),
        }
    }

    fn calm_snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot::neutral(dec!(100))
    }

    #[test]
    fn generous_risk_reward_is_approved() {
        let validator = SignalValidator::new(0.5, 0.05);
        let s = signal(SignalAction::Long, dec!(100), dec!(95), dec!(110));
        assert!(validator.approves(&s, &calm_snapshot()));
    }

    #[test]
    fn thin_reward_is_rejected() {
        let validator = SignalValidator::new(0.5, 0.05);
        let s = signal(SignalAction::Long, dec!(100), dec!(95), dec!(101));
        assert!(!validator.approves(&s, &calm_snapshot()));
    }

    #[test]
    fn short_risk_reward_uses_mirrored_legs() {
        let validator = SignalValidator::new(0.5, 0.05);
        let s = signal(SignalAction::Short, dec!(100), dec!(104), dec!(92));
        assert!(validator.approves(&s, &calm_snapshot()));
    }

    #[test]
    fn wrong_side_stop_reads_as_zero_ratio() {
        let validator = SignalValidator::new(0.5, 0.05);
        let s = signal(SignalAction::Long, dec!(100), dec!(105), dec!(110));
        assert!(!validator.approves(&s, &calm_snapshot()));
    }

    #[test]
    fn boundary_values_are_approved() {
        let validator = SignalValidator::new(0.5, 0.05);
        let s = signal(SignalAction::Long, dec!(100), dec!(96), dec!(102));
        let mut snapshot = calm_snapshot();
        snapshot.volatility = 0.05;
        assert!(validator.approves(&s, &snapshot));
    }

    #[test]
    fn high_volatility_is_rejected() {
        let validator = SignalValidator::new(0.5, 0.05);
        let s = signal(SignalAction::Long, dec!(100), dec!(95), dec!(110));
        let mut snapshot = calm_snapshot();
        snapshot.volatility = 0.08;
        assert!(!validator.approves(&s, &snapshot));
    }

    #[test]
    fn disabled_validator_approves_everything() {
        let config = ValidationConfig {
            enabled: false,
            fail_open: true,
            min_risk_reward: 0.5,
            max_volatility: 0.05,
        };
        let validator = SignalValidator::from_config(&config);
        let s = signal(SignalAction::Long, dec!(100), dec!(105), dec!(90));
        assert!(validator.approves(&s, &calm_snapshot()));
    }

    #[test]
    fn degenerate_inputs_follow_fail_open_policy() {
        let mut snapshot = calm_snapshot();
        snapshot.volatility = f64::NAN;
        let s = signal(SignalAction::Long, dec!(100), dec!(95), dec!(110));

        let open = SignalValidator::new(0.5, 0.05);
        assert!(open.approves(&s, &snapshot));

        let closed = SignalValidator::from_config(&ValidationConfig {
            enabled: true,
            fail_open: false,
            min_risk_reward: 0.5,
            max_volatility: 0.05,
        });
        assert!(!closed.approves(&s, &snapshot));
    }
}
