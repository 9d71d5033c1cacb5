pub mod breakout;
pub mod indicators;
pub mod mean_reversion;
pub mod momentum;
pub mod screen;
pub mod trend_following;
pub mod validator;

pub use breakout::BreakoutStrategy;
pub use mean_reversion::MeanReversionStrategy;
pub use momentum::MomentumStrategy;
pub use trend_following::TrendFollowingStrategy;
pub use validator::SignalValidator;

use paper_trade_core::config::StrategiesConfig;
use paper_trade_core::traits::Strategy;

/// Builds the configured strategy list in priority order; each signal
/// cycle asks them in turn and the first one to produce a signal wins.
#[must_use]
pub fn strategies_from_config(config: &StrategiesConfig) -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(MomentumStrategy::from_config(&config.momentum)),
        Box::new(MeanReversionStrategy::from_config(&config.mean_reversion)),
        Box::new(BreakoutStrategy::from_config(&config.breakout)),
        Box::new(TrendFollowingStrategy::from_config(&config.trend_following)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builds_all_four_strategies_in_priority_order() {
        let strategies = strategies_from_config(&StrategiesConfig::default());
        let names: Vec<&str> = strategies.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["Momentum", "Mean Reversion", "Breakout", "Trend Following"]
        );
    }
}
