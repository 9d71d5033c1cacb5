use crate::config::AppConfig;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from `config.toml` merged with `PAPER_TRADE_*`
    /// environment variables, then bounds-checks it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or a value is out of
    /// range.
    pub fn load() -> Result<AppConfig> {
        Self::load_from("config.toml")
    }

    /// Loads configuration from an explicit TOML path. Nested fields are
    /// addressed in the environment with `__`, e.g.
    /// `PAPER_TRADE_TRADING__FEE_RATE=0.002`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or a value is out of
    /// range.
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig> {
        let path = path.as_ref();
        let config: AppConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("PAPER_TRADE_").split("__"))
            .extract()
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;

        config.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn loads_defaults_when_file_missing() {
        figment::Jail::expect_with(|jail| {
            let config = ConfigLoader::load_from("missing.toml").expect("defaults should load");
            assert_eq!(config.trading.initial_capital, dec!(10));
            assert_eq!(config.risk.max_daily_trades, 100);
            let _ = jail;
            Ok(())
        });
    }

    #[test]
    fn toml_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [trading]
                initial_capital = 250
                fee_rate = 0.002

                [risk]
                max_daily_trades = 7
                "#,
            )?;
            let config = ConfigLoader::load_from("config.toml").expect("config should load");
            assert_eq!(config.trading.initial_capital, dec!(250));
            assert!((config.trading.fee_rate - 0.002).abs() < f64::EPSILON);
            assert_eq!(config.risk.max_daily_trades, 7);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_toml() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [risk]
                max_drawdown_pct = 10.0
                "#,
            )?;
            jail.set_env("PAPER_TRADE_RISK__MAX_DRAWDOWN_PCT", "3.5");
            let config = ConfigLoader::load_from("config.toml").expect("config should load");
            assert!((config.risk.max_drawdown_pct - 3.5).abs() < f64::EPSILON);
            Ok(())
        });
    }

    #[test]
    fn invalid_values_fail_loudly() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [trading]
                initial_capital = 0
                "#,
            )?;
            assert!(ConfigLoader::load_from("config.toml").is_err());
            Ok(())
        });
    }
}
