use anyhow::{bail, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Execution mode for order handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Simulated fills with slippage and fees (no real money)
    #[default]
    Paper,
    /// Real orders through the signed exchange REST client
    Live,
}

/// Where market prices and candles come from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarketDataSource {
    /// Synthetic random-walk data (no network)
    #[default]
    Mock,
    /// Bybit v5 public REST endpoints
    Bybit,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub strategies: StrategiesConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    #[serde(default = "default_initial_capital")]
    pub initial_capital: Decimal,
    /// Max notional per position as a percentage of capital
    #[serde(default = "default_max_position_size_pct")]
    pub max_position_size_pct: f64,
    /// Taker fee per side, applied at both entry and exit
    #[serde(default = "default_fee_rate")]
    pub fee_rate: f64,
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default = "default_signal_interval_secs")]
    pub signal_interval_secs: u64,
    #[serde(default = "default_monitor_interval_secs")]
    pub monitor_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_max_drawdown_pct")]
    pub max_drawdown_pct: f64,
    #[serde(default = "default_max_daily_loss_pct")]
    pub max_daily_loss_pct: f64,
    #[serde(default = "default_max_daily_trades")]
    pub max_daily_trades: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Slippage half-width; fills land within +/- this fraction of price
    #[serde(default = "default_slippage_pct")]
    pub slippage_pct: f64,
    /// Seed for the fill RNG; entropy when unset
    #[serde(default)]
    pub random_seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub min_confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategiesConfig {
    #[serde(default = "default_momentum")]
    pub momentum: StrategyConfig,
    #[serde(default = "default_mean_reversion")]
    pub mean_reversion: StrategyConfig,
    #[serde(default = "default_breakout")]
    pub breakout: StrategyConfig,
    #[serde(default = "default_trend_following")]
    pub trend_following: StrategyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Approve signals when the validator itself errors
    #[serde(default = "default_true")]
    pub fail_open: bool,
    #[serde(default = "default_min_risk_reward")]
    pub min_risk_reward: f64,
    #[serde(default = "default_max_volatility")]
    pub max_volatility: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default)]
    pub source: MarketDataSource,
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    #[serde(default = "default_candle_limit")]
    pub candle_limit: usize,
    #[serde(default = "default_candle_interval_min")]
    pub candle_interval_min: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_trades_file")]
    pub trades_file: String,
}

fn default_initial_capital() -> Decimal {
    Decimal::from(10)
}

const fn default_max_position_size_pct() -> f64 {
    1.0 // 1% of capital per position
}

const fn default_fee_rate() -> f64 {
    0.001 // 0.1% per side
}

const fn default_signal_interval_secs() -> u64 {
    30
}

const fn default_monitor_interval_secs() -> u64 {
    5
}

const fn default_max_drawdown_pct() -> f64 {
    5.0
}

const fn default_max_daily_loss_pct() -> f64 {
    2.0
}

const fn default_max_daily_trades() -> u32 {
    100
}

const fn default_slippage_pct() -> f64 {
    0.001 // 0.1% either way
}

const fn default_true() -> bool {
    true
}

const fn default_momentum() -> StrategyConfig {
    StrategyConfig {
        enabled: true,
        min_confidence: 0.6,
    }
}

const fn default_mean_reversion() -> StrategyConfig {
    StrategyConfig {
        enabled: true,
        min_confidence: 0.65,
    }
}

const fn default_breakout() -> StrategyConfig {
    StrategyConfig {
        enabled: true,
        min_confidence: 0.7,
    }
}

const fn default_trend_following() -> StrategyConfig {
    StrategyConfig {
        enabled: true,
        min_confidence: 0.75,
    }
}

const fn default_min_risk_reward() -> f64 {
    0.5
}

const fn default_max_volatility() -> f64 {
    0.05
}

fn default_symbols() -> Vec<String> {
    ["BTCUSDT", "ETHUSDT", "BNBUSDT", "SOLUSDT", "XRPUSDT"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

const fn default_candle_limit() -> usize {
    200
}

const fn default_candle_interval_min() -> u32 {
    5
}

fn default_rest_url() -> String {
    "https://api-testnet.bybit.com".to_string()
}

const fn default_recv_window_ms() -> u64 {
    5000
}

fn default_trades_file() -> String {
    "trades.json".to_string()
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            initial_capital: default_initial_capital(),
            max_position_size_pct: default_max_position_size_pct(),
            fee_rate: default_fee_rate(),
            mode: ExecutionMode::default(),
            signal_interval_secs: default_signal_interval_secs(),
            monitor_interval_secs: default_monitor_interval_secs(),
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_drawdown_pct: default_max_drawdown_pct(),
            max_daily_loss_pct: default_max_daily_loss_pct(),
            max_daily_trades: default_max_daily_trades(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            slippage_pct: default_slippage_pct(),
            random_seed: None,
        }
    }
}

impl Default for StrategiesConfig {
    fn default() -> Self {
        Self {
            momentum: default_momentum(),
            mean_reversion: default_mean_reversion(),
            breakout: default_breakout(),
            trend_following: default_trend_following(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fail_open: true,
            min_risk_reward: default_min_risk_reward(),
            max_volatility: default_max_volatility(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: MarketDataSource::default(),
            symbols: default_symbols(),
            candle_limit: default_candle_limit(),
            candle_interval_min: default_candle_interval_min(),
        }
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            rest_url: default_rest_url(),
            api_key: String::new(),
            api_secret: String::new(),
            recv_window_ms: default_recv_window_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            trades_file: default_trades_file(),
        }
    }
}

impl AppConfig {
    /// Bounds-checks every knob that the risk ledger, sizer, and executor
    /// assume to be sane.
    ///
    /// # Errors
    /// Returns an error describing the first out-of-range field.
    pub fn validate(&self) -> Result<()> {
        if self.trading.initial_capital <= Decimal::ZERO {
            bail!(
                "initial_capital must be positive, got {}",
                self.trading.initial_capital
            );
        }
        if self.trading.max_position_size_pct <= 0.0 || self.trading.max_position_size_pct > 100.0 {
            bail!(
                "max_position_size_pct must be in (0, 100], got {}",
                self.trading.max_position_size_pct
            );
        }
        if !(0.0..1.0).contains(&self.trading.fee_rate) {
            bail!("fee_rate must be in [0, 1), got {}", self.trading.fee_rate);
        }
        if self.trading.signal_interval_secs == 0 || self.trading.monitor_interval_secs == 0 {
            bail!("trading intervals must be at least 1 second");
        }
        if self.risk.max_drawdown_pct <= 0.0 || self.risk.max_drawdown_pct > 100.0 {
            bail!(
                "max_drawdown_pct must be in (0, 100], got {}",
                self.risk.max_drawdown_pct
            );
        }
        if self.risk.max_daily_loss_pct <= 0.0 || self.risk.max_daily_loss_pct > 100.0 {
            bail!(
                "max_daily_loss_pct must be in (0, 100], got {}",
                self.risk.max_daily_loss_pct
            );
        }
        if self.risk.max_daily_trades == 0 {
            bail!("max_daily_trades must be at least 1");
        }
        if !(0.0..1.0).contains(&self.execution.slippage_pct) {
            bail!(
                "slippage_pct must be in [0, 1), got {}",
                self.execution.slippage_pct
            );
        }
        if self.validation.min_risk_reward < 0.0 {
            bail!(
                "min_risk_reward must be non-negative, got {}",
                self.validation.min_risk_reward
            );
        }
        if self.data.symbols.is_empty() {
            bail!("data.symbols must list at least one symbol");
        }
        if self.data.candle_limit < 30 {
            bail!(
                "candle_limit must be at least 30 for indicator warmup, got {}",
                self.data.candle_limit
            );
        }
        Ok(())
    }
}
