use crate::error::RiskError;
use paper_trade_core::config::AppConfig;
use paper_trade_core::events::Signal;
use paper_trade_core::position::Direction;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::warn;

/// Converts signal confidence into a position size in units, honoring the
/// per-trade notional cap and an adaptive minimum-notional floor.
///
/// The sizer holds only a capital mirror. The orchestrator refreshes it
/// from the ledger after every confirmed capital change; a slightly stale
/// read is tolerable and never blocks.
pub struct PositionSizer {
    current_capital: Decimal,
    max_position_size_pct: Decimal,
}

impl PositionSizer {
    #[must_use]
    pub fn new(initial_capital: Decimal, max_position_size_pct: f64) -> Self {
        Self {
            current_capital: initial_capital,
            max_position_size_pct: Decimal::try_from(max_position_size_pct).unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.trading.initial_capital,
            config.trading.max_position_size_pct,
        )
    }

    /// Sizes a position for `signal`. A confidence of 0.5 yields the
    /// configured cap unscaled; confidence scales the risk percentage
    /// linearly around that pivot, clamped to `[0.1, max_position_size_pct]`.
    ///
    /// `reference_price` substitutes for non-positive entry or stop prices
    /// on the signal. Returns `Ok(None)` for flat signals, wrong-side
    /// stops, exhausted capital, or notionals under the floor.
    ///
    /// # Errors
    /// `RiskError::NonPositivePrice` when no positive entry price can be
    /// derived.
    pub fn size_position(
        &self,
        signal: &Signal,
        reference_price: Decimal,
    ) -> Result<Option<Decimal>, RiskError> {
        let Some(direction) = signal.action.direction() else {
            return Ok(None);
        };

        let entry_price = if signal.entry_price > Decimal::ZERO {
            signal.entry_price
        } else {
            reference_price
        };
        let stop_loss = if signal.stop_loss_price > Decimal::ZERO {
            signal.stop_loss_price
        } else {
            reference_price
        };
        if entry_price <= Decimal::ZERO {
            return Err(RiskError::NonPositivePrice {
                symbol: signal.symbol.clone(),
                price: entry_price,
            });
        }

        let risk_per_unit = match direction {
            Direction::Long => entry_price - stop_loss,
            Direction::Short => stop_loss - entry_price,
        };
        if risk_per_unit <= Decimal::ZERO {
            warn!(
                symbol = %signal.symbol,
                entry = %entry_price,
                stop = %stop_loss,
                "stop loss on the wrong side of entry, skipping"
            );
            return Ok(None);
        }

        let confidence = if signal.confidence <= 0.0 {
            0.5
        } else {
            signal.confidence
        };
        let max_pct = self.max_position_size_pct.to_f64().unwrap_or(0.0);
        let base_risk_pct = f64::max(0.1, f64::min(max_pct * (confidence / 0.5), max_pct));

        if self.current_capital <= Decimal::ZERO {
            warn!(capital = %self.current_capital, "no capital available for sizing");
            return Ok(None);
        }
        let risk_amount = self.current_capital * Decimal::try_from(base_risk_pct).unwrap_or_default()
            / Decimal::ONE_HUNDRED;
        let raw_size = risk_amount / risk_per_unit;

        let max_position_value =
            self.current_capital * self.max_position_size_pct / Decimal::ONE_HUNDRED;
        let max_size = max_position_value / entry_price;
        let size = raw_size.min(max_size);

        let notional = size * entry_price;
        let floor = if self.current_capital < dec!(20) {
            (max_position_value * dec!(0.5)).max(dec!(0.05))
        } else {
            (self.current_capital * dec!(0.05)).min(dec!(0.5)).max(dec!(0.10))
        };
        // 0.1% relative slack on the floor comparison.
        if notional < floor * dec!(0.999) {
            warn!(
                symbol = %signal.symbol,
                notional = %notional,
                floor = %floor,
                "position notional below minimum, skipping"
            );
            return Ok(None);
        }

        if size < dec!(0.000001) || notional <= Decimal::ZERO {
            return Ok(None);
        }

        Ok(Some(size))
    }

    /// Overwrites the capital mirror. Call after every ledger-confirmed
    /// open or close.
    pub fn update_capital(&mut self, capital: Decimal) {
        self.current_capital = capital;
    }

    #[must_use]
    pub const fn current_capital(&self) -> Decimal {
        self.current_capital
    }
}
