use paper_trade_core::events::{Signal, SignalAction};
use rust_decimal::Decimal;

/// Final screen every strategy applies to its own output before
/// returning it.
///
/// Rejects signals from a disabled strategy, signals below the
/// strategy's confidence threshold, non-positive prices, and stops or
/// targets on the wrong side of the entry (Long wants
/// `stop < entry < target`, Short the reverse). `Flat` carries no
/// direction so it only has to pass the price checks.
#[must_use]
pub fn screen_signal(enabled: bool, min_confidence: f64, signal: Signal) -> Option<Signal> {
    if !enabled {
        return None;
    }
    if signal.confidence < min_confidence {
        return None;
    }
    if signal.entry_price <= Decimal::ZERO
        || signal.stop_loss_price <= Decimal::ZERO
        || signal.take_profit_price <= Decimal::ZERO
    {
        return None;
    }

    let ordered = match signal.action {
        SignalAction::Long => {
            signal.stop_loss_price < signal.entry_price
                && signal.entry_price < signal.take_profit_price
        }
        SignalAction::Short => {
            signal.stop_loss_price > signal.entry_price
                && signal.entry_price > signal.take_profit_price
        }
        SignalAction::Flat => true,
    };
    ordered.then_some(signal)
}
