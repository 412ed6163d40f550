//! Persistent per-instrument state.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::TradeSignal;

/// Persisted state for one instrument.
///
/// `all_time_high` is the close that produced the current VWAP anchor and
/// `all_time_high_date` is the date of that close. `last_trade_signal` is the
/// confirmed BUY/SELL toggle; `trade_signal` is the transient label for the
/// most recent session only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentState {
    pub symbol: String,
    pub all_time_high: f64,
    pub all_time_high_date: NaiveDate,
    pub trade_signal: Option<TradeSignal>,
    pub last_trade_signal: Option<TradeSignal>,
    /// VWAP of the row that confirmed the most recent BUY.
    pub anchored_vwap_at_buy: Option<f64>,
}

/// Which confirmation the state machine is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// `last_trade_signal` is not BUY.
    AwaitingBuy,
    /// `last_trade_signal` is BUY.
    AwaitingSell,
}

impl InstrumentState {
    /// Fresh state anchored at `(price, date)` with no signals.
    pub fn seeded(symbol: impl Into<String>, price: f64, date: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            all_time_high: price,
            all_time_high_date: date,
            trade_signal: None,
            last_trade_signal: None,
            anchored_vwap_at_buy: None,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.last_trade_signal {
            Some(TradeSignal::Buy) => Phase::AwaitingSell,
            _ => Phase::AwaitingBuy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_follows_last_signal() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut state = InstrumentState::seeded("AAPL", 10.0, date);
        assert_eq!(state.phase(), Phase::AwaitingBuy);
        state.last_trade_signal = Some(TradeSignal::Buy);
        assert_eq!(state.phase(), Phase::AwaitingSell);
        state.last_trade_signal = Some(TradeSignal::Sell);
        assert_eq!(state.phase(), Phase::AwaitingBuy);
    }
}
