//! Storage gateway for bars, zone history and per-instrument state.
//!
//! Every operation is self-contained: implementations acquire whatever
//! resource they need for the call and release it before returning. Nothing
//! is held open across calls.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::NaiveDate;
use thiserror::Error;

use anchorline_core::domain::{InstrumentState, PriceBar, TradeSignal, ZoneHistory};
use anchorline_core::engine::StateUpdate;

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("instrument '{symbol}' not found")]
    NotFound { symbol: String },

    #[error("corrupt {what}: {detail}")]
    Corrupt { what: &'static str, detail: String },

    #[error("store unavailable during {op}")]
    Unavailable { op: &'static str },
}

/// Read/write contract the replay orchestrator runs against.
pub trait SignalStore: Send + Sync {
    /// Registered symbols, ascending, optionally bounded.
    fn list_symbols(&self, limit: Option<usize>) -> Result<Vec<String>, StoreError>;

    /// Register a symbol with empty state. No-op if it already exists.
    fn register_symbol(&self, symbol: &str) -> Result<(), StoreError>;

    /// Bars for `symbol` dated within `[start, end]`, ascending. `end = None`
    /// means no upper bound.
    fn load_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PriceBar>, StoreError>;

    /// Insert or overwrite bars keyed by (symbol, date). Returns the count written.
    fn upsert_bars(&self, symbol: &str, bars: &[PriceBar]) -> Result<usize, StoreError>;

    /// Current state, or `None` if the instrument has never been anchored.
    fn load_state(&self, symbol: &str) -> Result<Option<InstrumentState>, StoreError>;

    /// Set the anchor. Creates the instrument row if it does not exist.
    fn update_all_time_high(
        &self,
        symbol: &str,
        price: f64,
        date: NaiveDate,
    ) -> Result<(), StoreError>;

    fn update_trade_signal(
        &self,
        symbol: &str,
        signal: Option<TradeSignal>,
    ) -> Result<(), StoreError>;

    fn update_last_trade_signal(&self, symbol: &str, signal: TradeSignal)
        -> Result<(), StoreError>;

    fn update_anchored_vwap_at_buy(&self, symbol: &str, vwap: f64) -> Result<(), StoreError>;

    fn load_zones(&self) -> Result<ZoneHistory, StoreError>;

    /// Discard the stored zone history and write `zones` in its place.
    fn replace_zones(&self, zones: &ZoneHistory) -> Result<(), StoreError>;

    /// Symbols whose transient `trade_signal` equals `signal`, ascending.
    fn symbols_with_signal(&self, signal: TradeSignal) -> Result<Vec<String>, StoreError>;

    /// Route one state-machine update to the matching write.
    fn apply_update(&self, symbol: &str, update: &StateUpdate) -> Result<(), StoreError> {
        match *update {
            StateUpdate::Seed { price, date } | StateUpdate::AllTimeHigh { price, date } => {
                self.update_all_time_high(symbol, price, date)
            }
            StateUpdate::TradeSignal(signal) => self.update_trade_signal(symbol, signal),
            StateUpdate::LastTradeSignal(signal) => self.update_last_trade_signal(symbol, signal),
            StateUpdate::AnchoredVwapAtBuy(vwap) => self.update_anchored_vwap_at_buy(symbol, vwap),
        }
    }
}

/// Dates are stored as ISO `YYYY-MM-DD` text.
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| StoreError::Corrupt {
        what: "date",
        detail: format!("'{raw}': {e}"),
    })
}
