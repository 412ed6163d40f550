//! In-memory gateway, used by tests and dry runs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;

use anchorline_core::domain::{InstrumentState, PriceBar, TradeSignal, ZoneHistory};

use super::{SignalStore, StoreError};

/// Instrument row as stored: state fields stay empty until the first anchor.
#[derive(Debug, Clone, Default)]
struct Row {
    anchor: Option<(f64, NaiveDate)>,
    trade_signal: Option<TradeSignal>,
    last_trade_signal: Option<TradeSignal>,
    anchored_vwap_at_buy: Option<f64>,
}

#[derive(Debug, Default)]
struct Inner {
    instruments: BTreeMap<String, Row>,
    bars: BTreeMap<String, BTreeMap<NaiveDate, PriceBar>>,
    zones: ZoneHistory,
    failing: BTreeSet<&'static str>,
}

/// BTreeMap-backed store with per-operation failure injection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call of `op` fail with [`StoreError::Unavailable`].
    /// `op` is the trait method name, e.g. `"update_last_trade_signal"`.
    pub fn fail_on(&self, op: &'static str) {
        self.lock().failing.insert(op);
    }

    /// Stop injecting failures for `op`.
    pub fn heal(&self, op: &'static str) {
        self.lock().failing.remove(op);
    }

    /// Overwrite the whole state row, bypassing the update operations.
    pub fn put_state(&self, state: InstrumentState) {
        let mut inner = self.lock();
        inner.instruments.insert(
            state.symbol.clone(),
            Row {
                anchor: Some((state.all_time_high, state.all_time_high_date)),
                trade_signal: state.trade_signal,
                last_trade_signal: state.last_trade_signal,
                anchored_vwap_at_buy: state.anchored_vwap_at_buy,
            },
        );
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves plain data behind; keep using it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn guard(&self, op: &'static str) -> Result<MutexGuard<'_, Inner>, StoreError> {
        let inner = self.lock();
        if inner.failing.contains(op) {
            return Err(StoreError::Unavailable { op });
        }
        Ok(inner)
    }

    fn with_row<F>(&self, op: &'static str, symbol: &str, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Row),
    {
        let mut inner = self.guard(op)?;
        let row = inner
            .instruments
            .get_mut(symbol)
            .ok_or_else(|| StoreError::NotFound {
                symbol: symbol.to_string(),
            })?;
        f(row);
        Ok(())
    }
}

impl SignalStore for MemoryStore {
    fn list_symbols(&self, limit: Option<usize>) -> Result<Vec<String>, StoreError> {
        let inner = self.guard("list_symbols")?;
        let symbols = inner.instruments.keys().cloned();
        Ok(match limit {
            Some(n) => symbols.take(n).collect(),
            None => symbols.collect(),
        })
    }

    fn register_symbol(&self, symbol: &str) -> Result<(), StoreError> {
        let mut inner = self.guard("register_symbol")?;
        inner.instruments.entry(symbol.to_string()).or_default();
        Ok(())
    }

    fn load_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PriceBar>, StoreError> {
        let inner = self.guard("load_bars")?;
        let Some(series) = inner.bars.get(symbol) else {
            return Ok(Vec::new());
        };
        Ok(series
            .range(start..)
            .take_while(|(date, _)| end.map_or(true, |end| **date <= end))
            .map(|(_, bar)| bar.clone())
            .collect())
    }

    fn upsert_bars(&self, symbol: &str, bars: &[PriceBar]) -> Result<usize, StoreError> {
        let mut inner = self.guard("upsert_bars")?;
        let series = inner.bars.entry(symbol.to_string()).or_default();
        for bar in bars {
            series.insert(bar.date, bar.clone());
        }
        Ok(bars.len())
    }

    fn load_state(&self, symbol: &str) -> Result<Option<InstrumentState>, StoreError> {
        let inner = self.guard("load_state")?;
        Ok(inner.instruments.get(symbol).and_then(|row| {
            row.anchor.map(|(price, date)| InstrumentState {
                symbol: symbol.to_string(),
                all_time_high: price,
                all_time_high_date: date,
                trade_signal: row.trade_signal,
                last_trade_signal: row.last_trade_signal,
                anchored_vwap_at_buy: row.anchored_vwap_at_buy,
            })
        }))
    }

    fn update_all_time_high(
        &self,
        symbol: &str,
        price: f64,
        date: NaiveDate,
    ) -> Result<(), StoreError> {
        let mut inner = self.guard("update_all_time_high")?;
        inner
            .instruments
            .entry(symbol.to_string())
            .or_default()
            .anchor = Some((price, date));
        Ok(())
    }

    fn update_trade_signal(
        &self,
        symbol: &str,
        signal: Option<TradeSignal>,
    ) -> Result<(), StoreError> {
        self.with_row("update_trade_signal", symbol, |row| row.trade_signal = signal)
    }

    fn update_last_trade_signal(
        &self,
        symbol: &str,
        signal: TradeSignal,
    ) -> Result<(), StoreError> {
        self.with_row("update_last_trade_signal", symbol, |row| {
            row.last_trade_signal = Some(signal)
        })
    }

    fn update_anchored_vwap_at_buy(&self, symbol: &str, vwap: f64) -> Result<(), StoreError> {
        self.with_row("update_anchored_vwap_at_buy", symbol, |row| {
            row.anchored_vwap_at_buy = Some(vwap)
        })
    }

    fn load_zones(&self) -> Result<ZoneHistory, StoreError> {
        Ok(self.guard("load_zones")?.zones.clone())
    }

    fn replace_zones(&self, zones: &ZoneHistory) -> Result<(), StoreError> {
        self.guard("replace_zones")?.zones = zones.clone();
        Ok(())
    }

    fn symbols_with_signal(&self, signal: TradeSignal) -> Result<Vec<String>, StoreError> {
        let inner = self.guard("symbols_with_signal")?;
        Ok(inner
            .instruments
            .iter()
            .filter(|(_, row)| row.trade_signal == Some(signal))
            .map(|(symbol, _)| symbol.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn bar(day: u32, close: f64) -> PriceBar {
        PriceBar {
            date: d(day),
            open: close,
            high: close,
            low: close,
            close,
            volume: 10,
            split_factor: 1.0,
        }
    }

    #[test]
    fn registered_symbol_has_no_state_until_anchored() {
        let store = MemoryStore::new();
        store.register_symbol("MSFT").unwrap();
        assert_eq!(store.load_state("MSFT").unwrap(), None);

        store.update_all_time_high("MSFT", 400.0, d(2)).unwrap();
        let state = store.load_state("MSFT").unwrap().unwrap();
        assert_eq!(state.all_time_high, 400.0);
        assert_eq!(state.last_trade_signal, None);
    }

    #[test]
    fn symbols_are_sorted_and_limited() {
        let store = MemoryStore::new();
        for s in ["TSLA", "AAPL", "MSFT"] {
            store.register_symbol(s).unwrap();
        }
        assert_eq!(store.list_symbols(None).unwrap(), ["AAPL", "MSFT", "TSLA"]);
        assert_eq!(store.list_symbols(Some(2)).unwrap(), ["AAPL", "MSFT"]);
    }

    #[test]
    fn bars_respect_range() {
        let store = MemoryStore::new();
        store
            .upsert_bars("X", &[bar(3, 1.0), bar(1, 2.0), bar(2, 3.0)])
            .unwrap();
        let bars = store.load_bars("X", d(2), None).unwrap();
        assert_eq!(bars.iter().map(|b| b.date).collect::<Vec<_>>(), [d(2), d(3)]);
        let bars = store.load_bars("X", d(1), Some(d(2))).unwrap();
        assert_eq!(bars.len(), 2);
        assert!(store.load_bars("Y", d(1), None).unwrap().is_empty());
    }

    #[test]
    fn signal_update_on_unknown_symbol_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.update_last_trade_signal("NOPE", TradeSignal::Buy),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn injected_failure_until_healed() {
        let store = MemoryStore::new();
        store.fail_on("list_symbols");
        assert!(matches!(
            store.list_symbols(None),
            Err(StoreError::Unavailable { op: "list_symbols" })
        ));
        store.heal("list_symbols");
        assert!(store.list_symbols(None).unwrap().is_empty());
    }
}
