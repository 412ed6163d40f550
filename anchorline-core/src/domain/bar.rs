//! PriceBar: one daily OHLCV row for an instrument, plus its split factor.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar for a single instrument.
///
/// `split_factor == 1.0` means no corporate action on that day. Any other
/// value marks a split and invalidates earlier price-level comparisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    #[serde(default = "default_split_factor")]
    pub split_factor: f64,
}

fn default_split_factor() -> f64 {
    1.0
}

impl PriceBar {
    /// Typical price used by the VWAP: (high + low + close) / 3.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// True when a corporate action happened on this bar's date.
    pub fn has_split(&self) -> bool {
        self.split_factor != 1.0
    }

    /// Returns true if any price field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.close > 0.0
    }
}

/// True when `bars` is strictly ascending by date (no duplicates).
pub fn is_chronological(bars: &[PriceBar]) -> bool {
    bars.windows(2).all(|w| w[0].date < w[1].date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            open: 100.0,
            high: 105.0,
            low: 98.0,
            close: 103.0,
            volume: 50_000,
            split_factor: 1.0,
        }
    }

    #[test]
    fn typical_price_is_hlc_mean() {
        assert_eq!(sample_bar().typical_price(), (105.0 + 98.0 + 103.0) / 3.0);
    }

    #[test]
    fn split_detection() {
        let mut bar = sample_bar();
        assert!(!bar.has_split());
        bar.split_factor = 0.5;
        assert!(bar.has_split());
    }

    #[test]
    fn bar_detects_void() {
        let mut bar = sample_bar();
        bar.close = f64::NAN;
        assert!(bar.is_void());
        assert!(!bar.is_sane());
    }

    #[test]
    fn bar_detects_insane_high_low() {
        let mut bar = sample_bar();
        bar.high = 97.0;
        assert!(!bar.is_sane());
    }

    #[test]
    fn missing_split_factor_defaults_to_one() {
        let json = r#"{"date":"2024-01-02","open":1.0,"high":2.0,"low":0.5,"close":1.5,"volume":10}"#;
        let bar: PriceBar = serde_json::from_str(json).unwrap();
        assert_eq!(bar.split_factor, 1.0);
    }

    #[test]
    fn chronology_check() {
        let a = sample_bar();
        let mut b = sample_bar();
        b.date = a.date.succ_opt().unwrap();
        assert!(is_chronological(&[a.clone(), b.clone()]));
        assert!(!is_chronological(&[b.clone(), a.clone()]));
        assert!(!is_chronological(&[a.clone(), a]));
    }
}
