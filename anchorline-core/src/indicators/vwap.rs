//! Anchored VWAP.
//!
//! Cumulative sums restart at the anchor date: bars before the anchor never
//! contribute. A new anchor requires a full recomputation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::PriceBar;

/// One dated (close, vwap) pair from an anchored VWAP computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchoredVwapRow {
    pub date: NaiveDate,
    pub close: f64,
    pub vwap: f64,
}

impl AnchoredVwapRow {
    pub fn is_above(&self) -> bool {
        self.close > self.vwap
    }

    pub fn is_below(&self) -> bool {
        self.close < self.vwap
    }
}

/// Compute the VWAP anchored at `anchor` over `bars` (ascending by date).
///
/// Only bars dated on or after `anchor` produce rows. While cumulative volume
/// is still zero the VWAP is undefined and the row is excluded.
pub fn anchored_vwap(bars: &[PriceBar], anchor: NaiveDate) -> Vec<AnchoredVwapRow> {
    let start = bars.partition_point(|b| b.date < anchor);
    let mut rows = Vec::with_capacity(bars.len() - start);
    let mut cumulative_pv = 0.0;
    let mut cumulative_vol = 0.0;

    for bar in &bars[start..] {
        let volume = bar.volume as f64;
        cumulative_pv += bar.typical_price() * volume;
        cumulative_vol += volume;

        if cumulative_vol == 0.0 {
            warn!(date = %bar.date, %anchor, "zero cumulative volume, vwap undefined; row excluded");
            continue;
        }

        let vwap = cumulative_pv / cumulative_vol;
        if !vwap.is_finite() {
            warn!(date = %bar.date, %anchor, "non-finite vwap; row excluded");
            continue;
        }

        rows.push(AnchoredVwapRow {
            date: bar.date,
            close: bar.close,
            vwap,
        });
    }

    rows
}
