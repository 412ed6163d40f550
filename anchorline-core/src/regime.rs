//! Zone classifier: derives the green/red market regime from a reference
//! instrument's closes.
//!
//! A date is green when close > SMA(200) and EMA(20) > SMA(200), otherwise
//! red. Only dates past the SMA warmup are classified, and only regime
//! changes are recorded, starting from red: a series that never turns green
//! produces no records. The output replaces any earlier history wholesale.

use tracing::{debug, info};

use crate::domain::{PriceBar, ZoneColor, ZoneHistory, ZoneRecord};
use crate::indicators::{Ema, Indicator, Sma};

/// Default SMA window for the regime baseline.
pub const DEFAULT_SMA_PERIOD: usize = 200;
/// Default EMA span for the fast average.
pub const DEFAULT_EMA_SPAN: usize = 20;

/// Two-average regime classifier.
#[derive(Debug, Clone)]
pub struct ZoneClassifier {
    sma: Sma,
    ema: Ema,
}

impl Default for ZoneClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_SMA_PERIOD, DEFAULT_EMA_SPAN)
    }
}

impl ZoneClassifier {
    pub fn new(sma_period: usize, ema_span: usize) -> Self {
        Self {
            sma: Sma::new(sma_period),
            ema: Ema::new(ema_span),
        }
    }

    /// Classify a single date from its close and both averages.
    pub fn classify_point(close: f64, sma: f64, ema: f64) -> ZoneColor {
        if close > sma && ema > sma {
            ZoneColor::Green
        } else {
            ZoneColor::Red
        }
    }

    /// Build the regime history for `bars` (ascending by date).
    ///
    /// An empty or too-short series yields an empty history, so every
    /// lookup falls back to red.
    pub fn classify(&self, bars: &[PriceBar]) -> ZoneHistory {
        let mut history = ZoneHistory::new();
        if bars.is_empty() {
            info!("reference series empty; zone classification skipped");
            return history;
        }

        let sma = self.sma.compute(bars);
        let ema = self.ema.compute(bars);
        let mut current = ZoneColor::default();

        for (i, bar) in bars.iter().enumerate() {
            let (s, e) = (sma[i], ema[i]);
            if s.is_nan() || e.is_nan() || bar.close.is_nan() {
                continue;
            }
            let color = Self::classify_point(bar.close, s, e);
            if color != current {
                debug!(date = %bar.date, %color, "zone change");
                history.push(ZoneRecord {
                    color,
                    change_date: bar.date,
                });
                current = color;
            }
        }

        info!(
            bars = bars.len(),
            records = history.len(),
            latest = %history.latest_color(),
            "zone classification complete"
        );
        history
    }
}
