//! Synthetic bars for demos and tests.
//!
//! Trend legs of alternating direction with uniform noise, seeded from the
//! symbol name, on weekdays only. Alternating legs give the zone classifier
//! regime flips and the crossover detector VWAP crossings to find. The output
//! is clearly fake and should never be mixed with imported market data for the
//! same symbol.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use anchorline_core::domain::PriceBar;

/// Volume on a flat day; larger moves trade proportionally more.
const BASE_VOLUME: f64 = 1_000_000.0;

/// Shape of the generated walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkParams {
    pub start_price: f64,
    /// Daily return added while a leg trends up, subtracted while it trends down.
    pub drift: f64,
    /// Half-width of the uniform daily return noise. Must stay below 1.
    pub noise: f64,
    /// Trading days per leg. Zero means a single upward leg.
    pub leg_days: usize,
}

impl Default for WalkParams {
    fn default() -> Self {
        Self {
            start_price: 100.0,
            drift: 0.002,
            noise: 0.02,
            leg_days: 120,
        }
    }
}

/// Trading-day rule: Monday through Friday.
pub fn is_trading_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Generate bars for `symbol` over `[start, end]` following `params`.
///
/// The same symbol and parameters always produce the same bars.
pub fn generate_walk(
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    params: &WalkParams,
) -> Vec<PriceBar> {
    let mut rng = StdRng::from_seed(*blake3::hash(symbol.as_bytes()).as_bytes());
    let wick = params.noise / 2.0;
    let mut last_close = params.start_price;

    start
        .iter_days()
        .take_while(|date| *date <= end)
        .filter(|date| is_trading_day(*date))
        .enumerate()
        .map(|(day, date)| {
            let leg = day.checked_div(params.leg_days).unwrap_or(0);
            let drift = if leg % 2 == 0 { params.drift } else { -params.drift };
            let ret = drift + rng.gen_range(-params.noise..=params.noise);

            let open = last_close;
            let close = (open * (1.0 + ret)).max(0.01);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..=wick));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..=wick));
            last_close = close;

            PriceBar {
                date,
                open,
                high,
                low,
                close,
                volume: (BASE_VOLUME * (1.0 + 20.0 * ret.abs())) as u64,
                split_factor: 1.0,
            }
        })
        .collect()
}
