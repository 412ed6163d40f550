//! Crossover signal detector over (close, anchored VWAP) rows.
//!
//! Two modes:
//! - Historical (`find_b_signal` / `find_s_signal`): forward scan of 3-bar
//!   windows up to a target date, returning the EARLIEST matching date.
//!   Callers accept the match only when it lands exactly on the target date.
//! - Same-session (`find_two_bar_b_signal` / `find_two_bar_s_signal`): looks
//!   only at the final two rows of a short tail.

use chrono::NaiveDate;

use crate::domain::TradeSignal;
use crate::indicators::AnchoredVwapRow;

/// Number of trailing rows handed to the same-session detector.
pub const SAME_SESSION_TAIL: usize = 4;

/// Price was at/under VWAP for two bars, then strictly above on the third.
fn is_three_bar_buy(w: &[AnchoredVwapRow]) -> bool {
    w[2].is_above() && w[1].close <= w[1].vwap && w[0].close <= w[0].vwap
}

/// Price was at/above VWAP for two bars, then strictly below on the third.
fn is_three_bar_sell(w: &[AnchoredVwapRow]) -> bool {
    w[2].is_below() && w[1].close >= w[1].vwap && w[0].close >= w[0].vwap
}

fn first_three_bar_match(
    rows: &[AnchoredVwapRow],
    target: NaiveDate,
    pattern: fn(&[AnchoredVwapRow]) -> bool,
) -> Option<NaiveDate> {
    let end = rows.partition_point(|r| r.date <= target);
    rows[..end]
        .windows(3)
        .find(|w| pattern(w))
        .map(|w| w[2].date)
}

/// Earliest 3-bar BUY crossover dated on or before `target`.
pub fn find_b_signal(rows: &[AnchoredVwapRow], target: NaiveDate) -> Option<NaiveDate> {
    first_three_bar_match(rows, target, is_three_bar_buy)
}

/// Earliest 3-bar SELL crossover dated on or before `target`.
pub fn find_s_signal(rows: &[AnchoredVwapRow], target: NaiveDate) -> Option<NaiveDate> {
    first_three_bar_match(rows, target, is_three_bar_sell)
}

/// 2-bar BUY on the final two rows: at/under VWAP, then strictly above.
pub fn find_two_bar_b_signal(tail: &[AnchoredVwapRow]) -> Option<NaiveDate> {
    match tail {
        [.., prev, last] if last.is_above() && prev.close <= prev.vwap => Some(last.date),
        _ => None,
    }
}

/// 2-bar SELL on the final two rows: at/above VWAP, then strictly below.
pub fn find_two_bar_s_signal(tail: &[AnchoredVwapRow]) -> Option<NaiveDate> {
    match tail {
        [.., prev, last] if last.is_below() && prev.close >= prev.vwap => Some(last.date),
        _ => None,
    }
}

/// Same-session detector for the given signal kind, applied to the last
/// [`SAME_SESSION_TAIL`] rows.
pub fn find_two_bar(signal: TradeSignal, rows: &[AnchoredVwapRow]) -> Option<NaiveDate> {
    let tail = &rows[rows.len().saturating_sub(SAME_SESSION_TAIL)..];
    match signal {
        TradeSignal::Buy => find_two_bar_b_signal(tail),
        TradeSignal::Sell => find_two_bar_s_signal(tail),
    }
}
