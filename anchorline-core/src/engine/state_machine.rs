//! Instrument state machine.
//!
//! `decide` evaluates one (instrument, date) and returns the next state plus
//! the ordered list of persistence updates that take the stored row there.
//! It performs no I/O; the caller applies the updates through its store and
//! re-reads state before the next date, so a failed write simply means the
//! transition did not happen.
//!
//! Priority per date:
//! 1. split override (resets the anchor, forces BUY, nothing else runs)
//! 2. initialization from the first bar when no state exists
//! 3. "today" → same-session 2-bar detector only
//! 4. otherwise historical 3-bar detector for the awaited signal, plus the
//!    new-high scan while awaiting SELL

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::crossover::{find_b_signal, find_s_signal, find_two_bar};
use crate::domain::{is_chronological, InstrumentState, Phase, PriceBar, TradeSignal, ZoneColor};
use crate::indicators::{anchored_vwap, AnchoredVwapRow};

use super::StepError;

/// Minimum bars in a window before any processing happens.
pub const MIN_WINDOW_BARS: usize = 4;

/// Everything the state machine sees for one date.
#[derive(Debug, Clone, Copy)]
pub struct StepInput<'a> {
    pub symbol: &'a str,
    /// All bars up to and including `current_date`, ascending.
    pub window: &'a [PriceBar],
    pub current_date: NaiveDate,
    /// Most recent date of the replay; only same-session detection applies.
    pub is_today: bool,
    /// Regime on `current_date`. Carried for reporting only; it does not
    /// gate any transition.
    pub zone: ZoneColor,
}

/// One write against the persisted instrument row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateUpdate {
    /// First anchor for an instrument without state. The remaining updates
    /// of the same step assume it was persisted.
    Seed { price: f64, date: NaiveDate },
    AllTimeHigh { price: f64, date: NaiveDate },
    LastTradeSignal(TradeSignal),
    TradeSignal(Option<TradeSignal>),
    AnchoredVwapAtBuy(f64),
}

/// Which rule set produced the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepMode {
    Split,
    Historical,
    SameSession,
}

/// Result of evaluating one date.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub date: NaiveDate,
    pub mode: StepMode,
    pub zone: ZoneColor,
    pub next: InstrumentState,
    pub updates: Vec<StateUpdate>,
}

impl StepOutcome {
    fn new(date: NaiveDate, mode: StepMode, zone: ZoneColor, next: InstrumentState) -> Self {
        Self {
            date,
            mode,
            zone,
            next,
            updates: Vec::new(),
        }
    }

    fn push(&mut self, update: StateUpdate) {
        self.next.apply(&update);
        self.updates.push(update);
    }

    /// Signal confirmed into `last_trade_signal` on this date, if any.
    pub fn confirmed(&self) -> Option<TradeSignal> {
        self.updates.iter().find_map(|u| match u {
            StateUpdate::LastTradeSignal(sig) => Some(*sig),
            _ => None,
        })
    }
}

impl InstrumentState {
    /// Apply a single update in place.
    pub fn apply(&mut self, update: &StateUpdate) {
        match *update {
            StateUpdate::Seed { price, date } | StateUpdate::AllTimeHigh { price, date } => {
                self.all_time_high = price;
                self.all_time_high_date = date;
            }
            StateUpdate::LastTradeSignal(sig) => self.last_trade_signal = Some(sig),
            StateUpdate::TradeSignal(sig) => self.trade_signal = sig,
            StateUpdate::AnchoredVwapAtBuy(vwap) => self.anchored_vwap_at_buy = Some(vwap),
        }
    }
}

/// Evaluate one (instrument, date) against the prior persisted state.
pub fn decide(
    prior: Option<&InstrumentState>,
    input: &StepInput<'_>,
) -> Result<StepOutcome, StepError> {
    let window = input.window;
    let date = input.current_date;

    if window.len() < MIN_WINDOW_BARS {
        return Err(StepError::InsufficientData {
            needed: MIN_WINDOW_BARS,
            found: window.len(),
        });
    }
    if !is_chronological(window) {
        let bad = window
            .windows(2)
            .find(|w| w[0].date >= w[1].date)
            .map_or(date, |w| w[1].date);
        return Err(StepError::NonChronological { date: bad });
    }
    let current = window
        .binary_search_by_key(&date, |b| b.date)
        .map(|i| &window[i])
        .map_err(|_| StepError::DateNotInWindow { date })?;

    if current.has_split() {
        return Ok(split_override(prior, input, current));
    }

    let (state, seeded) = match prior {
        Some(state) => (state.clone(), false),
        None => {
            let first = &window[0];
            if !first.close.is_finite() {
                return Err(StepError::InvalidPrice { date: first.date });
            }
            (
                InstrumentState::seeded(input.symbol, first.close, first.date),
                true,
            )
        }
    };

    let mode = if input.is_today {
        StepMode::SameSession
    } else {
        StepMode::Historical
    };
    let mut outcome = StepOutcome::new(date, mode, input.zone, state.clone());
    if seeded {
        outcome.updates.push(StateUpdate::Seed {
            price: state.all_time_high,
            date: state.all_time_high_date,
        });
    }

    let rows = anchored_vwap(window, state.all_time_high_date);
    if rows.is_empty() {
        let anchor = state.all_time_high_date;
        if outcome.updates.is_empty() {
            return Err(StepError::EmptyVwap { anchor });
        }
        warn!(symbol = input.symbol, %date, %anchor, "vwap empty after seeding; persisting seed only");
        return Ok(outcome);
    }

    debug!(
        symbol = input.symbol,
        %date,
        zone = %input.zone,
        phase = ?state.phase(),
        anchor = %state.all_time_high_date,
        "evaluating"
    );

    if input.is_today {
        same_session(&mut outcome, &state, &rows, input.symbol);
    } else {
        historical(&mut outcome, &state, &rows, window, date, input.symbol);
    }

    Ok(outcome)
}

fn split_override(
    prior: Option<&InstrumentState>,
    input: &StepInput<'_>,
    current: &PriceBar,
) -> StepOutcome {
    let base = prior.cloned().unwrap_or_else(|| {
        InstrumentState::seeded(input.symbol, current.close, current.date)
    });
    let mut outcome = StepOutcome::new(current.date, StepMode::Split, input.zone, base);
    outcome.push(StateUpdate::AllTimeHigh {
        price: current.close,
        date: current.date,
    });
    outcome.push(StateUpdate::LastTradeSignal(TradeSignal::Buy));
    info!(
        symbol = input.symbol,
        date = %current.date,
        factor = current.split_factor,
        close = current.close,
        "split detected; anchor reset and BUY forced"
    );
    outcome
}

fn same_session(
    outcome: &mut StepOutcome,
    state: &InstrumentState,
    rows: &[AnchoredVwapRow],
    symbol: &str,
) {
    let awaited = match state.phase() {
        Phase::AwaitingSell => TradeSignal::Sell,
        Phase::AwaitingBuy => TradeSignal::Buy,
    };

    match find_two_bar(awaited, rows) {
        Some(hit) => {
            outcome.push(StateUpdate::TradeSignal(Some(awaited)));
            outcome.push(StateUpdate::LastTradeSignal(awaited));
            if awaited == TradeSignal::Buy {
                if let Some(row) = rows.last() {
                    outcome.push(StateUpdate::AnchoredVwapAtBuy(row.vwap));
                }
            }
            info!(symbol, date = %hit, signal = %awaited, "two-bar signal");
        }
        None => outcome.push(StateUpdate::TradeSignal(None)),
    }
}

fn historical(
    outcome: &mut StepOutcome,
    state: &InstrumentState,
    rows: &[AnchoredVwapRow],
    window: &[PriceBar],
    date: NaiveDate,
    symbol: &str,
) {
    match state.phase() {
        Phase::AwaitingBuy => {
            if find_b_signal(rows, date) != Some(date) {
                return;
            }
            outcome.push(StateUpdate::LastTradeSignal(TradeSignal::Buy));
            if let Some(row) = rows.iter().find(|r| r.date == date) {
                outcome.push(StateUpdate::AnchoredVwapAtBuy(row.vwap));
            }
            // Re-anchor at the confirming bar.
            if let Ok(i) = window.binary_search_by_key(&date, |b| b.date) {
                let close = window[i].close;
                if close.is_finite() {
                    outcome.push(StateUpdate::AllTimeHigh { price: close, date });
                }
            }
            info!(symbol, %date, "three-bar BUY confirmed; anchor moved");
        }
        Phase::AwaitingSell => {
            if find_s_signal(rows, date) == Some(date) {
                outcome.push(StateUpdate::LastTradeSignal(TradeSignal::Sell));
                info!(symbol, %date, "three-bar SELL confirmed");
            }
            if let Some((price, high_date)) = highest_close_after(window, state.all_time_high_date)
            {
                if price > state.all_time_high {
                    outcome.push(StateUpdate::AllTimeHigh {
                        price,
                        date: high_date,
                    });
                    debug!(symbol, %high_date, price, "new high while awaiting SELL");
                }
            }
        }
    }
}

/// Maximum close strictly after `anchor`; ties resolve to the earliest date.
fn highest_close_after(window: &[PriceBar], anchor: NaiveDate) -> Option<(f64, NaiveDate)> {
    let start = window.partition_point(|b| b.date <= anchor);
    window[start..]
        .iter()
        .filter(|b| b.close.is_finite())
        .fold(None, |best: Option<(f64, NaiveDate)>, b| match best {
            Some((price, _)) if price >= b.close => best,
            _ => Some((b.close, b.date)),
        })
}
