//! Replay orchestrator: wires zones, the state machine and the store.
//!
//! Three entry points:
//! - `compute_zones()`: classify the reference instrument and replace the
//!   stored zone history.
//! - `replay_instrument()`: expanding-window replay of one instrument, date
//!   by date, applying each step's updates through the store.
//! - `run()`: zones first, then every selected instrument in order, then the
//!   BUY/SELL aggregation for the report.
//!
//! Everything is sequential. Each date re-reads the stored state, so a write
//! that failed on an earlier date is simply a transition that never happened.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use anchorline_core::domain::{InstrumentState, PriceBar, TradeSignal, ZoneHistory};
use anchorline_core::engine::{decide, StateUpdate, StepError, StepInput};
use anchorline_core::regime::ZoneClassifier;

use crate::config::RunSection;
use crate::report::SignalReport;
use crate::store::{SignalStore, StoreError};

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("cannot list instruments: {0}")]
    Symbols(#[source] StoreError),
}

/// What happened while replaying one instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSummary {
    pub symbol: String,
    /// Unique dates visited.
    pub dates: usize,
    /// Dates skipped for data-quality reasons or an unreadable state row.
    pub skipped: usize,
    /// Failed writes; the corresponding transitions did not happen.
    pub write_failures: usize,
    /// Signals whose `last_trade_signal` write succeeded, in date order.
    pub confirmed: Vec<(NaiveDate, TradeSignal)>,
    /// BLAKE3 over the replayed bars.
    pub fingerprint: String,
    /// Stored state after the last date, if readable.
    pub final_state: Option<InstrumentState>,
}

/// Outcome of a full run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub zones: ZoneHistory,
    pub instruments: Vec<InstrumentSummary>,
    /// Instruments whose bars could not be read at all.
    pub failed: Vec<String>,
    pub report: SignalReport,
}

/// Classify the reference instrument and replace the stored zone history.
///
/// If the reference bars cannot be read the stored history is left alone and
/// an empty history is returned. An empty series replaces the stored history
/// with an empty one.
pub fn compute_zones<S: SignalStore + ?Sized>(
    store: &S,
    run: &RunSection,
    classifier: &ZoneClassifier,
) -> ZoneHistory {
    let reference = run.reference_symbol.as_str();
    let bars = match store.load_bars(reference, run.start_date, run.end_date) {
        Ok(bars) => bars,
        Err(e) => {
            error!(reference, error = %e, "cannot load reference bars; zones not computed");
            return ZoneHistory::new();
        }
    };
    if bars.is_empty() {
        warn!(reference, "no reference bars; zone history will be empty");
    }

    let zones = classifier.classify(&bars);
    if let Err(e) = store.replace_zones(&zones) {
        error!(error = %e, "failed to persist zone history");
    }
    info!(
        reference,
        bars = bars.len(),
        records = zones.len(),
        latest = %zones.latest_color(),
        "zones computed"
    );
    zones
}

/// Replay one instrument from `run.start_date` through `run.end_date`.
///
/// Fails only when the bar history cannot be read; every per-date problem is
/// logged and counted in the summary.
pub fn replay_instrument<S: SignalStore + ?Sized>(
    store: &S,
    symbol: &str,
    run: &RunSection,
    zones: &ZoneHistory,
) -> Result<InstrumentSummary, StoreError> {
    let bars = store.load_bars(symbol, run.start_date, run.end_date)?;
    let mut summary = InstrumentSummary {
        symbol: symbol.to_string(),
        fingerprint: fingerprint(&bars),
        ..InstrumentSummary::default()
    };
    if bars.is_empty() {
        warn!(symbol, "no bars in range; skipping");
        return Ok(summary);
    }
    debug!(symbol, bars = bars.len(), fingerprint = %summary.fingerprint, "replay start");

    for (i, bar) in bars.iter().enumerate() {
        summary.dates += 1;
        let date = bar.date;

        let prior = match store.load_state(symbol) {
            Ok(prior) => prior,
            Err(e) => {
                error!(symbol, %date, error = %e, "state read failed; date skipped");
                summary.skipped += 1;
                continue;
            }
        };

        let input = StepInput {
            symbol,
            window: &bars[..=i],
            current_date: date,
            is_today: i + 1 == bars.len(),
            zone: zones.color_on(date),
        };
        let outcome = match decide(prior.as_ref(), &input) {
            Ok(outcome) => outcome,
            Err(e) => {
                log_skip(symbol, &e);
                summary.skipped += 1;
                continue;
            }
        };

        for update in &outcome.updates {
            match store.apply_update(symbol, update) {
                Ok(()) => {
                    if let StateUpdate::LastTradeSignal(signal) = update {
                        summary.confirmed.push((date, *signal));
                    }
                }
                Err(e) => {
                    error!(symbol, %date, ?update, error = %e, "state write failed");
                    summary.write_failures += 1;
                    if matches!(update, StateUpdate::Seed { .. }) {
                        // Nothing later in this step is meaningful without the anchor.
                        break;
                    }
                }
            }
        }
    }

    summary.final_state = store.load_state(symbol).unwrap_or_else(|e| {
        error!(symbol, error = %e, "final state read failed");
        None
    });
    info!(
        symbol,
        dates = summary.dates,
        skipped = summary.skipped,
        confirmed = summary.confirmed.len(),
        write_failures = summary.write_failures,
        fingerprint = %summary.fingerprint,
        "instrument replayed"
    );
    Ok(summary)
}

/// Full run: zones, every selected instrument, then the report.
pub fn run<S: SignalStore + ?Sized>(store: &S, run: &RunSection) -> Result<RunSummary, RunError> {
    let classifier = ZoneClassifier::default();
    let computed = compute_zones(store, run, &classifier);
    let zones = store.load_zones().unwrap_or_else(|e| {
        warn!(error = %e, "cannot reload zones; using the computed history");
        computed
    });
    if zones.is_empty() {
        warn!("no zone data; every date defaults to red");
    }

    let symbols = store.list_symbols(run.limit).map_err(RunError::Symbols)?;
    info!(count = symbols.len(), limit = ?run.limit, "instruments selected");

    let mut summary = RunSummary::default();
    let total = symbols.len();
    for (idx, symbol) in symbols.iter().enumerate() {
        info!("processing instrument {}/{}: {}", idx + 1, total, symbol);
        match replay_instrument(store, symbol, run, &zones) {
            Ok(instrument) => summary.instruments.push(instrument),
            Err(e) => {
                error!(%symbol, error = %e, "cannot load bars; instrument skipped");
                summary.failed.push(symbol.clone());
            }
        }
    }

    summary.report = collect_report(store, &zones);
    summary.zones = zones;
    Ok(summary)
}

/// Instruments currently flagged BUY/SELL plus the latest zone color.
///
/// A failed lookup yields an empty list for that side.
pub fn collect_report<S: SignalStore + ?Sized>(store: &S, zones: &ZoneHistory) -> SignalReport {
    let side = |signal: TradeSignal| {
        store.symbols_with_signal(signal).unwrap_or_else(|e| {
            error!(%signal, error = %e, "signal lookup failed");
            Vec::new()
        })
    };
    let report = SignalReport {
        buy: side(TradeSignal::Buy),
        sell: side(TradeSignal::Sell),
        zone: zones.latest_color(),
    };
    info!(buy = report.buy.len(), sell = report.sell.len(), zone = %report.zone, "signals collected");
    report
}

/// Deterministic BLAKE3 hash over dates and all bar values.
pub fn fingerprint(bars: &[PriceBar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(bar.date.to_string().as_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
        hasher.update(&bar.split_factor.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

fn log_skip(symbol: &str, err: &StepError) {
    match err {
        // Every replay starts with a few of these.
        StepError::InsufficientData { .. } => debug!(symbol, reason = %err, "date skipped"),
        _ => warn!(symbol, reason = %err, "date skipped"),
    }
}
