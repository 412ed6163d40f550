//! Data-quality failures raised while processing one (instrument, date).

use chrono::NaiveDate;
use thiserror::Error;

/// Reasons the state machine declines to process a date.
///
/// All variants are recoverable: the caller logs the skip and moves on to the
/// next date or instrument. None of them touch persisted state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepError {
    #[error("not enough bars: needed {needed}, found {found}")]
    InsufficientData { needed: usize, found: usize },

    #[error("bar window is not strictly ascending near {date}")]
    NonChronological { date: NaiveDate },

    #[error("no bar for {date} in the supplied window")]
    DateNotInWindow { date: NaiveDate },

    #[error("invalid close price on {date}")]
    InvalidPrice { date: NaiveDate },

    #[error("anchored vwap from {anchor} produced no rows")]
    EmptyVwap { anchor: NaiveDate },
}
