//! Per-instrument signal engine: the state machine and its failure type.

pub mod error;
pub mod state_machine;

pub use error::StepError;
pub use state_machine::{decide, StateUpdate, StepInput, StepMode, StepOutcome, MIN_WINDOW_BARS};
