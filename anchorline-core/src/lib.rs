//! Anchorline Core: signal derivation engine.
//!
//! This crate contains the pure, I/O-free part of the system:
//! - Domain types (price bars, zone history, instrument state, signals)
//! - Indicators: SMA, span EMA, anchored VWAP
//! - Zone classifier (green/red market regime from a reference instrument)
//! - Crossover detector (3-bar historical and 2-bar same-session modes)
//! - Instrument state machine producing ordered persistence updates

pub mod crossover;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod regime;
