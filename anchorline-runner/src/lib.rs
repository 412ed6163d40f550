//! Anchorline Runner: replay orchestration, storage, configuration, reports.
//!
//! This crate builds on `anchorline-core` to provide:
//! - The `SignalStore` gateway with SQLite and in-memory implementations
//! - Layered run configuration (defaults, TOML, environment)
//! - Zone computation and per-instrument expanding-window replay
//! - The marker-delimited signal report and its extractor
//! - CSV bar import and synthetic bar generation

pub mod config;
pub mod csv_import;
pub mod replay;
pub mod report;
pub mod store;
pub mod synthetic;

pub use config::{ConfigError, RunConfig, RunSection, StoreConfig};
pub use csv_import::{import_file, read_bars, ImportError, ImportSummary};
pub use replay::{
    collect_report, compute_zones, fingerprint, replay_instrument, run, InstrumentSummary,
    RunError, RunSummary,
};
pub use report::{extract_between_markers, render_error, SignalReport, END_MARKER, START_MARKER};
pub use store::{MemoryStore, SignalStore, SqliteStore, StoreError};
pub use synthetic::{generate_walk, WalkParams};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn stores_are_send_sync() {
        assert_send::<MemoryStore>();
        assert_sync::<MemoryStore>();
        assert_send::<SqliteStore>();
        assert_sync::<SqliteStore>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<RunConfig>();
        assert_sync::<RunConfig>();
    }

    #[test]
    fn summaries_are_send_sync() {
        assert_send::<RunSummary>();
        assert_sync::<RunSummary>();
        assert_send::<SignalReport>();
        assert_sync::<SignalReport>();
    }

    #[test]
    fn store_trait_is_object_safe() {
        let store: Box<dyn SignalStore> = Box::new(MemoryStore::new());
        assert!(store.list_symbols(None).unwrap().is_empty());
    }
}
