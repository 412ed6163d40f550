//! Daily bar import from CSV.
//!
//! Expected header: `date,open,high,low,close,volume` with an optional
//! `split_factor` column (defaults to 1.0). Dates are `YYYY-MM-DD`.

use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use anchorline_core::domain::PriceBar;

use crate::store::{SignalStore, StoreError};

/// Errors from reading or storing imported bars.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: {reason}")]
    InvalidRow { line: u64, reason: String },

    #[error("store: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of importing one file.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    pub symbol: String,
    pub rows: usize,
    pub first: Option<chrono::NaiveDate>,
    pub last: Option<chrono::NaiveDate>,
}

/// Parse bars from CSV, returned ascending by date.
///
/// Rows with NaN prices, a non-positive close or a date already seen are
/// rejected. Rows failing the OHLC consistency check are kept with a warning.
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<PriceBar>, ImportError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars: Vec<PriceBar> = Vec::new();

    for (i, record) in rdr.deserialize::<PriceBar>().enumerate() {
        // Header is line 1.
        let line = i as u64 + 2;
        let bar = record?;
        if bar.is_void() || bar.close <= 0.0 {
            return Err(ImportError::InvalidRow {
                line,
                reason: format!("unusable prices on {}", bar.date),
            });
        }
        if !bar.split_factor.is_finite() || bar.split_factor <= 0.0 {
            return Err(ImportError::InvalidRow {
                line,
                reason: format!("split_factor {} on {}", bar.split_factor, bar.date),
            });
        }
        if !bar.is_sane() {
            warn!(line, date = %bar.date, "OHLC values are inconsistent; keeping row");
        }
        bars.push(bar);
    }

    bars.sort_by_key(|b| b.date);
    if let Some(dup) = bars.windows(2).find(|w| w[0].date == w[1].date) {
        return Err(ImportError::InvalidRow {
            line: 0,
            reason: format!("duplicate date {}", dup[0].date),
        });
    }
    Ok(bars)
}

/// Import a CSV file for `symbol`: upsert its bars and register the symbol.
pub fn import_file<S: SignalStore + ?Sized>(
    store: &S,
    symbol: &str,
    path: &Path,
) -> Result<ImportSummary, ImportError> {
    let file = std::fs::File::open(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let bars = read_bars(file)?;
    let rows = store.upsert_bars(symbol, &bars)?;
    store.register_symbol(symbol)?;
    info!(symbol, rows, path = %path.display(), "bars imported");
    Ok(ImportSummary {
        symbol: symbol.to_string(),
        rows,
        first: bars.first().map(|b| b.date),
        last: bars.last().map(|b| b.date),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const SAMPLE: &str = "\
date,open,high,low,close,volume
2024-01-03,11,12,10,11.5,2000
2024-01-02,10,11,9,10.5,1000
";

    #[test]
    fn reads_and_sorts() {
        let bars = read_bars(SAMPLE.as_bytes()).unwrap();
        assert_eq!(bars.len(), 2);
        assert!(bars[0].date < bars[1].date);
        assert_eq!(bars[0].close, 10.5);
        assert_eq!(bars[0].split_factor, 1.0);
    }

    #[test]
    fn optional_split_column() {
        let text = "date,open,high,low,close,volume,split_factor\n\
                    2024-01-02,10,11,9,10.5,1000,1\n\
                    2024-01-03,5,6,4,5.5,1000,2\n";
        let bars = read_bars(text.as_bytes()).unwrap();
        assert!(!bars[0].has_split());
        assert!(bars[1].has_split());
    }

    #[test]
    fn bad_date_is_csv_error() {
        let text = "date,open,high,low,close,volume\n01/02/2024,10,11,9,10.5,1000\n";
        assert!(matches!(read_bars(text.as_bytes()), Err(ImportError::Csv(_))));
    }

    #[test]
    fn non_positive_close_names_line() {
        let text = "date,open,high,low,close,volume\n\
                    2024-01-02,10,11,9,10.5,1000\n\
                    2024-01-03,10,11,9,0,1000\n";
        match read_bars(text.as_bytes()) {
            Err(ImportError::InvalidRow { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected InvalidRow, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_dates_rejected() {
        let text = "date,open,high,low,close,volume\n\
                    2024-01-02,10,11,9,10.5,1000\n\
                    2024-01-02,10,11,9,10.6,1000\n";
        assert!(matches!(
            read_bars(text.as_bytes()),
            Err(ImportError::InvalidRow { .. })
        ));
    }

    #[test]
    fn import_registers_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acme.csv");
        std::fs::write(&path, SAMPLE).unwrap();

        let store = MemoryStore::new();
        let summary = import_file(&store, "ACME", &path).unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(store.list_symbols(None).unwrap(), ["ACME"]);
        assert_eq!(
            store
                .load_bars("ACME", summary.first.unwrap(), None)
                .unwrap()
                .len(),
            2
        );
    }
}
