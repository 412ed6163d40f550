//! SQLite gateway.
//!
//! Each trait call opens its own connection, does its work and drops it.
//! Multi-row writes (`upsert_bars`, `replace_zones`) run in one transaction.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use anchorline_core::domain::{
    InstrumentState, PriceBar, TradeSignal, ZoneColor, ZoneHistory, ZoneRecord,
};

use super::{parse_date, SignalStore, StoreError, DATE_FORMAT};
use crate::config::StoreConfig;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS instruments (
    symbol               TEXT PRIMARY KEY,
    all_time_high        REAL,
    all_time_high_date   TEXT,
    trade_signal         TEXT,
    last_trade_signal    TEXT,
    anchored_vwap_at_buy REAL
);
CREATE TABLE IF NOT EXISTS daily_bars (
    symbol       TEXT    NOT NULL,
    date         TEXT    NOT NULL,
    open         REAL    NOT NULL,
    high         REAL    NOT NULL,
    low          REAL    NOT NULL,
    close        REAL    NOT NULL,
    volume       INTEGER NOT NULL,
    split_factor REAL    NOT NULL DEFAULT 1.0,
    PRIMARY KEY (symbol, date)
);
CREATE TABLE IF NOT EXISTS zone_state (
    id                INTEGER PRIMARY KEY,
    state_color       TEXT NOT NULL,
    state_change_date TEXT NOT NULL
);
";

/// SQLite-backed [`SignalStore`].
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if needed) the database named by `config` and make
    /// sure the schema exists.
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let store = Self {
            path: config.path.clone(),
        };
        store.connect()?.execute_batch(SCHEMA)?;
        debug!(path = %store.path.display(), "sqlite store ready");
        Ok(store)
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        Ok(Connection::open(&self.path)?)
    }

    /// Run an UPDATE on one instrument row; zero affected rows is NotFound.
    fn update_row(
        &self,
        sql: &str,
        symbol: &str,
        value: &dyn rusqlite::ToSql,
    ) -> Result<(), StoreError> {
        let conn = self.connect()?;
        let changed = conn.execute(sql, params![value, symbol])?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                symbol: symbol.to_string(),
            });
        }
        Ok(())
    }
}

fn parse_signal(raw: Option<String>) -> Result<Option<TradeSignal>, StoreError> {
    raw.map(|s| {
        TradeSignal::from_str(&s).map_err(|detail| StoreError::Corrupt {
            what: "trade signal",
            detail,
        })
    })
    .transpose()
}

fn volume_to_sql(volume: u64) -> Result<i64, StoreError> {
    i64::try_from(volume).map_err(|_| StoreError::Corrupt {
        what: "volume",
        detail: format!("{volume} exceeds the storable range"),
    })
}

impl SignalStore for SqliteStore {
    fn list_symbols(&self, limit: Option<usize>) -> Result<Vec<String>, StoreError> {
        let conn = self.connect()?;
        // LIMIT -1 is "no limit" in SQLite.
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        let mut stmt =
            conn.prepare("SELECT symbol FROM instruments ORDER BY symbol ASC LIMIT ?1")?;
        let symbols = stmt
            .query_map(params![limit], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(symbols)
    }

    fn register_symbol(&self, symbol: &str) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT OR IGNORE INTO instruments (symbol) VALUES (?1)",
            params![symbol],
        )?;
        Ok(())
    }

    fn load_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PriceBar>, StoreError> {
        let conn = self.connect()?;
        let start = start.format(DATE_FORMAT).to_string();
        let end = end.map(|d| d.format(DATE_FORMAT).to_string());
        let mut stmt = conn.prepare(
            "SELECT date, open, high, low, close, volume, split_factor
             FROM daily_bars
             WHERE symbol = ?1 AND date >= ?2 AND (?3 IS NULL OR date <= ?3)
             ORDER BY date ASC",
        )?;
        let raw = stmt
            .query_map(params![symbol, start, end], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, f64>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(date, open, high, low, close, volume, split_factor)| -> Result<_, StoreError> {
                Ok(PriceBar {
                    date: parse_date(&date)?,
                    open,
                    high,
                    low,
                    close,
                    volume: u64::try_from(volume).map_err(|_| StoreError::Corrupt {
                        what: "volume",
                        detail: format!("negative volume {volume} on {date}"),
                    })?,
                    split_factor,
                })
            })
            .collect()
    }

    fn upsert_bars(&self, symbol: &str, bars: &[PriceBar]) -> Result<usize, StoreError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let mut count = 0;

        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO daily_bars
                 (symbol, date, open, high, low, close, volume, split_factor)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for bar in bars {
                stmt.execute(params![
                    symbol,
                    bar.date.format(DATE_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    volume_to_sql(bar.volume)?,
                    bar.split_factor,
                ])?;
                count += 1;
            }
        }

        tx.commit()?;
        Ok(count)
    }

    fn load_state(&self, symbol: &str) -> Result<Option<InstrumentState>, StoreError> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT all_time_high, all_time_high_date, trade_signal,
                        last_trade_signal, anchored_vwap_at_buy
                 FROM instruments WHERE symbol = ?1",
                params![symbol],
                |row| {
                    Ok((
                        row.get::<_, Option<f64>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<f64>>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((Some(high), Some(high_date), trade, last, vwap)) = row else {
            return Ok(None);
        };
        Ok(Some(InstrumentState {
            symbol: symbol.to_string(),
            all_time_high: high,
            all_time_high_date: parse_date(&high_date)?,
            trade_signal: parse_signal(trade)?,
            last_trade_signal: parse_signal(last)?,
            anchored_vwap_at_buy: vwap,
        }))
    }

    fn update_all_time_high(
        &self,
        symbol: &str,
        price: f64,
        date: NaiveDate,
    ) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO instruments (symbol, all_time_high, all_time_high_date)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(symbol) DO UPDATE SET
                 all_time_high = excluded.all_time_high,
                 all_time_high_date = excluded.all_time_high_date",
            params![symbol, price, date.format(DATE_FORMAT).to_string()],
        )?;
        Ok(())
    }

    fn update_trade_signal(
        &self,
        symbol: &str,
        signal: Option<TradeSignal>,
    ) -> Result<(), StoreError> {
        self.update_row(
            "UPDATE instruments SET trade_signal = ?1 WHERE symbol = ?2",
            symbol,
            &signal.map(|s| s.as_str()),
        )
    }

    fn update_last_trade_signal(
        &self,
        symbol: &str,
        signal: TradeSignal,
    ) -> Result<(), StoreError> {
        self.update_row(
            "UPDATE instruments SET last_trade_signal = ?1 WHERE symbol = ?2",
            symbol,
            &signal.as_str(),
        )
    }

    fn update_anchored_vwap_at_buy(&self, symbol: &str, vwap: f64) -> Result<(), StoreError> {
        self.update_row(
            "UPDATE instruments SET anchored_vwap_at_buy = ?1 WHERE symbol = ?2",
            symbol,
            &vwap,
        )
    }

    fn load_zones(&self) -> Result<ZoneHistory, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT state_color, state_change_date FROM zone_state ORDER BY state_change_date ASC",
        )?;
        let raw = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let records = raw
            .into_iter()
            .map(|(color, date)| -> Result<_, StoreError> {
                Ok(ZoneRecord {
                    color: ZoneColor::from_str(&color).map_err(|detail| {
                        StoreError::Corrupt {
                            what: "zone color",
                            detail,
                        }
                    })?,
                    change_date: parse_date(&date)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ZoneHistory::from_records(records))
    }

    fn replace_zones(&self, zones: &ZoneHistory) -> Result<(), StoreError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM zone_state", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO zone_state (state_color, state_change_date) VALUES (?1, ?2)",
            )?;
            for record in zones.records() {
                stmt.execute(params![
                    record.color.as_str(),
                    record.change_date.format(DATE_FORMAT).to_string(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn symbols_with_signal(&self, signal: TradeSignal) -> Result<Vec<String>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT symbol FROM instruments WHERE trade_signal = ?1 ORDER BY symbol ASC",
        )?;
        let symbols = stmt
            .query_map(params![signal.as_str()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(symbols)
    }
}
