//! SQLite gateway round trips on a temporary database file.

use anchorline_core::domain::{PriceBar, TradeSignal, ZoneColor, ZoneHistory, ZoneRecord};
use anchorline_runner::{run, MemoryStore, RunSection, SignalStore, SqliteStore, StoreConfig, StoreError};
use chrono::NaiveDate;
use rusqlite::Connection;

fn d(i: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 3).unwrap() + chrono::Duration::days(i)
}

fn bar(i: i64, high: f64, low: f64, close: f64) -> PriceBar {
    PriceBar {
        date: d(i),
        open: close,
        high,
        low,
        close,
        volume: 1000,
        split_factor: 1.0,
    }
}

fn buy_then_sell_bars() -> Vec<PriceBar> {
    vec![
        bar(0, 101.0, 99.0, 100.0),
        bar(1, 99.0, 97.0, 98.0),
        bar(2, 98.0, 96.0, 97.0),
        bar(3, 104.0, 100.0, 103.5),
        bar(4, 103.0, 99.0, 99.5),
    ]
}

fn temp_store() -> (tempfile::TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        path: dir.path().join("signals.db"),
    };
    let store = SqliteStore::new(&config).unwrap();
    (dir, store)
}

#[test]
fn bars_round_trip_in_order() {
    let (_dir, store) = temp_store();
    let mut bars = buy_then_sell_bars();
    bars[2].split_factor = 0.5;
    bars.reverse();
    assert_eq!(store.upsert_bars("ACME", &bars).unwrap(), 5);

    let loaded = store.load_bars("ACME", d(0), None).unwrap();
    assert_eq!(loaded.len(), 5);
    assert!(loaded.windows(2).all(|w| w[0].date < w[1].date));
    assert_eq!(loaded[2].split_factor, 0.5);
    assert_eq!(loaded[3], buy_then_sell_bars()[3]);

    let window = store.load_bars("ACME", d(1), Some(d(3))).unwrap();
    assert_eq!(window.first().unwrap().date, d(1));
    assert_eq!(window.last().unwrap().date, d(3));
}

#[test]
fn upsert_overwrites_same_date() {
    let (_dir, store) = temp_store();
    store.upsert_bars("ACME", &[bar(0, 11.0, 9.0, 10.0)]).unwrap();
    store.upsert_bars("ACME", &[bar(0, 13.0, 11.0, 12.0)]).unwrap();
    let loaded = store.load_bars("ACME", d(0), None).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].close, 12.0);
}

#[test]
fn state_lifecycle() {
    let (_dir, store) = temp_store();
    store.register_symbol("ACME").unwrap();
    store.register_symbol("ACME").unwrap();
    assert_eq!(store.load_state("ACME").unwrap(), None);
    assert_eq!(store.load_state("NOPE").unwrap(), None);

    store.update_all_time_high("ACME", 103.5, d(3)).unwrap();
    store.update_last_trade_signal("ACME", TradeSignal::Buy).unwrap();
    store.update_anchored_vwap_at_buy("ACME", 99.375).unwrap();
    store.update_trade_signal("ACME", Some(TradeSignal::Buy)).unwrap();

    let state = store.load_state("ACME").unwrap().unwrap();
    assert_eq!(state.all_time_high, 103.5);
    assert_eq!(state.all_time_high_date, d(3));
    assert_eq!(state.last_trade_signal, Some(TradeSignal::Buy));
    assert_eq!(state.trade_signal, Some(TradeSignal::Buy));
    assert_eq!(state.anchored_vwap_at_buy, Some(99.375));

    store.update_trade_signal("ACME", None).unwrap();
    assert_eq!(store.load_state("ACME").unwrap().unwrap().trade_signal, None);
}

#[test]
fn anchor_update_creates_missing_row() {
    let (_dir, store) = temp_store();
    store.update_all_time_high("NEW", 10.0, d(0)).unwrap();
    assert_eq!(store.list_symbols(None).unwrap(), ["NEW"]);
}

#[test]
fn signal_update_on_unknown_symbol_is_not_found() {
    let (_dir, store) = temp_store();
    assert!(matches!(
        store.update_trade_signal("NOPE", Some(TradeSignal::Sell)),
        Err(StoreError::NotFound { .. })
    ));
}

#[test]
fn symbols_sorted_limited_and_filtered() {
    let (_dir, store) = temp_store();
    for symbol in ["TSLA", "AAPL", "MSFT"] {
        store.register_symbol(symbol).unwrap();
    }
    assert_eq!(store.list_symbols(None).unwrap(), ["AAPL", "MSFT", "TSLA"]);
    assert_eq!(store.list_symbols(Some(1)).unwrap(), ["AAPL"]);

    store.update_trade_signal("TSLA", Some(TradeSignal::Sell)).unwrap();
    store.update_trade_signal("AAPL", Some(TradeSignal::Sell)).unwrap();
    store.update_trade_signal("MSFT", Some(TradeSignal::Buy)).unwrap();
    assert_eq!(
        store.symbols_with_signal(TradeSignal::Sell).unwrap(),
        ["AAPL", "TSLA"]
    );
    assert_eq!(store.symbols_with_signal(TradeSignal::Buy).unwrap(), ["MSFT"]);
}

#[test]
fn zones_are_replaced_wholesale() {
    let (_dir, store) = temp_store();
    let first = ZoneHistory::from_records(vec![
        ZoneRecord {
            color: ZoneColor::Green,
            change_date: d(0),
        },
        ZoneRecord {
            color: ZoneColor::Red,
            change_date: d(5),
        },
    ]);
    store.replace_zones(&first).unwrap();
    assert_eq!(store.load_zones().unwrap(), first);

    let second = ZoneHistory::from_records(vec![ZoneRecord {
        color: ZoneColor::Green,
        change_date: d(9),
    }]);
    store.replace_zones(&second).unwrap();
    assert_eq!(store.load_zones().unwrap(), second);

    store.replace_zones(&ZoneHistory::new()).unwrap();
    assert!(store.load_zones().unwrap().is_empty());
}

#[test]
fn unknown_signal_text_is_corrupt() {
    let (dir, store) = temp_store();
    store.register_symbol("ACME").unwrap();
    store.update_all_time_high("ACME", 10.0, d(0)).unwrap();

    let conn = Connection::open(dir.path().join("signals.db")).unwrap();
    conn.execute(
        "UPDATE instruments SET last_trade_signal = 'HOLD' WHERE symbol = 'ACME'",
        [],
    )
    .unwrap();

    assert!(matches!(
        store.load_state("ACME"),
        Err(StoreError::Corrupt { .. })
    ));
}

#[test]
fn run_matches_memory_store() {
    let (_dir, sqlite) = temp_store();
    let memory = MemoryStore::new();
    let section = RunSection {
        start_date: d(0),
        ..RunSection::default()
    };
    for store in [&sqlite as &dyn SignalStore, &memory as &dyn SignalStore] {
        store.register_symbol("ACME").unwrap();
        store.upsert_bars("ACME", &buy_then_sell_bars()).unwrap();
    }

    let a = run(&sqlite, &section).unwrap();
    let b = run(&memory, &section).unwrap();
    assert_eq!(a.report, b.report);
    assert_eq!(a.instruments, b.instruments);
    assert_eq!(a.report.sell, ["ACME"]);
}
