//! Criterion benchmarks for the signal hot paths.
//!
//! Benchmarks:
//! 1. Expanding-window replay of one instrument through `decide`
//! 2. Zone classification over a reference series
//! 3. Anchored VWAP from the first bar

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use anchorline_core::domain::{InstrumentState, PriceBar, ZoneColor};
use anchorline_core::engine::{decide, StepInput};
use anchorline_core::indicators::anchored_vwap;
use anchorline_core::regime::ZoneClassifier;

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize) -> Vec<PriceBar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            PriceBar {
                date: base_date + chrono::Duration::days(i as i64),
                open: close - 0.3,
                high: close + 1.5,
                low: close - 1.5,
                close,
                volume: 1_000_000 + (i as u64 % 500_000),
                split_factor: 1.0,
            }
        })
        .collect()
}

fn replay(bars: &[PriceBar]) -> Option<InstrumentState> {
    let mut state: Option<InstrumentState> = None;
    for i in 0..bars.len() {
        let input = StepInput {
            symbol: "BENCH",
            window: &bars[..=i],
            current_date: bars[i].date,
            is_today: i + 1 == bars.len(),
            zone: ZoneColor::Green,
        };
        if let Ok(outcome) = decide(state.as_ref(), &input) {
            state = Some(outcome.next);
        }
    }
    state
}

// ── 1. Replay ────────────────────────────────────────────────────────

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("instrument_replay");

    for &bar_count in &[252, 1260] {
        let bars = make_bars(bar_count);
        group.bench_with_input(BenchmarkId::new("decide_fold", bar_count), &bar_count, |b, _| {
            b.iter(|| replay(black_box(&bars)));
        });
    }

    group.finish();
}

// ── 2. Zones ─────────────────────────────────────────────────────────

fn bench_zones(c: &mut Criterion) {
    let mut group = c.benchmark_group("zone_classification");
    let classifier = ZoneClassifier::default();

    for &bar_count in &[1260, 2520] {
        let bars = make_bars(bar_count);
        group.bench_with_input(BenchmarkId::new("sma200_ema20", bar_count), &bar_count, |b, _| {
            b.iter(|| classifier.classify(black_box(&bars)));
        });
    }

    group.finish();
}

// ── 3. VWAP ──────────────────────────────────────────────────────────

fn bench_vwap(c: &mut Criterion) {
    let bars = make_bars(2520);
    let anchor = bars[0].date;
    c.bench_function("anchored_vwap_2520", |b| {
        b.iter(|| anchored_vwap(black_box(&bars), black_box(anchor)));
    });
}

criterion_group!(benches, bench_replay, bench_zones, bench_vwap);
criterion_main!(benches);
