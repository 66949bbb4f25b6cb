//! Criterion benchmarks for simulation hot paths.
//!
//! Benchmarks:
//! 1. Calendar construction (NYSE schedule over multi-year ranges)
//! 2. Clock ticking (minute and daily steps)
//! 3. Gap detection (sparse caches over long histories)
//! 4. Event dispatch (many subscribers, many emits)

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::cell::RefCell;
use std::rc::Rc;
use tradesim::calendar::TradingCalendar;
use tradesim::clock::SimulationClock;
use tradesim::data::missing_date_ranges;
use tradesim::domain::{Bar, Contract, Resolution};
use tradesim::events::{BarEvent, Subscribers};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

// ── 1. Calendar Construction ─────────────────────────────────────────

fn bench_calendar(c: &mut Criterion) {
    let mut group = c.benchmark_group("calendar");

    for &years in &[1, 5, 10] {
        group.bench_with_input(BenchmarkId::new("nyse", years), &years, |b, &years| {
            let start = d(2010, 1, 1);
            let end = d(2010 + years - 1, 12, 31);
            b.iter(|| TradingCalendar::nyse(black_box(start), black_box(end)));
        });
    }

    group.finish();
}

// ── 2. Clock Ticking ─────────────────────────────────────────────────

fn bench_clock(c: &mut Criterion) {
    let mut group = c.benchmark_group("clock");

    group.bench_function("minute_ticks_one_quarter", |b| {
        b.iter(|| {
            let mut clock =
                SimulationClock::new(d(2020, 1, 2), d(2020, 3, 31), Resolution::Minutes(1))
                    .unwrap();
            let mut ticks = 0u64;
            while clock.tick().is_ok() {
                ticks += 1;
            }
            black_box(ticks)
        });
    });

    group.bench_function("daily_ticks_ten_years", |b| {
        b.iter(|| {
            let mut clock =
                SimulationClock::new(d(2010, 1, 4), d(2019, 12, 31), Resolution::Daily).unwrap();
            let mut ticks = 0u64;
            while clock.tick().is_ok() {
                ticks += 1;
            }
            black_box(ticks)
        });
    });

    group.finish();
}

// ── 3. Gap Detection ─────────────────────────────────────────────────

fn bench_gap_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("gap_detection");

    let trading: Vec<NaiveDate> = TradingCalendar::nyse(d(2010, 1, 1), d(2019, 12, 31))
        .days()
        .iter()
        .map(|day| day.date)
        .collect();

    // every other session cached: the worst case for run coalescing
    let sparse: Vec<NaiveDate> = trading.iter().copied().step_by(2).collect();
    group.bench_function("alternating_ten_years", |b| {
        b.iter(|| missing_date_ranges(black_box(&trading), black_box(&sparse)));
    });

    let mostly_cached: Vec<NaiveDate> =
        trading.iter().copied().filter(|day| day.day() != 15).collect();
    group.bench_function("mostly_cached_ten_years", |b| {
        b.iter(|| missing_date_ranges(black_box(&trading), black_box(&mostly_cached)));
    });

    group.finish();
}

// ── 4. Event Dispatch ────────────────────────────────────────────────

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_dispatch");

    group.bench_function("emit_1000_to_100_subscribers", |b| {
        let event = BarEvent {
            contract: Contract::stock("SPY"),
            resolution: Resolution::Minutes(1),
            bar: Bar {
                datetime: d(2020, 1, 2).and_hms_opt(9, 31, 0).unwrap(),
                open: 100.0,
                high: 100.5,
                low: 99.5,
                close: 100.2,
                volume: 10_000.0,
            },
        };
        b.iter(|| {
            let mut subs: Subscribers<BarEvent> = Subscribers::new();
            let counter = Rc::new(RefCell::new(0u64));
            for _ in 0..100 {
                let sink = Rc::clone(&counter);
                subs.subscribe(Box::new(move |_| *sink.borrow_mut() += 1));
            }
            for _ in 0..1000 {
                subs.emit(black_box(&event));
            }
            black_box(*counter.borrow())
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_calendar,
    bench_clock,
    bench_gap_detection,
    bench_dispatch,
);
criterion_main!(benches);
