//! Criterion benchmarks for tradeloop hot paths.
//!
//! Benchmarks:
//! 1. Simulation loop (full bar walk with the built-in strategies)
//! 2. Price normalization
//! 3. ATR over a signal window

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use tradeloop_core::domain::{Bar, BarOpen, Direction, InstrumentProfile, Tick};
use tradeloop_core::engine::{SimulationEngine, SymbolSetup};
use tradeloop_core::execution::normalize;
use tradeloop_core::indicators::average_true_range;
use tradeloop_core::signals::{Aggression, SignalSource, StrategyParams, StrategyRegistry};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize) -> Vec<Bar> {
    let base = Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            let open = close - 0.3;
            Bar {
                symbol: "BENCH".into(),
                timestamp: base + chrono::Duration::minutes(15 * i as i64),
                open,
                high: close + 1.5,
                low: close - 1.5,
                close,
                volume: 1_000.0 + (i % 500) as f64,
            }
        })
        .collect()
}

fn sources() -> Vec<Box<dyn SignalSource>> {
    let registry = StrategyRegistry::builtin();
    registry
        .names()
        .into_iter()
        .filter_map(|name| {
            registry
                .create(name, &StrategyParams::new(), Aggression::Medium)
                .ok()
        })
        .collect()
}

// ── 1. Simulation loop ───────────────────────────────────────────────

fn bench_simulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation");
    for &n in &[1_000usize, 10_000] {
        let bars = make_bars(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &bars, |b, bars| {
            b.iter(|| {
                let setup = SymbolSetup {
                    profile: InstrumentProfile::new("BENCH", 2, 0.01, 5, 100.0),
                    volume: 0.1,
                };
                let mut engine = SimulationEngine::new(100_000.0, sources(), [setup]);
                for (i, bar) in bars.iter().enumerate() {
                    let next = bars.get(i + 1).map(BarOpen::of);
                    let _ = engine.advance(bar.clone(), next);
                }
                black_box(engine.finish())
            })
        });
    }
    group.finish();
}

// ── 2. Normalization ─────────────────────────────────────────────────

fn bench_normalize(c: &mut Criterion) {
    let profile = InstrumentProfile::new("EURUSD", 5, 0.00001, 10, 100_000.0);
    let tick = Tick {
        timestamp: Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap(),
        bid: 1.08412,
        ask: 1.08419,
        last: 1.08412,
    };
    c.bench_function("normalize_long", |b| {
        b.iter(|| {
            normalize(
                black_box(Direction::Long),
                black_box(&tick),
                black_box(1.0831234),
                black_box(1.0862178),
                &profile,
            )
        })
    });
}

// ── 3. ATR ───────────────────────────────────────────────────────────

fn bench_atr(c: &mut Criterion) {
    let bars = make_bars(200);
    c.bench_function("atr_14_window_200", |b| {
        b.iter(|| average_true_range(black_box(&bars), 14))
    });
}

criterion_group!(benches, bench_simulation, bench_normalize, bench_atr);
criterion_main!(benches);
