//! Integration tests for the simulation engine.
//!
//! Tests:
//! 1. Next-bar-open entries with normalized levels
//! 2. Exit resolution: stop before target, exact exit prices
//! 3. Source priority: the first intent wins, later sources are skipped
//! 4. Malformed bars are rejected without touching state
//! 5. Ruin halts new entries everywhere; finish() still closes what is open

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tradeloop_core::domain::{
    Bar, BarError, BarOpen, CloseReason, Direction, InstrumentProfile, OrderIntent, Ticket, Tick,
};
use tradeloop_core::engine::{EngineError, SimulationEngine, SymbolSetup};
use tradeloop_core::signals::SignalSource;

// ── Helpers ──────────────────────────────────────────────────────────

fn t(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + chrono::Duration::minutes(minute)
}

fn bar(symbol: &str, minute: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        symbol: symbol.into(),
        timestamp: t(minute),
        open,
        high,
        low,
        close,
        volume: 100.0,
    }
}

fn setup(symbol: &str, tick_size: f64) -> SymbolSetup {
    SymbolSetup {
        profile: InstrumentProfile::new(symbol, 2, tick_size, 0, 1.0),
        volume: 1.0,
    }
}

/// Fires fixed levels, optionally only for one symbol or one window length.
struct FireAt {
    name: &'static str,
    symbol: Option<&'static str>,
    at_len: Option<usize>,
    direction: Direction,
    sl: f64,
    tp: f64,
    calls: Arc<AtomicUsize>,
}

impl FireAt {
    fn long(name: &'static str, sl: f64, tp: f64) -> Self {
        Self {
            name,
            symbol: None,
            at_len: None,
            direction: Direction::Long,
            sl,
            tp,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn only(mut self, symbol: &'static str) -> Self {
        self.symbol = Some(symbol);
        self
    }

    fn at(mut self, len: usize) -> Self {
        self.at_len = Some(len);
        self
    }
}

impl SignalSource for FireAt {
    fn name(&self) -> &str {
        self.name
    }

    fn warmup_bars(&self) -> usize {
        1
    }

    fn check_signal(&self, bars: &[Bar], tick: &Tick) -> Option<OrderIntent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let last = bars.last()?;
        if self.symbol.is_some_and(|s| s != last.symbol) {
            return None;
        }
        if self.at_len.is_some_and(|n| n != bars.len()) {
            return None;
        }
        Some(OrderIntent::new(self.direction, tick.ask, self.sl, self.tp, self.name))
    }
}

fn engine(balance: f64, sources: Vec<Box<dyn SignalSource>>, symbols: &[&str]) -> SimulationEngine {
    SimulationEngine::new(balance, sources, symbols.iter().map(|s| setup(s, 0.01)))
}

// ── 1. Entries ───────────────────────────────────────────────────────

#[test]
fn entry_fills_at_next_open() {
    let mut eng = engine(10_000.0, vec![Box::new(FireAt::long("first", 97.0, 103.0).at(1))], &["A"]);
    let b0 = bar("A", 0, 100.0, 101.0, 99.0, 100.0);
    let b1 = bar("A", 1, 100.5, 102.0, 99.5, 101.0);

    let closed = eng.advance(b0, Some(BarOpen::of(&b1))).unwrap();
    assert!(closed.is_empty());

    let pos = eng.ledger().position("A").unwrap();
    assert_eq!(pos.ticket, Ticket(1));
    assert_eq!(pos.entry_price, 100.5);
    assert_eq!(pos.entry_time, t(1));
    assert_eq!(pos.stop_loss, 97.0);
    assert_eq!(pos.take_profit, 103.0);
    assert_eq!(pos.strategy, "first");
}

#[test]
fn no_entry_without_next_open() {
    let mut eng = engine(10_000.0, vec![Box::new(FireAt::long("first", 97.0, 103.0))], &["A"]);
    eng.advance(bar("A", 0, 100.0, 101.0, 99.0, 100.0), None).unwrap();
    assert_eq!(eng.ledger().open_count(), 0);
}

#[test]
fn requested_levels_are_normalized() {
    // SL above the synthesized bid (bar low 99.0) is clamped one tick below it.
    let mut eng = engine(10_000.0, vec![Box::new(FireAt::long("first", 99.5, 103.004).at(1))], &["A"]);
    let b0 = bar("A", 0, 100.0, 101.0, 99.0, 100.0);
    let b1 = bar("A", 1, 100.5, 102.0, 99.5, 101.0);
    eng.advance(b0, Some(BarOpen::of(&b1))).unwrap();
    let pos = eng.ledger().position("A").unwrap();
    assert_eq!(pos.stop_loss, 98.99);
    assert_eq!(pos.take_profit, 103.0);
}

#[test]
fn rejected_normalization_drops_signal() {
    let sources: Vec<Box<dyn SignalSource>> = vec![Box::new(FireAt::long("first", 97.0, 103.0))];
    let mut eng = SimulationEngine::new(10_000.0, sources, [setup("A", 0.0)]);
    let b0 = bar("A", 0, 100.0, 101.0, 99.0, 100.0);
    let b1 = bar("A", 1, 100.5, 102.0, 99.5, 101.0);
    assert!(eng.advance(b0, Some(BarOpen::of(&b1))).unwrap().is_empty());
    assert_eq!(eng.ledger().open_count(), 0);
    assert!(eng.advance(b1, None).is_ok());
}

// ── 2. Exits ─────────────────────────────────────────────────────────

#[test]
fn take_profit_exits_at_exact_level() {
    let mut eng = engine(10_000.0, vec![Box::new(FireAt::long("first", 97.0, 103.0).at(1))], &["A"]);
    let bars = [
        bar("A", 0, 100.0, 101.0, 99.0, 100.0),
        bar("A", 1, 100.5, 102.0, 99.5, 101.0),
        bar("A", 2, 101.0, 103.5, 100.5, 103.0),
    ];
    eng.advance(bars[0].clone(), Some(BarOpen::of(&bars[1]))).unwrap();
    assert!(eng.advance(bars[1].clone(), Some(BarOpen::of(&bars[2]))).unwrap().is_empty());
    let closed = eng.advance(bars[2].clone(), None).unwrap();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].reason, CloseReason::TakeProfit);
    assert_eq!(closed[0].exit_price, 103.0);
    assert_eq!(closed[0].exit_time, t(2));
    assert!((closed[0].profit - 2.5).abs() < 1e-9);
    assert!((eng.ledger().account().balance() - 10_002.5).abs() < 1e-9);
}

#[test]
fn stop_wins_when_bar_crosses_both() {
    let mut eng = engine(10_000.0, vec![Box::new(FireAt::long("first", 97.0, 103.0).at(1))], &["A"]);
    let b0 = bar("A", 0, 100.0, 101.0, 99.0, 100.0);
    let b1 = bar("A", 1, 100.5, 104.0, 96.0, 100.0);
    eng.advance(b0, Some(BarOpen::of(&b1))).unwrap();
    let closed = eng.advance(b1, None).unwrap();
    assert_eq!(closed[0].reason, CloseReason::StopLoss);
    assert_eq!(closed[0].exit_price, closed[0].stop_loss);
}

#[test]
fn re_entry_allowed_on_the_closing_bar() {
    let mut eng = engine(10_000.0, vec![Box::new(FireAt::long("first", 97.0, 103.0))], &["A"]);
    let b0 = bar("A", 0, 100.0, 101.0, 99.0, 100.0);
    let b1 = bar("A", 1, 100.5, 103.5, 99.5, 103.0);
    let b2 = bar("A", 2, 103.0, 103.5, 102.0, 103.0);
    eng.advance(b0, Some(BarOpen::of(&b1))).unwrap();
    let closed = eng.advance(b1, Some(BarOpen::of(&b2))).unwrap();
    assert_eq!(closed.len(), 1);
    let pos = eng.ledger().position("A").unwrap();
    assert_eq!(pos.ticket, Ticket(2));
    assert_eq!(pos.entry_time, t(2));
}

// ── 3. Source priority ───────────────────────────────────────────────

#[test]
fn first_intent_wins() {
    let first = FireAt::long("first", 97.0, 103.0).at(1);
    let second = FireAt::long("second", 96.0, 104.0);
    let second_calls = second.calls.clone();
    let mut eng = engine(10_000.0, vec![Box::new(first), Box::new(second)], &["A"]);

    let b0 = bar("A", 0, 100.0, 101.0, 99.0, 100.0);
    let b1 = bar("A", 1, 100.5, 102.0, 99.5, 101.0);
    eng.advance(b0, Some(BarOpen::of(&b1))).unwrap();

    assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    assert_eq!(eng.ledger().position("A").unwrap().strategy, "first");
    assert_eq!(eng.source_names(), vec!["first", "second"]);
}

#[test]
fn sources_not_queried_while_position_open() {
    let first = FireAt::long("first", 90.0, 110.0);
    let calls = first.calls.clone();
    let mut eng = engine(10_000.0, vec![Box::new(first)], &["A"]);
    let b0 = bar("A", 0, 100.0, 101.0, 99.0, 100.0);
    let b1 = bar("A", 1, 100.5, 102.0, 99.5, 101.0);
    let b2 = bar("A", 2, 101.0, 102.0, 100.0, 101.0);
    eng.advance(b0, Some(BarOpen::of(&b1))).unwrap();
    eng.advance(b1, Some(BarOpen::of(&b2))).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(eng.ledger().open_count(), 1);
}

// ── 4. Malformed bars ────────────────────────────────────────────────

#[test]
fn malformed_bars_leave_state_untouched() {
    let mut eng = engine(10_000.0, vec![Box::new(FireAt::long("first", 97.0, 103.0).at(2))], &["A"]);
    let b0 = bar("A", 0, 100.0, 101.0, 99.0, 100.0);
    let b1 = bar("A", 1, 100.5, 102.0, 99.5, 101.0);
    eng.advance(b0.clone(), Some(BarOpen::of(&b1))).unwrap();

    let nan = bar("A", 1, f64::NAN, 102.0, 99.5, 101.0);
    assert!(matches!(
        eng.advance(nan, None),
        Err(EngineError::Data(BarError::NonFinitePrice { .. }))
    ));
    let inverted = bar("A", 1, 100.0, 99.0, 101.0, 100.0);
    assert!(matches!(
        eng.advance(inverted, None),
        Err(EngineError::Data(BarError::InconsistentRange { .. }))
    ));
    assert!(matches!(
        eng.advance(b0, None),
        Err(EngineError::Data(BarError::NonMonotonic { .. }))
    ));
    assert_eq!(eng.history("A").unwrap().len(), 1);

    // The next valid bar is processed as if nothing happened.
    let b2 = bar("A", 2, 101.0, 102.0, 100.0, 101.0);
    eng.advance(b1, Some(BarOpen::of(&b2))).unwrap();
    assert_eq!(eng.history("A").unwrap().len(), 2);
    assert_eq!(eng.ledger().open_count(), 1);
}

#[test]
fn unknown_symbol_is_an_error() {
    let mut eng = engine(10_000.0, Vec::new(), &["A"]);
    let err = eng.advance(bar("Z", 0, 1.0, 1.0, 1.0, 1.0), None).unwrap_err();
    assert_eq!(err, EngineError::UnknownSymbol("Z".into()));
}

// ── 5. Ruin and finish ───────────────────────────────────────────────

#[test]
fn ruin_halts_entries_on_every_symbol() {
    let sources: Vec<Box<dyn SignalSource>> = vec![
        Box::new(FireAt::long("a_only", 97.0, 103.0).only("A").at(1)),
        Box::new(FireAt::long("b_always", 97.0, 103.0).only("B")),
    ];
    let mut eng = engine(1.0, sources, &["A", "B"]);

    let a0 = bar("A", 0, 100.0, 101.0, 99.0, 100.0);
    let a1 = bar("A", 1, 100.5, 101.0, 96.0, 97.5);
    eng.advance(a0, Some(BarOpen::of(&a1))).unwrap();
    let closed = eng.advance(a1, None).unwrap();
    assert_eq!(closed[0].reason, CloseReason::StopLoss);
    assert!(eng.ledger().is_ruined());

    let b0 = bar("B", 2, 100.0, 101.0, 99.0, 100.0);
    let b1 = bar("B", 3, 100.0, 101.0, 99.0, 100.0);
    eng.advance(b0, Some(BarOpen::of(&b1))).unwrap();
    assert_eq!(eng.ledger().open_count(), 0);
    assert!(eng.ledger().closed_trades().iter().all(|t| t.symbol == "A"));
}

#[test]
fn finish_force_closes_even_when_ruined() {
    let mut eng = engine(2.0, vec![Box::new(FireAt::long("first", 97.0, 103.0).at(1))], &["A", "B"]);

    let a0 = bar("A", 0, 100.0, 101.0, 99.0, 100.0);
    let b0 = bar("B", 0, 100.0, 101.0, 99.0, 100.0);
    let a1 = bar("A", 1, 100.5, 101.0, 96.0, 97.5);
    let b1 = bar("B", 1, 100.5, 101.0, 99.0, 100.25);

    eng.advance(a0, Some(BarOpen::of(&a1))).unwrap();
    eng.advance(b0, Some(BarOpen::of(&b1))).unwrap();
    assert_eq!(eng.ledger().open_count(), 2);

    eng.advance(a1, None).unwrap();
    eng.advance(b1, None).unwrap();
    assert!(eng.ledger().is_ruined());

    let forced = eng.finish();
    assert_eq!(forced.len(), 1);
    assert_eq!(forced[0].symbol, "B");
    assert_eq!(forced[0].reason, CloseReason::ForcedClose);
    assert_eq!(forced[0].exit_price, 100.25);
    assert_eq!(eng.ledger().open_count(), 0);
    assert_eq!(eng.ledger().closed_trades().len(), 2);
}
