//! Trade reporter shared by the live workers and the reporting thread.
//!
//! Pulls closed deals from the venue, books each one exactly once against
//! the session account and answers performance queries. Ruin is decided
//! here: the first booked deal that takes the balance to zero or below
//! flips the account, and every worker sees it on its next cycle.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{error, info};
use tradeloop_core::domain::{AccountState, ClosedTrade, Ticket};
use tradeloop_core::execution::{ExecutionVenue, VenueError};

use crate::metrics::PerformanceReport;

#[derive(Debug)]
struct ReporterState {
    account: AccountState,
    processed: BTreeSet<Ticket>,
    trades: Vec<ClosedTrade>,
}

#[derive(Debug)]
pub struct TradeReporter {
    since: DateTime<Utc>,
    state: Mutex<ReporterState>,
}

impl TradeReporter {
    /// `since` bounds the deal history this session is responsible for.
    pub fn new(initial_balance: f64, since: DateTime<Utc>) -> Self {
        Self {
            since,
            state: Mutex::new(ReporterState {
                account: AccountState::new(initial_balance),
                processed: BTreeSet::new(),
                trades: Vec::new(),
            }),
        }
    }

    /// Fetch deals closed since the session start and book the new ones.
    /// Returns how many were new.
    pub fn sync(&self, venue: &dyn ExecutionVenue) -> Result<usize, VenueError> {
        let deals = venue.closed_deals(self.since, Utc::now())?;
        Ok(self.record(deals))
    }

    /// Book deals not seen before, in the order given.
    pub fn record(&self, deals: impl IntoIterator<Item = ClosedTrade>) -> usize {
        let mut state = self.state.lock();
        let mut added = 0;
        for deal in deals {
            if !state.processed.insert(deal.ticket) {
                continue;
            }
            info!(
                symbol = %deal.symbol,
                ticket = %deal.ticket,
                strategy = %deal.strategy,
                reason = %deal.reason,
                profit = deal.profit,
                "deal booked"
            );
            if state.account.apply_profit(deal.profit) {
                error!(
                    ticket = %deal.ticket,
                    balance = state.account.balance(),
                    "account ruined, halting new orders"
                );
            }
            state.trades.push(deal);
            added += 1;
        }
        added
    }

    pub fn is_ruined(&self) -> bool {
        self.state.lock().account.is_ruined()
    }

    pub fn account(&self) -> AccountState {
        self.state.lock().account.clone()
    }

    /// Booked trades in booking order.
    pub fn trades(&self) -> Vec<ClosedTrade> {
        self.state.lock().trades.clone()
    }

    pub fn report(&self) -> PerformanceReport {
        PerformanceReport::compute(&self.state.lock().trades)
    }

    /// Log the current report.
    pub fn log_report(&self) {
        let report = self.report();
        if report.total_trades == 0 {
            info!("performance report: no closed trades yet");
            return;
        }
        info!(
            total_trades = report.total_trades,
            wins = report.wins,
            losses = report.losses,
            win_rate = report.win_rate,
            total_pnl = report.total_pnl,
            profit_factor = report.profit_factor,
            max_drawdown = report.max_drawdown,
            "performance report"
        );
    }
}
