use serde::{Deserialize, Serialize};

/// Running balance plus the terminal ruin flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    initial_balance: f64,
    balance: f64,
    ruined: bool,
}

impl AccountState {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            initial_balance,
            balance: initial_balance,
            ruined: initial_balance <= 0.0,
        }
    }

    /// Book a realized profit. Returns true if this close ruined the account.
    ///
    /// `ruined` never resets once set.
    pub fn apply_profit(&mut self, profit: f64) -> bool {
        self.balance += profit;
        if !self.ruined && self.balance <= 0.0 {
            self.ruined = true;
            return true;
        }
        false
    }

    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn is_ruined(&self) -> bool {
        self.ruined
    }

    /// Net change since the start of the run.
    pub fn net_pnl(&self) -> f64 {
        self.balance - self.initial_balance
    }
}
