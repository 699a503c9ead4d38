use serde::{Deserialize, Serialize};
use std::fmt;

/// Position ticket. Monotonic and unique for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticket(pub u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out tickets in increasing order, starting at 1.
#[derive(Debug, Clone)]
pub struct TicketAllocator {
    next: u64,
}

impl TicketAllocator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    pub fn next_ticket(&mut self) -> Ticket {
        let ticket = Ticket(self.next);
        self.next += 1;
        ticket
    }

    /// The ticket that will be issued next, without consuming it.
    pub fn peek(&self) -> Ticket {
        Ticket(self.next)
    }
}

impl Default for TicketAllocator {
    fn default() -> Self {
        Self::new()
    }
}
