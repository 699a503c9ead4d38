//! Domain types for tradeloop

pub mod account;
pub mod bar;
pub mod ids;
pub mod instrument;
pub mod order;
pub mod position;
pub mod trade;

pub use account::AccountState;
pub use bar::{Bar, BarError, BarOpen, PriceSeries, Tick};
pub use ids::{Ticket, TicketAllocator};
pub use instrument::InstrumentProfile;
pub use order::{Direction, OrderIntent};
pub use position::Position;
pub use trade::{CloseReason, ClosedTrade};

/// Symbol type alias
pub type Symbol = String;
