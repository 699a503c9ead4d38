//! Execution: price normalization and the venue capability.
//!
//! - **Normalizer**: requested SL/TP → tick-quantized, broker-valid levels
//! - **Venue**: the narrow interface live trading needs from a broker
//! - **Replay venue**: an in-memory broker over recorded bars

pub mod normalizer;
pub mod replay;
pub mod venue;

pub use normalizer::{normalize, quantize, NormalizeError, NormalizedLevels};
pub use replay::ReplayVenue;
pub use venue::{ExecutionVenue, OrderAck, OrderRequest, VenueError};
