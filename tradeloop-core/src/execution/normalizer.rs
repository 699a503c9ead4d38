//! Price normalizer: requested SL/TP → levels the venue will accept.
//!
//! Steps, in order:
//! 1. **Side clamp**: a stop on the wrong side of the quote moves one tick past it.
//! 2. **Minimum stop distance**: a stop closer than `min_stop_ticks × tick_size`
//!    to the validation price (bid for long, ask for short) moves out to it.
//! 3. **Quantize** both levels to the tick grid, round half up, in decimal.
//! 4. **Guard**: a level that rounding pushed back onto the wrong side or
//!    inside the minimum distance steps one tick outward.
//!
//! The output satisfies every rule it enforces, so normalizing it again is a
//! no-op. Offline and live execution share this code path.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use crate::domain::{Direction, InstrumentProfile, Tick};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    #[error("{symbol}: tick size {tick_size} is not usable")]
    InvalidTickSize { symbol: String, tick_size: f64 },

    #[error("{field} price {value} cannot be represented as a decimal")]
    Unrepresentable { field: &'static str, value: f64 },

    #[error("normalized {field} {value} is not positive")]
    NonPositiveLevel { field: &'static str, value: Decimal },
}

/// Broker-valid SL/TP pair, exact on the tick grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedLevels {
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
}

impl NormalizedLevels {
    pub fn stop_loss_f64(&self) -> f64 {
        to_f64(self.stop_loss)
    }

    pub fn take_profit_f64(&self) -> f64 {
        to_f64(self.take_profit)
    }
}

// ─── Decimal helpers ─────────────────────────────────────────────────

/// Exact decimal of the shortest string that round-trips `value`.
pub fn to_decimal(field: &'static str, value: f64) -> Result<Decimal, NormalizeError> {
    if !value.is_finite() {
        return Err(NormalizeError::Unrepresentable { field, value });
    }
    Decimal::from_str(&value.to_string()).map_err(|_| NormalizeError::Unrepresentable { field, value })
}

/// Nearest f64 to a decimal.
pub fn to_f64(value: Decimal) -> f64 {
    // Decimal's Display is a plain decimal literal, which always parses.
    value.to_string().parse().unwrap_or(f64::NAN)
}

/// Snap `price` to the nearest multiple of `tick`, halves away from zero.
///
/// Fails when `price / tick` does not fit in a `Decimal`.
pub fn quantize(
    field: &'static str,
    price: Decimal,
    tick: Decimal,
) -> Result<Decimal, NormalizeError> {
    price
        .checked_div(tick)
        .map(|steps| steps.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|steps| steps.checked_mul(tick))
        .ok_or(NormalizeError::Unrepresentable {
            field,
            value: to_f64(price),
        })
}

/// Whether `price` lies exactly on the `tick` grid.
pub fn is_on_grid(price: Decimal, tick: Decimal) -> bool {
    (price % tick).is_zero()
}

// ─── Normalization ───────────────────────────────────────────────────

/// Turn a requested SL/TP pair into venue-acceptable levels, or reject it.
pub fn normalize(
    direction: Direction,
    tick: &Tick,
    requested_sl: f64,
    requested_tp: f64,
    profile: &InstrumentProfile,
) -> Result<NormalizedLevels, NormalizeError> {
    if !profile.has_valid_tick() {
        return Err(NormalizeError::InvalidTickSize {
            symbol: profile.symbol.clone(),
            tick_size: profile.tick_size,
        });
    }
    let step = to_decimal("tick_size", profile.tick_size)?;
    let bid = to_decimal("bid", tick.bid)?;
    let ask = to_decimal("ask", tick.ask)?;
    let mut sl = to_decimal("stop_loss", requested_sl)?;
    let mut tp = to_decimal("take_profit", requested_tp)?;
    let min_distance = Decimal::from(profile.min_stop_ticks) * step;

    match direction {
        Direction::Long => {
            if sl >= bid {
                sl = bid - step;
            }
            if tp <= ask {
                tp = ask + step;
            }
            if bid - sl < min_distance {
                sl = bid - min_distance;
            }

            sl = quantize("stop_loss", sl, step)?;
            tp = quantize("take_profit", tp, step)?;

            if sl >= bid || bid - sl < min_distance {
                sl -= step;
            }
            if tp <= ask {
                tp += step;
            }
        }
        Direction::Short => {
            if sl <= ask {
                sl = ask + step;
            }
            if tp >= bid {
                tp = bid - step;
            }
            if sl - ask < min_distance {
                sl = ask + min_distance;
            }

            sl = quantize("stop_loss", sl, step)?;
            tp = quantize("take_profit", tp, step)?;

            if sl <= ask || sl - ask < min_distance {
                sl += step;
            }
            if tp >= bid {
                tp -= step;
            }
        }
    }

    if sl <= Decimal::ZERO {
        return Err(NormalizeError::NonPositiveLevel { field: "stop_loss", value: sl });
    }
    if tp <= Decimal::ZERO {
        return Err(NormalizeError::NonPositiveLevel { field: "take_profit", value: tp });
    }

    Ok(NormalizedLevels {
        stop_loss: sl.normalize(),
        take_profit: tp.normalize(),
    })
}
