//! Fixed-point and time helpers for deterministic simulation.
//!
//! Simulated time is counted in whole milliseconds and the only fractional
//! quantity, mana, is fixed-point. Floating-point operations can produce
//! different results on different CPUs, so neither appears in tick math.

use fixed::types::I32F32;

/// Fixed-point number type for all fractional simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// Simulated time in milliseconds.
///
/// Signed so that cooldown timers may run below zero while a unit waits
/// for a target, exactly as a countdown would.
pub type Millis = i64;

/// Milliseconds in one simulated second.
pub const MILLIS_PER_SECOND: Millis = 1000;

/// Amount accrued over `dt` at `rate_per_second`.
///
/// The multiplication happens before the division so that common rates
/// (5/s over 100 ms) land on exactly representable values.
#[must_use]
pub fn accrued_over(rate_per_second: Fixed, dt: Millis) -> Fixed {
    if dt <= 0 {
        return Fixed::ZERO;
    }
    rate_per_second.saturating_mul(Fixed::from_num(dt)) / Fixed::from_num(MILLIS_PER_SECOND)
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}
