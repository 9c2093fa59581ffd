//! # Write Planner
//!
//! Turns a requested point value into the register words to write.
//!
//! Numeric points go through three steps:
//!
//! 1. quantize to the point's `step` (default 1) and round to an integer,
//! 2. clamp to `min` / `max`,
//! 3. encode as one word (FC06) or a high/low pair (FC16), wrapping negative
//!    values to two's complement.
//!
//! Switch points set or clear one bit of the last known register word.
//!
//! Planning is pure; sending the words and patching the snapshot is done by
//! the [`Hub`](crate::Hub).

use crate::error::ConfigError;
use crate::schema::WritableNumberSpec;

/// Words for a numeric write, plus the integer they encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericWrite {
    /// Quantized and clamped value in the register's integer domain.
    pub value: i64,
    /// Register payload, high word first.
    pub words: Vec<u16>,
}

/// Plan a write of `target` to a numeric point.
///
/// # Example
///
/// ```rust
/// use solakon_modbus::{plan_numeric_write, WritableNumberSpec};
///
/// let spec = WritableNumberSpec::new("limit", "remote_power")
///     .with_range(0.0, 100.0)
///     .with_step(5.0);
/// let plan = plan_numeric_write(137.0, &spec).unwrap();
/// assert_eq!(plan.value, 100);
/// assert_eq!(plan.words, vec![100]);
/// ```
pub fn plan_numeric_write(
    target: f64,
    spec: &WritableNumberSpec,
) -> Result<NumericWrite, ConfigError> {
    if !target.is_finite() {
        return Err(ConfigError::invalid(
            &spec.key,
            format!("cannot write non-finite value {}", target),
        ));
    }

    let value = quantize(target, spec);
    let words = encode_words(value, spec.count, &spec.key)?;
    Ok(NumericWrite { value, words })
}

/// Quantize to the step, round, then clamp.
///
/// `target / step` rounds half to even; bounds are truncated toward zero.
pub fn quantize(target: f64, spec: &WritableNumberSpec) -> i64 {
    let step = spec.step.unwrap_or(1.0);
    let quantized = (target / step).round_ties_even() * step;
    let mut value = quantized.round() as i64;

    if let Some(min) = spec.min {
        value = value.max(min.trunc() as i64);
    }
    if let Some(max) = spec.max {
        value = value.min(max.trunc() as i64);
    }
    value
}

/// Encode an integer into `count` register words.
///
/// Only 1 and 2 word writes exist; anything else is a configuration fault.
pub fn encode_words(value: i64, count: u8, key: &str) -> Result<Vec<u16>, ConfigError> {
    match count {
        1 => Ok(vec![(value & 0xFFFF) as u16]),
        2 => {
            let wide = (value & 0xFFFF_FFFF) as u32;
            Ok(vec![(wide >> 16) as u16, (wide & 0xFFFF) as u16])
        }
        _ => Err(ConfigError::UnsupportedCount {
            key: key.to_string(),
            count,
        }),
    }
}

/// Set or clear `bit` in the last known register word.
///
/// An unknown current value counts as 0. Bits outside 0..=15 leave the word
/// unchanged.
///
/// ```rust
/// use solakon_modbus::plan_bit_write;
///
/// let on = plan_bit_write(true, None, 2);
/// assert_eq!(on, 0b0100);
/// assert_eq!(plan_bit_write(false, Some(on), 2), 0);
/// ```
pub fn plan_bit_write(target_on: bool, current: Option<u16>, bit: u8) -> u16 {
    let current = current.unwrap_or(0);
    let mask = 1u16.checked_shl(u32::from(bit)).unwrap_or(0);
    if target_on {
        current | mask
    } else {
        current & !mask
    }
}
