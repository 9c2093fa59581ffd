//! # Register Codec
//!
//! Decoding of raw holding-register words into [`RegisterValue`]s according
//! to a [`RegisterSpec`].
//!
//! Multi-register values are big-endian in both senses: the high byte comes
//! first within a word and the high word comes first within a pair (ABCD).
//!
//! | Type | Words used | Result |
//! |------|------------|--------|
//! | string | all | Latin-1 text, trailing NULs stripped |
//! | u16 / i16 | 1 | integer, or `raw / scale` |
//! | u32 / i32 | 2 | integer, or `raw / scale` |
//! | bitfield16 | 1 | [`StatusBits`], never scaled |
//!
//! Decoding is pure; the caller decides what a failure means. The poll
//! cycle turns every [`DecodeError`] into an absent snapshot value.

use crate::error::DecodeError;
use crate::schema::{DataType, RegisterSpec};
use crate::value::{RegisterValue, StatusBits};

/// Decode raw words for one register entry.
///
/// Words beyond what the data type needs are ignored; too few words is an
/// error.
///
/// # Example
///
/// ```rust
/// use solakon_modbus::{decode, DataType, RegisterSpec, RegisterValue};
///
/// let spec = RegisterSpec::scaled("grid_frequency", 39139, 1, DataType::I16, 100, Some("Hz"));
/// assert_eq!(decode(&[5002], &spec).unwrap(), RegisterValue::Scaled(50.02));
/// ```
pub fn decode(registers: &[u16], spec: &RegisterSpec) -> Result<RegisterValue, DecodeError> {
    let raw = match spec.data_type {
        DataType::String => {
            if registers.is_empty() {
                return Err(short(spec.data_type, 1, 0));
            }
            return Ok(RegisterValue::Text(words_to_string(registers)));
        }
        DataType::Bitfield16 => {
            let word = first_word(registers, spec.data_type)?;
            return Ok(RegisterValue::Bits(StatusBits::new(word)));
        }
        DataType::U16 => i64::from(first_word(registers, spec.data_type)?),
        DataType::I16 => i64::from(first_word(registers, spec.data_type)? as i16),
        DataType::U32 => i64::from(words_to_u32(registers, spec.data_type)?),
        DataType::I32 => i64::from(words_to_u32(registers, spec.data_type)? as i32),
    };

    Ok(apply_scale(raw, spec.scale))
}

/// Divide by the scale as a real number; no scale keeps the integer.
#[inline]
pub fn apply_scale(raw: i64, scale: Option<u32>) -> RegisterValue {
    match scale {
        Some(scale) => RegisterValue::Scaled(raw as f64 / f64::from(scale)),
        None => RegisterValue::Integer(raw),
    }
}

/// Pack words high byte first and read the bytes as Latin-1.
///
/// Only trailing NULs are removed; embedded NULs are kept.
pub fn words_to_string(registers: &[u16]) -> String {
    let text: String = registers
        .iter()
        .flat_map(|word| word.to_be_bytes())
        .map(char::from)
        .collect();
    text.trim_end_matches('\0').to_string()
}

/// Combine the first two words, high word first.
#[inline]
pub fn words_to_u32(registers: &[u16], data_type: DataType) -> Result<u32, DecodeError> {
    match registers {
        [high, low, ..] => Ok((u32::from(*high) << 16) | u32::from(*low)),
        _ => Err(short(data_type, 2, registers.len())),
    }
}

#[inline]
fn first_word(registers: &[u16], data_type: DataType) -> Result<u16, DecodeError> {
    registers
        .first()
        .copied()
        .ok_or_else(|| short(data_type, 1, 0))
}

fn short(data_type: DataType, expected: usize, actual: usize) -> DecodeError {
    DecodeError::ShortRead {
        data_type,
        expected,
        actual,
    }
}

// ============================================================================
// Tests
// ============================================================================
