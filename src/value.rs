//! # Decoded Register Values
//!
//! Typed results of decoding a register entry, as stored in a
//! [`Snapshot`](crate::Snapshot).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::constants::{STATUS_BIT_FAULT, STATUS_BIT_OPERATION, STATUS_BIT_STANDBY};

/// Value of one register entry after decoding.
///
/// | Variant | Produced by |
/// |---------|-------------|
/// | Text | `string` registers |
/// | Integer | unscaled `u16`/`i16`/`u32`/`i32`, numeric write patches |
/// | Scaled | numeric registers with a `scale` |
/// | Bits | `bitfield16` registers |
///
/// # Example
///
/// ```rust
/// use solakon_modbus::RegisterValue;
///
/// let soc = RegisterValue::Scaled(87.0);
/// assert_eq!(soc.as_f64(), Some(87.0));
/// assert_eq!(RegisterValue::Text("ONE".into()).as_f64(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RegisterValue {
    Text(String),
    Integer(i64),
    Scaled(f64),
    Bits(StatusBits),
}

impl RegisterValue {
    /// Numeric view of the value; `None` for text.
    ///
    /// Bitfields report their raw word.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RegisterValue::Text(_) => None,
            RegisterValue::Integer(v) => Some(*v as f64),
            RegisterValue::Scaled(v) => Some(*v),
            RegisterValue::Bits(bits) => Some(f64::from(bits.raw())),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RegisterValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bits(&self) -> Option<StatusBits> {
        match self {
            RegisterValue::Bits(bits) => Some(*bits),
            _ => None,
        }
    }

    /// Recover the 16-bit register word this value was decoded from.
    ///
    /// `scale` must be the divisor of the register the value belongs to.
    /// Negative integers wrap to their two's-complement word. Text has no
    /// word representation.
    pub fn register_word(&self, scale: Option<u32>) -> Option<u16> {
        match self {
            RegisterValue::Text(_) => None,
            RegisterValue::Integer(v) => Some((*v & 0xFFFF) as u16),
            RegisterValue::Scaled(v) => {
                let raw = (v * f64::from(scale.unwrap_or(1))).round() as i64;
                Some((raw & 0xFFFF) as u16)
            }
            RegisterValue::Bits(bits) => Some(bits.raw()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            RegisterValue::Text(_) => "text",
            RegisterValue::Integer(_) => "integer",
            RegisterValue::Scaled(_) => "scaled",
            RegisterValue::Bits(_) => "bits",
        }
    }
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterValue::Text(v) => write!(f, "{}", v),
            RegisterValue::Integer(v) => write!(f, "{}", v),
            RegisterValue::Scaled(v) => write!(f, "{}", v),
            RegisterValue::Bits(v) => write!(f, "{}", v),
        }
    }
}

impl From<String> for RegisterValue {
    fn from(v: String) -> Self {
        RegisterValue::Text(v)
    }
}

impl From<&str> for RegisterValue {
    fn from(v: &str) -> Self {
        RegisterValue::Text(v.to_string())
    }
}

impl From<i64> for RegisterValue {
    fn from(v: i64) -> Self {
        RegisterValue::Integer(v)
    }
}

impl From<f64> for RegisterValue {
    fn from(v: f64) -> Self {
        RegisterValue::Scaled(v)
    }
}

impl From<StatusBits> for RegisterValue {
    fn from(v: StatusBits) -> Self {
        RegisterValue::Bits(v)
    }
}

/// A decoded `bitfield16` word.
///
/// Besides the sixteen `bitN` flags, the status aliases `standby` (bit 0),
/// `operation` (bit 2) and `fault` (bit 6) are reported. Aliases are
/// additive: several can be set at once, and an alias is only listed in
/// [`to_map`](Self::to_map) when its bit is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatusBits(u16);

impl StatusBits {
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    /// State of bit `n` (0 = LSB). Bits above 15 are never set.
    pub const fn bit(self, n: u8) -> bool {
        n < 16 && (self.0 >> n) & 1 == 1
    }

    pub const fn standby(self) -> bool {
        self.bit(STATUS_BIT_STANDBY)
    }

    pub const fn operation(self) -> bool {
        self.bit(STATUS_BIT_OPERATION)
    }

    pub const fn fault(self) -> bool {
        self.bit(STATUS_BIT_FAULT)
    }

    /// Flag map: `bit0`..`bit15` always, aliases only when set.
    pub fn to_map(self) -> BTreeMap<String, bool> {
        let mut map: BTreeMap<String, bool> =
            (0..16).map(|n| (format!("bit{}", n), self.bit(n))).collect();

        for (alias, set) in [
            ("standby", self.standby()),
            ("operation", self.operation()),
            ("fault", self.fault()),
        ] {
            if set {
                map.insert(alias.to_string(), true);
            }
        }
        map
    }
}

impl fmt::Display for StatusBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

impl Serialize for StatusBits {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}
