//! # Register Schema
//!
//! Declarative description of the device memory map: one [`RegisterSpec`] per
//! semantic key, plus the writable points layered on top of it
//! ([`WritableNumberSpec`], [`WritableSwitchSpec`]).
//!
//! ## Supported Data Types
//!
//! | Type | Registers | Aliases |
//! |------|-----------|---------|
//! | string | declared length (2 chars/word) | str, text |
//! | u16 | 1 | uint16, word |
//! | i16 | 1 | int16, short |
//! | u32 | 2 | uint32, dword |
//! | i32 | 2 | int32, long |
//! | bitfield16 | 1 | bits, status |
//!
//! Everything is validated once when a [`DeviceSchema`] is built. After that
//! the schema is shared read-only for the lifetime of the process.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::MAX_READ_REGISTERS;
use crate::error::ConfigError;

/// Wire data type of a register entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[serde(alias = "str", alias = "text")]
    String,
    #[serde(alias = "uint16", alias = "word")]
    U16,
    #[serde(alias = "int16", alias = "short")]
    I16,
    #[serde(alias = "uint32", alias = "dword")]
    U32,
    #[serde(alias = "int32", alias = "long")]
    I32,
    #[serde(alias = "bits", alias = "status")]
    Bitfield16,
}

impl DataType {
    /// Fixed word width of the type, `None` for strings.
    pub const fn word_count(self) -> Option<u8> {
        match self {
            DataType::String => None,
            DataType::U16 | DataType::I16 | DataType::Bitfield16 => Some(1),
            DataType::U32 | DataType::I32 => Some(2),
        }
    }

    /// Whether a configured scale divisor applies to decoded values.
    pub const fn is_scalable(self) -> bool {
        !matches!(self, DataType::String | DataType::Bitfield16)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::U16 => "u16",
            DataType::I16 => "i16",
            DataType::U32 => "u32",
            DataType::I32 => "i32",
            DataType::Bitfield16 => "bitfield16",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" | "str" | "text" => Ok(DataType::String),
            "u16" | "uint16" | "word" => Ok(DataType::U16),
            "i16" | "int16" | "short" => Ok(DataType::I16),
            "u32" | "uint32" | "dword" => Ok(DataType::U32),
            "i32" | "int32" | "long" => Ok(DataType::I32),
            "bitfield16" | "bits" | "status" => Ok(DataType::Bitfield16),
            _ => Err(format!("Unsupported data type: {}", s)),
        }
    }
}

/// One holding-register entry of the memory map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSpec {
    /// Stable identifier, e.g. `battery1_soc`.
    pub key: Cow<'static, str>,
    /// Holding register address.
    pub address: u16,
    /// Number of words to read.
    pub length: u8,
    #[serde(rename = "type")]
    pub data_type: DataType,
    /// Divisor applied to the decoded integer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<Cow<'static, str>>,
}

impl RegisterSpec {
    pub const fn new(key: &'static str, address: u16, length: u8, data_type: DataType) -> Self {
        Self {
            key: Cow::Borrowed(key),
            address,
            length,
            data_type,
            scale: None,
            unit: None,
        }
    }

    pub const fn scaled(
        key: &'static str,
        address: u16,
        length: u8,
        data_type: DataType,
        scale: u32,
        unit: Option<&'static str>,
    ) -> Self {
        let unit = match unit {
            Some(unit) => Some(Cow::Borrowed(unit)),
            None => None,
        };
        Self {
            key: Cow::Borrowed(key),
            address,
            length,
            data_type,
            scale: Some(scale),
            unit,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Check the length/type invariant and protocol limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.data_type.word_count() {
            Some(expected) if expected != self.length => {
                return Err(ConfigError::LengthMismatch {
                    key: self.key.to_string(),
                    data_type: self.data_type,
                    expected,
                    declared: self.length,
                });
            }
            None if self.length == 0 => {
                return Err(ConfigError::invalid(
                    self.key.as_ref(),
                    "string registers need at least one word",
                ));
            }
            _ => {}
        }

        if usize::from(self.length) > MAX_READ_REGISTERS {
            return Err(ConfigError::invalid(
                self.key.as_ref(),
                format!(
                    "length {} exceeds the {} register read limit",
                    self.length, MAX_READ_REGISTERS
                ),
            ));
        }

        if u32::from(self.address) + u32::from(self.length) > 0x1_0000 {
            return Err(ConfigError::invalid(
                self.key.as_ref(),
                "register range runs past address 65535",
            ));
        }

        if self.scale == Some(0) {
            return Err(ConfigError::invalid(self.key.as_ref(), "scale must be positive"));
        }

        Ok(())
    }
}

fn default_count() -> u8 {
    1
}

/// A controllable numeric point backed by one or two registers.
///
/// `min`, `max` and `step` are applied to the integer that is written, after
/// quantization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritableNumberSpec {
    pub key: String,
    /// Key of the backing [`RegisterSpec`].
    pub register: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub step: Option<f64>,
    /// Words written: 1 (FC06) or 2 (FC16, high word first).
    #[serde(default = "default_count")]
    pub count: u8,
    #[serde(default)]
    pub unit: Option<String>,
}

impl WritableNumberSpec {
    pub fn new<K: Into<String>, R: Into<String>>(key: K, register: R) -> Self {
        Self {
            key: key.into(),
            register: register.into(),
            name: None,
            min: None,
            max: None,
            step: None,
            count: 1,
            unit: None,
        }
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_count(mut self, count: u8) -> Self {
        self.count = count;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.count, 1 | 2) {
            return Err(ConfigError::UnsupportedCount {
                key: self.key.clone(),
                count: self.count,
            });
        }
        if let Some(step) = self.step {
            if !(step.is_finite() && step > 0.0) {
                return Err(ConfigError::invalid(&self.key, "step must be a positive number"));
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(ConfigError::invalid(
                    &self.key,
                    format!("min {} is greater than max {}", min, max),
                ));
            }
        }
        Ok(())
    }
}

/// A controllable on/off point stored as one bit of a register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritableSwitchSpec {
    pub key: String,
    /// Key of the backing [`RegisterSpec`].
    pub register: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Bit position, 0 = LSB.
    pub bit: u8,
}

impl WritableSwitchSpec {
    pub fn new<K: Into<String>, R: Into<String>>(key: K, register: R, bit: u8) -> Self {
        Self {
            key: key.into(),
            register: register.into(),
            name: None,
            bit,
        }
    }

    fn validate(&self, register: &RegisterSpec) -> Result<(), ConfigError> {
        if self.bit > 15 {
            return Err(ConfigError::invalid(
                &self.key,
                format!("bit {} is outside 0..=15", self.bit),
            ));
        }
        if !matches!(
            register.data_type,
            DataType::U16 | DataType::I16 | DataType::Bitfield16
        ) {
            return Err(ConfigError::invalid(
                &self.key,
                format!(
                    "switch register '{}' must be a single-word integer or bitfield, not {}",
                    register.key, register.data_type
                ),
            ));
        }
        Ok(())
    }
}

/// Validated register table plus writable points.
#[derive(Debug, Clone)]
pub struct DeviceSchema {
    registers: Vec<RegisterSpec>,
    index: HashMap<String, usize>,
    numbers: Vec<WritableNumberSpec>,
    switches: Vec<WritableSwitchSpec>,
}

impl DeviceSchema {
    /// Build and validate a schema. Register order is kept as given.
    pub fn new(
        registers: Vec<RegisterSpec>,
        numbers: Vec<WritableNumberSpec>,
        switches: Vec<WritableSwitchSpec>,
    ) -> Result<Self, ConfigError> {
        let mut index = HashMap::with_capacity(registers.len());
        for (position, register) in registers.iter().enumerate() {
            register.validate()?;
            if index.insert(register.key.to_string(), position).is_some() {
                return Err(ConfigError::DuplicateKey {
                    key: register.key.to_string(),
                });
            }
        }

        let mut point_keys = HashSet::new();
        for number in &numbers {
            if !point_keys.insert(number.key.as_str()) {
                return Err(ConfigError::DuplicateKey {
                    key: number.key.clone(),
                });
            }
            let register = index
                .get(&number.register)
                .map(|&position| &registers[position])
                .ok_or_else(|| ConfigError::UnknownRegister {
                    point: number.key.clone(),
                    register: number.register.clone(),
                })?;
            number.validate()?;
            if number.count != register.length {
                return Err(ConfigError::invalid(
                    &number.key,
                    format!(
                        "writes {} register(s) but '{}' is {} register(s) long",
                        number.count, register.key, register.length
                    ),
                ));
            }
        }

        for switch in &switches {
            if !point_keys.insert(switch.key.as_str()) {
                return Err(ConfigError::DuplicateKey {
                    key: switch.key.clone(),
                });
            }
            let register = index
                .get(&switch.register)
                .map(|&position| &registers[position])
                .ok_or_else(|| ConfigError::UnknownRegister {
                    point: switch.key.clone(),
                    register: switch.register.clone(),
                })?;
            switch.validate(register)?;
        }

        Ok(Self {
            registers,
            index,
            numbers,
            switches,
        })
    }

    /// The built-in Solakon ONE register table without writable points.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::new(BUILTIN_REGISTERS.to_vec(), Vec::new(), Vec::new())
    }

    /// Registers in poll order.
    pub fn registers(&self) -> &[RegisterSpec] {
        &self.registers
    }

    pub fn register(&self, key: &str) -> Option<&RegisterSpec> {
        self.index.get(key).map(|&position| &self.registers[position])
    }

    pub fn numbers(&self) -> &[WritableNumberSpec] {
        &self.numbers
    }

    pub fn number(&self, key: &str) -> Option<&WritableNumberSpec> {
        self.numbers.iter().find(|number| number.key == key)
    }

    pub fn switches(&self) -> &[WritableSwitchSpec] {
        &self.switches
    }

    pub fn switch(&self, key: &str) -> Option<&WritableSwitchSpec> {
        self.switches.iter().find(|switch| switch.key == key)
    }
}

use DataType::{Bitfield16, String as Text, I16, I32, U16, U32};

/// Solakon ONE holding register map.
pub static BUILTIN_REGISTERS: &[RegisterSpec] = &[
    // Model information
    RegisterSpec::new("model_name", 30000, 16, Text),
    RegisterSpec::new("serial_number", 30016, 16, Text),
    RegisterSpec::new("mfg_id", 30032, 16, Text),
    // Firmware versions
    RegisterSpec::new("master_version", 36001, 1, U16),
    RegisterSpec::new("slave_version", 36002, 1, U16),
    RegisterSpec::new("manager_version", 36003, 1, U16),
    // Protocol and ratings
    RegisterSpec::new("protocol_version", 39000, 2, U32),
    RegisterSpec::scaled("rated_power", 39053, 2, I32, 1000, Some("kW")),
    RegisterSpec::scaled("max_active_power", 39055, 2, I32, 1000, Some("kW")),
    // Status
    RegisterSpec::new("status_1", 39063, 1, Bitfield16),
    RegisterSpec::new("alarm_1", 39067, 1, Bitfield16),
    RegisterSpec::new("alarm_2", 39068, 1, Bitfield16),
    RegisterSpec::new("alarm_3", 39069, 1, Bitfield16),
    // PV input
    RegisterSpec::scaled("pv1_voltage", 39070, 1, I16, 10, Some("V")),
    RegisterSpec::scaled("pv1_current", 39071, 1, I16, 100, Some("A")),
    RegisterSpec::scaled("pv2_voltage", 39072, 1, I16, 10, Some("V")),
    RegisterSpec::scaled("pv2_current", 39073, 1, I16, 100, Some("A")),
    RegisterSpec::scaled("pv3_voltage", 39074, 1, I16, 10, Some("V")),
    RegisterSpec::scaled("pv3_current", 39075, 1, I16, 100, Some("A")),
    RegisterSpec::scaled("pv4_voltage", 39076, 1, I16, 10, Some("V")),
    RegisterSpec::scaled("pv4_current", 39077, 1, I16, 100, Some("A")),
    RegisterSpec::scaled("total_pv_power", 39118, 2, I32, 1000, Some("kW")),
    // Grid
    RegisterSpec::scaled("grid_r_voltage", 39123, 1, I16, 10, Some("V")),
    RegisterSpec::scaled("grid_s_voltage", 39124, 1, I16, 10, Some("V")),
    RegisterSpec::scaled("grid_t_voltage", 39125, 1, I16, 10, Some("V")),
    RegisterSpec::scaled("grid_r_current", 39126, 1, I16, 100, Some("A")),
    RegisterSpec::scaled("grid_s_current", 39127, 1, I16, 100, Some("A")),
    RegisterSpec::scaled("grid_t_current", 39128, 1, I16, 100, Some("A")),
    RegisterSpec::scaled("active_power", 39134, 2, I32, 1000, Some("kW")),
    RegisterSpec::scaled("reactive_power", 39136, 2, I32, 1000, Some("kVar")),
    RegisterSpec::scaled("power_factor", 39138, 1, I16, 1000, None),
    RegisterSpec::scaled("grid_frequency", 39139, 1, I16, 100, Some("Hz")),
    // Temperature
    RegisterSpec::scaled("internal_temp", 39141, 1, I16, 10, Some("°C")),
    RegisterSpec::scaled("heatsink_temp", 39142, 1, I16, 10, Some("°C")),
    // Energy statistics
    RegisterSpec::scaled("cumulative_generation", 39149, 2, U32, 100, Some("kWh")),
    RegisterSpec::scaled("daily_generation", 39151, 2, U32, 100, Some("kWh")),
    RegisterSpec::scaled("monthly_generation", 39153, 2, U32, 100, Some("kWh")),
    RegisterSpec::scaled("yearly_generation", 39155, 2, U32, 100, Some("kWh")),
    // Battery
    RegisterSpec::scaled("battery1_voltage", 39227, 1, I16, 10, Some("V")),
    RegisterSpec::scaled("battery1_current", 39228, 2, I32, 1000, Some("A")),
    RegisterSpec::scaled("battery1_power", 39230, 2, I32, 1, Some("W")),
    RegisterSpec::scaled("battery1_soc", 39232, 1, U16, 1, Some("%")),
    RegisterSpec::scaled("battery1_soh", 39233, 1, U16, 1, Some("%")),
    RegisterSpec::scaled("battery1_temp", 39234, 1, I16, 10, Some("°C")),
    RegisterSpec::scaled("battery_combined_power", 39237, 2, I32, 1, Some("W")),
    RegisterSpec::scaled("battery_charge_today", 39239, 2, U32, 100, Some("kWh")),
    RegisterSpec::scaled("battery_discharge_today", 39241, 2, U32, 100, Some("kWh")),
    // Load
    RegisterSpec::scaled("load_power", 39263, 2, I32, 1, Some("W")),
    RegisterSpec::scaled("load_voltage", 39265, 1, I16, 10, Some("V")),
    RegisterSpec::scaled("load_current", 39266, 1, I16, 100, Some("A")),
    // Grid import/export
    RegisterSpec::scaled("grid_import_today", 39279, 2, U32, 100, Some("kWh")),
    RegisterSpec::scaled("grid_export_today", 39281, 2, U32, 100, Some("kWh")),
    RegisterSpec::scaled("grid_import_total", 39283, 2, U32, 100, Some("kWh")),
    RegisterSpec::scaled("grid_export_total", 39285, 2, U32, 100, Some("kWh")),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn control_register() -> RegisterSpec {
        RegisterSpec::new("remote_control", 46001, 1, DataType::U16)
    }

    #[test]
    fn test_builtin_schema_is_valid() {
        let schema = DeviceSchema::builtin().unwrap();
        assert_eq!(schema.registers().len(), BUILTIN_REGISTERS.len());
        assert_eq!(schema.registers()[0].key(), "model_name");

        let soc = schema.register("battery1_soc").unwrap();
        assert_eq!(soc.address, 39232);
        assert_eq!(soc.scale, Some(1));
        assert_eq!(soc.unit.as_deref(), Some("%"));
        assert!(schema.register("missing").is_none());
    }

    #[test]
    fn test_builtin_addresses_in_device_range() {
        for register in BUILTIN_REGISTERS {
            assert!(
                (30000..=39285).contains(&register.address),
                "{} at {}",
                register.key,
                register.address
            );
        }
    }

    #[test]
    fn test_data_type_aliases() {
        assert_eq!("uint16".parse::<DataType>(), Ok(DataType::U16));
        assert_eq!("INT32".parse::<DataType>(), Ok(DataType::I32));
        assert_eq!("bitfield16".parse::<DataType>(), Ok(DataType::Bitfield16));
        assert!("float32".parse::<DataType>().is_err());
        assert_eq!(DataType::Bitfield16.to_string(), "bitfield16");
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let bad = RegisterSpec::new("broken", 39000, 1, DataType::U32);
        let err = DeviceSchema::new(vec![bad], vec![], vec![]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::LengthMismatch {
                key: "broken".to_string(),
                data_type: DataType::U32,
                expected: 2,
                declared: 1,
            }
        );
    }

    #[test]
    fn test_zero_scale_and_empty_string_rejected() {
        let zero = RegisterSpec::scaled("zero", 39070, 1, DataType::I16, 0, None);
        assert!(zero.validate().is_err());

        let empty = RegisterSpec::new("empty", 30000, 0, DataType::String);
        assert!(empty.validate().is_err());

        let too_long = RegisterSpec::new("huge", 30000, 126, DataType::String);
        assert!(too_long.validate().is_err());
    }

    #[test]
    fn test_duplicate_register_key_rejected() {
        let registers = vec![control_register(), control_register()];
        let err = DeviceSchema::new(registers, vec![], vec![]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateKey { .. }));
    }

    #[test]
    fn test_dangling_references_rejected() {
        let number = WritableNumberSpec::new("export_limit", "no_such_register");
        let err = DeviceSchema::new(vec![control_register()], vec![number], vec![]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownRegister {
                point: "export_limit".to_string(),
                register: "no_such_register".to_string(),
            }
        );

        let switch = WritableSwitchSpec::new("remote_enable", "nowhere", 0);
        let err = DeviceSchema::new(vec![control_register()], vec![], vec![switch]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRegister { .. }));
    }

    #[test]
    fn test_writable_point_validation() {
        let registers = vec![control_register()];

        let bad_count = WritableNumberSpec::new("limit", "remote_control").with_count(3);
        let err = DeviceSchema::new(registers.clone(), vec![bad_count], vec![]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnsupportedCount {
                key: "limit".to_string(),
                count: 3,
            }
        );

        let bad_step = WritableNumberSpec::new("limit", "remote_control").with_step(0.0);
        assert!(DeviceSchema::new(registers.clone(), vec![bad_step], vec![]).is_err());

        let inverted = WritableNumberSpec::new("limit", "remote_control").with_range(10.0, 0.0);
        assert!(DeviceSchema::new(registers.clone(), vec![inverted], vec![]).is_err());

        let bad_bit = WritableSwitchSpec::new("enable", "remote_control", 16);
        assert!(DeviceSchema::new(registers.clone(), vec![], vec![bad_bit]).is_err());
    }

    #[test]
    fn test_number_count_must_match_register_length() {
        let registers = vec![
            control_register(),
            RegisterSpec::new("export_limit", 46002, 2, DataType::I32),
        ];

        let wide_on_word = WritableNumberSpec::new("limit", "remote_control").with_count(2);
        let err = DeviceSchema::new(registers.clone(), vec![wide_on_word], vec![]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "limit"));

        let narrow_on_pair = WritableNumberSpec::new("export", "export_limit");
        let err = DeviceSchema::new(registers.clone(), vec![narrow_on_pair], vec![]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "export"));

        let matched = vec![
            WritableNumberSpec::new("limit", "remote_control"),
            WritableNumberSpec::new("export", "export_limit").with_count(2),
        ];
        assert!(DeviceSchema::new(registers, matched, vec![]).is_ok());
    }

    #[test]
    fn test_switch_requires_single_word_register() {
        let registers = BUILTIN_REGISTERS.to_vec();
        let switch = WritableSwitchSpec::new("odd", "active_power", 0);
        let err = DeviceSchema::new(registers, vec![], vec![switch]).unwrap_err();
        assert!(err.to_string().contains("single-word"));
    }

    #[test]
    fn test_points_lookup() {
        let schema = DeviceSchema::new(
            vec![control_register()],
            vec![WritableNumberSpec::new("limit", "remote_control").with_range(0.0, 800.0)],
            vec![WritableSwitchSpec::new("enable", "remote_control", 0)],
        )
        .unwrap();

        assert_eq!(schema.number("limit").unwrap().max, Some(800.0));
        assert_eq!(schema.switch("enable").unwrap().bit, 0);
        assert!(schema.number("enable").is_none());
    }

    #[test]
    fn test_point_keys_unique_across_kinds() {
        let err = DeviceSchema::new(
            vec![control_register()],
            vec![WritableNumberSpec::new("shared", "remote_control")],
            vec![WritableSwitchSpec::new("shared", "remote_control", 1)],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateKey { .. }));
    }
}
