//! Hub configuration
//!
//! Sources, later ones winning:
//!
//! 1. built-in defaults (port 502, unit 1, 30 s scan interval)
//! 2. a YAML file, when given
//! 3. environment variables prefixed `SOLAKON_` (`SOLAKON_HOST`, `SOLAKON_PORT`, ...)
//!
//! ```yaml
//! host: 192.168.1.50
//! timeout_ms: 3000
//! registers:
//!   - { key: remote_control, address: 46001, length: 1, type: u16 }
//! switches:
//!   - { key: remote_enable, register: remote_control, bit: 0 }
//! ```

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_SCAN_INTERVAL_SECS, DEFAULT_SLAVE_ID, DEFAULT_TCP_PORT};
use crate::error::{ConfigError, Result};
use crate::schema::{
    DeviceSchema, RegisterSpec, WritableNumberSpec, WritableSwitchSpec, BUILTIN_REGISTERS,
};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SOLAKON_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubConfig {
    /// Device host name or IP address
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Modbus unit identifier
    #[serde(default = "default_slave_id")]
    pub slave_id: u8,
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
    /// Per-operation timeout; unset leaves timing to the socket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Re-read a register before flipping one of its bits.
    #[serde(default)]
    pub refresh_before_bit_write: bool,
    /// Appended to the built-in register table.
    #[serde(default)]
    pub registers: Vec<RegisterSpec>,
    #[serde(default)]
    pub numbers: Vec<WritableNumberSpec>,
    #[serde(default)]
    pub switches: Vec<WritableSwitchSpec>,
}

fn default_port() -> u16 {
    DEFAULT_TCP_PORT
}

fn default_slave_id() -> u8 {
    DEFAULT_SLAVE_ID
}

fn default_scan_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL_SECS
}

impl HubConfig {
    pub fn new<S: Into<String>>(host: S) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_TCP_PORT,
            slave_id: DEFAULT_SLAVE_ID,
            scan_interval_secs: DEFAULT_SCAN_INTERVAL_SECS,
            timeout_ms: None,
            refresh_before_bit_write: false,
            registers: Vec::new(),
            numbers: Vec::new(),
            switches: Vec::new(),
        }
    }

    /// Layered sources without extracting, so callers can merge overrides.
    ///
    /// A given file must exist; a missing one is not silently skipped.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::new()
            .merge(Serialized::default("port", DEFAULT_TCP_PORT))
            .merge(Serialized::default("slave_id", DEFAULT_SLAVE_ID))
            .merge(Serialized::default(
                "scan_interval_secs",
                DEFAULT_SCAN_INTERVAL_SECS,
            ));
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::invalid(
                    "config",
                    format!("file not found: {}", path.display()),
                )
                .into());
            }
            figment = figment.merge(Yaml::file(path));
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Load from an optional YAML file plus the environment, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::from_figment(&Self::figment(path)?)
    }

    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Connection-level checks. Register and point checks happen in
    /// [`schema`](Self::schema).
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::invalid("host", "must not be empty"));
        }
        if self.scan_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "scan_interval_secs",
                "must be at least 1",
            ));
        }
        if self.timeout_ms == Some(0) {
            return Err(ConfigError::invalid("timeout_ms", "must be at least 1"));
        }
        Ok(())
    }

    /// Built-in registers plus configured extras, with writable points.
    pub fn schema(&self) -> std::result::Result<DeviceSchema, ConfigError> {
        let registers = BUILTIN_REGISTERS
            .iter()
            .chain(&self.registers)
            .cloned()
            .collect();
        DeviceSchema::new(registers, self.numbers.clone(), self.switches.clone())
    }

    /// Resolve `host:port` to the first socket address.
    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, ConfigError> {
        let unresolved = |detail: String| {
            ConfigError::invalid("host", format!("cannot resolve {}: {}", self.host, detail))
        };
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|err| unresolved(err.to_string()))?
            .next()
            .ok_or_else(|| unresolved("no addresses".to_string()))
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::schema::DataType;
    use figment::Jail;

    #[test]
    fn test_defaults_applied() {
        Jail::expect_with(|jail| {
            jail.set_env("SOLAKON_HOST", "10.0.0.7");

            let config = HubConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config, HubConfig::new("10.0.0.7"));
            assert_eq!(config.scan_interval(), Duration::from_secs(30));
            assert_eq!(config.timeout(), None);
            Ok(())
        });
    }

    #[test]
    fn test_yaml_with_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "solakon.yaml",
                r#"
host: 192.168.1.50
port: 1502
timeout_ms: 3000
refresh_before_bit_write: true
registers:
  - { key: remote_control, address: 46001, length: 1, type: uint16 }
  - { key: export_limit, address: 46002, length: 2, type: int32 }
numbers:
  - { key: export_limit, register: export_limit, count: 2, min: 0, max: 800 }
switches:
  - { key: remote_enable, register: remote_control, bit: 0 }
"#,
            )?;
            jail.set_env("SOLAKON_SLAVE_ID", "3");

            let config =
                HubConfig::load(Some(Path::new("solakon.yaml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.host, "192.168.1.50");
            assert_eq!(config.port, 1502);
            assert_eq!(config.slave_id, 3);
            assert_eq!(config.timeout(), Some(Duration::from_millis(3000)));
            assert!(config.refresh_before_bit_write);
            assert_eq!(config.registers[1].data_type, DataType::I32);

            let schema = config.schema().map_err(|e| e.to_string())?;
            assert_eq!(schema.registers().len(), BUILTIN_REGISTERS.len() + 2);
            assert_eq!(schema.number("export_limit").and_then(|n| n.max), Some(800.0));
            assert_eq!(schema.switch("remote_enable").map(|s| s.bit), Some(0));
            Ok(())
        });
    }

    #[test]
    fn test_missing_host_is_config_error() {
        Jail::expect_with(|_| {
            let err = HubConfig::load(None).unwrap_err();
            assert!(matches!(err, Error::Config(_)));
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_rejected() {
        let err = HubConfig::load(Some(Path::new("/nonexistent/solakon.yaml"))).unwrap_err();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_validation() {
        let mut config = HubConfig::new("  ");
        assert!(config.validate().is_err());

        config.host = "localhost".to_string();
        config.scan_interval_secs = 0;
        assert!(config.validate().is_err());

        config.scan_interval_secs = 10;
        config.timeout_ms = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_point_surfaces_from_schema() {
        let mut config = HubConfig::new("localhost");
        config.numbers = vec![WritableNumberSpec::new("limit", "no_such_register")];
        assert!(matches!(
            config.schema(),
            Err(ConfigError::UnknownRegister { .. })
        ));
    }

    #[test]
    fn test_socket_addr_resolves_literal() {
        let mut config = HubConfig::new("127.0.0.1");
        config.port = 1502;
        assert_eq!(
            config.socket_addr().unwrap(),
            "127.0.0.1:1502".parse::<SocketAddr>().unwrap()
        );
    }
}
