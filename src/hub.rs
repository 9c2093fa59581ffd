//! # Device Hub
//!
//! The [`Hub`] is the one object per device connection. It owns the
//! transport, the validated [`DeviceSchema`] and the latest [`Snapshot`],
//! and it serializes every transport call through one lock:
//!
//! - a poll cycle holds the lock for the whole table, so reads from
//!   different callers never interleave,
//! - writes queue behind a running poll and are never reordered,
//! - decoding and write planning run without touching the network.
//!
//! A poll never fails as a whole. Each register is read and decoded on its
//! own; a failure leaves that key absent and the cycle moves on. Writes
//! report their failures to the caller and are not retried.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use solakon_modbus::{DeviceSchema, Hub, TcpTransport};
//!
//! # async fn example() -> solakon_modbus::Result<()> {
//! let transport = TcpTransport::new("192.168.1.50:502".parse().unwrap(), 1);
//! let hub = Hub::new(transport, Arc::new(DeviceSchema::builtin()?));
//!
//! let snapshot = hub.poll_all().await;
//! if let Some(soc) = snapshot.get("battery1_soc") {
//!     println!("battery at {}%", soc);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::codec::decode;
use crate::config::HubConfig;
use crate::constants::{CONNECTION_PROBE_ADDRESS, DEFAULT_MANUFACTURER, DEFAULT_MODEL};
use crate::error::{ConfigError, Error, Result, TransportError};
use crate::planner::{plan_bit_write, plan_numeric_write};
use crate::schema::{DeviceSchema, RegisterSpec};
use crate::snapshot::Snapshot;
use crate::transport::{RegisterTransport, TcpTransport, TransportStats};
use crate::value::RegisterValue;

/// Read and decode every register once, in order.
///
/// Failures are logged and recorded as absent values; this never returns an
/// error. The caller is responsible for exclusive use of `transport`.
pub async fn poll_registers<T: RegisterTransport>(
    transport: &mut T,
    registers: &[RegisterSpec],
) -> Snapshot {
    let mut snapshot = Snapshot::new();
    let mut failed = 0usize;

    for spec in registers {
        let value = match read_register(transport, spec).await {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(key = %spec.key, address = spec.address, error = %err, "register unavailable");
                failed += 1;
                None
            }
        };
        snapshot.insert(spec.key.to_string(), value);
    }

    if failed > 0 {
        info!(total = registers.len(), failed, "poll cycle finished with absent values");
    } else {
        debug!(total = registers.len(), "poll cycle finished");
    }
    snapshot.stamp();
    snapshot
}

async fn read_register<T: RegisterTransport>(
    transport: &mut T,
    spec: &RegisterSpec,
) -> Result<RegisterValue> {
    let words = transport
        .read_holding_registers(spec.address, u16::from(spec.length))
        .await?;
    Ok(decode(&words, spec)?)
}

async fn read_text<T: RegisterTransport>(
    transport: &mut T,
    schema: &DeviceSchema,
    key: &str,
) -> Option<String> {
    let spec = schema.register(key)?;
    match read_register(transport, spec).await {
        Ok(RegisterValue::Text(text)) => Some(text),
        Ok(other) => Some(other.to_string()),
        Err(err) => {
            debug!(key, error = %err, "device info field unavailable");
            None
        }
    }
}

/// Identification strings read once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub model: Option<String>,
    pub serial: Option<String>,
    pub manufacturer: Option<String>,
}

impl DeviceInfo {
    pub fn model_or_default(&self) -> &str {
        non_empty(&self.model).unwrap_or(DEFAULT_MODEL)
    }

    pub fn manufacturer_or_default(&self) -> &str {
        non_empty(&self.manufacturer).unwrap_or(DEFAULT_MANUFACTURER)
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|text| !text.is_empty())
}

/// Owner of one device connection.
#[derive(Debug)]
pub struct Hub<T: RegisterTransport = TcpTransport> {
    transport: Mutex<T>,
    schema: Arc<DeviceSchema>,
    snapshot: RwLock<Snapshot>,
    refresh_before_bit_write: bool,
}

impl Hub<TcpTransport> {
    /// Build a TCP hub from loaded configuration.
    pub fn from_config(config: &HubConfig) -> Result<Self> {
        let address = config.socket_addr()?;
        let transport = TcpTransport::new(address, config.slave_id)
            .with_timeout(config.timeout());
        let hub = Hub::new(transport, Arc::new(config.schema()?))
            .with_refresh_before_bit_write(config.refresh_before_bit_write);
        Ok(hub)
    }
}

impl<T: RegisterTransport> Hub<T> {
    pub fn new(transport: T, schema: Arc<DeviceSchema>) -> Self {
        Self {
            transport: Mutex::new(transport),
            schema,
            snapshot: RwLock::new(Snapshot::new()),
            refresh_before_bit_write: false,
        }
    }

    /// Read the current register word before each switch write instead of
    /// trusting the last snapshot.
    pub fn with_refresh_before_bit_write(mut self, enabled: bool) -> Self {
        self.refresh_before_bit_write = enabled;
        self
    }

    pub fn schema(&self) -> &Arc<DeviceSchema> {
        &self.schema
    }

    /// Run one poll cycle and make it the current snapshot.
    pub async fn poll_all(&self) -> Snapshot {
        let mut transport = self.transport.lock().await;
        let snapshot = poll_registers(&mut *transport, self.schema.registers()).await;
        *self.snapshot.write().await = snapshot.clone();
        snapshot
    }

    /// Copy of the current snapshot.
    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    /// Read and decode a single register without touching the snapshot.
    pub async fn read_register(&self, key: &str) -> Result<RegisterValue> {
        let spec = self
            .schema
            .register(key)
            .ok_or_else(|| Error::unknown_point(key))?;
        let mut transport = self.transport.lock().await;
        read_register(&mut *transport, spec).await
    }

    /// Probe one word of the model name.
    pub async fn test_connection(&self) -> bool {
        let mut transport = self.transport.lock().await;
        match transport
            .read_holding_registers(CONNECTION_PROBE_ADDRESS, 1)
            .await
        {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "connection test failed");
                false
            }
        }
    }

    /// Read model, serial and manufacturer. Each one is optional.
    pub async fn device_info(&self) -> DeviceInfo {
        let mut transport = self.transport.lock().await;
        let transport = &mut *transport;
        DeviceInfo {
            model: read_text(transport, &self.schema, "model_name").await,
            serial: read_text(transport, &self.schema, "serial_number").await,
            manufacturer: read_text(transport, &self.schema, "mfg_id").await,
        }
    }

    /// Write a numeric point and patch the snapshot.
    ///
    /// Returns the integer actually written after quantization and
    /// clamping.
    pub async fn write_number(&self, key: &str, target: f64) -> Result<i64> {
        let number = self
            .schema
            .number(key)
            .ok_or_else(|| Error::unknown_point(key))?;
        let register = self.backing_register(key, &number.register)?;
        let plan = plan_numeric_write(target, number)?;

        let mut transport = self.transport.lock().await;
        let result = match plan.words.as_slice() {
            [word] => {
                transport
                    .write_single_register(register.address, *word)
                    .await
            }
            words => {
                transport
                    .write_multiple_registers(register.address, words)
                    .await
            }
        };
        if let Err(err) = result {
            warn!(key, address = register.address, error = %err, "number write failed");
            return Err(err.into());
        }

        self.snapshot
            .write()
            .await
            .patch(register.key.to_string(), RegisterValue::Integer(plan.value));
        info!(key, target, value = plan.value, "number written");
        Ok(plan.value)
    }

    /// Set or clear a switch bit and patch the snapshot.
    ///
    /// The other bits come from the last snapshot, or from a fresh read when
    /// [`with_refresh_before_bit_write`](Self::with_refresh_before_bit_write)
    /// is enabled. Returns the word written.
    pub async fn write_switch(&self, key: &str, on: bool) -> Result<u16> {
        let switch = self
            .schema
            .switch(key)
            .ok_or_else(|| Error::unknown_point(key))?;
        let register = self.backing_register(key, &switch.register)?;

        let mut transport = self.transport.lock().await;
        let current = if self.refresh_before_bit_write {
            let words = transport
                .read_holding_registers(register.address, 1)
                .await
                .inspect_err(|err| {
                    warn!(key, address = register.address, error = %err, "switch refresh failed");
                })?;
            words.first().copied()
        } else {
            self.snapshot
                .read()
                .await
                .get(&register.key)
                .and_then(|value| value.register_word(register.scale))
        };

        let word = plan_bit_write(on, current, switch.bit);
        if let Err(err) = transport.write_single_register(register.address, word).await {
            warn!(key, address = register.address, error = %err, "switch write failed");
            return Err(err.into());
        }

        let patched = decode(&[word], register).unwrap_or(RegisterValue::Integer(i64::from(word)));
        self.snapshot
            .write()
            .await
            .patch(register.key.to_string(), patched);
        info!(key, on, word, "switch written");
        Ok(word)
    }

    /// Current value of a numeric point, `None` when unknown.
    pub async fn number_value(&self, key: &str) -> Option<f64> {
        let number = self.schema.number(key)?;
        self.snapshot
            .read()
            .await
            .get(&number.register)
            .and_then(RegisterValue::as_f64)
    }

    /// Current state of a switch; unknown reads as off.
    pub async fn switch_state(&self, key: &str) -> bool {
        let Some(switch) = self.schema.switch(key) else {
            return false;
        };
        let Some(register) = self.schema.register(&switch.register) else {
            return false;
        };
        self.snapshot
            .read()
            .await
            .get(&register.key)
            .and_then(|value| value.register_word(register.scale))
            .is_some_and(|word| (word >> switch.bit) & 1 == 1)
    }

    pub async fn stats(&self) -> TransportStats {
        self.transport.lock().await.stats()
    }

    /// Close the underlying connection. Later calls fail.
    pub async fn close(&self) -> std::result::Result<(), TransportError> {
        self.transport.lock().await.close().await
    }

    fn backing_register(&self, point: &str, register: &str) -> Result<&RegisterSpec> {
        self.schema.register(register).ok_or_else(|| {
            ConfigError::UnknownRegister {
                point: point.to_string(),
                register: register.to_string(),
            }
            .into()
        })
    }
}
