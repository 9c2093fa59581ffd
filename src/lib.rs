//! # Solakon Modbus - Polling Client for the Solakon ONE
//!
//! Reads the Solakon ONE holding-register map over Modbus TCP, decodes each
//! entry into a typed and scaled value, and writes the controllable points
//! back.
//!
//! ## Features
//!
//! - **Declarative register table**: 57 built-in registers, extendable from
//!   configuration, validated once at startup
//! - **Typed decoding**: Latin-1 strings, signed/unsigned 16/32-bit integers,
//!   fixed-point scaling, status bitfields
//! - **Write planning**: step quantization, clamping, two's-complement
//!   multi-register writes, bit read-modify-write
//! - **Resilient polling**: one failed register never aborts a cycle
//! - **Single-flight transport**: every request goes through one lock
//!
//! ## Register Types
//!
//! | Type | Words | Decoded as |
//! |------|-------|------------|
//! | `string` | n | text, trailing NULs stripped |
//! | `u16` / `i16` | 1 | integer or `raw / scale` |
//! | `u32` / `i32` | 2 | integer or `raw / scale` (high word first) |
//! | `bitfield16` | 1 | `bit0`..`bit15` plus status aliases |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use solakon_modbus::{Hub, HubConfig};
//!
//! #[tokio::main]
//! async fn main() -> solakon_modbus::Result<()> {
//!     let config = HubConfig::load(None)?;
//!     let hub = Hub::from_config(&config)?;
//!
//!     let info = hub.device_info().await;
//!     println!("{} {}", info.manufacturer_or_default(), info.model_or_default());
//!
//!     let snapshot = hub.poll_all().await;
//!     for (key, value) in snapshot.iter() {
//!         match value {
//!             Some(value) => println!("{key} = {value}"),
//!             None => println!("{key} unavailable"),
//!         }
//!     }
//!
//!     hub.close().await?;
//!     Ok(())
//! }
//! ```

// ============================================================================
// Core modules
// ============================================================================

/// Error types and result handling
pub mod error;

/// Protocol limits and device defaults
pub mod constants;

/// Register table and writable point definitions
pub mod schema;

/// Decoded register values
pub mod value;

/// Raw words to typed values
pub mod codec;

/// Requested values to register words
pub mod planner;

/// Modbus TCP transport
pub mod transport;

/// Poll results
pub mod snapshot;

/// Device connection owner
pub mod hub;

/// Configuration loading
pub mod config;

/// Subscriber setup for the command line tool
#[cfg(feature = "cli")]
pub mod logging;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Device API ===
pub use hub::{poll_registers, DeviceInfo, Hub};
pub use snapshot::Snapshot;

// === Schema ===
pub use schema::{
    DataType, DeviceSchema, RegisterSpec, WritableNumberSpec, WritableSwitchSpec,
    BUILTIN_REGISTERS,
};
pub use value::{RegisterValue, StatusBits};

// === Pure encode / decode ===
pub use codec::decode;
pub use planner::{plan_bit_write, plan_numeric_write, NumericWrite};

// === Transport ===
pub use transport::{RegisterTransport, TcpTransport, TransportResult, TransportStats};

// === Configuration ===
pub use config::HubConfig;

// === Error handling ===
pub use error::{ConfigError, DecodeError, Error, Result, TransportError};

// === Protocol limits ===
pub use constants::{MAX_READ_REGISTERS, MAX_WRITE_REGISTERS};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
