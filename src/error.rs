//! # Error Handling
//!
//! Error taxonomy for the polling client. Three families matter to callers:
//!
//! - [`TransportError`]: connection loss, timeouts and Modbus exception
//!   responses on a single read or write call. While polling these are
//!   absorbed into absent snapshot values; writes return them.
//! - [`DecodeError`]: raw words that do not fit the declared data type.
//!   Never escapes the decoder boundary during a poll.
//! - [`ConfigError`]: schema or writable-point definitions that can never
//!   work (bad lengths, dangling references, unsupported register counts).
//!   Retrying will not help, so these are reported and never truncated away.
//!
//! [`Error`] wraps all of them for the [`Hub`](crate::Hub) API.
//!
//! ```rust
//! use solakon_modbus::{Error, TransportError};
//!
//! let err = Error::from(TransportError::timeout("read 39063", 3000));
//! assert!(err.is_recoverable());
//! ```

use thiserror::Error;

use crate::schema::DataType;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of one Modbus transaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Socket-level failure while talking to the device.
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Could not establish the TCP connection.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// The operation did not complete within the configured timeout.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The device answered with a Modbus exception response.
    ///
    /// Common codes: 0x02 illegal data address, 0x03 illegal data value,
    /// 0x06 server device busy.
    #[error("Modbus exception: function={function:02X}, code={code:02X} ({message})")]
    Exception { function: u8, code: u8, message: String },

    /// The request can never be framed (empty or above the PDU limit).
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// A request was attempted after the transport was closed.
    #[error("Transport is closed")]
    Closed,
}

impl TransportError {
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn invalid_request<S: Into<String>>(message: S) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn timeout<S: Into<String>>(operation: S, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Build an exception error, mapping standard codes to readable text.
    pub fn exception(function: u8, code: u8) -> Self {
        let message = match code {
            0x01 => "Illegal Function",
            0x02 => "Illegal Data Address",
            0x03 => "Illegal Data Value",
            0x04 => "Server Device Failure",
            0x05 => "Acknowledge",
            0x06 => "Server Device Busy",
            0x08 => "Memory Parity Error",
            0x0A => "Gateway Path Unavailable",
            0x0B => "Gateway Target Device Failed to Respond",
            _ => "Unknown Exception",
        }
        .to_string();

        Self::Exception {
            function,
            code,
            message,
        }
    }

    /// Whether the connection should be torn down and re-established.
    ///
    /// Exception responses prove the link works, so they keep the connection.
    pub fn breaks_connection(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Connection { .. } | Self::Timeout { .. }
        )
    }

    /// Whether a later attempt (next poll, re-issued write) may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io { .. } | Self::Connection { .. } | Self::Timeout { .. } => true,
            // Acknowledge, busy
            Self::Exception { code, .. } => matches!(code, 0x05 | 0x06),
            Self::InvalidRequest { .. } | Self::Closed => false,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<tokio_modbus::Error> for TransportError {
    fn from(err: tokio_modbus::Error) -> Self {
        match err {
            tokio_modbus::Error::Transport(io) => Self::io(io.to_string()),
            other => Self::io(other.to_string()),
        }
    }
}

/// Raw register data that cannot be decoded as the declared type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{data_type} needs {expected} register(s), got {actual}")]
    ShortRead {
        data_type: DataType,
        expected: usize,
        actual: usize,
    },
}

/// A schema or write definition that can never succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("register '{key}': {data_type} requires length {expected}, declared {declared}")]
    LengthMismatch {
        key: String,
        data_type: DataType,
        expected: u8,
        declared: u8,
    },

    #[error("duplicate key '{key}'")]
    DuplicateKey { key: String },

    #[error("'{point}' references unknown register '{register}'")]
    UnknownRegister { point: String, register: String },

    #[error("unsupported register count {count} for '{key}' (expected 1 or 2)")]
    UnsupportedCount { key: String, count: u8 },

    #[error("invalid configuration for '{key}': {message}")]
    Invalid { key: String, message: String },
}

impl ConfigError {
    pub fn invalid<K: Into<String>, S: Into<String>>(key: K, message: S) -> Self {
        Self::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Crate-level error returned by the [`Hub`](crate::Hub) API.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    InvalidConfiguration(#[from] ConfigError),

    /// A write named a number or switch that is not in the schema.
    #[error("unknown point '{key}'")]
    UnknownPoint { key: String },

    /// Configuration sources could not be read or deserialized.
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl Error {
    pub fn unknown_point<S: Into<String>>(key: S) -> Self {
        Self::UnknownPoint { key: key.into() }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_recoverable(),
            _ => false,
        }
    }

    pub fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_messages() {
        let err = TransportError::exception(0x03, 0x02);
        assert_eq!(
            err.to_string(),
            "Modbus exception: function=03, code=02 (Illegal Data Address)"
        );
        assert!(!err.is_recoverable());
        assert!(!err.breaks_connection());

        let busy = TransportError::exception(0x06, 0x06);
        assert!(busy.is_recoverable());
    }

    #[test]
    fn test_connection_classification() {
        assert!(TransportError::timeout("read", 1000).breaks_connection());
        assert!(TransportError::io("reset by peer").breaks_connection());
        assert!(!TransportError::Closed.breaks_connection());
        assert!(!TransportError::Closed.is_recoverable());
    }

    #[test]
    fn test_error_wrapping() {
        let err: Error = ConfigError::UnsupportedCount {
            key: "export_limit".to_string(),
            count: 3,
        }
        .into();
        assert!(!err.is_recoverable());
        assert!(!err.is_transport_error());
        assert!(err.to_string().contains("unsupported register count 3"));

        let err: Error = TransportError::connection("refused").into();
        assert!(err.is_transport_error());
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::ShortRead {
            data_type: DataType::I32,
            expected: 2,
            actual: 1,
        };
        assert_eq!(err.to_string(), "i32 needs 2 register(s), got 1");
    }
}
