//! # Transport Adapter
//!
//! Holding-register access over Modbus TCP.
//!
//! Framing is handled by `tokio-modbus`; this module adds what the poll
//! cycle needs on top of it:
//!
//! - one error type ([`TransportError`]) for socket failures, timeouts and
//!   exception responses,
//! - an optional per-operation timeout,
//! - lazy reconnection after the link breaks,
//! - request/error counters ([`TransportStats`]).
//!
//! The [`RegisterTransport`] trait is the seam the [`Hub`](crate::Hub) is
//! generic over, so the poll and write paths can be driven by a scripted
//! transport in tests.
//!
//! ```rust,no_run
//! use solakon_modbus::{RegisterTransport, TcpTransport};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), solakon_modbus::TransportError> {
//! let mut transport = TcpTransport::new("192.168.1.50:502".parse().unwrap(), 1)
//!     .with_timeout(Some(Duration::from_secs(3)));
//! let words = transport.read_holding_registers(39232, 1).await?;
//! println!("soc raw = {}", words[0]);
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tracing::{debug, info};

use crate::constants::{
    FC_READ_HOLDING_REGISTERS, FC_WRITE_MULTIPLE_REGISTERS, FC_WRITE_SINGLE_REGISTER,
    MAX_READ_REGISTERS, MAX_WRITE_REGISTERS,
};
use crate::error::TransportError;

/// Result of one transport call.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Holding-register operations the poll and write paths rely on.
///
/// Implementations are used behind a mutex, so methods take `&mut self` and
/// only one call is ever in flight.
pub trait RegisterTransport: Send {
    /// Read `count` holding registers starting at `address` (FC03).
    fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> impl Future<Output = TransportResult<Vec<u16>>> + Send;

    /// Write one holding register (FC06).
    fn write_single_register(
        &mut self,
        address: u16,
        value: u16,
    ) -> impl Future<Output = TransportResult<()>> + Send;

    /// Write consecutive holding registers (FC16).
    fn write_multiple_registers(
        &mut self,
        address: u16,
        values: &[u16],
    ) -> impl Future<Output = TransportResult<()>> + Send;

    /// Release the connection. Later calls fail with [`TransportError::Closed`].
    fn close(&mut self) -> impl Future<Output = TransportResult<()>> + Send;

    fn stats(&self) -> TransportStats;
}

/// Transport counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub requests: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub exceptions: u64,
    pub reconnects: u64,
}

impl TransportStats {
    fn record<T>(&mut self, result: &TransportResult<T>) {
        self.requests += 1;
        match result {
            Ok(_) => {}
            Err(TransportError::Timeout { .. }) => {
                self.errors += 1;
                self.timeouts += 1;
            }
            Err(TransportError::Exception { .. }) => {
                self.errors += 1;
                self.exceptions += 1;
            }
            Err(_) => self.errors += 1,
        }
    }
}

/// Modbus TCP transport backed by a `tokio-modbus` client context.
///
/// The TCP connection is opened on first use. Socket errors and timeouts
/// drop it; the next call dials again. Exception responses leave it intact.
pub struct TcpTransport {
    address: SocketAddr,
    slave: Slave,
    timeout: Option<Duration>,
    context: Option<Context>,
    connected_once: bool,
    closed: bool,
    stats: TransportStats,
}

impl fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpTransport")
            .field("address", &self.address)
            .field("slave", &self.slave.0)
            .field("timeout", &self.timeout)
            .field("closed", &self.closed)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl TcpTransport {
    pub fn new(address: SocketAddr, slave_id: u8) -> Self {
        Self {
            address,
            slave: Slave(slave_id),
            timeout: None,
            context: None,
            connected_once: false,
            closed: false,
            stats: TransportStats::default(),
        }
    }

    /// Bound every operation (including the connect) by `timeout`.
    ///
    /// `None` leaves timing to the socket.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn is_connected(&self) -> bool {
        self.context.is_some()
    }

    /// Open the connection now instead of on the first request.
    pub async fn connect(&mut self) -> TransportResult<()> {
        self.context().await.map(|_| ())
    }

    async fn context(&mut self) -> TransportResult<&mut Context> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        if self.context.is_none() {
            let address = self.address;
            let slave = self.slave;
            let operation = format!("connect {}", address);
            let context = guarded(self.timeout, operation, async move {
                tcp::connect_slave(address, slave)
                    .await
                    .map_err(|err| TransportError::connection(format!("{}: {}", address, err)))
            })
            .await?;

            if self.connected_once {
                self.stats.reconnects += 1;
                info!(%address, "reconnected to device");
            } else {
                info!(%address, slave = slave.0, "connected to device");
            }
            self.connected_once = true;
            self.context = Some(context);
        }

        self.context.as_mut().ok_or(TransportError::Closed)
    }

    /// Book-keeping after every call: counters, and dropping a broken link.
    fn finish<T>(&mut self, result: TransportResult<T>) -> TransportResult<T> {
        self.stats.record(&result);
        if let Err(err) = &result {
            if err.breaks_connection() && self.context.take().is_some() {
                debug!(address = %self.address, error = %err, "dropping connection");
            }
        }
        result
    }
}

impl RegisterTransport for TcpTransport {
    async fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> TransportResult<Vec<u16>> {
        if count == 0 || usize::from(count) > MAX_READ_REGISTERS {
            return self.finish(Err(TransportError::invalid_request(format!(
                "read of {} registers at {} (limit {})",
                count, address, MAX_READ_REGISTERS
            ))));
        }
        let timeout = self.timeout;
        let result = match self.context().await {
            Ok(ctx) => {
                guarded(timeout, format!("read {} x{}", address, count), async {
                    flatten(
                        FC_READ_HOLDING_REGISTERS,
                        ctx.read_holding_registers(address, count).await,
                    )
                })
                .await
            }
            Err(err) => Err(err),
        };
        self.finish(result)
    }

    async fn write_single_register(&mut self, address: u16, value: u16) -> TransportResult<()> {
        let timeout = self.timeout;
        let result = match self.context().await {
            Ok(ctx) => {
                guarded(timeout, format!("write {}", address), async {
                    flatten(
                        FC_WRITE_SINGLE_REGISTER,
                        ctx.write_single_register(address, value).await,
                    )
                })
                .await
            }
            Err(err) => Err(err),
        };
        self.finish(result)
    }

    async fn write_multiple_registers(
        &mut self,
        address: u16,
        values: &[u16],
    ) -> TransportResult<()> {
        if values.is_empty() || values.len() > MAX_WRITE_REGISTERS {
            return self.finish(Err(TransportError::invalid_request(format!(
                "write of {} registers at {} (limit {})",
                values.len(),
                address,
                MAX_WRITE_REGISTERS
            ))));
        }
        let timeout = self.timeout;
        let result = match self.context().await {
            Ok(ctx) => {
                guarded(
                    timeout,
                    format!("write {} x{}", address, values.len()),
                    async {
                        flatten(
                            FC_WRITE_MULTIPLE_REGISTERS,
                            ctx.write_multiple_registers(address, values).await,
                        )
                    },
                )
                .await
            }
            Err(err) => Err(err),
        };
        self.finish(result)
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.closed = true;
        if let Some(mut ctx) = self.context.take() {
            if let Err(err) = ctx.disconnect().await {
                debug!(address = %self.address, error = %err, "disconnect failed");
            }
            info!(address = %self.address, "connection closed");
        }
        Ok(())
    }

    fn stats(&self) -> TransportStats {
        self.stats
    }
}

/// Run `fut`, failing with [`TransportError::Timeout`] if it outlives `timeout`.
async fn guarded<T, F>(
    timeout: Option<Duration>,
    operation: String,
    fut: F,
) -> TransportResult<T>
where
    F: Future<Output = TransportResult<T>>,
{
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::timeout(
                operation,
                u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            )),
        },
        None => fut.await,
    }
}

/// Collapse tokio-modbus' nested result (transport error outside, exception inside).
fn flatten<T>(
    function: u8,
    result: tokio_modbus::Result<T>,
) -> TransportResult<T> {
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(code)) => Err(TransportError::exception(function, u8::from(code))),
        Err(err) => Err(err.into()),
    }
}
