//! Device and protocol constants
//!
//! Protocol limits follow the Modbus application protocol specification;
//! device defaults follow the Solakon ONE factory settings.

// ============================================================================
// Register Operation Limits
// ============================================================================

/// Maximum number of registers for FC03 (Read Holding Registers)
///
/// Response PDU: Function Code (1) + Byte Count (1) + N × 2 ≤ 253,
/// therefore N ≤ 125.
pub const MAX_READ_REGISTERS: usize = 125;

/// Maximum number of registers for FC16 (Write Multiple Registers)
///
/// Request PDU: FC (1) + Address (2) + Quantity (2) + Byte Count (1) + N × 2 ≤ 253,
/// therefore N ≤ 123.
pub const MAX_WRITE_REGISTERS: usize = 123;

// ============================================================================
// Modbus Function Codes used by this client
// ============================================================================

/// Read Holding Registers (FC03)
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Write Single Register (FC06)
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// Write Multiple Registers (FC16)
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

// ============================================================================
// Device Defaults
// ============================================================================

/// Modbus TCP default port
pub const DEFAULT_TCP_PORT: u16 = 502;

/// Default unit (slave) identifier
pub const DEFAULT_SLAVE_ID: u8 = 1;

/// Default polling interval in seconds
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 30;

/// Register probed by the connection test (first word of the model name)
pub const CONNECTION_PROBE_ADDRESS: u16 = 30000;

/// Fallback manufacturer when `mfg_id` cannot be read
pub const DEFAULT_MANUFACTURER: &str = "Solakon";

/// Fallback model when `model_name` cannot be read
pub const DEFAULT_MODEL: &str = "One";

// ============================================================================
// Status Bitfield Aliases
// ============================================================================

/// Bit of a status word reporting standby
pub const STATUS_BIT_STANDBY: u8 = 0;

/// Bit of a status word reporting normal operation
pub const STATUS_BIT_OPERATION: u8 = 2;

/// Bit of a status word reporting a fault
pub const STATUS_BIT_FAULT: u8 = 6;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_fit_pdu() {
        const MAX_PDU_SIZE: usize = 253;
        assert!(2 + MAX_READ_REGISTERS * 2 <= MAX_PDU_SIZE);
        assert!(6 + MAX_WRITE_REGISTERS * 2 <= MAX_PDU_SIZE);
    }
}
