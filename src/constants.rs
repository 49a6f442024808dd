//! Modbus TCP gateway constants
//!
//! Frame layout (MBAP framing) used by every telegram:
//!
//! | Offset | Field | Size |
//! |--------|-------|------|
//! | 0 | Transaction ID | 2 |
//! | 2 | Protocol ID (= 0) | 2 |
//! | 4 | Following length | 2 |
//! | 6 | Unit / slave ID | 1 |
//! | 7 | Function code | 1 |
//! | 8.. | Function payload | N |

// ============================================================================
// Frame Size Constants
// ============================================================================

/// Bytes before the following-length count starts: Transaction ID(2) + Protocol ID(2) + Length(2)
pub const MBAP_PREFIX_LEN: usize = 6;

/// Offset of the unit (slave) id byte
pub const UNIT_ID_OFFSET: usize = 6;

/// Offset of the function code byte
pub const FUNCTION_OFFSET: usize = 7;

/// Offset of the exception code in an exception response
pub const EXCEPTION_CODE_OFFSET: usize = 8;

/// Smallest frame worth looking at: 7-byte header + function code + exception code
pub const MIN_RESPONSE_LEN: usize = 9;

/// Exact length of an exception response
pub const EXCEPTION_RESPONSE_LEN: usize = 9;

/// Read request: header(7) + FC(1) + start(2) + count(2)
pub const READ_REQUEST_LEN: usize = 12;

/// Fixed part of a read response before register data: header(7) + FC(1) + byte count(1)
pub const READ_RESPONSE_HEADER_LEN: usize = 9;

/// Fixed part of a write request before register data:
/// header(7) + FC(1) + start(2) + count(2) + byte count(1)
pub const WRITE_REQUEST_HEADER_LEN: usize = 13;

/// Write response echoes start register and quantity: header(7) + FC(1) + start(2) + count(2)
pub const WRITE_RESPONSE_LEN: usize = 12;

/// Bit set on the function code of an exception response
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Maximum PDU (Protocol Data Unit) size per Modbus specification
pub const MAX_PDU_SIZE: usize = 253;

/// Receive buffer ceiling; a frame announcing more than this is garbage
pub const MODBUS_RESPONSE_BUFFER_SIZE: usize = 512;

// ============================================================================
// Register Operation Limits
// ============================================================================

/// Maximum number of registers for FC03 (Read Holding Registers)
///
/// Response PDU: FC(1) + byte count(1) + N × 2 ≤ 253 → N ≤ 125
pub const MAX_READ_REGISTERS: usize = 125;

/// Maximum number of registers for FC16 (Write Multiple Registers)
///
/// Request PDU: FC(1) + start(2) + qty(2) + byte count(1) + N × 2 ≤ 253 → N ≤ 123
pub const MAX_WRITE_REGISTERS: usize = 123;

// ============================================================================
// Modbus Function Codes
// ============================================================================

/// Read Holding Registers (FC03)
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Write Multiple Registers (FC16)
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

// ============================================================================
// Modbus Exception Codes
// ============================================================================

/// Gateway Path Unavailable
pub const EXCEPTION_GATEWAY_PATH_UNAVAILABLE: u8 = 0x0A;

/// Gateway Target Device Failed to Respond
pub const EXCEPTION_GATEWAY_TARGET_FAILED: u8 = 0x0B;
