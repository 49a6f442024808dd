//! # Telegram Codec
//!
//! Stateless conversion between typed schemas and complete MBAP telegrams.
//!
//! ## Read Holding Registers (FC03)
//!
//! ```text
//! request:  [tid:2][0x0000][0x0006][unit][0x03][start:2][count:2]       (12 bytes)
//! response: [tid:2][0x0000][len:2][unit][0x03][bytes:1][data: count*2]  (9 + count*2)
//! ```
//!
//! ## Write Multiple Registers (FC16)
//!
//! ```text
//! request:  [tid:2][0x0000][7+count*2][unit][0x10][start:2][count:2][count*2][data]
//! response: [tid:2][0x0000][0x0006][unit][0x10][start:2][count:2]       (12 bytes)
//! ```
//!
//! The transaction id is left at zero when a telegram is built; the engine
//! stamps it right before each transmission.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::constants::{
    FC_READ_HOLDING_REGISTERS, FC_WRITE_MULTIPLE_REGISTERS, FUNCTION_OFFSET, MAX_READ_REGISTERS,
    MAX_WRITE_REGISTERS, READ_REQUEST_LEN, READ_RESPONSE_HEADER_LEN, UNIT_ID_OFFSET,
    WRITE_REQUEST_HEADER_LEN, WRITE_RESPONSE_LEN,
};
use crate::error::{ModbusError, ModbusResult};
use crate::schema::{self, ItemType, SchemaItem};
use crate::value::{pack_bits, unpack_bits, RegisterValue};
use crate::word_order::{value_to_wire_bytes, wire_to_value_bytes};

/// Slave / unit identifier
pub type SlaveId = u8;

/// Modbus codec for telegram construction.
pub struct ModbusCodec;

/// A complete request frame plus what its answer should look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telegram {
    frame: BytesMut,
    expected_response_len: usize,
}

impl Telegram {
    /// Raw frame bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.frame
    }

    /// Frozen copy of the frame for the writer task.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.frame)
    }

    /// Length of the frame in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.frame.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    /// Transaction id currently written in the header.
    pub fn transaction_id(&self) -> u16 {
        u16::from_be_bytes([self.frame[0], self.frame[1]])
    }

    /// Unit id byte.
    #[inline]
    pub fn unit_id(&self) -> SlaveId {
        self.frame[UNIT_ID_OFFSET]
    }

    /// Function code byte.
    #[inline]
    pub fn function(&self) -> u8 {
        self.frame[FUNCTION_OFFSET]
    }

    /// First register addressed by the request.
    pub fn start_register(&self) -> u16 {
        u16::from_be_bytes([self.frame[8], self.frame[9]])
    }

    /// Number of registers addressed by the request.
    pub fn register_count(&self) -> u16 {
        u16::from_be_bytes([self.frame[10], self.frame[11]])
    }

    /// Exact length a successful response must have.
    #[inline]
    pub fn expected_response_len(&self) -> usize {
        self.expected_response_len
    }

    /// Write transaction id and unit id into the header.
    pub fn stamp(&mut self, transaction_id: u16, unit_id: SlaveId) {
        self.frame[..2].copy_from_slice(&transaction_id.to_be_bytes());
        self.frame[UNIT_ID_OFFSET] = unit_id;
    }
}

/// Echo of a successful write: first register and number of registers written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteAck {
    pub address: u16,
    pub quantity: u16,
}

impl WriteAck {
    /// `[start register, quantity]`
    pub fn as_pair(&self) -> [u16; 2] {
        [self.address, self.quantity]
    }
}

// ============================================================================
// Telegram Building
// ============================================================================

impl ModbusCodec {
    /// Build a Read Holding Registers (FC03) telegram covering `schema`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use voltage_modbus_mux::{ModbusCodec, SchemaItem};
    ///
    /// let telegram = ModbusCodec::build_read_request(1, 0, &[SchemaItem::word(2)]).unwrap();
    /// assert_eq!(
    ///     telegram.as_bytes(),
    ///     &[0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x02]
    /// );
    /// assert_eq!(telegram.expected_response_len(), 13);
    /// ```
    pub fn build_read_request(
        slave_id: SlaveId,
        start_register: u16,
        schema: &[SchemaItem],
    ) -> ModbusResult<Telegram> {
        let count = schema::validate(schema, MAX_READ_REGISTERS)?;

        let mut frame = BytesMut::with_capacity(READ_REQUEST_LEN);
        frame.put_u16(0); // transaction id, stamped on send
        frame.put_u16(0); // protocol id
        frame.put_u16(6); // following length
        frame.put_u8(slave_id);
        frame.put_u8(FC_READ_HOLDING_REGISTERS);
        frame.put_u16(start_register);
        frame.put_u16(count);

        Ok(Telegram {
            frame,
            expected_response_len: READ_RESPONSE_HEADER_LEN + usize::from(count) * 2,
        })
    }

    /// Build a Write Multiple Registers (FC16) telegram from `schema` and `values`.
    pub fn build_write_request(
        slave_id: SlaveId,
        start_register: u16,
        schema: &[SchemaItem],
        values: &[RegisterValue],
    ) -> ModbusResult<Telegram> {
        let count = schema::validate(schema, MAX_WRITE_REGISTERS)?;
        let payload = encode_registers(schema, values)?;
        let byte_count = usize::from(count) * 2;

        let mut frame = BytesMut::with_capacity(WRITE_REQUEST_HEADER_LEN + byte_count);
        frame.put_u16(0);
        frame.put_u16(0);
        frame.put_u16(7 + byte_count as u16);
        frame.put_u8(slave_id);
        frame.put_u8(FC_WRITE_MULTIPLE_REGISTERS);
        frame.put_u16(start_register);
        frame.put_u16(count);
        frame.put_u8(byte_count as u8);
        frame.extend_from_slice(&payload);

        Ok(Telegram {
            frame,
            expected_response_len: WRITE_RESPONSE_LEN,
        })
    }
}

// ============================================================================
// Register Payload Encoding / Decoding
// ============================================================================

/// Encode `values` into register bytes following `schema`.
///
/// Each non-Empty slot consumes one value in order; Empty slots are zero-filled.
pub fn encode_registers(schema: &[SchemaItem], values: &[RegisterValue]) -> ModbusResult<Bytes> {
    let expected = schema::value_count(schema);
    if values.len() != expected {
        return Err(ModbusError::invalid_data(format!(
            "Schema expects {} values, got {}",
            expected,
            values.len()
        )));
    }

    let mut buf = BytesMut::with_capacity(schema::register_count(schema) * 2);
    let mut values = values.iter();

    for item in schema {
        if item.item_type == ItemType::Empty {
            buf.put_bytes(0, item.register_count() * 2);
            continue;
        }

        let order = item.word_order();
        for _ in 0..item.count {
            // Count checked above
            let Some(value) = values.next() else {
                return Err(ModbusError::invalid_data("Ran out of values"));
            };
            match (item.item_type, value) {
                (ItemType::Word, RegisterValue::Word(v)) => buf.put_u16(*v),
                (ItemType::Int, RegisterValue::Int(v)) => buf.put_i16(*v),
                (ItemType::Binary, RegisterValue::Binary(bits)) => buf.put_u16(pack_bits(bits)),
                (ItemType::Float, RegisterValue::Float(v)) => {
                    buf.put_slice(&value_to_wire_bytes(&v.to_be_bytes(), order))
                }
                (ItemType::DoubleWord, RegisterValue::DoubleWord(v)) => {
                    buf.put_slice(&value_to_wire_bytes(&v.to_be_bytes(), order))
                }
                (ItemType::DoubleInt, RegisterValue::DoubleInt(v)) => {
                    buf.put_slice(&value_to_wire_bytes(&v.to_be_bytes(), order))
                }
                (item_type, value) => {
                    return Err(ModbusError::invalid_data(format!(
                        "Schema item {} cannot encode a {} value",
                        item_type,
                        value.type_name()
                    )));
                }
            }
        }
    }

    Ok(buf.freeze())
}

/// Decode register bytes following `schema`.
pub fn decode_registers(schema: &[SchemaItem], data: &[u8]) -> ModbusResult<Vec<RegisterValue>> {
    let needed = schema::register_count(schema) * 2;
    if data.len() < needed {
        return Err(ModbusError::invalid_data(format!(
            "Schema needs {} bytes, got {}",
            needed,
            data.len()
        )));
    }

    let mut buf = data;
    let mut values = Vec::with_capacity(schema::value_count(schema));

    for item in schema {
        let order = item.word_order();
        match item.item_type {
            ItemType::Empty => buf.advance(item.register_count() * 2),
            ItemType::Word => {
                for _ in 0..item.count {
                    values.push(RegisterValue::Word(buf.get_u16()));
                }
            }
            ItemType::Int => {
                for _ in 0..item.count {
                    values.push(RegisterValue::Int(buf.get_i16()));
                }
            }
            ItemType::Binary => {
                for _ in 0..item.count {
                    values.push(RegisterValue::Binary(unpack_bits(buf.get_u16())));
                }
            }
            ItemType::Float | ItemType::DoubleWord | ItemType::DoubleInt => {
                for _ in 0..item.count {
                    let mut wire = [0u8; 4];
                    buf.copy_to_slice(&mut wire);
                    let bytes = wire_to_value_bytes(&wire, order);
                    values.push(match item.item_type {
                        ItemType::Float => RegisterValue::Float(f32::from_be_bytes(bytes)),
                        ItemType::DoubleWord => {
                            RegisterValue::DoubleWord(u32::from_be_bytes(bytes))
                        }
                        _ => RegisterValue::DoubleInt(i32::from_be_bytes(bytes)),
                    });
                }
            }
        }
    }

    Ok(values)
}

// ============================================================================
// Response Parsing
// ============================================================================

/// Decode the register data of a complete FC03 response frame.
pub fn decode_read_response(
    schema: &[SchemaItem],
    frame: &[u8],
) -> ModbusResult<Vec<RegisterValue>> {
    if frame.len() < READ_RESPONSE_HEADER_LEN {
        return Err(ModbusError::protocol(format!(
            "Read response too short: {} bytes",
            frame.len()
        )));
    }
    decode_registers(schema, &frame[READ_RESPONSE_HEADER_LEN..])
}

/// Parse the echo of a complete FC16 response frame.
pub fn parse_write_ack(frame: &[u8]) -> ModbusResult<WriteAck> {
    if frame.len() < WRITE_RESPONSE_LEN {
        return Err(ModbusError::protocol(format!(
            "Write response too short: {} bytes",
            frame.len()
        )));
    }
    let mut buf = &frame[8..WRITE_RESPONSE_LEN];
    Ok(WriteAck {
        address: buf.get_u16(),
        quantity: buf.get_u16(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn response_frame(unit: u8, function: u8, body: &[u8]) -> Vec<u8> {
        let mut frame = vec![0x00, 0x07, 0x00, 0x00];
        frame.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
        frame.push(unit);
        frame.push(function);
        frame.extend_from_slice(body);
        frame
    }

    #[test]
    fn test_build_read_request() {
        let telegram = ModbusCodec::build_read_request(1, 0, &[SchemaItem::word(2)]).unwrap();
        assert_eq!(telegram.len(), 12);
        assert_eq!(telegram.unit_id(), 1);
        assert_eq!(telegram.function(), 0x03);
        assert_eq!(telegram.start_register(), 0);
        assert_eq!(telegram.register_count(), 2);
        assert_eq!(telegram.expected_response_len(), 13);
    }

    #[test]
    fn test_build_read_request_counts_double_registers() {
        let schema = [SchemaItem::float(2), SchemaItem::empty(3), SchemaItem::int(1)];
        let telegram = ModbusCodec::build_read_request(7, 0x0100, &schema).unwrap();
        assert_eq!(
            telegram.as_bytes(),
            &[0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x07, 0x03, 0x01, 0x00, 0x00, 0x08]
        );
        assert_eq!(telegram.expected_response_len(), 9 + 16);
    }

    #[test]
    fn test_build_write_request_float() {
        let telegram = ModbusCodec::build_write_request(
            1,
            10,
            &[SchemaItem::float(1)],
            &[RegisterValue::Float(3.5)],
        )
        .unwrap();
        // 3.5 = 0x40600000
        assert_eq!(
            telegram.as_bytes(),
            &[
                0x00, 0x00, 0x00, 0x00, 0x00, 0x0B, 0x01, 0x10, 0x00, 0x0A, 0x00, 0x02, 0x04, 0x40,
                0x60, 0x00, 0x00
            ]
        );
        assert_eq!(telegram.len(), 17);
        assert_eq!(telegram.expected_response_len(), 12);
    }

    #[test]
    fn test_build_write_request_swapped_and_padding() {
        let schema = [
            SchemaItem::double_word(1).swapped(),
            SchemaItem::empty(1),
            SchemaItem::binary(1),
        ];
        let mut bits = [false; 16];
        bits[0] = true;
        bits[15] = true;
        let values = [RegisterValue::DoubleWord(0x12345678), RegisterValue::Binary(bits)];

        let telegram = ModbusCodec::build_write_request(2, 0, &schema, &values).unwrap();
        assert_eq!(
            &telegram.as_bytes()[13..],
            &[0x56, 0x78, 0x12, 0x34, 0x00, 0x00, 0x80, 0x01]
        );
    }

    #[test]
    fn test_build_write_request_rejects_bad_values() {
        let schema = [SchemaItem::word(2)];
        assert!(matches!(
            ModbusCodec::build_write_request(1, 0, &schema, &[RegisterValue::Word(1)]),
            Err(ModbusError::InvalidData { .. })
        ));
        assert!(matches!(
            ModbusCodec::build_write_request(
                1,
                0,
                &schema,
                &[RegisterValue::Word(1), RegisterValue::Float(1.0)]
            ),
            Err(ModbusError::InvalidData { .. })
        ));
        let too_many = [RegisterValue::Word(0); 124];
        assert!(
            ModbusCodec::build_write_request(1, 0, &[SchemaItem::word(124)], &too_many).is_err()
        );
    }

    #[test]
    fn test_stamp() {
        let mut telegram = ModbusCodec::build_read_request(1, 0, &[SchemaItem::word(1)]).unwrap();
        telegram.stamp(0xBEEF, 9);
        assert_eq!(telegram.transaction_id(), 0xBEEF);
        assert_eq!(telegram.unit_id(), 9);
        assert_eq!(&telegram.as_bytes()[..2], &[0xBE, 0xEF]);
    }

    #[test]
    fn test_decode_two_words() {
        let frame = response_frame(1, 0x03, &[0x04, 0x12, 0x34, 0xAB, 0xCD]);
        assert_eq!(frame.len(), 13);
        let values = decode_read_response(&[SchemaItem::word(2)], &frame).unwrap();
        assert_eq!(
            values,
            vec![RegisterValue::Word(0x1234), RegisterValue::Word(0xABCD)]
        );
    }

    #[test]
    fn test_decode_signed_and_binary() {
        let data = [0xFF, 0xFF, 0x00, 0x05];
        let values = decode_registers(&[SchemaItem::int(1), SchemaItem::binary(1)], &data).unwrap();
        assert_eq!(values[0], RegisterValue::Int(-1));
        let RegisterValue::Binary(bits) = values[1] else {
            panic!("Expected binary");
        };
        assert!(bits[0]);
        assert!(!bits[1]);
        assert!(bits[2]);
        assert!(bits[3..].iter().all(|b| !b));
    }

    #[test]
    fn test_decode_32bit_word_swap() {
        // 25.0 in IEEE 754: 0x41C80000, wire order CDAB
        let data = [0x00, 0x00, 0x41, 0xC8, 0xFF, 0xFF, 0xFF, 0xFE];
        let schema = [SchemaItem::float(1).swapped(), SchemaItem::double_int(1)];
        let values = decode_registers(&schema, &data).unwrap();
        assert_eq!(
            values,
            vec![RegisterValue::Float(25.0), RegisterValue::DoubleInt(-2)]
        );
    }

    #[test]
    fn test_decode_skips_empty() {
        let data = [0x11, 0x11, 0x22, 0x22, 0x00, 0x2A];
        let values = decode_registers(&[SchemaItem::empty(2), SchemaItem::word(1)], &data).unwrap();
        assert_eq!(values, vec![RegisterValue::Word(42)]);
    }

    #[test]
    fn test_decode_short_data() {
        assert!(decode_registers(&[SchemaItem::double_word(1)], &[0x00, 0x01]).is_err());
    }

    #[test]
    fn test_parse_write_ack() {
        let frame = response_frame(1, 0x10, &[0x00, 0x0A, 0x00, 0x02]);
        let ack = parse_write_ack(&frame).unwrap();
        assert_eq!(ack, WriteAck { address: 10, quantity: 2 });
        assert_eq!(ack.as_pair(), [10, 2]);
    }
}
