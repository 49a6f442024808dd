//! Build write telegrams from arbitrary schemas and values, then decode the
//! payload back. Whatever encodes must decode to the same values.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use voltage_modbus_mux::codec::decode_registers;
use voltage_modbus_mux::{ModbusCodec, RegisterValue, SchemaItem};

#[derive(Arbitrary, Debug)]
enum Slot {
    Gap(u8),
    Word(u16),
    Int(i16),
    Binary(u16),
    Float(u32, bool),
    DoubleWord(u32, bool),
    DoubleInt(i32, bool),
}

fuzz_target!(|slots: Vec<Slot>| {
    let mut schema = Vec::new();
    let mut values = Vec::new();

    for slot in slots.iter().take(32) {
        match *slot {
            Slot::Gap(n) => schema.push(SchemaItem::empty(u16::from(n % 4) + 1)),
            Slot::Word(v) => {
                schema.push(SchemaItem::word(1));
                values.push(RegisterValue::Word(v));
            }
            Slot::Int(v) => {
                schema.push(SchemaItem::int(1));
                values.push(RegisterValue::Int(v));
            }
            Slot::Binary(v) => {
                schema.push(SchemaItem::binary(1));
                values.push(RegisterValue::Binary(voltage_modbus_mux::value::unpack_bits(v)));
            }
            Slot::Float(bits, swap) => {
                let item = SchemaItem::float(1);
                schema.push(if swap { item.swapped() } else { item });
                values.push(RegisterValue::Float(f32::from_bits(bits)));
            }
            Slot::DoubleWord(v, swap) => {
                let item = SchemaItem::double_word(1);
                schema.push(if swap { item.swapped() } else { item });
                values.push(RegisterValue::DoubleWord(v));
            }
            Slot::DoubleInt(v, swap) => {
                let item = SchemaItem::double_int(1);
                schema.push(if swap { item.swapped() } else { item });
                values.push(RegisterValue::DoubleInt(v));
            }
        }
    }

    let Ok(telegram) = ModbusCodec::build_write_request(1, 0, &schema, &values) else {
        return;
    };
    let decoded = decode_registers(&schema, &telegram.as_bytes()[13..])
        .expect("encoded payload must decode");

    assert_eq!(decoded.len(), values.len());
    for (got, want) in decoded.iter().zip(&values) {
        match (got, want) {
            // NaN payloads compare by bit pattern
            (RegisterValue::Float(a), RegisterValue::Float(b)) => {
                assert_eq!(a.to_bits(), b.to_bits())
            }
            _ => assert_eq!(got, want),
        }
    }
});
