//! Feed arbitrary bytes to the response decoders.
//!
//! Decoding must return an error on malformed input, never panic.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use voltage_modbus_mux::codec::{decode_read_response, parse_write_ack};
use voltage_modbus_mux::{ItemType, SchemaItem};

#[derive(Arbitrary, Debug)]
struct Input {
    items: Vec<(u8, u8, bool)>,
    frame: Vec<u8>,
}

const TYPES: [ItemType; 7] = [
    ItemType::Empty,
    ItemType::Word,
    ItemType::Int,
    ItemType::Binary,
    ItemType::Float,
    ItemType::DoubleWord,
    ItemType::DoubleInt,
];

fuzz_target!(|input: Input| {
    let schema: Vec<SchemaItem> = input
        .items
        .iter()
        .take(16)
        .map(|&(kind, count, swap)| SchemaItem {
            item_type: TYPES[usize::from(kind) % TYPES.len()],
            count: u16::from(count),
            swap_words: swap,
        })
        .collect();

    let _ = decode_read_response(&schema, &input.frame);
    let _ = parse_write_ack(&input.frame);
});
