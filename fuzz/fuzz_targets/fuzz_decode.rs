#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use solakon_modbus::{decode, DataType, RegisterSpec};

#[derive(Debug, Arbitrary)]
struct Input {
    type_index: u8,
    length: u8,
    scale: Option<u32>,
    words: Vec<u16>,
}

const TYPES: [DataType; 6] = [
    DataType::String,
    DataType::U16,
    DataType::I16,
    DataType::U32,
    DataType::I32,
    DataType::Bitfield16,
];

fuzz_target!(|input: Input| {
    let data_type = TYPES[usize::from(input.type_index) % TYPES.len()];
    let mut spec = RegisterSpec::new("fuzz", 30000, input.length, data_type);
    spec.scale = input.scale.filter(|&s| s != 0);

    // Short input must be an error, never a panic
    match decode(&input.words, &spec) {
        Ok(value) => {
            let needed = usize::from(data_type.word_count().unwrap_or(1));
            assert!(input.words.len() >= needed);
            let _ = value.to_string();
        }
        Err(_) => assert!(input.words.len() < 2),
    }
});
