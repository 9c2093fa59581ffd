#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use solakon_modbus::{plan_bit_write, plan_numeric_write, WritableNumberSpec};

#[derive(Debug, Arbitrary)]
struct Input {
    target: f64,
    min: Option<f64>,
    max: Option<f64>,
    step: Option<f64>,
    count: u8,
    current: Option<u16>,
    bit: u8,
    on: bool,
}

fuzz_target!(|input: Input| {
    let mut spec = WritableNumberSpec::new("fuzz", "fuzz").with_count(input.count);
    spec.min = input.min;
    spec.max = input.max;
    spec.step = input.step.filter(|s| s.is_finite() && *s > 0.0);

    if let Ok(plan) = plan_numeric_write(input.target, &spec) {
        assert_eq!(plan.words.len(), usize::from(input.count));
    }

    let _ = plan_bit_write(input.on, input.current, input.bit);
});
