//! Benchmarks for register decoding and write planning

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use solakon_modbus::{
    decode, plan_numeric_write, DataType, RegisterSpec, WritableNumberSpec, BUILTIN_REGISTERS,
};

fn words_for(spec: &RegisterSpec) -> Vec<u16> {
    match spec.data_type {
        DataType::String => vec![0x534F; usize::from(spec.length)],
        _ => vec![0xFFFE, 0x1DC0],
    }
}

fn bench_decode_types(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let specs = [
        RegisterSpec::new("model_name", 30000, 16, DataType::String),
        RegisterSpec::scaled("grid_frequency", 39139, 1, DataType::I16, 100, Some("Hz")),
        RegisterSpec::scaled("active_power", 39134, 2, DataType::I32, 1000, Some("kW")),
        RegisterSpec::new("status_1", 39063, 1, DataType::Bitfield16),
    ];

    for spec in &specs {
        let words = words_for(spec);
        group.bench_with_input(
            BenchmarkId::from_parameter(spec.data_type),
            &words,
            |b, words| b.iter(|| decode(black_box(words), black_box(spec))),
        );
    }
    group.finish();
}

fn bench_decode_builtin_table(c: &mut Criterion) {
    let table: Vec<(RegisterSpec, Vec<u16>)> = BUILTIN_REGISTERS
        .iter()
        .map(|spec| (spec.clone(), words_for(spec)))
        .collect();

    c.bench_function("decode_builtin_table", |b| {
        b.iter(|| {
            for (spec, words) in &table {
                let _ = black_box(decode(words, spec));
            }
        })
    });
}

fn bench_plan_numeric_write(c: &mut Criterion) {
    let spec = WritableNumberSpec::new("export_limit", "export_limit")
        .with_range(-10_000.0, 10_000.0)
        .with_step(5.0)
        .with_count(2);

    c.bench_function("plan_numeric_write", |b| {
        b.iter(|| plan_numeric_write(black_box(-1237.4), black_box(&spec)))
    });
}

criterion_group!(
    benches,
    bench_decode_types,
    bench_decode_builtin_table,
    bench_plan_numeric_write
);
criterion_main!(benches);
