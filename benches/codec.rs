//! Benchmarks for NVCombo encoding/decoding performance

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nvcombo::{
    compression, decode, parse_combo_list, BandClass, Carrier, Combo, DescriptorWidth, Encoder,
    EncoderConfig, GroupingStrategy,
};

const BANDS: [u16; 12] = [1, 2, 3, 4, 5, 7, 8, 12, 20, 25, 28, 66];

fn generate_combos(count: usize) -> Vec<Combo> {
    (0..count)
        .map(|i| {
            let len = 1 + i % 4;
            let carriers = (0..len)
                .map(|j| {
                    let band = BANDS[(i / 4 + j * 5) % BANDS.len()];
                    let mimo = if (i + j) % 5 == 0 { 4 } else { 2 };
                    let carrier = Carrier::new(band, BandClass::A, mimo);
                    if j == 0 && i % 3 == 0 {
                        carrier.with_ul(BandClass::A)
                    } else {
                        carrier
                    }
                })
                .collect();
            Combo::new(carriers)
        })
        .collect()
}

fn bench_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("encoding");

    let combos = generate_combos(1000);
    group.throughput(Throughput::Elements(combos.len() as u64));

    let strategies = [
        ("auto_detect", GroupingStrategy::AutoDetect),
        ("fixed_wide", GroupingStrategy::Fixed(DescriptorWidth::Wide)),
    ];
    for (name, strategy) in strategies {
        let encoder = Encoder::with_config(EncoderConfig {
            strategy,
            ..Default::default()
        });
        group.bench_function(BenchmarkId::new("encode_1000_combos", name), |b| {
            b.iter(|| black_box(encoder.encode_combos(black_box(&combos))))
        });
    }

    let decoded = decode(&Encoder::new().encode_combos(&combos).unwrap().bytes).unwrap();
    let preserving = Encoder::with_config(EncoderConfig::preserving(&decoded));
    group.bench_function(BenchmarkId::new("encode_1000_combos", "preserve"), |b| {
        b.iter(|| black_box(preserving.encode(&decoded.combos, Some(&decoded.groups))))
    });

    group.finish();
}

fn bench_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("decoding");

    let combos = generate_combos(1000);
    let output = Encoder::new().encode_combos(&combos).unwrap();
    group.throughput(Throughput::Bytes(output.bytes.len() as u64));

    group.bench_function("decode_1000_combos", |b| {
        b.iter(|| black_box(decode(black_box(&output.bytes))))
    });

    group.finish();
}

fn bench_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("text");

    let text: String = generate_combos(1000)
        .iter()
        .map(|c| format!("{}\n", c))
        .collect();
    group.throughput(Throughput::Elements(1000));

    group.bench_function("parse_1000_lines", |b| {
        b.iter(|| black_box(parse_combo_list(black_box(&text))))
    });

    group.finish();
}

fn bench_compression(c: &mut Criterion) {
    let mut group = c.benchmark_group("compression");

    for count in [100usize, 1000, 10_000] {
        let raw = Encoder::new()
            .encode_combos(&generate_combos(count))
            .unwrap()
            .bytes;
        group.throughput(Throughput::Bytes(raw.len() as u64));

        group.bench_with_input(BenchmarkId::new("deflate", count), &raw, |b, raw| {
            b.iter(|| black_box(compression::deflate(raw, compression::DEFAULT_LEVEL)))
        });

        let packed = compression::deflate(&raw, compression::DEFAULT_LEVEL).unwrap();
        group.bench_with_input(BenchmarkId::new("inflate", count), &packed, |b, packed| {
            b.iter(|| black_box(compression::inflate(packed)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_encoding,
    bench_decoding,
    bench_text,
    bench_compression
);
criterion_main!(benches);
