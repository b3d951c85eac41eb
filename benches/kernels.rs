//! Kernel benchmarks comparing every tier the CPU supports.
//!
//! Each group benchmarks one operation at 8x8 (4x4 for the DST). A tier is
//! only benchmarked for keys it implements itself.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hevc_dsp::harness::{self, Harness, LogSink, Mode};
use hevc_dsp::{
    Channel, DequantizeParams, KernelKey, KernelTable, Neighbours, Operation, QuantizeParams,
    Tier, TierMask,
};

/// Generate pseudo-random coefficients in `[-range, range)`
fn generate_coeffs(len: usize, range: i32) -> Vec<i16> {
    (0..len)
        .map(|i| ((i as i32 * 73 + 17) % (2 * range) - range) as i16)
        .collect()
}

fn generate_pixels(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 73 + 17) % 256) as u8).collect()
}

/// Tables limited to `{reference, tier}` whose entry for `(op, key)` the
/// tier provides itself.
fn owning_tables(op: Operation, key: KernelKey) -> Vec<(Tier, KernelTable)> {
    TierMask::detect()
        .tiers()
        .map(|t| (t, KernelTable::build(TierMask::REFERENCE.with(t))))
        .filter(|(t, table)| table.provenance(op, key) == Some(*t))
        .collect()
}

fn bench_pred_intra_dc(c: &mut Criterion) {
    let key = KernelKey::intra(Channel::Luma, 3);
    let neighbours = Neighbours::from_fn(|x| (x * 5) as u8, |y| (250 - y * 3) as u8, 128);

    let mut group = c.benchmark_group("pred_intra_dc");
    group.throughput(Throughput::Elements(1)); // 1 block

    for (tier, table) in owning_tables(Operation::PredIntraDc, key) {
        let Some(entry) = table.pred_intra_dc(key) else { continue };
        group.bench_function(BenchmarkId::new(tier.name(), key), |b| {
            let mut dst = [0u8; 64];
            b.iter(|| {
                (entry.function)(black_box(&mut dst), black_box(&neighbours), key);
                dst
            })
        });
    }
    group.finish();
}

fn bench_quantize(c: &mut Criterion) {
    let key = KernelKey::size(3);
    let src = generate_coeffs(64, 4096);
    let params = QuantizeParams::new(51, 20, 14);

    let mut group = c.benchmark_group("quantize");
    group.throughput(Throughput::Elements(1));

    for (tier, table) in owning_tables(Operation::Quantize, key) {
        let Some(entry) = table.quantize(key) else { continue };
        group.bench_function(BenchmarkId::new(tier.name(), key), |b| {
            let mut dst = [0i16; 64];
            b.iter(|| (entry.function)(black_box(&mut dst), black_box(&src), params))
        });
    }
    group.finish();
}

fn bench_quantize_inverse(c: &mut Criterion) {
    let key = KernelKey::size(3);
    let src = generate_coeffs(64, 256);
    let params = DequantizeParams::new(51, 14);

    let mut group = c.benchmark_group("quantize_inverse");
    group.throughput(Throughput::Elements(1));

    for (tier, table) in owning_tables(Operation::QuantizeInverse, key) {
        let Some(entry) = table.quantize_inverse(key) else { continue };
        group.bench_function(BenchmarkId::new(tier.name(), key), |b| {
            let mut dst = [0i16; 64];
            b.iter(|| {
                (entry.function)(black_box(&mut dst), black_box(&src), params);
                dst
            })
        });
    }
    group.finish();
}

fn bench_reconstruct(c: &mut Criterion) {
    let key = KernelKey::size(3);
    let pred = generate_pixels(64);
    let residual = generate_coeffs(64, 256);

    let mut group = c.benchmark_group("reconstruct");
    group.throughput(Throughput::Elements(1));

    for (tier, table) in owning_tables(Operation::Reconstruct, key) {
        let Some(entry) = table.reconstruct(key) else { continue };
        group.bench_function(BenchmarkId::new(tier.name(), key), |b| {
            let mut dst = [0u8; 64];
            b.iter(|| {
                (entry.function)(black_box(&mut dst), 8, black_box(&pred), 8, &residual, 8);
                dst
            })
        });
    }
    group.finish();
}

fn bench_inverse_transforms(c: &mut Criterion) {
    let mut group = c.benchmark_group("inverse_transform_add");
    group.throughput(Throughput::Elements(1));

    for (op, key) in [
        (Operation::InverseTransformAdd, KernelKey::size(3)),
        (Operation::InverseDstAdd, KernelKey::size(2)),
    ] {
        let n = key.block_size();
        let coeffs = generate_coeffs(n * n, 256);
        let pred = generate_pixels(n * n);

        for (tier, table) in owning_tables(op, key) {
            let entry = match op {
                Operation::InverseDstAdd => table.inverse_dst_add(key),
                _ => table.inverse_transform_add(key),
            };
            let Some(entry) = entry else { continue };
            let id = BenchmarkId::new(format!("{}/{}", op, tier.name()), key);
            group.bench_function(id, |b| {
                let mut dst = vec![0u8; n * n];
                b.iter(|| {
                    (entry.function)(black_box(&mut dst), n, black_box(&pred), n, &coeffs);
                })
            });
        }
    }
    group.finish();
}

fn bench_harness_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("harness");
    group.sample_size(10);

    group.bench_function("run_all_correctness", |b| {
        let harness = Harness::detected();
        b.iter(|| harness::run_all(black_box(&harness), &mut harness::NullSink))
    });
    group.finish();

    // One logged benchmark sweep for the speedup table
    let harness = Harness::detected().mode(Mode::Benchmark { repeats: 1000 });
    if let Err(e) = harness::run_all(&harness, &mut LogSink) {
        eprintln!("harness sweep failed: {}", e);
    }
}

criterion_group!(
    benches,
    bench_pred_intra_dc,
    bench_quantize,
    bench_quantize_inverse,
    bench_reconstruct,
    bench_inverse_transforms,
    bench_harness_sweep,
);
criterion_main!(benches);
